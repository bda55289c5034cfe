//! User domain model.
//!
//! # Responsibility
//! - Define the persisted `User` record and its store-assigned identity.
//! - Define `NewUser`, the validated draft accepted by store writes.
//!
//! # Invariants
//! - `id` is assigned by the store, immutable and never reused.
//! - `name` and `email` are never empty.
//! - At most one `User` exists per `email` value.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned identifier of a persisted user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wraps a raw identifier value.
    ///
    /// Any `i64` is accepted so lookups can be issued for ids the store never
    /// produced; such lookups simply miss.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validation failures for user field invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    /// `name` is the empty string.
    EmptyName,
    /// `email` is the empty string.
    EmptyEmail,
}

impl UserValidationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyName => "empty_name",
            Self::EmptyEmail => "empty_email",
        }
    }
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name must not be empty"),
            Self::EmptyEmail => write!(f, "email must not be empty"),
        }
    }
}

impl Error for UserValidationError {}

/// Persisted user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl User {
    /// Checks field invariants on a record read back from storage.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        validate_fields(&self.name, &self.email)
    }
}

/// Id-less user draft accepted by `UserRepository::save`.
///
/// Values are stored exactly as given; no trimming or case folding is done,
/// so email uniqueness is byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    name: String,
    email: String,
}

impl NewUser {
    /// Builds a draft, rejecting an empty `name` or `email`.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, UserValidationError> {
        let draft = Self {
            name: name.into(),
            email: email.into(),
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Re-checks field invariants.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        validate_fields(&self.name, &self.email)
    }

    /// Attaches a store-assigned id, producing the persisted shape.
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
        }
    }
}

fn validate_fields(name: &str, email: &str) -> Result<(), UserValidationError> {
    if name.is_empty() {
        return Err(UserValidationError::EmptyName);
    }
    if email.is_empty() {
        return Err(UserValidationError::EmptyEmail);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_fields, UserValidationError};

    #[test]
    fn name_is_checked_before_email() {
        assert_eq!(validate_fields("", ""), Err(UserValidationError::EmptyName));
    }

    #[test]
    fn whitespace_only_values_are_not_empty() {
        assert_eq!(validate_fields(" ", "\u{3000}"), Ok(()));
        assert_eq!(
            validate_fields("Анна", ""),
            Err(UserValidationError::EmptyEmail)
        );
    }
}
