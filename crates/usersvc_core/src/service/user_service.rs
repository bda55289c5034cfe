//! User use-case service.
//!
//! # Responsibility
//! - Enforce the no-duplicate-email rule before writing.
//! - Translate lookup misses into explicit domain errors.
//!
//! # Invariants
//! - `create_user` is check-then-act with no lock between the email lookup
//!   and the write. A concurrent writer that loses the race gets the store's
//!   `RepoError::ConstraintViolation` back unchanged, as
//!   `UserServiceError::Repo`.
//! - Service layer remains storage-agnostic.

use crate::model::user::{NewUser, User, UserId, UserValidationError};
use crate::repo::user_repo::{RepoError, UserRepository};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub const DUPLICATE_EMAIL_MESSAGE: &str = "User with this email already exists";
pub const NOT_FOUND_MESSAGE: &str = "User not found";

/// Service error for user use-cases.
#[derive(Debug)]
pub enum UserServiceError {
    /// Input failed field validation; nothing was read or written.
    InvalidInput(UserValidationError),
    /// Another user already holds this email at check time.
    DuplicateEmail(String),
    /// No user has this id.
    NotFound(UserId),
    /// Persistence-layer failure, including storage constraint violations.
    Repo(RepoError),
}

impl UserServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(err) => err.code(),
            Self::DuplicateEmail(_) => "duplicate_email",
            Self::NotFound(_) => "not_found",
            Self::Repo(err) => err.code(),
        }
    }
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::DuplicateEmail(_) => f.write_str(DUPLICATE_EMAIL_MESSAGE),
            Self::NotFound(_) => f.write_str(NOT_FOUND_MESSAGE),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UserValidationError> for UserServiceError {
    fn from(value: UserValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

impl From<RepoError> for UserServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// User service facade over a repository implementation.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    /// Creates a service owning the provided repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a user after checking that `email` is free.
    ///
    /// # Errors
    /// - `InvalidInput` when `name` or `email` is empty.
    /// - `DuplicateEmail` when a user with `email` already exists.
    /// - `Repo(RepoError::ConstraintViolation { .. })` when a concurrent
    ///   writer inserted the same email between the check and the write.
    pub fn create_user(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<User, UserServiceError> {
        let started_at = Instant::now();
        let draft = NewUser::new(name, email)?;

        if self.repo.find_by_email(draft.email())?.is_some() {
            warn!(
                "event=user_create module=service status=error duration_ms={} error_code=duplicate_email",
                started_at.elapsed().as_millis()
            );
            return Err(UserServiceError::DuplicateEmail(draft.email().to_string()));
        }

        let user = self.repo.save(&draft).map_err(|err| {
            warn!(
                "event=user_create module=service status=error duration_ms={} error_code={}",
                started_at.elapsed().as_millis(),
                err.code()
            );
            err
        })?;

        info!(
            "event=user_create module=service status=ok user_id={} duration_ms={}",
            user.id,
            started_at.elapsed().as_millis()
        );
        Ok(user)
    }

    /// Gets one user by id.
    pub fn get_user_by_id(&self, id: UserId) -> Result<User, UserServiceError> {
        self.repo
            .find_by_id(id)?
            .ok_or(UserServiceError::NotFound(id))
    }

    /// Borrows the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }
}
