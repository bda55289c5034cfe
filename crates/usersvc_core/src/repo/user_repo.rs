//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create and lookup primitives over the `users` table.
//! - Surface the storage-level email uniqueness constraint as a typed error.
//!
//! # Invariants
//! - Write paths call `NewUser::validate()` before SQL mutations.
//! - `save` reports duplicates from the `UNIQUE` index itself, never from a
//!   pre-read, so the constraint holds even when callers skip their check.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::user::{NewUser, User, UserId, UserValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const USERS_TABLE: &str = "users";
const REQUIRED_USER_COLUMNS: &[&str] = &["id", "name", "email"];

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    email
FROM users";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for user persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(UserValidationError),
    /// A write collided with the unique index on `users.email`.
    ConstraintViolation {
        email: String,
    },
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::ConstraintViolation { .. } => "constraint_violation",
            Self::Db(err) => err.code(),
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::MissingRequiredColumn { .. } => "missing_column",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ConstraintViolation { .. } => {
                write!(f, "unique constraint violated on users.email")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted user data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it through db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UserValidationError> for RepoError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage capability set for users.
pub trait UserRepository {
    /// Persists a new user and returns it with its assigned id.
    ///
    /// Fails with `RepoError::ConstraintViolation` when `email` is taken.
    fn save(&self, user: &NewUser) -> RepoResult<User>;
    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
}

impl<R: UserRepository + ?Sized> UserRepository for &R {
    fn save(&self, user: &NewUser) -> RepoResult<User> {
        (**self).save(user)
    }

    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        (**self).find_by_id(id)
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        (**self).find_by_email(email)
    }
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Wraps a connection after checking that its schema is usable.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the `users`
    ///   shape does not match what this repository queries.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        ensure_users_schema(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn save(&self, user: &NewUser) -> RepoResult<User> {
        user.validate()?;

        let inserted = self.conn.execute(
            "INSERT INTO users (name, email) VALUES (?1, ?2);",
            params![user.name(), user.email()],
        );

        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(RepoError::ConstraintViolation {
                    email: user.email().to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        }

        let id = UserId::new(self.conn.last_insert_rowid());
        Ok(user.clone().into_user(id))
    }

    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        self.find_one(&format!("{USER_SELECT_SQL} WHERE id = ?1;"), id.get())
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.find_one(&format!("{USER_SELECT_SQL} WHERE email = ?1;"), email)
    }
}

impl SqliteUserRepository<'_> {
    fn find_one(&self, sql: &str, key: impl rusqlite::ToSql) -> RepoResult<Option<User>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let user = User {
        id: UserId::new(row.get("id")?),
        name: row.get("name")?,
        email: row.get("email")?,
    };
    user.validate().map_err(|err| {
        RepoError::InvalidData(format!("user {} violates field invariants: {err}", user.id))
    })?;
    Ok(user)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn ensure_users_schema(conn: &Connection) -> RepoResult<()> {
    let table: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [USERS_TABLE],
            |row| row.get(0),
        )
        .optional()?;
    if table.is_none() {
        return Err(RepoError::MissingRequiredTable(USERS_TABLE));
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let columns = stmt
        .query_map([USERS_TABLE], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    for &column in REQUIRED_USER_COLUMNS {
        if !columns.iter().any(|name| name == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: USERS_TABLE,
                column,
            });
        }
    }
    Ok(())
}
