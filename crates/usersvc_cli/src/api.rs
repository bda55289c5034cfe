//! Transport-facing use-case API.
//!
//! # Responsibility
//! - Run one service call per invocation on a freshly opened connection.
//! - Map service results and errors to a stable response envelope.
//!
//! # Invariants
//! - The connection lives only for the duration of one call and is dropped on
//!   every exit path.
//! - Functions never panic; every failure becomes an envelope.

use log::{error, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use usersvc_core::db::open_db;
use usersvc_core::{SqliteUserRepository, User, UserId, UserService, UserServiceError};

const DEFAULT_DB_FILE_NAME: &str = "usersvc.sqlite3";

/// Transport-level outcome class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    ClientError,
    NotFound,
    ServerError,
}

impl ResponseStatus {
    /// Process exit code for this outcome.
    ///
    /// 2 is left to clap, which exits with it on usage errors.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::ServerError => 1,
            Self::NotFound => 3,
            Self::ClientError => 4,
        }
    }
}

/// Response envelope for user calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserResponse {
    pub ok: bool,
    pub status: ResponseStatus,
    pub user: Option<User>,
    pub message: String,
}

impl UserResponse {
    fn success(user: User, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            status: ResponseStatus::Ok,
            user: Some(user),
            message: message.into(),
        }
    }

    fn failure(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            user: None,
            message: message.into(),
        }
    }
}

/// Default database location: `<tmp>/usersvc.sqlite3`.
pub fn default_db_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
}

/// Creates a user and reports the stored record.
pub fn create_user(db_path: &Path, name: &str, email: &str) -> UserResponse {
    respond("create_user", "User created.", db_path, |service| {
        service.create_user(name, email)
    })
}

/// Fetches a user by id.
pub fn get_user(db_path: &Path, id: i64) -> UserResponse {
    respond("get_user", "User found.", db_path, |service| {
        service.get_user_by_id(UserId::new(id))
    })
}

/// Maps a service error to its transport class.
///
/// Storage constraint violations are server errors: they surface a lost race,
/// not a caller mistake the caller could have avoided.
pub fn status_for(err: &UserServiceError) -> ResponseStatus {
    match err {
        UserServiceError::InvalidInput(_) | UserServiceError::DuplicateEmail(_) => {
            ResponseStatus::ClientError
        }
        UserServiceError::NotFound(_) => ResponseStatus::NotFound,
        UserServiceError::Repo(_) => ResponseStatus::ServerError,
    }
}

fn respond(
    op: &'static str,
    success_message: &str,
    db_path: &Path,
    f: impl FnOnce(&UserService<SqliteUserRepository<'_>>) -> Result<User, UserServiceError>,
) -> UserResponse {
    let conn = match open_db(db_path) {
        Ok(conn) => conn,
        Err(err) => {
            error!("event=api_call module=api status=error op={op} error_code={}", err.code());
            return UserResponse::failure(
                ResponseStatus::ServerError,
                format!("{op} failed: database open failed: {err}"),
            );
        }
    };
    let repo = match SqliteUserRepository::try_new(&conn) {
        Ok(repo) => repo,
        Err(err) => {
            error!("event=api_call module=api status=error op={op} error_code={}", err.code());
            return UserResponse::failure(
                ResponseStatus::ServerError,
                format!("{op} failed: repository init failed: {err}"),
            );
        }
    };

    match f(&UserService::new(repo)) {
        Ok(user) => {
            info!("event=api_call module=api status=ok op={op} user_id={}", user.id);
            UserResponse::success(user, success_message)
        }
        Err(err) => {
            let status = status_for(&err);
            if status == ResponseStatus::ServerError {
                error!("event=api_call module=api status=error op={op} error_code={}", err.code());
            } else {
                info!("event=api_call module=api status=rejected op={op} error_code={}", err.code());
            }
            UserResponse::failure(status, err.to_string())
        }
    }
}
