//! Command-line front end for the user service.
//!
//! # Responsibility
//! - Resolve database and logging configuration from flags or environment.
//! - Print one JSON envelope per call and exit with its mapped status code.

mod api;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "usersvc", version, about = "Create and look up users")]
struct Cli {
    /// SQLite database file; defaults to `<tmp>/usersvc.sqlite3`.
    #[arg(long, env = "USERSVC_DB_PATH", global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, env = "USERSVC_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// One of trace|debug|info|warn|error.
    #[arg(long, env = "USERSVC_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a user with a unique email.
    Create { name: String, email: String },
    /// Look up a user by id.
    Get { id: i64 },
    /// Check core linkage.
    Ping,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let log_dir = log_dir
            .to_str()
            .context("log directory must be valid UTF-8")?;
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| usersvc_core::default_log_level());
        usersvc_core::init_logging(level, log_dir).map_err(anyhow::Error::msg)?;
    }

    let db_path = cli.db.unwrap_or_else(api::default_db_path);
    let response = match cli.command {
        Command::Create { name, email } => api::create_user(&db_path, &name, &email),
        Command::Get { id } => api::get_user(&db_path, id),
        Command::Ping => {
            println!("usersvc_core ping={}", usersvc_core::ping());
            println!("usersvc_core version={}", usersvc_core::core_version());
            return Ok(ExitCode::SUCCESS);
        }
    };

    println!("{}", serde_json::to_string(&response)?);
    Ok(ExitCode::from(response.status.exit_code()))
}
