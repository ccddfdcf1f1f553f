//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
use std::{env, path::Path, str::FromStr, time::Duration};

use log::{info, warn};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Error as SqlxError,
    SqlitePool,
};

pub mod change_feed;
pub mod counters;
pub mod exceptions;
pub mod orders;

const SQLITE_DB_URL: &str = "sqlite://data/chatpesa_ledger.db";

pub fn db_url() -> String {
    let result = env::var("CPL_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ CPL_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Creates a connection pool. The database file (and its parent folder) is created if it does not exist yet.
///
/// `timeout` bounds how long a caller waits for a pooled connection. SQLite's busy handler waits for half of it, so
/// that lock contention is reported as such before the caller's own deadline expires.
pub async fn new_pool(url: &str, max_connections: u32, timeout: Duration) -> Result<SqlitePool, SqlxError> {
    ensure_parent_folder(url);
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true)
        .busy_timeout(timeout / 2);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await?;
    Ok(pool)
}

fn ensure_parent_folder(url: &str) {
    let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return;
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("🗃️ Could not create the database folder {}: {e}", parent.display());
        }
    }
}
