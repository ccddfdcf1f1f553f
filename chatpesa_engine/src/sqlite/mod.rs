//! SQLite backend for the ChatPesa order ledger.
//!
//! Orders, the id counter, the change feed and held payments share one database file, so that an order write and its
//! feed event are committed in a single transaction.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::{SqliteDatabase, DEFAULT_STORE_TIMEOUT};
