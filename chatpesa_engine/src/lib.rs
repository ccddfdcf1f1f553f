//! ChatPesa Ledger Engine
//!
//! The ChatPesa ledger tracks orders placed over chat, matches them with mobile-money payment confirmations, and lets
//! any number of dashboards follow their state in near-real time. This library contains the core logic. It knows
//! nothing about HTTP or about the chat and payment providers.
//!
//! The library is divided into these sections:
//! 1. Storage contracts ([`mod@traits`]) and the SQLite backend ([`SqliteDatabase`]). You should never need to touch
//!    the database directly; use the public API instead. The data types stored in the database are defined in
//!    [`mod@db_types`] and are public.
//! 2. The ledger public API: [`LedgerApi`] applies every order mutation and enforces the order state machine, and
//!    [`QueryApi`] serves snapshots, change feed pages and live feed subscriptions.
//!
//! The engine also emits events when orders are created, paid, cancelled or failed, and when a payment is held for
//! reconciliation. A simple actor framework ([`mod@events`]) lets you hook into these events and perform custom
//! actions.
pub mod db_types;
pub mod events;
pub mod helpers;
mod ledger_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use ledger_api::{
    errors::{LedgerError, QueryApiError},
    id_generator::OrderIdGenerator,
    ledger_flow_api::{LedgerApi, LedgerConfig, DEFAULT_MATCH_WINDOW_HOURS, DEFAULT_MAX_WRITE_ATTEMPTS, DEFAULT_RETRY_AFTER},
    order_objects,
    query_api::{QueryApi, DEFAULT_CHANGES_LIMIT, MAX_CHANGES_LIMIT},
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase, DEFAULT_STORE_TIMEOUT};
