//! # ChatPesa ledger public API
//!
//! The `ledger_api` module exposes the programmatic API of the order ledger. It is split by concern so that callers
//! only take what they need:
//!
//! * [`ledger_flow_api`] is the write side. It creates orders, applies payment confirmations, cancels and fails
//!   orders, and runs the change feed recovery pass. It is the only code that mutates orders.
//! * [`query_api`] is the read side that dashboards use: order snapshots, change feed pages, live subscriptions and
//!   the held-payment list. It never mutates anything.
//! * [`id_generator`] turns the store's durable counter into order ids.
//!
//! The other submodules are support types.
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements the traits the API needs.
//!
//! ```rust,ignore
//! use chatpesa_engine::{events::EventProducers, LedgerApi, QueryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let ledger = LedgerApi::new(db.clone(), EventProducers::default());
//! let order = ledger.create_order(new_order).await?;
//! let query = QueryApi::new(db);
//! let page = query.changes_since(0, None).await?;
//! ```
pub mod errors;
pub mod id_generator;
pub mod ledger_flow_api;
pub mod order_objects;
pub mod query_api;
