//! # ChatPesa ledger server
//! This crate hosts the HTTP boundary of the ChatPesa order ledger. It is responsible for:
//! * Accepting order-creation requests from the chat channel adapter.
//! * Accepting payment confirmations from the mobile-money gateway.
//! * Serving order snapshots, change feed pages and a live change feed stream to dashboards.
//!
//! All of the ledger logic lives in [`chatpesa_engine`]. This crate translates between HTTP and the ledger API, and
//! runs the background reconcile worker.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! See [routes](routes/index.html), or run the server binary with any argument for a summary.

pub mod activity_log;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod reconcile_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
