//! # Storage backends
//!
//! This module defines the contracts a storage backend must satisfy to host the ChatPesa order ledger.
//!
//! * [`OrderStore`] is the durable, per-key persistence of order records. Its conditional put
//!   ([`OrderStore::put_if_version`]) is the only way an order is ever written, and is the concurrency control anchor
//!   for the ledger. The store also owns the durable id counter and the held-payment list.
//! * [`ChangeFeed`] is the append-only, offset-ordered log of accepted transitions that dashboards tail.
//!
//! The SQLite backend implements both in one database file so that an order write and its feed event commit together.
mod change_feed;
mod data_objects;
mod order_store;

pub use change_feed::ChangeFeed;
pub use data_objects::{PutResult, RecoveryResult};
pub use order_store::{OrderStore, StoreError};
