use std::collections::HashMap;

use crate::{
    db_types::{FeedEvent, NewFeedEvent, OrderId},
    traits::StoreError,
};

/// The append-only log of accepted order transitions.
///
/// Offsets start at 1, are assigned in commit order, and are never reused. Consumers keep their own cursor; the feed
/// holds no per-consumer state.
#[allow(async_fn_in_trait)]
pub trait ChangeFeed: Clone {
    /// Appends an event and returns it with its assigned offset.
    ///
    /// If the feed already holds an event for the same order at the same or a later version, nothing is appended and
    /// that existing event is returned instead. An older snapshot is never recorded behind a newer one.
    async fn append(&self, event: NewFeedEvent) -> Result<FeedEvent, StoreError>;

    /// Returns up to `limit` events with `offset >= from`, in ascending offset order.
    async fn read_from(&self, from: i64, limit: usize) -> Result<Vec<FeedEvent>, StoreError>;

    /// The highest offset written so far, or 0 for an empty feed.
    async fn head_offset(&self) -> Result<i64, StoreError>;

    /// The highest recorded version per order. Used by the recovery pass to find orders with missing events.
    async fn latest_versions(&self) -> Result<HashMap<OrderId, i64>, StoreError>;
}
