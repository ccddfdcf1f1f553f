//! Read-only access to the ledger for dashboards.
//!
//! This is the single translation point between storage and consumers: everything it returns uses the canonical
//! [`Order`] shape. Reads go straight to the store, so a snapshot is at least as fresh as the store at call time.

use std::{fmt::Debug, time::Duration};

use futures_util::Stream;
use log::trace;

use crate::{
    db_types::{FeedEvent, Order, OrderId, PaymentException},
    events::{follow, FeedNotifier, FollowOptions},
    ledger_api::{
        errors::QueryApiError,
        ledger_flow_api::DEFAULT_RETRY_AFTER,
        order_objects::{ChangesPage, OrderQueryFilter},
    },
    traits::{ChangeFeed, OrderStore, StoreError},
};

pub const DEFAULT_CHANGES_LIMIT: usize = 500;
pub const MAX_CHANGES_LIMIT: usize = 1000;

/// The `QueryApi` serves order snapshots and change feed reads. It never mutates anything.
pub struct QueryApi<B> {
    db: B,
    notifier: FeedNotifier,
    default_limit: usize,
    retry_after: Duration,
    follow_options: FollowOptions,
}

impl<B: Debug> Debug for QueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "QueryApi ({:?})", self.db)
    }
}

impl<B> QueryApi<B> {
    pub fn new(db: B) -> Self {
        Self {
            db,
            notifier: FeedNotifier::default(),
            default_limit: DEFAULT_CHANGES_LIMIT,
            retry_after: DEFAULT_RETRY_AFTER,
            follow_options: FollowOptions::default(),
        }
    }

    /// Live subscriptions wake up when this notifier moves. Share it with the [`LedgerApi`](crate::LedgerApi).
    pub fn with_feed_notifier(mut self, notifier: FeedNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// The page size used by [`changes_since`](Self::changes_since) when the caller does not ask for one. Never
    /// more than [`MAX_CHANGES_LIMIT`].
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.clamp(1, MAX_CHANGES_LIMIT);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn with_follow_options(mut self, options: FollowOptions) -> Self {
        self.follow_options = options;
        self
    }

    fn store_error(&self, e: StoreError) -> QueryApiError {
        QueryApiError::from_store(e, self.retry_after)
    }
}

impl<B> QueryApi<B>
where B: OrderStore + ChangeFeed
{
    /// Returns the orders matching `filter`, in creation order.
    pub async fn list_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, QueryApiError> {
        trace!("💻️ Listing orders. {filter}");
        self.db.scan(filter).await.map_err(|e| self.store_error(e))
    }

    pub async fn order_by_id(&self, id: &OrderId) -> Result<Option<Order>, QueryApiError> {
        self.db.get(id).await.map_err(|e| self.store_error(e))
    }

    /// Returns the change feed events with `offset >= from`, and the offset to ask for next.
    ///
    /// Calling this repeatedly with the returned `next_offset` yields every event exactly once, in offset order.
    /// Offset 0 is treated as "from the beginning". `limit` defaults to the configured page size and is capped at
    /// [`MAX_CHANGES_LIMIT`].
    pub async fn changes_since(&self, from: i64, limit: Option<usize>) -> Result<ChangesPage, QueryApiError> {
        if from < 0 {
            return Err(QueryApiError::QueryError(format!("offset must not be negative, got {from}")));
        }
        let limit = match limit {
            Some(0) => return Err(QueryApiError::QueryError("limit must be at least 1".into())),
            Some(n) => n.min(MAX_CHANGES_LIMIT),
            None => self.default_limit,
        };
        let events = self.db.read_from(from, limit).await.map_err(|e| self.store_error(e))?;
        let next_offset = events.last().map(|e| e.offset + 1).unwrap_or(from);
        trace!("💻️ {} changes since #{from}. Next offset is #{next_offset}", events.len());
        Ok(ChangesPage { events, next_offset })
    }

    pub async fn head_offset(&self) -> Result<i64, QueryApiError> {
        self.db.head_offset().await.map_err(|e| self.store_error(e))
    }

    /// Payments that were held for manual reconciliation, oldest first.
    pub async fn payment_exceptions(&self) -> Result<Vec<PaymentException>, QueryApiError> {
        self.db.payment_exceptions().await.map_err(|e| self.store_error(e))
    }
}

impl<B> QueryApi<B>
where B: ChangeFeed + 'static
{
    /// A live, unbounded stream of change feed events starting at offset `from`.
    pub fn follow(&self, from: i64) -> impl Stream<Item = Result<FeedEvent, StoreError>> {
        follow(self.db.clone(), from, self.notifier.subscribe(), self.follow_options)
    }
}
