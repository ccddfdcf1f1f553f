//! `SqliteDatabase` is a concrete implementation of a ChatPesa ledger backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
//! Every operation runs under the configured store timeout; if it expires the caller gets [`StoreError::Timeout`]
//! rather than waiting indefinitely.
//!
//! [`traits`]: crate::traits
use std::{collections::HashMap, fmt::Debug, future::Future, time::Duration};

use log::*;
use sqlx::SqlitePool;

use super::db::{change_feed, counters, db_url, exceptions, new_pool, orders};
use crate::{
    db_types::{FeedEvent, NewFeedEvent, NewPaymentException, Order, OrderId, PaymentException},
    order_objects::OrderQueryFilter,
    traits::{ChangeFeed, OrderStore, PutResult, StoreError},
};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    timeout: Duration,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn next_sequence(&self) -> Result<i64, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            let seq = counters::next_value(counters::ORDER_ID_COUNTER, &mut conn).await?;
            trace!("🗃️ Issued sequence {seq}");
            Ok::<_, StoreError>(seq)
        })
        .await
    }

    async fn current_sequence(&self) -> Result<i64, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            Ok::<_, StoreError>(counters::current_value(counters::ORDER_ID_COUNTER, &mut conn).await?)
        })
        .await
    }

    async fn reconcile_sequence(&self) -> Result<Option<i64>, StoreError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;
            let max = orders::max_sequence(&mut tx).await?;
            let raised = match max {
                0 => None,
                max => counters::raise_floor(counters::ORDER_ID_COUNTER, max, &mut tx).await?,
            };
            tx.commit().await?;
            if let Some(v) = raised {
                warn!("🗃️ The order id counter had fallen behind the stored orders. It has been raised to {v}");
            }
            Ok::<_, StoreError>(raised)
        })
        .await
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            Ok::<_, StoreError>(orders::fetch_order(id, &mut conn).await?)
        })
        .await
    }

    async fn find_by_receipt(&self, receipt: &str) -> Result<Option<Order>, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            Ok::<_, StoreError>(orders::fetch_order_by_receipt(receipt, &mut conn).await?)
        })
        .await
    }

    async fn put_if_version(&self, order: &Order, expected_version: i64) -> Result<PutResult, StoreError> {
        if order.version != expected_version + 1 {
            return Err(StoreError::InvalidRecord(format!(
                "Order {} carries version {} but the expected version is {expected_version}",
                order.id, order.version
            )));
        }
        self.bounded(self.conditional_put(order, expected_version)).await
    }

    async fn scan(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            Ok::<_, StoreError>(orders::search_orders(filter, &mut conn).await?)
        })
        .await
    }

    async fn hold_payment(&self, exception: NewPaymentException) -> Result<PaymentException, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            Ok::<_, StoreError>(exceptions::idempotent_insert(exception, &mut conn).await?)
        })
        .await
    }

    async fn payment_exceptions(&self) -> Result<Vec<PaymentException>, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            Ok::<_, StoreError>(exceptions::fetch_all(&mut conn).await?)
        })
        .await
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl ChangeFeed for SqliteDatabase {
    async fn append(&self, event: NewFeedEvent) -> Result<FeedEvent, StoreError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;
            let recorded = change_feed::idempotent_append(event, &mut tx).await?;
            tx.commit().await?;
            Ok::<_, StoreError>(recorded)
        })
        .await
    }

    async fn read_from(&self, from: i64, limit: usize) -> Result<Vec<FeedEvent>, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            change_feed::read_from(from, limit, &mut conn).await
        })
        .await
    }

    async fn head_offset(&self) -> Result<i64, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            Ok::<_, StoreError>(change_feed::head_offset(&mut conn).await?)
        })
        .await
    }

    async fn latest_versions(&self) -> Result<HashMap<OrderId, i64>, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            Ok::<_, StoreError>(change_feed::latest_versions(&mut conn).await?)
        })
        .await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `CPL_DATABASE_URL`.
    pub async fn new(max_connections: u32, timeout: Duration) -> Result<Self, StoreError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections, timeout).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32, timeout: Duration) -> Result<Self, StoreError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections, timeout).await?;
        let url = url.to_string();
        Ok(Self { url, pool, timeout })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DriverError(format!("Could not run database migrations. {e}")))?;
        debug!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where F: Future<Output = Result<T, StoreError>> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => {
                warn!("🗃️ Store operation did not complete within {:?}", self.timeout);
                Err(StoreError::Timeout(self.timeout))
            },
        }
    }

    /// Writes the order and its feed event in one transaction. The first statement in the transaction is the write,
    /// so SQLite takes the write lock up front and the version check cannot go stale before commit.
    async fn conditional_put(&self, order: &Order, expected_version: i64) -> Result<PutResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let written = if expected_version == 0 {
            orders::insert_order(order, &mut tx).await
        } else {
            orders::update_if_version(order, expected_version, &mut tx).await
        };
        match written {
            Ok(true) => {},
            Ok(false) => {
                let current_version = orders::fetch_version(&order.id, &mut tx).await?;
                tx.rollback().await?;
                debug!(
                    "🗃️ Version conflict on [{}]. Expected {expected_version}, found {current_version:?}",
                    order.id
                );
                return Ok(PutResult::VersionConflict {
                    order_id: order.id.clone(),
                    expected: expected_version,
                    current_version,
                });
            },
            Err(e) if orders::is_receipt_violation(&e) => {
                tx.rollback().await?;
                let receipt = order.receipt.clone().unwrap_or_default();
                debug!("🗃️ Receipt {receipt} is already attached to another order. [{}] was not written", order.id);
                return Ok(PutResult::ReceiptTaken { order_id: order.id.clone(), receipt });
            },
            Err(e) => return Err(e.into()),
        }
        let event = change_feed::idempotent_append(NewFeedEvent::for_order(order), &mut tx).await?;
        tx.commit().await?;
        Ok(PutResult::Written(event))
    }
}
