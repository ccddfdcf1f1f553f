use std::time::Duration;

use thiserror::Error;

use crate::{
    db_types::{NewPaymentException, Order, OrderId, PaymentException},
    helpers::IdSpaceExhausted,
    order_objects::OrderQueryFilter,
    traits::PutResult,
};

/// Durable persistence of order records, with an atomic conditional put per order id.
///
/// Implementations must survive process restarts. The id counter lives in the same store so that it can never be
/// reset independently of the orders it numbered.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Clone {
    /// The URL of the backing store
    fn url(&self) -> &str;

    /// Atomically advances the durable id counter and returns the new value. Two concurrent callers never receive the
    /// same value.
    async fn next_sequence(&self) -> Result<i64, StoreError>;

    /// The last value handed out by [`next_sequence`](OrderStore::next_sequence), without advancing it.
    async fn current_sequence(&self) -> Result<i64, StoreError>;

    /// Raises the id counter to the highest sequence found in the order records, if it has fallen behind.
    /// Returns the new counter value if it was changed.
    async fn reconcile_sequence(&self) -> Result<Option<i64>, StoreError>;

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Fetches the order that carries the given payment receipt, if any.
    async fn find_by_receipt(&self, receipt: &str) -> Result<Option<Order>, StoreError>;

    /// The sole mutation primitive.
    ///
    /// * `expected_version == 0` inserts `order`, which must not exist yet.
    /// * Otherwise the stored record is replaced only if its version still equals `expected_version`.
    ///
    /// `order.version` must be `expected_version + 1`. The derived change feed event is recorded atomically with the
    /// write and returned in [`PutResult::Written`].
    async fn put_if_version(&self, order: &Order, expected_version: i64) -> Result<PutResult, StoreError>;

    /// Returns the orders matching `filter`, in creation order.
    async fn scan(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, StoreError>;

    /// Holds a payment for manual reconciliation. Holding the same receipt for the same reason twice returns the
    /// existing record.
    async fn hold_payment(&self, exception: NewPaymentException) -> Result<PaymentException, StoreError>;

    /// All held payments, oldest first.
    async fn payment_exceptions(&self) -> Result<Vec<PaymentException>, StoreError>;

    async fn close(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database driver error: {0}")]
    DriverError(String),
    #[error("The store did not respond within {0:?}")]
    Timeout(Duration),
    #[error("The store is busy: {0}")]
    Busy(String),
    #[error("A stored record could not be (de)serialized: {0}")]
    Serialization(String),
    #[error("Refusing to store an invalid record: {0}")]
    InvalidRecord(String),
    #[error(transparent)]
    IdSpaceExhausted(#[from] IdSpaceExhausted),
}

impl StoreError {
    /// Lock contention that the ledger may retry like a version conflict.
    pub fn is_busy(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }

    /// Failures that may clear up on their own, so the same request can be retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::DriverError(_) | StoreError::Timeout(_) | StoreError::Busy(_))
    }
}

// SQLite primary result codes for contention. Extended codes carry these in the low byte.
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref db) => {
                let primary = db.code().and_then(|c| c.parse::<i64>().ok()).map(|c| c & 0xff);
                match primary {
                    Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => StoreError::Busy(db.message().to_string()),
                    _ => StoreError::DriverError(e.to_string()),
                }
            },
            sqlx::Error::PoolTimedOut => StoreError::DriverError("timed out waiting for a database connection".into()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
                StoreError::Serialization(e.to_string())
            },
            _ => StoreError::DriverError(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
