use std::time::Duration;

use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    traits::StoreError,
};

/// The ledger's error taxonomy. Only [`LedgerError::WriteConflict`] and [`LedgerError::StoreUnavailable`] are
/// transient; everything else is final for the given request.
///
/// [`LedgerError::StoreFault`] is a store failure that retrying cannot fix, such as an exhausted id space or a
/// corrupt record.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {receipt} conflicts with order {order_id}. {detail}")]
    ConflictingPayment { receipt: String, order_id: OrderId, detail: String },
    #[error("Payment {receipt} could not be matched to any order. It has been held for manual reconciliation")]
    UnmatchedPayment { receipt: String },
    #[error("Order {order_id} could not be written after {attempts} attempts because of concurrent modifications")]
    WriteConflict { order_id: OrderId, attempts: usize },
    #[error("The order store is unavailable. {reason}")]
    StoreUnavailable { reason: String, retry_after: Duration },
    #[error("The order store failed. {0}")]
    StoreFault(String),
}

impl LedgerError {
    /// Transient store failures carry the retry hint. Permanent ones do not.
    pub fn from_store(e: StoreError, retry_after: Duration) -> Self {
        if e.is_transient() {
            LedgerError::StoreUnavailable { reason: e.to_string(), retry_after }
        } else {
            LedgerError::StoreFault(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum QueryApiError {
    #[error("The order store is unavailable. {reason}")]
    StoreUnavailable { reason: String, retry_after: Duration },
    #[error("User error constructing query: {0}")]
    QueryError(String),
    #[error("The order store failed. {0}")]
    StoreFault(String),
}

impl QueryApiError {
    pub fn from_store(e: StoreError, retry_after: Duration) -> Self {
        if e.is_transient() {
            QueryApiError::StoreUnavailable { reason: e.to_string(), retry_after }
        } else {
            QueryApiError::StoreFault(e.to_string())
        }
    }
}
