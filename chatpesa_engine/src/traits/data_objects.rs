use serde::Serialize;

use crate::db_types::{FeedEvent, OrderId};

/// The outcome of a conditional put.
#[derive(Debug, Clone)]
pub enum PutResult {
    /// The record was written. Carries the feed event that was recorded with it.
    Written(FeedEvent),
    /// Another writer got there first. `current_version` is `None` if the order does not exist (for updates), or the
    /// version found in the store.
    VersionConflict { order_id: OrderId, expected: i64, current_version: Option<i64> },
    /// The receipt on the new record is already attached to another order.
    ReceiptTaken { order_id: OrderId, receipt: String },
}

impl PutResult {
    pub fn is_written(&self) -> bool {
        matches!(self, PutResult::Written(_))
    }
}

/// A summary of what a change feed recovery pass repaired.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryResult {
    /// Set if the id counter had fallen behind the highest stored sequence and was raised.
    pub counter_raised_to: Option<i64>,
    /// Feed events that were missing and have been re-derived from the current order records.
    pub appended: Vec<FeedEvent>,
}

impl RecoveryResult {
    pub fn is_clean(&self) -> bool {
        self.counter_raised_to.is_none() && self.appended.is_empty()
    }
}
