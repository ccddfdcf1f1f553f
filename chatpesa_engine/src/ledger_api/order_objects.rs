use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Amount, FeedEvent, Order, OrderStatusType},
    helpers::normalize_phone,
    ledger_api::errors::QueryApiError,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQueryFilter {
    pub customer_phone: Option<String>,
    pub amount: Option<Amount>,
    /// Only orders created at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Only orders created at or before this time
    pub until: Option<DateTime<Utc>>,
    pub statuses: Option<Vec<OrderStatusType>>,
    pub limit: Option<usize>,
}

impl OrderQueryFilter {
    /// Filters on the customer's phone number. The number is normalized first, so any format the channel accepts
    /// will match.
    pub fn with_customer_phone(mut self, phone: &str) -> Result<Self, QueryApiError> {
        let phone = normalize_phone(phone).map_err(|e| QueryApiError::QueryError(e.to_string()))?;
        self.customer_phone = Some(phone);
        Ok(self)
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        let statuses = self.statuses.get_or_insert_with(Vec::new);
        if !statuses.contains(&status) {
            statuses.push(status);
        }
        self
    }

    /// Adds every status in a comma-separated list, e.g. `paid,awaiting_payment`. Casing is ignored.
    pub fn with_status_list(self, list: &str) -> Result<Self, QueryApiError> {
        list.split(',').map(str::trim).filter(|s| !s.is_empty()).try_fold(self, |filter, s| {
            let status = s.parse::<OrderStatusType>().map_err(|e| QueryApiError::QueryError(e.to_string()))?;
            Ok(filter.with_status(status))
        })
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True if no `WHERE` criteria are set. `limit` is not a criterion.
    pub fn is_empty(&self) -> bool {
        self.customer_phone.is_none() &&
            self.amount.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.statuses.as_ref().map(|s| s.is_empty()).unwrap_or(true)
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(phone) = &self.customer_phone {
            write!(f, "customer_phone: {phone}. ")?;
        }
        if let Some(amount) = &self.amount {
            write!(f, "amount: {amount}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.statuses {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}

/// The result of applying a payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub order: Order,
    /// `false` when the payment had already been applied and this call was an idempotent replay.
    pub applied: bool,
}

/// One page of the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesPage {
    pub events: Vec<FeedEvent>,
    /// The offset to ask for next. Equal to the requested offset when there was nothing new.
    pub next_offset: i64,
}
