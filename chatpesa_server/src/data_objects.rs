use chatpesa_engine::{
    db_types::{Order, PaymentException},
    order_objects::OrderQueryFilter,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order: Order,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionsResponse {
    pub exceptions: Vec<PaymentException>,
}

/// Optional body for `POST /orders/{id}/cancel` and `POST /orders/{id}/fail`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseOrderParams {
    #[serde(default)]
    pub reason: String,
}

/// Query parameters for `GET /orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdersQuery {
    /// Comma-separated list of statuses, in any casing
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub phone: Option<String>,
    pub limit: Option<usize>,
}

impl TryFrom<OrdersQuery> for OrderQueryFilter {
    type Error = ServerError;

    fn try_from(query: OrdersQuery) -> Result<Self, Self::Error> {
        let mut filter = OrderQueryFilter::default();
        if let Some(statuses) = query.status {
            filter = filter.with_status_list(&statuses)?;
        }
        if let Some(phone) = query.phone {
            filter = filter.with_customer_phone(&phone)?;
        }
        if let Some(since) = query.since {
            filter = filter.since(since);
        }
        if let Some(until) = query.until {
            filter = filter.until(until);
        }
        if let Some(limit) = query.limit {
            filter = filter.with_limit(limit);
        }
        Ok(filter)
    }
}

/// Query parameters for `GET /changes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangesQuery {
    #[serde(default)]
    pub offset: i64,
    pub limit: Option<usize>,
}

/// Query parameters for `GET /changes/stream`. A `Last-Event-ID` header takes precedence over `offset`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamQuery {
    pub offset: Option<i64>,
}
