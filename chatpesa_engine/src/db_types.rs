use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use cpl_common::Amount;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been created and no payment has been applied yet. This is the only non-terminal status.
    AwaitingPayment,
    /// A payment confirmation has been applied to the order.
    Paid,
    /// The payment attempt failed (e.g. the customer declined the STK push).
    Failed,
    /// The order was cancelled by the customer or an operator before it was paid.
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::AwaitingPayment => write!(f, "AWAITING_PAYMENT"),
            OrderStatusType::Paid => write!(f, "PAID"),
            OrderStatusType::Failed => write!(f, "FAILED"),
            OrderStatusType::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    /// Status strings are accepted in any casing, with `_`, `-` or spaces as separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "AWAITING_PAYMENT" => Ok(Self::AwaitingPayment),
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" | "CANCELED" => Ok(Self::Cancelled),
            _ => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// An opaque, fixed-width order identifier, e.g. `ORD-0000000042`. Lexicographic order is creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
/// The canonical order record. This is the only order shape that leaves the engine.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    /// The counter value `id` was formatted from.
    pub seq: i64,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub items: String,
    pub amount: Amount,
    /// The amount the order was created with, if a payment later corrected it.
    pub original_amount: Option<Amount>,
    pub status: OrderStatusType,
    pub receipt: Option<String>,
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
/// An order-creation request, as produced by the chat channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// The customer's channel identifier. Normalized to `+<digits>` before it is stored.
    #[serde(default)]
    pub customer_phone: String,
    pub customer_name: Option<String>,
    /// Free-text description of what was ordered.
    #[serde(default)]
    pub items: String,
    #[serde(default)]
    pub amount: Amount,
}

impl NewOrder {
    pub fn new<S: Into<String>>(customer_phone: S, items: S, amount: Amount) -> Self {
        Self { customer_phone: customer_phone.into(), customer_name: None, items: items.into(), amount }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.customer_name = Some(name.into());
        self
    }
}

//--------------------------------------     PaymentEvent      ---------------------------------------------------------
/// The fields a payment confirmation can use to find the order it pays for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationHint {
    /// Authoritative when present.
    pub order_id: Option<OrderId>,
    /// Used for the best-effort phone + amount + time window match when no order id is supplied.
    pub customer_phone: Option<String>,
}

impl CorrelationHint {
    pub fn for_order(order_id: OrderId) -> Self {
        Self { order_id: Some(order_id), customer_phone: None }
    }

    pub fn for_phone<S: Into<String>>(phone: S) -> Self {
        Self { order_id: None, customer_phone: Some(phone.into()) }
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() && self.customer_phone.is_none()
    }
}

/// A payment confirmation delivered by the mobile-money gateway. Delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    #[serde(default)]
    pub correlation_hint: CorrelationHint,
    /// The gateway's confirmation reference. Globally unique, and the idempotency key for payments.
    #[serde(default)]
    pub receipt: String,
    #[serde(default)]
    pub amount: Amount,
    /// When the gateway says the payment happened.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// The payer's name as registered with the mobile-money provider, if the gateway supplies it.
    pub payer_name: Option<String>,
}

impl PaymentEvent {
    pub fn new<S: Into<String>>(hint: CorrelationHint, receipt: S, amount: Amount) -> Self {
        Self { correlation_hint: hint, receipt: receipt.into(), amount, timestamp: Utc::now(), payer_name: None }
    }

    pub fn with_payer_name<S: Into<String>>(mut self, name: S) -> Self {
        self.payer_name = Some(name.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

//--------------------------------------      ChangeKind       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Paid,
    Failed,
    Cancelled,
}

impl ChangeKind {
    /// The kind of transition that produced the given order snapshot.
    pub fn for_order(order: &Order) -> Self {
        match order.status {
            OrderStatusType::AwaitingPayment => Self::Created,
            OrderStatusType::Paid => Self::Paid,
            OrderStatusType::Failed => Self::Failed,
            OrderStatusType::Cancelled => Self::Cancelled,
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Paid => write!(f, "paid"),
            ChangeKind::Failed => write!(f, "failed"),
            ChangeKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

//--------------------------------------      FeedEvent        ---------------------------------------------------------
/// One accepted state transition, as recorded in the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub offset: i64,
    pub order_id: OrderId,
    pub kind: ChangeKind,
    /// The order version the snapshot carries. `(order_id, version)` is unique in the feed.
    pub version: i64,
    pub order: Order,
    pub timestamp: DateTime<Utc>,
}

/// A feed event that has not been assigned an offset yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedEvent {
    pub kind: ChangeKind,
    pub order: Order,
    pub timestamp: DateTime<Utc>,
}

impl NewFeedEvent {
    pub fn for_order(order: &Order) -> Self {
        Self { kind: ChangeKind::for_order(order), order: order.clone(), timestamp: Utc::now() }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order.id
    }

    pub fn version(&self) -> i64 {
        self.order.version
    }
}

//--------------------------------------   PaymentException    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionKind {
    /// No order could be matched to the payment.
    Unmatched,
    /// The matched order was already paid with a different receipt, or the receipt belongs to another order.
    Conflicting,
    /// The matched order had already failed or been cancelled.
    ClosedOrder,
}

impl Display for ExceptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExceptionKind::Unmatched => write!(f, "UNMATCHED"),
            ExceptionKind::Conflicting => write!(f, "CONFLICTING"),
            ExceptionKind::ClosedOrder => write!(f, "CLOSED_ORDER"),
        }
    }
}

/// A payment that could not be applied automatically and is held for manual reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentException {
    pub id: i64,
    pub receipt: String,
    pub kind: ExceptionKind,
    pub order_id: Option<OrderId>,
    pub customer_phone: Option<String>,
    pub amount: Amount,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentException {
    pub receipt: String,
    pub kind: ExceptionKind,
    pub order_id: Option<OrderId>,
    pub customer_phone: Option<String>,
    pub amount: Amount,
    pub detail: String,
}

impl NewPaymentException {
    pub fn new(event: &PaymentEvent, kind: ExceptionKind, detail: String) -> Self {
        Self {
            receipt: event.receipt.clone(),
            kind,
            order_id: event.correlation_hint.order_id.clone(),
            customer_phone: event.correlation_hint.customer_phone.clone(),
            amount: event.amount,
            detail,
        }
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}
