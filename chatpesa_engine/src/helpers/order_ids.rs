use thiserror::Error;

use crate::db_types::OrderId;

const ORDER_ID_PREFIX: &str = "ORD-";
/// Ids are zero-padded to this width so that lexicographic order matches creation order.
const ORDER_ID_DIGITS: usize = 10;
const MAX_SEQUENCE: i64 = 9_999_999_999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("The order id space is exhausted. Sequence {0} does not fit in {ORDER_ID_DIGITS} digits")]
pub struct IdSpaceExhausted(pub i64);

/// Formats a counter value as an order id. Sequence numbers start at 1.
pub fn format_order_id(seq: i64) -> Result<OrderId, IdSpaceExhausted> {
    if !(1..=MAX_SEQUENCE).contains(&seq) {
        return Err(IdSpaceExhausted(seq));
    }
    Ok(OrderId(format!("{ORDER_ID_PREFIX}{seq:0width$}", width = ORDER_ID_DIGITS)))
}
