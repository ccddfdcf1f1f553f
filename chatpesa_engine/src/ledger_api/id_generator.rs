use log::trace;

use crate::{
    db_types::OrderId,
    helpers::format_order_id,
    traits::{OrderStore, StoreError},
};

/// Issues order ids from the store's durable counter.
///
/// Ids are never derived from the existing records (e.g. "last id + 1"). The counter is advanced atomically by the
/// store, so concurrent callers, and callers in other processes sharing the store, never receive the same id.
#[derive(Debug, Clone)]
pub struct OrderIdGenerator<B> {
    db: B,
}

impl<B> OrderIdGenerator<B>
where B: OrderStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Returns the next id, along with the sequence number it was formatted from.
    pub async fn next(&self) -> Result<(i64, OrderId), StoreError> {
        let seq = self.db.next_sequence().await?;
        let id = format_order_id(seq)?;
        trace!("🔄️🆔️ Allocated order id {id}");
        Ok((seq, id))
    }
}
