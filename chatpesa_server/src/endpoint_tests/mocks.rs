use std::collections::HashMap;

use chatpesa_engine::{
    db_types::{FeedEvent, NewFeedEvent, NewPaymentException, Order, OrderId, PaymentException},
    order_objects::OrderQueryFilter,
    traits::{ChangeFeed, OrderStore, PutResult, StoreError},
};
use mockall::mock;

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl OrderStore for Store {
        fn url(&self) -> &str;
        async fn next_sequence(&self) -> Result<i64, StoreError>;
        async fn current_sequence(&self) -> Result<i64, StoreError>;
        async fn reconcile_sequence(&self) -> Result<Option<i64>, StoreError>;
        async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;
        async fn find_by_receipt(&self, receipt: &str) -> Result<Option<Order>, StoreError>;
        async fn put_if_version(&self, order: &Order, expected_version: i64) -> Result<PutResult, StoreError>;
        async fn scan(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, StoreError>;
        async fn hold_payment(&self, exception: NewPaymentException) -> Result<PaymentException, StoreError>;
        async fn payment_exceptions(&self) -> Result<Vec<PaymentException>, StoreError>;
        async fn close(&mut self) -> Result<(), StoreError>;
    }
    impl ChangeFeed for Store {
        async fn append(&self, event: NewFeedEvent) -> Result<FeedEvent, StoreError>;
        async fn read_from(&self, from: i64, limit: usize) -> Result<Vec<FeedEvent>, StoreError>;
        async fn head_offset(&self) -> Result<i64, StoreError>;
        async fn latest_versions(&self) -> Result<HashMap<OrderId, i64>, StoreError>;
    }
}
