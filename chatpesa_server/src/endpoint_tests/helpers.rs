use actix_web::{
    http::{header, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chatpesa_engine::{
    db_types::{Amount, ChangeKind, FeedEvent, Order, OrderId, OrderStatusType},
    events::EventProducers,
    traits::PutResult,
    LedgerApi,
    QueryApi,
};
use chrono::{TimeZone, Utc};
use log::debug;
use serde_json::Value;

use super::mocks::MockStore;
use crate::{
    routes::{
        health,
        CancelOrderRoute,
        ChangesRoute,
        ChangesStreamRoute,
        CreateOrderRoute,
        ExceptionsRoute,
        FailOrderRoute,
        OrderByIdRoute,
        OrdersRoute,
        PaymentEventRoute,
    },
    server::{json_config, query_config},
};

pub struct TestResponse {
    pub status: StatusCode,
    pub retry_after: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("Response body is not JSON")
    }
}

/// Mounts every route against the given stores. The ledger and the query facade get separate mocks so that each test
/// only states the calls it expects.
pub fn configure(ledger_store: MockStore, query_store: MockStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let ledger_api = LedgerApi::new(ledger_store, EventProducers::default());
        let query_api = QueryApi::new(query_store);
        cfg.app_data(json_config())
            .app_data(query_config())
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(query_api))
            .service(health)
            .service(CreateOrderRoute::<MockStore>::new())
            .service(PaymentEventRoute::<MockStore>::new())
            .service(CancelOrderRoute::<MockStore>::new())
            .service(FailOrderRoute::<MockStore>::new())
            .service(ChangesStreamRoute::<MockStore>::new())
            .service(ChangesRoute::<MockStore>::new())
            .service(ExceptionsRoute::<MockStore>::new())
            .service(OrdersRoute::<MockStore>::new())
            .service(OrderByIdRoute::<MockStore>::new());
    }
}

pub async fn send_request<F>(req: TestRequest, configure: F) -> TestResponse
where F: FnOnce(&mut ServiceConfig) {
    let _ = env_logger::try_init();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let header_value = |name| res.headers().get(name).and_then(|v| v.to_str().ok()).map(String::from);
    let retry_after = header_value(header::RETRY_AFTER);
    let content_type = header_value(header::CONTENT_TYPE);
    let body = match status {
        // The change feed stream never ends, so leave its body alone
        StatusCode::OK if content_type.as_deref() == Some("text/event-stream") => String::new(),
        _ => String::from_utf8_lossy(&test::read_body(res).await).into_owned(),
    };
    TestResponse { status, retry_after, content_type, body }
}

/// A store whose clones hand out `next` as the next sequence number. The ledger's id generator owns such a clone.
pub fn store_issuing(next: i64) -> MockStore {
    let mut store = MockStore::new();
    store.expect_clone().returning(move || {
        let mut ids = MockStore::new();
        ids.expect_next_sequence().returning(move || Ok(next));
        ids
    });
    store
}

pub fn idle_store() -> MockStore {
    let mut store = MockStore::new();
    store.expect_clone().returning(MockStore::new);
    store
}

pub fn sample_order(seq: i64, status: OrderStatusType) -> Order {
    let created_at = Utc.with_ymd_and_hms(2024, 10, 19, 8, 30, 0).unwrap();
    Order {
        id: OrderId::from(format!("ORD-{seq:010}")),
        seq,
        customer_phone: "+254700000001".into(),
        customer_name: Some("Jane".into()),
        items: "2x chapati, 1x chai".into(),
        amount: Amount::from(250),
        original_amount: None,
        status,
        receipt: None,
        status_reason: None,
        created_at,
        paid_at: None,
        updated_at: created_at,
        version: 1,
    }
}

pub fn written(offset: i64, order: &Order) -> PutResult {
    PutResult::Written(FeedEvent {
        offset,
        order_id: order.id.clone(),
        kind: ChangeKind::for_order(order),
        version: order.version,
        order: order.clone(),
        timestamp: order.updated_at,
    })
}
