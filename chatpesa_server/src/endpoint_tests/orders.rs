use actix_web::{http::StatusCode, test::TestRequest};
use chatpesa_engine::{
    db_types::{Amount, Order, OrderId, OrderStatusType},
    traits::StoreError,
};
use serde_json::json;

use super::helpers::{configure, idle_store, sample_order, send_request, store_issuing, written};
use crate::endpoint_tests::mocks::MockStore;

#[actix_web::test]
async fn create_order() {
    let mut ledger = store_issuing(7);
    ledger
        .expect_put_if_version()
        .withf(|order: &Order, expected: &i64| *expected == 0 && order.version == 1)
        .times(1)
        .returning(|order, _| Ok(written(1, order)));
    let req = TestRequest::post().uri("/create-order").set_json(json!({
        "customerPhone": "254 700 000 001",
        "customerName": "Jane",
        "items": "2x chapati",
        "amount": "250"
    }));
    let res = send_request(req, configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::CREATED);
    let body = res.json();
    assert_eq!(body["order"]["id"], "ORD-0000000007");
    assert_eq!(body["order"]["customerPhone"], "+254700000001");
    assert_eq!(body["order"]["amount"], 250);
    assert_eq!(body["order"]["status"], "AWAITING_PAYMENT");
    assert_eq!(body["order"]["paidAt"], serde_json::Value::Null);
}

#[actix_web::test]
async fn create_order_rejects_invalid_requests() {
    let req = TestRequest::post()
        .uri("/create-order")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"customerPhone\": ");
    let res = send_request(req, configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "InvalidRequest");

    let req = TestRequest::post()
        .uri("/create-order")
        .set_json(json!({"customerPhone": "+254700000001", "items": "tea", "amount": 0}));
    let res = send_request(req, configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "InvalidRequest");

    let req = TestRequest::post().uri("/create-order").set_json(json!({"items": "tea", "amount": 10}));
    let res = send_request(req, configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn amounts_must_be_whole_shillings() {
    let mut ledger = store_issuing(8);
    ledger.expect_put_if_version().times(1).returning(|order, _| Ok(written(1, order)));
    let req = TestRequest::post()
        .uri("/create-order")
        .set_json(json!({"customerPhone": "+254700000001", "items": "tea", "amount": "250.00"}));
    let res = send_request(req, configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.json()["order"]["amount"], 250);

    let req = TestRequest::post()
        .uri("/create-order")
        .set_json(json!({"customerPhone": "+254700000001", "items": "tea", "amount": 12.5}));
    let res = send_request(req, configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let body = res.json();
    assert_eq!(body["code"], "InvalidRequest");
    assert!(body["error"].as_str().unwrap().contains("not a whole number"), "{body}");
}

#[actix_web::test]
async fn fetch_order_by_id() {
    let mut query = MockStore::new();
    query
        .expect_get()
        .withf(|id: &OrderId| id.as_str() == "ORD-0000000001")
        .returning(|_| Ok(Some(sample_order(1, OrderStatusType::AwaitingPayment))));
    let req = TestRequest::get().uri("/orders/ORD-0000000001");
    let res = send_request(req, configure(idle_store(), query)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["order"]["id"], "ORD-0000000001");
    assert_eq!(body["order"]["createdAt"], "2024-10-19T08:30:00Z");
}

#[actix_web::test]
async fn fetch_missing_order() {
    let mut query = MockStore::new();
    query.expect_get().returning(|_| Ok(None));
    let res = send_request(TestRequest::get().uri("/orders/ORD-0000000404"), configure(idle_store(), query)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["code"], "OrderNotFound");
}

#[actix_web::test]
async fn list_orders_with_filters() {
    let mut query = MockStore::new();
    query
        .expect_scan()
        .withf(|filter| {
            filter.statuses == Some(vec![OrderStatusType::Paid]) &&
                filter.customer_phone.as_deref() == Some("+254700000001") &&
                filter.since.is_some()
        })
        .returning(|_| {
            let mut order = sample_order(2, OrderStatusType::Paid);
            order.receipt = Some("RCP0001".into());
            Ok(vec![order])
        });
    let req = TestRequest::get().uri("/orders?status=paid&phone=%2B254700000001&since=2024-10-19T00:00:00Z");
    let res = send_request(req, configure(idle_store(), query)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["orders"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(body["orders"][0]["status"], "PAID");
    assert_eq!(body["orders"][0]["receipt"], "RCP0001");
}

#[actix_web::test]
async fn no_orders_is_not_an_error() {
    let mut query = MockStore::new();
    query.expect_scan().returning(|_| Ok(vec![]));
    let res = send_request(TestRequest::get().uri("/orders"), configure(idle_store(), query)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, r#"{"orders":[]}"#);
}

#[actix_web::test]
async fn unreachable_store_is_not_an_empty_list() {
    let mut query = MockStore::new();
    query.expect_scan().returning(|_| Err(StoreError::Timeout(std::time::Duration::from_secs(10))));
    let res = send_request(TestRequest::get().uri("/orders"), configure(idle_store(), query)).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.retry_after.as_deref(), Some("5"));
    let body = res.json();
    assert_eq!(body["code"], "StoreUnavailable");
    assert_eq!(body["retryAfter"], 5);
}

#[actix_web::test]
async fn invalid_order_queries() {
    let res = send_request(TestRequest::get().uri("/orders?status=shipped"), configure(idle_store(), MockStore::new()))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "InvalidRequest");
    let res = send_request(TestRequest::get().uri("/orders?since=yesterday"), configure(idle_store(), MockStore::new()))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "InvalidRequest");
}

#[actix_web::test]
async fn cancel_an_open_order() {
    let mut ledger = idle_store();
    ledger.expect_get().returning(|_| Ok(Some(sample_order(3, OrderStatusType::AwaitingPayment))));
    ledger
        .expect_put_if_version()
        .withf(|order: &Order, expected: &i64| *expected == 1 && order.version == 2)
        .times(1)
        .returning(|order, _| Ok(written(9, order)));
    let req = TestRequest::post().uri("/orders/ORD-0000000003/cancel").set_json(json!({"reason": "out of stock"}));
    let res = send_request(req, configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["order"]["status"], "CANCELLED");
    assert_eq!(body["order"]["statusReason"], "out of stock");
    assert_eq!(body["order"]["version"], 2);
}

#[actix_web::test]
async fn fail_without_a_body() {
    let mut ledger = idle_store();
    ledger.expect_get().returning(|_| Ok(Some(sample_order(3, OrderStatusType::AwaitingPayment))));
    ledger.expect_put_if_version().times(1).returning(|order, _| Ok(written(9, order)));
    let res = send_request(TestRequest::post().uri("/orders/ORD-0000000003/fail"), configure(ledger, MockStore::new()))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["order"]["status"], "FAILED");
    assert_eq!(body["order"]["statusReason"], serde_json::Value::Null);
}

#[actix_web::test]
async fn paid_orders_cannot_be_cancelled() {
    let mut ledger = idle_store();
    ledger.expect_get().returning(|_| {
        let mut order = sample_order(4, OrderStatusType::Paid);
        order.receipt = Some("RCP0004".into());
        order.amount = Amount::from(300);
        Ok(Some(order))
    });
    ledger.expect_put_if_version().never();
    let res =
        send_request(TestRequest::post().uri("/orders/ORD-0000000004/cancel"), configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json()["code"], "InvalidTransition");
}

#[actix_web::test]
async fn cancel_a_missing_order() {
    let mut ledger = idle_store();
    ledger.expect_get().returning(|_| Ok(None));
    let res =
        send_request(TestRequest::post().uri("/orders/ORD-0000000404/cancel"), configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["code"], "OrderNotFound");
}
