use actix_web::{http::StatusCode, test::TestRequest};
use chatpesa_engine::{
    db_types::{ExceptionKind, NewPaymentException, Order, OrderStatusType, PaymentException},
    traits::StoreError,
};
use chrono::Utc;
use serde_json::json;

use super::helpers::{configure, idle_store, sample_order, send_request, written};
use crate::endpoint_tests::mocks::MockStore;

fn payment_json(receipt: &str) -> serde_json::Value {
    json!({
        "correlationHint": { "orderId": "ORD-0000000001" },
        "receipt": receipt,
        "amount": 250,
        "timestamp": "2024-10-19T09:00:00Z",
        "payerName": "JANE W. DOE"
    })
}

fn held(exception: NewPaymentException) -> PaymentException {
    PaymentException {
        id: 1,
        receipt: exception.receipt,
        kind: exception.kind,
        order_id: exception.order_id,
        customer_phone: exception.customer_phone,
        amount: exception.amount,
        detail: exception.detail,
        created_at: Utc::now(),
    }
}

#[actix_web::test]
async fn apply_payment() {
    let mut ledger = idle_store();
    ledger.expect_find_by_receipt().returning(|_| Ok(None));
    ledger.expect_get().returning(|_| Ok(Some(sample_order(1, OrderStatusType::AwaitingPayment))));
    ledger
        .expect_put_if_version()
        .withf(|order: &Order, expected: &i64| *expected == 1 && order.receipt.as_deref() == Some("RCP0001"))
        .times(1)
        .returning(|order, _| Ok(written(2, order)));
    let req = TestRequest::post().uri("/payment-event").set_json(payment_json("RCP0001"));
    let res = send_request(req, configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["applied"], true);
    assert_eq!(body["order"]["status"], "PAID");
    assert_eq!(body["order"]["paidAt"], "2024-10-19T09:00:00Z");
    assert_eq!(body["order"]["customerName"], "JANE W. DOE");
}

#[actix_web::test]
async fn redelivered_payment() {
    let mut ledger = idle_store();
    ledger.expect_find_by_receipt().returning(|_| {
        let mut order = sample_order(1, OrderStatusType::Paid);
        order.receipt = Some("RCP0001".into());
        order.version = 2;
        Ok(Some(order))
    });
    ledger.expect_put_if_version().never();
    let req = TestRequest::post().uri("/payment-event").set_json(payment_json("RCP0001"));
    let res = send_request(req, configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["applied"], false);
    assert_eq!(body["order"]["version"], 2);
}

#[actix_web::test]
async fn unmatched_payment_is_held() {
    let mut ledger = idle_store();
    ledger.expect_find_by_receipt().returning(|_| Ok(None));
    ledger.expect_get().returning(|_| Ok(None));
    ledger
        .expect_hold_payment()
        .withf(|e: &NewPaymentException| e.kind == ExceptionKind::Unmatched && e.receipt == "RCP0002")
        .times(1)
        .returning(|e| Ok(held(e)));
    let req = TestRequest::post().uri("/payment-event").set_json(payment_json("RCP0002"));
    let res = send_request(req, configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.json()["code"], "UnmatchedPayment");
}

#[actix_web::test]
async fn second_receipt_conflicts() {
    let mut ledger = idle_store();
    ledger.expect_find_by_receipt().returning(|_| Ok(None));
    ledger.expect_get().returning(|_| {
        let mut order = sample_order(1, OrderStatusType::Paid);
        order.receipt = Some("RCP0001".into());
        order.version = 2;
        Ok(Some(order))
    });
    ledger
        .expect_hold_payment()
        .withf(|e: &NewPaymentException| e.kind == ExceptionKind::Conflicting)
        .times(1)
        .returning(|e| Ok(held(e)));
    let req = TestRequest::post().uri("/payment-event").set_json(payment_json("RCP0003"));
    let res = send_request(req, configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json()["code"], "ConflictingPayment");
}

#[actix_web::test]
async fn payments_are_retried_when_the_store_is_down() {
    let mut ledger = idle_store();
    ledger.expect_find_by_receipt().returning(|_| Err(StoreError::DriverError("disk I/O error".into())));
    let req = TestRequest::post().uri("/payment-event").set_json(payment_json("RCP0004"));
    let res = send_request(req, configure(ledger, MockStore::new())).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.retry_after.as_deref(), Some("5"));
    assert_eq!(res.json()["code"], "StoreUnavailable");
}

#[actix_web::test]
async fn payments_need_a_receipt() {
    let req = TestRequest::post().uri("/payment-event").set_json(json!({
        "correlationHint": { "orderId": "ORD-0000000001" },
        "amount": 250
    }));
    let res = send_request(req, configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "InvalidRequest");
}
