use actix_web::{http::StatusCode, test::TestRequest};
use chatpesa_engine::{
    db_types::{Amount, ExceptionKind, FeedEvent, OrderStatusType, PaymentException},
    traits::PutResult,
};
use chrono::Utc;

use super::helpers::{configure, idle_store, sample_order, send_request, written};
use crate::endpoint_tests::mocks::MockStore;

fn created_event(offset: i64, seq: i64) -> FeedEvent {
    match written(offset, &sample_order(seq, OrderStatusType::AwaitingPayment)) {
        PutResult::Written(event) => event,
        _ => unreachable!(),
    }
}

#[actix_web::test]
async fn health() {
    let res = send_request(TestRequest::get().uri("/health"), configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, r#"{"status":"ok"}"#);
}

#[actix_web::test]
async fn page_through_changes() {
    let mut query = MockStore::new();
    query
        .expect_read_from()
        .withf(|from: &i64, limit: &usize| *from == 0 && *limit == 500)
        .returning(|_, _| Ok(vec![created_event(1, 1), created_event(2, 2)]));
    let res = send_request(TestRequest::get().uri("/changes"), configure(idle_store(), query)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["nextOffset"], 3);
    assert_eq!(body["events"][0]["kind"], "created");
    assert_eq!(body["events"][1]["orderId"], "ORD-0000000002");
    assert_eq!(body["events"][1]["order"]["status"], "AWAITING_PAYMENT");
}

#[actix_web::test]
async fn caught_up_pages_keep_the_offset() {
    let mut query = MockStore::new();
    query
        .expect_read_from()
        .withf(|from: &i64, limit: &usize| *from == 3 && *limit == 1000)
        .returning(|_, _| Ok(vec![]));
    let res = send_request(TestRequest::get().uri("/changes?offset=3&limit=5000"), configure(idle_store(), query)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, r#"{"events":[],"nextOffset":3}"#);
}

#[actix_web::test]
async fn invalid_change_queries() {
    let res = send_request(TestRequest::get().uri("/changes?offset=-1"), configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "InvalidRequest");
    let res =
        send_request(TestRequest::get().uri("/changes?limit=0"), configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res =
        send_request(TestRequest::get().uri("/changes?offset=first"), configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn the_stream_is_server_sent_events() {
    let mut query = MockStore::new();
    query.expect_clone().returning(MockStore::new);
    let req = TestRequest::get().uri("/changes/stream").insert_header(("Last-Event-ID", "12"));
    let res = send_request(req, configure(idle_store(), query)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.content_type.as_deref(), Some("text/event-stream"));

    let req = TestRequest::get().uri("/changes/stream").insert_header(("Last-Event-ID", "twelve"));
    let res = send_request(req, configure(idle_store(), MockStore::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn list_held_payments() {
    let mut query = MockStore::new();
    query.expect_payment_exceptions().returning(|| {
        Ok(vec![PaymentException {
            id: 1,
            receipt: "RCP0009".into(),
            kind: ExceptionKind::ClosedOrder,
            order_id: Some(sample_order(5, OrderStatusType::Cancelled).id),
            customer_phone: None,
            amount: Amount::from(250),
            detail: "Order ORD-0000000005 cannot move from CANCELLED to PAID".into(),
            created_at: Utc::now(),
        }])
    });
    let res = send_request(TestRequest::get().uri("/exceptions"), configure(idle_store(), query)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["exceptions"][0]["kind"], "CLOSED_ORDER");
    assert_eq!(body["exceptions"][0]["orderId"], "ORD-0000000005");
}
