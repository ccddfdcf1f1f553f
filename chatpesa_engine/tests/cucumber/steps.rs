use chatpesa_engine::{
    db_types::{Amount, ChangeKind, CorrelationHint, NewOrder, OrderStatusType, PaymentEvent},
    LedgerError,
};
use cucumber::{then, when};

use crate::cucumber::LedgerWorld;

fn error_name(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::InvalidRequest(_) => "InvalidRequest",
        LedgerError::InvalidTransition { .. } => "InvalidTransition",
        LedgerError::OrderNotFound(_) => "OrderNotFound",
        LedgerError::ConflictingPayment { .. } => "ConflictingPayment",
        LedgerError::UnmatchedPayment { .. } => "UnmatchedPayment",
        LedgerError::WriteConflict { .. } => "WriteConflict",
        LedgerError::StoreUnavailable { .. } => "StoreUnavailable",
        LedgerError::StoreFault(_) => "StoreFault",
    }
}

#[when(expr = "customer {string} places order {word} for {int} KES")]
async fn place_order(world: &mut LedgerWorld, phone: String, name: String, amount: i64) {
    let request = NewOrder::new(phone, format!("Order {name}"), Amount::from(amount));
    let result = world.api().create_order(request).await;
    match result {
        Ok(order) => {
            world.orders.insert(name, order.id);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

async fn pay(world: &mut LedgerWorld, payment: PaymentEvent) {
    world.last_error = world.api().apply_payment(payment).await.err();
}

#[when(expr = "payment {word} for {int} KES arrives for order {word}")]
async fn payment_for_order(world: &mut LedgerWorld, receipt: String, amount: i64, name: String) {
    let hint = CorrelationHint::for_order(world.order_id(&name));
    pay(world, PaymentEvent::new(hint, receipt, Amount::from(amount))).await;
}

#[when(expr = "payment {word} for {int} KES arrives from {string}")]
async fn payment_from_phone(world: &mut LedgerWorld, receipt: String, amount: i64, phone: String) {
    let hint = CorrelationHint::for_phone(phone);
    pay(world, PaymentEvent::new(hint, receipt, Amount::from(amount))).await;
}

#[when(expr = "order {word} is cancelled")]
async fn cancel_order(world: &mut LedgerWorld, name: String) {
    let id = world.order_id(&name);
    world.last_error = world.api().cancel_order(&id, "cancelled by the merchant").await.err();
}

#[when(expr = "order {word} fails")]
async fn fail_order(world: &mut LedgerWorld, name: String) {
    let id = world.order_id(&name);
    world.last_error = world.api().mark_failed(&id, "payment prompt declined").await.err();
}

#[then(expr = "order {word} is {word}")]
async fn check_status(world: &mut LedgerWorld, name: String, status: String) {
    let expected = status.parse::<OrderStatusType>().expect("Not a valid order status");
    let id = world.order_id(&name);
    let order = world.query().order_by_id(&id).await.expect("Error fetching order").expect("Order does not exist");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} was paid with receipt {word}")]
async fn check_receipt(world: &mut LedgerWorld, name: String, receipt: String) {
    let id = world.order_id(&name);
    let order = world.query().order_by_id(&id).await.expect("Error fetching order").expect("Order does not exist");
    assert_eq!(order.receipt.as_deref(), Some(receipt.as_str()));
    assert!(order.paid_at.is_some(), "paidAt is not set");
}

#[then(expr = "the request succeeds")]
async fn check_success(world: &mut LedgerWorld) {
    assert!(world.last_error.is_none(), "Request failed: {:?}", world.last_error);
}

#[then(expr = "the request fails with {word}")]
async fn check_failure(world: &mut LedgerWorld, name: String) {
    let err = world.last_error.as_ref().expect("The request did not fail");
    assert_eq!(error_name(err), name, "Unexpected error: {err}");
}

#[then(expr = "the feed has {int} {word} event(s) for order {word}")]
async fn check_feed(world: &mut LedgerWorld, count: usize, kind: String, name: String) {
    let id = world.order_id(&name);
    let page = world.query().changes_since(0, None).await.expect("Error reading the change feed");
    let found = page.events.iter().filter(|e| e.order_id == id && e.kind.to_string() == kind).count();
    assert_eq!(found, count, "Expected {count} {kind} events for {id}, found {found}");
}

#[then(expr = "{int} payment(s) are/is held for reconciliation")]
async fn check_held(world: &mut LedgerWorld, count: usize) {
    let held = world.query().payment_exceptions().await.expect("Error fetching payment exceptions");
    assert_eq!(held.len(), count);
}
