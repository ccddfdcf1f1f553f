//! Event handlers that record ledger activity in the server log.
//!
//! The handlers run on their own tasks, off the request path. They write to the `cpl::activity` target so that the
//! activity log can be routed separately with `RUST_LOG`.
use chatpesa_engine::events::{
    EventHandlers,
    EventHooks,
    OrderAnnulledEvent,
    OrderCreatedEvent,
    OrderPaidEvent,
    PaymentHeldEvent,
};
use futures::future::BoxFuture;
use log::*;

const ACTIVITY_EVENT_BUFFER_SIZE: usize = 64;
const ACTIVITY_LOG_TARGET: &str = "cpl::activity";

pub fn create_activity_log_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev: OrderCreatedEvent| {
            let order = ev.order;
            info!(
                target: ACTIVITY_LOG_TARGET,
                "📦️ New order {} from {} for {}: {}", order.id, order.customer_phone, order.amount, order.items
            );
            no_op()
        })
        .on_order_paid(|ev: OrderPaidEvent| {
            let order = ev.order;
            let receipt = order.receipt.as_deref().unwrap_or("(none)");
            match order.original_amount {
                Some(original) => info!(
                    target: ACTIVITY_LOG_TARGET,
                    "💰️ Order {} paid with receipt {receipt}. Amount corrected from {original} to {}", order.id, order.amount
                ),
                None => info!(target: ACTIVITY_LOG_TARGET, "💰️ Order {} paid with receipt {receipt}", order.id),
            }
            no_op()
        })
        .on_order_annulled(|ev: OrderAnnulledEvent| {
            let OrderAnnulledEvent { order, status } = ev;
            let reason = order.status_reason.unwrap_or_default();
            info!(target: ACTIVITY_LOG_TARGET, "❌️ Order {} is now {status}. {reason}", order.id);
            no_op()
        })
        .on_payment_held(|ev: PaymentHeldEvent| {
            let held = ev.exception;
            warn!(
                target: ACTIVITY_LOG_TARGET,
                "🚨️ Payment {} ({}) is waiting for manual reconciliation as {}. {}",
                held.receipt,
                held.amount,
                held.kind,
                held.detail
            );
            no_op()
        });
    EventHandlers::new(ACTIVITY_EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
