use std::{fmt::Debug, time::Duration};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{
        ExceptionKind,
        FeedEvent,
        NewFeedEvent,
        NewOrder,
        NewPaymentException,
        Order,
        OrderId,
        OrderStatusType,
        PaymentEvent,
    },
    events::{
        EventProducers,
        FeedNotifier,
        OrderAnnulledEvent,
        OrderCreatedEvent,
        OrderPaidEvent,
        PaymentHeldEvent,
    },
    helpers::normalize_phone,
    ledger_api::{
        errors::LedgerError,
        id_generator::OrderIdGenerator,
        order_objects::{OrderQueryFilter, PaymentOutcome},
    },
    traits::{ChangeFeed, OrderStore, PutResult, RecoveryResult, StoreError},
};

pub const DEFAULT_MAX_WRITE_ATTEMPTS: usize = 5;
pub const DEFAULT_MATCH_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// How many read-validate-write rounds a mutation gets before it fails with a write conflict.
    pub max_write_attempts: usize,
    /// How far back the phone + amount heuristic looks for an open order when a payment carries no order id.
    pub match_window: chrono::Duration,
    /// The retry hint handed to callers when the store is unavailable.
    pub retry_after: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            match_window: chrono::Duration::hours(DEFAULT_MATCH_WINDOW_HOURS),
            retry_after: DEFAULT_RETRY_AFTER,
        }
    }
}

/// What a mutation wants to do with the current record.
enum Transition {
    Write(Order),
    /// The order is already in the requested state. Nothing is written.
    Unchanged,
}

/// `LedgerApi` is the write side of the order ledger. It creates orders, applies payment confirmations and closes
/// orders, enforcing the order state machine.
///
/// Every mutation is a read-validate-write cycle against the store's conditional put. Mutations of different orders
/// never contend. When two writers race on the same order, exactly one wins each round and the loser re-reads and
/// re-validates, up to [`LedgerConfig::max_write_attempts`] times.
pub struct LedgerApi<B> {
    db: B,
    ids: OrderIdGenerator<B>,
    producers: EventProducers,
    notifier: FeedNotifier,
    config: LedgerConfig,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.config)
    }
}

impl<B> LedgerApi<B>
where B: OrderStore
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        let ids = OrderIdGenerator::new(db.clone());
        Self { db, ids, producers, notifier: FeedNotifier::default(), config: LedgerConfig::default() }
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a notifier with a [`QueryApi`](crate::QueryApi) so that its live subscribers wake up on every write.
    pub fn with_feed_notifier(mut self, notifier: FeedNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn feed_notifier(&self) -> &FeedNotifier {
        &self.notifier
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> LedgerApi<B>
where B: OrderStore + ChangeFeed
{
    /// Creates a new order in `AWAITING_PAYMENT` with a freshly allocated id, and records a `created` event.
    ///
    /// Fails with [`LedgerError::InvalidRequest`] if the customer phone is missing or malformed, or the amount is not
    /// positive.
    pub async fn create_order(&self, request: NewOrder) -> Result<Order, LedgerError> {
        let request = validate_new_order(request)?;
        let max_attempts = self.config.max_write_attempts.max(1);
        let mut last_id = None;
        // A busy store did not write the order, so its id is still free and is used again
        let mut pending = None;
        for attempt in 1..=max_attempts {
            let (seq, id) = match pending.take() {
                Some(allocated) => allocated,
                None => self.ids.next().await.map_err(|e| self.store_error(e))?,
            };
            let now = Utc::now();
            let order = Order {
                id: id.clone(),
                seq,
                customer_phone: request.customer_phone.clone(),
                customer_name: request.customer_name.clone(),
                items: request.items.clone(),
                amount: request.amount,
                original_amount: None,
                status: OrderStatusType::AwaitingPayment,
                receipt: None,
                status_reason: None,
                created_at: now,
                paid_at: None,
                updated_at: now,
                version: 1,
            };
            match self.db.put_if_version(&order, 0).await {
                Ok(PutResult::Written(event)) => {
                    info!("🔄️📦️ Order [{id}] created for {} ({})", order.customer_phone, order.amount);
                    self.notifier.notify(event.offset);
                    let order = event.order;
                    self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
                    return Ok(order);
                },
                Ok(PutResult::VersionConflict { .. }) => {
                    // The id is already taken, so the counter is behind the stored orders. Heal it and take another.
                    warn!("🔄️📦️ Order id {id} is already in use. Re-synchronizing the id counter (attempt {attempt})");
                    self.db.reconcile_sequence().await.map_err(|e| self.store_error(e))?;
                },
                Ok(PutResult::ReceiptTaken { receipt, .. }) => {
                    return Err(LedgerError::InvalidRequest(format!("A new order cannot carry receipt {receipt}")));
                },
                Err(e) if e.is_busy() => {
                    debug!("🔄️📦️ Store busy while creating order [{id}] (attempt {attempt}). {e}");
                    pending = Some((seq, id.clone()));
                },
                Err(e) => return Err(self.store_error(e)),
            }
            last_id = Some(id);
        }
        Err(LedgerError::WriteConflict { order_id: last_id.unwrap_or_else(|| OrderId::from("")), attempts: max_attempts })
    }

    /// Applies a payment confirmation from the mobile-money gateway.
    ///
    /// The receipt is the idempotency key. Redelivering a payment that has already been applied returns the paid order
    /// with `applied = false` and changes nothing. Payments that cannot be applied are never dropped: they are held for
    /// manual reconciliation and the reason is returned as an error.
    ///
    /// The order is resolved from the correlation hint's order id if present. Otherwise the oldest open order with the
    /// same customer phone and amount, created within the match window, is used. That fallback is best-effort.
    pub async fn apply_payment(&self, event: PaymentEvent) -> Result<PaymentOutcome, LedgerError> {
        let event = validate_payment(event)?;
        let receipt = event.receipt.clone();
        let matched_by_phone = event.correlation_hint.order_id.is_none();
        let max_attempts = self.config.max_write_attempts.max(1);
        trace!("🔄️💰️ Processing payment {receipt} for {}", event.amount);
        let mut attempt = 1;
        loop {
            if let Some(order) = self.db.find_by_receipt(&receipt).await.map_err(|e| self.store_error(e))? {
                return match &event.correlation_hint.order_id {
                    Some(hinted) if hinted != &order.id => {
                        let detail = format!("Receipt {receipt} has already been applied to order {}", order.id);
                        let exception = NewPaymentException::new(&event, ExceptionKind::Conflicting, detail.clone());
                        self.hold_payment(exception).await?;
                        Err(LedgerError::ConflictingPayment { receipt, order_id: hinted.clone(), detail })
                    },
                    _ => {
                        debug!("🔄️💰️ Payment {receipt} was already applied to [{}]. Nothing to do", order.id);
                        Ok(PaymentOutcome { order, applied: false })
                    },
                };
            }
            let Some(target) = self.resolve_payment_target(&event).await? else {
                let detail = "No open order matches this payment".to_string();
                let exception = NewPaymentException::new(&event, ExceptionKind::Unmatched, detail);
                self.hold_payment(exception).await?;
                return Err(LedgerError::UnmatchedPayment { receipt });
            };
            let result = self.transition(&target.id, |current| pay_order(current, &event)).await;
            match result {
                Ok((order, applied)) => {
                    if applied {
                        info!("🔄️💰️ Order [{}] paid with receipt {receipt}", order.id);
                        self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
                    }
                    return Ok(PaymentOutcome { order, applied });
                },
                // A phone match only ever picks an open order. If it is no longer open, another payment or a
                // cancellation got there first, and a different open order may still match.
                Err(LedgerError::ConflictingPayment { .. } | LedgerError::InvalidTransition { .. })
                    if matched_by_phone && attempt < max_attempts =>
                {
                    debug!(
                        "🔄️💰️ [{}] was closed while payment {receipt} was being matched to it. Matching again \
                         (attempt {attempt} of {max_attempts})",
                        target.id
                    );
                    attempt += 1;
                },
                Err(e @ LedgerError::ConflictingPayment { .. }) => {
                    let exception = NewPaymentException::new(&event, ExceptionKind::Conflicting, e.to_string())
                        .with_order_id(target.id.clone());
                    self.hold_payment(exception).await?;
                    return Err(e);
                },
                Err(e @ LedgerError::InvalidTransition { .. }) => {
                    let exception = NewPaymentException::new(&event, ExceptionKind::ClosedOrder, e.to_string())
                        .with_order_id(target.id.clone());
                    self.hold_payment(exception).await?;
                    return Err(e);
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Cancels an order that is still awaiting payment. Cancelling an order that is already cancelled is a no-op.
    pub async fn cancel_order(&self, id: &OrderId, reason: &str) -> Result<Order, LedgerError> {
        self.annul(id, OrderStatusType::Cancelled, reason).await
    }

    /// Marks an order that is still awaiting payment as failed, e.g. because the customer declined the payment
    /// prompt. Failing an order that has already failed is a no-op.
    pub async fn mark_failed(&self, id: &OrderId, reason: &str) -> Result<Order, LedgerError> {
        self.annul(id, OrderStatusType::Failed, reason).await
    }

    /// Repairs the id counter and the change feed from the order records.
    ///
    /// The counter is raised to the highest stored sequence if it has fallen behind. Then every order whose latest
    /// feed event is older than the record gets an event derived from its current state. Intermediate versions that
    /// were never recorded cannot be reconstructed; consumers see the order jump straight to its current state.
    pub async fn recover_change_feed(&self) -> Result<RecoveryResult, LedgerError> {
        let counter_raised_to = self.db.reconcile_sequence().await.map_err(|e| self.store_error(e))?;
        let recorded = self.db.latest_versions().await.map_err(|e| self.store_error(e))?;
        let orders = self.db.scan(OrderQueryFilter::default()).await.map_err(|e| self.store_error(e))?;
        let mut appended: Vec<FeedEvent> = Vec::new();
        for order in orders {
            let last_recorded = recorded.get(&order.id).copied().unwrap_or(0);
            if last_recorded >= order.version {
                continue;
            }
            let event = self.db.append(NewFeedEvent::for_order(&order)).await.map_err(|e| self.store_error(e))?;
            if event.version == order.version && event.version > last_recorded {
                warn!(
                    "🔄️🩹️ Order [{}] v{} had no feed event. Re-derived it at #{}",
                    order.id, order.version, event.offset
                );
                self.notifier.notify(event.offset);
                appended.push(event);
            }
        }
        let result = RecoveryResult { counter_raised_to, appended };
        if result.is_clean() {
            debug!("🔄️🩹️ Change feed recovery found nothing to repair");
        } else {
            info!("🔄️🩹️ Change feed recovery appended {} events", result.appended.len());
        }
        Ok(result)
    }

    async fn annul(&self, id: &OrderId, to: OrderStatusType, reason: &str) -> Result<Order, LedgerError> {
        let reason = Some(reason.trim()).filter(|r| !r.is_empty()).map(String::from);
        let (order, applied) = self
            .transition(id, |current| match current.status {
                OrderStatusType::AwaitingPayment => {
                    let mut next = current.clone();
                    next.status = to;
                    next.status_reason = reason.clone();
                    Ok(Transition::Write(next))
                },
                status if status == to => Ok(Transition::Unchanged),
                from => Err(LedgerError::InvalidTransition { order_id: current.id.clone(), from, to }),
            })
            .await?;
        if applied {
            info!("🔄️❌️ Order [{id}] is now {to}");
            self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone())).await;
        }
        Ok(order)
    }

    /// Runs the read-validate-write cycle for one order. `mutate` sees the current record and decides what to write.
    /// It is called again with the fresh record every time the conditional put loses a race.
    async fn transition<F>(&self, id: &OrderId, mutate: F) -> Result<(Order, bool), LedgerError>
    where F: Fn(&Order) -> Result<Transition, LedgerError> {
        let max_attempts = self.config.max_write_attempts.max(1);
        for attempt in 1..=max_attempts {
            let current =
                self.db.get(id).await.map_err(|e| self.store_error(e))?.ok_or_else(|| LedgerError::OrderNotFound(id.clone()))?;
            let mut next = match mutate(&current)? {
                Transition::Write(next) => next,
                Transition::Unchanged => return Ok((current, false)),
            };
            next.version = current.version + 1;
            next.updated_at = Utc::now();
            match self.db.put_if_version(&next, current.version).await {
                Ok(PutResult::Written(event)) => {
                    self.notifier.notify(event.offset);
                    return Ok((event.order, true));
                },
                Ok(PutResult::VersionConflict { current_version, .. }) => {
                    debug!(
                        "🔄️ Lost a write race on [{id}] at v{} (now {current_version:?}). Attempt {attempt} of \
                         {max_attempts}",
                        current.version
                    );
                },
                Ok(PutResult::ReceiptTaken { receipt, .. }) => {
                    return Err(LedgerError::ConflictingPayment {
                        receipt: receipt.clone(),
                        order_id: id.clone(),
                        detail: format!("Receipt {receipt} has already been applied to another order"),
                    });
                },
                Err(e) if e.is_busy() => debug!("🔄️ Store busy writing [{id}] (attempt {attempt}). {e}"),
                Err(e) => return Err(self.store_error(e)),
            }
        }
        warn!("🔄️ Giving up on [{id}] after {max_attempts} conflicting writes");
        Err(LedgerError::WriteConflict { order_id: id.clone(), attempts: max_attempts })
    }

    async fn resolve_payment_target(&self, event: &PaymentEvent) -> Result<Option<Order>, LedgerError> {
        let hint = &event.correlation_hint;
        if let Some(order_id) = &hint.order_id {
            return self.db.get(order_id).await.map_err(|e| self.store_error(e));
        }
        let Some(phone) = &hint.customer_phone else {
            return Ok(None);
        };
        let since = event.timestamp.checked_sub_signed(self.config.match_window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let filter = OrderQueryFilter {
            customer_phone: Some(phone.clone()),
            amount: Some(event.amount),
            since: Some(since),
            statuses: Some(vec![OrderStatusType::AwaitingPayment]),
            limit: Some(1),
            ..Default::default()
        };
        let candidate = self.db.scan(filter).await.map_err(|e| self.store_error(e))?.into_iter().next();
        match &candidate {
            Some(order) => debug!("🔄️💰️ Payment {} matched to [{}] by phone and amount", event.receipt, order.id),
            None => debug!("🔄️💰️ No open order for {phone} with amount {}", event.amount),
        }
        Ok(candidate)
    }

    /// Holds a payment for manual reconciliation. If even that fails, the caller gets the store error instead of the
    /// reconciliation outcome, so the gateway sees a failure and the payment is not lost.
    async fn hold_payment(&self, exception: NewPaymentException) -> Result<(), LedgerError> {
        let held = self.db.hold_payment(exception).await.map_err(|e| {
            error!("🔄️💰️ Could not hold a payment for reconciliation. {e}");
            self.store_error(e)
        })?;
        warn!("🔄️💰️ Payment {} held as {}. {}", held.receipt, held.kind, held.detail);
        self.producers.publish_payment_held(PaymentHeldEvent::new(held)).await;
        Ok(())
    }

    fn store_error(&self, e: StoreError) -> LedgerError {
        LedgerError::from_store(e, self.config.retry_after)
    }
}

fn pay_order(current: &Order, event: &PaymentEvent) -> Result<Transition, LedgerError> {
    match current.status {
        OrderStatusType::Paid if current.receipt.as_deref() == Some(event.receipt.as_str()) => Ok(Transition::Unchanged),
        OrderStatusType::Paid => Err(LedgerError::ConflictingPayment {
            receipt: event.receipt.clone(),
            order_id: current.id.clone(),
            detail: format!(
                "The order was already paid with receipt {}",
                current.receipt.as_deref().unwrap_or("(none)")
            ),
        }),
        from @ (OrderStatusType::Failed | OrderStatusType::Cancelled) => {
            Err(LedgerError::InvalidTransition { order_id: current.id.clone(), from, to: OrderStatusType::Paid })
        },
        OrderStatusType::AwaitingPayment => {
            let mut next = current.clone();
            next.status = OrderStatusType::Paid;
            next.receipt = Some(event.receipt.clone());
            next.paid_at = Some(event.timestamp);
            if let Some(name) = event.payer_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                next.customer_name = Some(name.to_string());
            }
            if event.amount != current.amount && current.original_amount.is_none() {
                debug!("🔄️💰️ Order [{}] amount corrected from {} to {}", current.id, current.amount, event.amount);
                next.original_amount = Some(current.amount);
                next.amount = event.amount;
            }
            Ok(Transition::Write(next))
        },
    }
}

fn validate_new_order(request: NewOrder) -> Result<NewOrder, LedgerError> {
    if request.customer_phone.trim().is_empty() {
        return Err(LedgerError::InvalidRequest("customerPhone is required".into()));
    }
    let customer_phone = normalize_phone(&request.customer_phone).map_err(|e| LedgerError::InvalidRequest(e.to_string()))?;
    if !request.amount.is_positive() {
        return Err(LedgerError::InvalidRequest(format!("amount must be greater than zero, got {}", request.amount)));
    }
    let customer_name = request.customer_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    Ok(NewOrder { customer_phone, customer_name, items: request.items, amount: request.amount })
}

fn validate_payment(mut event: PaymentEvent) -> Result<PaymentEvent, LedgerError> {
    event.receipt = event.receipt.trim().to_string();
    if event.receipt.is_empty() {
        return Err(LedgerError::InvalidRequest("receipt is required".into()));
    }
    if !event.amount.is_positive() {
        return Err(LedgerError::InvalidRequest(format!("amount must be greater than zero, got {}", event.amount)));
    }
    if event.correlation_hint.is_empty() {
        return Err(LedgerError::InvalidRequest("correlationHint needs an orderId or a customerPhone".into()));
    }
    if let Some(phone) = event.correlation_hint.customer_phone.take() {
        let phone = normalize_phone(&phone).map_err(|e| LedgerError::InvalidRequest(e.to_string()))?;
        event.correlation_hint.customer_phone = Some(phone);
    }
    Ok(event)
}
