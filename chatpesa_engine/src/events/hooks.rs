use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderAnnulledEvent,
    OrderCreatedEvent,
    OrderPaidEvent,
    PaymentHeldEvent,
};

type BoxedHook = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub payment_held_producer: Vec<EventProducer<PaymentHeldEvent>>,
}

impl EventProducers {
    pub async fn publish_order_created(&self, event: OrderCreatedEvent) {
        for producer in &self.order_created_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_paid(&self, event: OrderPaidEvent) {
        for producer in &self.order_paid_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_annulled(&self, event: OrderAnnulledEvent) {
        for producer in &self.order_annulled_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payment_held(&self, event: PaymentHeldEvent) {
        for producer in &self.payment_held_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    /// Combines the producers of two handler sets, so that events reach both.
    pub fn merge(mut self, other: EventProducers) -> Self {
        self.order_created_producer.extend(other.order_created_producer);
        self.order_paid_producer.extend(other.order_paid_producer);
        self.order_annulled_producer.extend(other.order_annulled_producer);
        self.payment_held_producer.extend(other.payment_held_producer);
        self
    }
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
    pub on_payment_held: Option<EventHandler<PaymentHeldEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_created = hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f));
        let on_order_paid = hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_order_annulled = hooks.on_order_annulled.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_held = hooks.on_payment_held.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_created, on_order_paid, on_order_annulled, on_payment_held }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_held {
            result.payment_held_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns each configured handler onto the runtime. Handlers stop once every producer has been dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_held {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_payment_held: Option<Handler<PaymentHeldEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_payment_held<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentHeldEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_payment_held = Some(Arc::new(f));
        self
    }
}
