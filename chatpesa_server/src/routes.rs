//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every store call in here is async and bounded by the store timeout,
//! so a slow database never parks a worker.
//!
//! Every handler is generic over the store so that the endpoint tests can run against mocks.
use actix_web::{get, http::header, web, HttpRequest, HttpResponse, Responder};
use bytes::Bytes;
use chatpesa_engine::{
    db_types::{FeedEvent, NewOrder, OrderId, PaymentEvent},
    order_objects::OrderQueryFilter,
    traits::{ChangeFeed, OrderStore, StoreError},
    LedgerApi,
    LedgerError,
    QueryApi,
};
use futures::StreamExt;
use log::*;
use serde_json::json;

use crate::{
    data_objects::{
        ChangesQuery,
        CloseOrderParams,
        ExceptionsResponse,
        OrderResponse,
        OrdersQuery,
        OrdersResponse,
        StreamQuery,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<B>(core::marker::PhantomData<fn() -> B>);}
        paste::paste! { impl<B> [<$name:camel Route>]<B> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> B>)
            }
        }}
        paste::paste! { impl<B> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B>
        where
            B: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/create-order" impl OrderStore, ChangeFeed);
/// Route handler for order creation. The chat channel adapter calls this when a customer confirms an order.
///
/// The id is allocated by the ledger. Any id in the body is ignored.
pub async fn create_order<B: OrderStore + ChangeFeed>(
    body: web::Json<NewOrder>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST create-order for {} ({})", request.customer_phone, request.amount);
    let order = api.create_order(request).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(OrderResponse { order }))
}

route!(cancel_order => Post "/orders/{id}/cancel" impl OrderStore, ChangeFeed);
pub async fn cancel_order<B: OrderStore + ChangeFeed>(
    path: web::Path<OrderId>,
    body: Option<web::Json<CloseOrderParams>>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let params = body.map(|b| b.into_inner()).unwrap_or_default();
    debug!("💻️ POST cancel for order {order_id}");
    let order = api.cancel_order(&order_id, &params.reason).await?;
    Ok(HttpResponse::Ok().json(OrderResponse { order }))
}

route!(fail_order => Post "/orders/{id}/fail" impl OrderStore, ChangeFeed);
pub async fn fail_order<B: OrderStore + ChangeFeed>(
    path: web::Path<OrderId>,
    body: Option<web::Json<CloseOrderParams>>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let params = body.map(|b| b.into_inner()).unwrap_or_default();
    debug!("💻️ POST fail for order {order_id}");
    let order = api.mark_failed(&order_id, &params.reason).await?;
    Ok(HttpResponse::Ok().json(OrderResponse { order }))
}

route!(orders => Get "/orders" impl OrderStore, ChangeFeed);
/// Route handler for the order list
///
/// Query parameters, all optional:
/// * `status` - comma-separated list of statuses, in any casing
/// * `since`, `until` - RFC 3339 bounds on the creation time
/// * `phone` - the customer's phone number, in any format the chat channel accepts
/// * `limit` - maximum number of orders to return
///
/// An empty result is a 200 with an empty list. If the store cannot be reached the response is a 503, never an empty
/// list.
pub async fn orders<B: OrderStore + ChangeFeed>(
    query: web::Query<OrdersQuery>,
    api: web::Data<QueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = OrderQueryFilter::try_from(query.into_inner())?;
    debug!("💻️ GET orders. {filter}");
    let orders = api.list_orders(filter).await?;
    Ok(HttpResponse::Ok().json(OrdersResponse { orders }))
}

route!(order_by_id => Get "/orders/{id}" impl OrderStore, ChangeFeed);
pub async fn order_by_id<B: OrderStore + ChangeFeed>(
    path: web::Path<OrderId>,
    api: web::Data<QueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id}");
    match api.order_by_id(&order_id).await? {
        Some(order) => Ok(HttpResponse::Ok().json(OrderResponse { order })),
        None => Err(LedgerError::OrderNotFound(order_id).into()),
    }
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_event => Post "/payment-event" impl OrderStore, ChangeFeed);
/// Route handler for payment confirmations from the mobile-money gateway.
///
/// Delivery is at-least-once. A redelivered confirmation returns the paid order with `applied: false`. Payments that
/// cannot be applied are held for manual reconciliation and reported with a 409 or 422.
pub async fn payment_event<B: OrderStore + ChangeFeed>(
    body: web::Json<PaymentEvent>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let event = body.into_inner();
    info!("💻️ Payment notification {} for {}", event.receipt, event.amount);
    let outcome = api.apply_payment(event).await.map_err(|e| {
        warn!("💻️ Payment was not applied. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(exceptions => Get "/exceptions" impl OrderStore, ChangeFeed);
/// Payments that are waiting for manual reconciliation, oldest first.
pub async fn exceptions<B: OrderStore + ChangeFeed>(api: web::Data<QueryApi<B>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET exceptions");
    let exceptions = api.payment_exceptions().await?;
    Ok(HttpResponse::Ok().json(ExceptionsResponse { exceptions }))
}

//----------------------------------------------   Change feed  ----------------------------------------------------
route!(changes => Get "/changes" impl OrderStore, ChangeFeed);
/// One page of the change feed. Call again with the returned `nextOffset` to continue.
pub async fn changes<B: OrderStore + ChangeFeed>(
    query: web::Query<ChangesQuery>,
    api: web::Data<QueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ChangesQuery { offset, limit } = query.into_inner();
    trace!("💻️ GET changes from #{offset}");
    let page = api.changes_since(offset, limit).await?;
    Ok(HttpResponse::Ok().json(page))
}

route!(changes_stream => Get "/changes/stream" impl OrderStore, ChangeFeed);
/// Follows the change feed as Server-Sent Events.
///
/// Each event carries its offset as the SSE `id`, so a browser `EventSource` resumes where it left off after a
/// reconnect. Other clients can pass `?offset=` with the first offset they want.
pub async fn changes_stream<B: OrderStore + ChangeFeed + 'static>(
    req: HttpRequest,
    query: web::Query<StreamQuery>,
    api: web::Data<QueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let from = resume_offset(&req, query.offset)?;
    debug!("💻️ Change feed subscriber connected from #{from}");
    let stream = api.follow(from).map(|item| item.and_then(|event| sse_frame(&event)));
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream))
}

fn resume_offset(req: &HttpRequest, offset: Option<i64>) -> Result<i64, ServerError> {
    let last_seen = req
        .headers()
        .get("Last-Event-ID")
        .map(|v| {
            v.to_str()
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| ServerError::InvalidQuery("Last-Event-ID must be a feed offset".into()))
        })
        .transpose()?;
    let from = match (last_seen, offset) {
        (Some(id), _) => id
            .checked_add(1)
            .ok_or_else(|| ServerError::InvalidQuery(format!("Last-Event-ID {id} is not a feed offset")))?,
        (None, Some(offset)) => offset,
        (None, None) => 0,
    };
    if from < 0 {
        return Err(ServerError::InvalidQuery(format!("offset must not be negative, got {from}")));
    }
    Ok(from)
}

fn sse_frame(event: &FeedEvent) -> Result<Bytes, StoreError> {
    let data = serde_json::to_string(event)?;
    Ok(Bytes::from(format!("id: {}\nevent: {}\ndata: {data}\n\n", event.offset, event.kind)))
}
