use std::time::Duration;

use actix_web::{
    dev::Server,
    error::{JsonPayloadError, QueryPayloadError},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpRequest,
    HttpServer,
};
use chatpesa_engine::{
    events::{EventProducers, FeedNotifier, FollowOptions},
    traits::ChangeFeed,
    LedgerApi,
    QueryApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    activity_log::create_activity_log_handlers,
    config::ServerConfig,
    errors::ServerError,
    reconcile_worker::start_reconcile_worker,
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
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections, config.store_timeout)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let head = db.head_offset().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let notifier = FeedNotifier::new(head);
    let handlers = create_activity_log_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let ledger = new_ledger_api(&config, db.clone(), producers.clone(), notifier.clone());
    if config.recover_on_startup {
        let result = ledger.recover_change_feed().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
        if result.is_clean() {
            info!("🚀️ Change feed is consistent with the order records");
        } else {
            warn!("🚀️ Start-up recovery re-derived {} feed events", result.appended.len());
        }
    }
    if config.reconcile_interval.is_zero() {
        info!("🚀️ Reconcile worker is disabled");
    } else {
        let _worker = start_reconcile_worker(ledger, config.reconcile_interval);
    }
    let srv = create_server_instance(config, db, producers, notifier)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    notifier: FeedNotifier,
) -> Result<Server, ServerError> {
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let ledger_api = new_ledger_api(&config, db.clone(), producers.clone(), notifier.clone());
        let query_api = QueryApi::new(db.clone())
            .with_feed_notifier(notifier.clone())
            .with_default_limit(config.changes_page_limit)
            .with_retry_after(config.retry_after)
            .with_follow_options(FollowOptions::default());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpl::access_log"))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(query_api))
            .service(health)
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(PaymentEventRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(FailOrderRoute::<SqliteDatabase>::new())
            .service(ChangesStreamRoute::<SqliteDatabase>::new())
            .service(ChangesRoute::<SqliteDatabase>::new())
            .service(ExceptionsRoute::<SqliteDatabase>::new())
            .service(OrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((bind_addr.0.as_str(), bind_addr.1))?
    .run();
    Ok(srv)
}

fn new_ledger_api(
    config: &ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    notifier: FeedNotifier,
) -> LedgerApi<SqliteDatabase> {
    LedgerApi::new(db, producers).with_config(config.ledger_config()).with_feed_notifier(notifier)
}

/// Malformed JSON bodies are reported with the same error shape as every other invalid request.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        debug!("💻️ Rejected request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req: &HttpRequest| {
        debug!("💻️ Rejected query string. {err}");
        ServerError::InvalidQuery(err.to_string()).into()
    })
}
