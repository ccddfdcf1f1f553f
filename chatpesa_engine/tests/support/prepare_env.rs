#![allow(dead_code)]
use std::time::Duration;

use chatpesa_engine::{events::EventProducers, traits::OrderStore, LedgerApi, SqliteDatabase};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const TEST_STORE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/chatpesa_test_{}.db", dir.display(), rand::random::<u64>())
}

/// Creates an empty, fully migrated database at `url`.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("🚀️ Nothing to drop at {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5, TEST_STORE_TIMEOUT).await.expect("Error connecting to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Created test database {url}");
    db
}

pub async fn new_ledger() -> LedgerApi<SqliteDatabase> {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    LedgerApi::new(db, EventProducers::default())
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e}");
    }
}
