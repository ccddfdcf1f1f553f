use std::collections::HashMap;

use chatpesa_engine::{db_types::OrderId, events::EventProducers, LedgerApi, LedgerError, QueryApi, SqliteDatabase};
use cucumber::World;
use log::*;

use crate::support::prepare_env::{prepare_test_env, random_db_path};

#[derive(Default, Debug, World)]
pub struct LedgerWorld {
    pub system: Option<LedgerSystem>,
    /// Orders are referred to by a name in the feature files, since their ids are allocated by the ledger
    pub orders: HashMap<String, OrderId>,
    pub last_error: Option<LedgerError>,
}

#[derive(Debug)]
pub struct LedgerSystem {
    pub db_path: String,
    pub api: LedgerApi<SqliteDatabase>,
    pub query: QueryApi<SqliteDatabase>,
}

impl LedgerWorld {
    pub fn api(&self) -> &LedgerApi<SqliteDatabase> {
        &self.system.as_ref().expect("Ledger not initialised").api
    }

    pub fn query(&self) -> &QueryApi<SqliteDatabase> {
        &self.system.as_ref().expect("Ledger not initialised").query
    }

    pub fn order_id(&self, name: &str) -> OrderId {
        self.orders.get(name).cloned().unwrap_or_else(|| OrderId::from(name))
    }
}

impl LedgerSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("Created database: {url}");
        let query = QueryApi::new(db.clone());
        let api = LedgerApi::new(db, EventProducers::default());
        Self { db_path: url, api, query }
    }
}
