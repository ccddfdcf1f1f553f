use std::{env, fmt::Display, str::FromStr, time::Duration};

use chatpesa_engine::{
    db_url,
    LedgerConfig,
    DEFAULT_CHANGES_LIMIT,
    DEFAULT_MATCH_WINDOW_HOURS,
    DEFAULT_MAX_WRITE_ATTEMPTS,
    DEFAULT_RETRY_AFTER,
    DEFAULT_STORE_TIMEOUT,
    MAX_CHANGES_LIMIT,
};
use cpl_common::helpers::parse_boolean_flag;
use log::*;

const DEFAULT_CPL_HOST: &str = "127.0.0.1";
const DEFAULT_CPL_PORT: u16 = 8360;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Upper bound on any single store operation, including waiting for a pooled connection.
    pub store_timeout: Duration,
    /// How many read-validate-write rounds a mutation gets before the client is told to retry.
    pub max_write_attempts: usize,
    /// How far back a payment without an order id may be matched to an open order by phone and amount.
    pub match_window: chrono::Duration,
    /// The `Retry-After` hint sent when the store is unavailable.
    pub retry_after: Duration,
    /// How often the background worker runs the change feed recovery pass. Zero disables the worker.
    pub reconcile_interval: Duration,
    pub recover_on_startup: bool,
    /// Page size for `GET /changes` when the client does not ask for one.
    pub changes_page_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPL_HOST.to_string(),
            port: DEFAULT_CPL_PORT,
            database_url: String::default(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            match_window: chrono::Duration::hours(DEFAULT_MATCH_WINDOW_HOURS),
            retry_after: DEFAULT_RETRY_AFTER,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            recover_on_startup: true,
            changes_page_limit: DEFAULT_CHANGES_LIMIT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let host = env::var("CPL_HOST").ok().unwrap_or_else(|| DEFAULT_CPL_HOST.into());
        let port = env_or_default("CPL_PORT", DEFAULT_CPL_PORT);
        let database_url = db_url();
        let db_max_connections = env_or_default("CPL_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS).max(1);
        let store_timeout =
            Duration::from_millis(env_or_default("CPL_STORE_TIMEOUT_MS", defaults.store_timeout.as_millis() as u64));
        let max_write_attempts = env_or_default("CPL_MAX_WRITE_ATTEMPTS", DEFAULT_MAX_WRITE_ATTEMPTS).max(1);
        let match_window = match_window(env_or_default("CPL_MATCH_WINDOW_HOURS", DEFAULT_MATCH_WINDOW_HOURS));
        let retry_after = Duration::from_secs(env_or_default("CPL_RETRY_AFTER_SECS", DEFAULT_RETRY_AFTER.as_secs()));
        let reconcile_interval = Duration::from_secs(env_or_default(
            "CPL_RECONCILE_INTERVAL_SECS",
            DEFAULT_RECONCILE_INTERVAL.as_secs(),
        ));
        let recover_on_startup = parse_boolean_flag(env::var("CPL_RECOVER_ON_STARTUP").ok(), true);
        let mut changes_page_limit = env_or_default("CPL_CHANGES_PAGE_LIMIT", DEFAULT_CHANGES_LIMIT);
        if changes_page_limit == 0 || changes_page_limit > MAX_CHANGES_LIMIT {
            warn!("🪛️ CPL_CHANGES_PAGE_LIMIT must be between 1 and {MAX_CHANGES_LIMIT}. Using {DEFAULT_CHANGES_LIMIT}.");
            changes_page_limit = DEFAULT_CHANGES_LIMIT;
        }
        if reconcile_interval.is_zero() {
            warn!("🪛️ The periodic change feed recovery pass is disabled.");
        }
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            store_timeout,
            max_write_attempts,
            match_window,
            retry_after,
            reconcile_interval,
            recover_on_startup,
            changes_page_limit,
        }
    }

    /// The subset of the configuration that the ledger itself needs.
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            max_write_attempts: self.max_write_attempts,
            match_window: self.match_window,
            retry_after: self.retry_after,
        }
    }
}

fn match_window(hours: i64) -> chrono::Duration {
    match chrono::Duration::try_hours(hours).filter(|_| hours > 0) {
        Some(window) => window,
        None => {
            warn!(
                "🪛️ CPL_MATCH_WINDOW_HOURS must be a positive number of hours, not {hours}. Using \
                 {DEFAULT_MATCH_WINDOW_HOURS}."
            );
            chrono::Duration::hours(DEFAULT_MATCH_WINDOW_HOURS)
        },
    }
}

/// Reads `name` from the environment. Unset variables quietly fall back to `default`; invalid ones are logged first.
fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}
