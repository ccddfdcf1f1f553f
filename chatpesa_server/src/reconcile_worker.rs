use std::time::Duration;

use chatpesa_engine::{LedgerApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the change feed reconcile worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, the worker runs the ledger's recovery pass, which raises the id counter floor and appends any
/// feed events that are missing for the current order records.
pub fn start_reconcile_worker(api: LedgerApi<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately, and start-up has its own recovery pass
        timer.tick().await;
        info!("🕰️ Change feed reconcile worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running change feed reconcile job");
            match api.recover_change_feed().await {
                Ok(result) if result.is_clean() => trace!("🕰️ Change feed is consistent"),
                Ok(result) => {
                    if let Some(seq) = result.counter_raised_to {
                        warn!("🕰️ Order id counter was raised to {seq}");
                    }
                    let repaired = result.appended.iter().map(|e| format!("{}@v{}", e.order_id, e.version)).collect::<Vec<_>>();
                    warn!("🕰️ {} feed events were re-derived: {}", repaired.len(), repaired.join(", "));
                },
                Err(e) => {
                    error!("🕰️ Error running change feed reconcile job: {e}");
                },
            }
        }
    })
}
