//!
//! The deprecation/garbage-collection background task.
//!
//! Grounded on `original_source/src/server.c`'s `garbage_collector` loop,
//! redesigned to be joinable on shutdown (a `watch` channel replaces the
//! original's reliance on `exit()` abandoning the thread).
//!

use log::{debug, info};
use tokio::sync::watch;

use crate::table::Table;

/// Runs until `shutdown` fires, sweeping `table` every `hash_deprecation_time`
/// seconds and evicting anything older than `garbage_col_time`.
///
/// Waits for the table to receive its first record before the first sweep,
/// standing in for the C original's `gc_lock` rendezvous.
pub async fn run(
    table: Table,
    hash_deprecation_time: u64,
    garbage_col_time: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    table.wait_until_warm().await;
    info!("collector armed, sweeping every {hash_deprecation_time}s");

    let period = std::time::Duration::from_secs(hash_deprecation_time);
    loop {
        tokio::select! {
            _ = tokio::time::sleep(period) => {
                let evicted = table.evict_expired(garbage_col_time).await;
                if evicted > 0 {
                    debug!("collector evicted {evicted} record(s)");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("collector shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collector_waits_for_warmth_before_sweeping() {
        let table = Table::new();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run(table.clone(), 0, 0, rx));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(table.live_records().await.is_empty());

        table.update("h", "::1", Some(0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(table.live_records().await.is_empty(), "expired record must be swept");

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_collector_stops_on_shutdown_signal() {
        let table = Table::new();
        table.update("h", "::1", None).await.unwrap();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run(table, 3600, 3600, rx));
        tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("collector must exit promptly on shutdown")
            .unwrap();
    }
}
