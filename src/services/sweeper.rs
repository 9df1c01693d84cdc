use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::services::TransferService;

/// Runs the stale-pending sweep loop. Recovers transactions orphaned in
/// `pending` when a transfer attempt died before its locked phase ever
/// ran. Acts only on persisted state, never on in-flight locks.
pub async fn run_sweeper(service: TransferService, interval: Duration, timeout: Duration) {
    info!(
        "Stale-pending sweeper started (interval {:?}, timeout {:?})",
        interval, timeout
    );

    loop {
        match service.sweep_stale_pending(timeout).await {
            Ok(0) => {}
            Ok(count) => info!("Swept {} stale pending transaction(s)", count),
            Err(e) => error!("Sweep pass error: {}", e),
        }

        sleep(interval).await;
    }
}
