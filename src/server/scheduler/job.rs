use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::{pin, select, time};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::server::store::RequestStore;
use crate::server::util::time::helper::get_utc_now;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One pass: permanently drop resolved requests older than `retention`.
pub async fn sweep(store: &dyn RequestStore, retention: Duration) -> u64 {
    let cutoff = match chrono::Duration::from_std(retention) {
        Ok(retention) => get_utc_now() - retention,
        Err(e) => {
            error!("invalid retention {:?}, {}", retention, e);
            return 0;
        }
    };
    match store.purge_resolved(cutoff).await {
        Ok(0) => {
            debug!("no resolved requests to sweep");
            0
        }
        Ok(purged) => {
            info!("swept {} resolved request(s)", purged);
            purged
        }
        Err(e) => {
            error!("failed to sweep resolved requests, {}", e);
            0
        }
    }
}

async fn worker(store: Arc<dyn RequestStore>, retention: Duration, every: Duration, cancel_token: CancellationToken) {
    let interval = time::interval(every);
    pin!(interval);
    loop {
        select! {
            _ = interval.tick() => {},
            _ = cancel_token.cancelled() => {
                info!("received cancel signal, returning gracefully");
                return;
            }
        }
        sweep(store.as_ref(), retention).await;
    }
}

/// Run the resolved-request sweeper until `cancel_token` fires.
pub async fn request_sweeper(store: Arc<dyn RequestStore>, retention: Duration, cancel_token: CancellationToken) {
    let tracker = TaskTracker::new();
    tracker.spawn(worker(store, retention, SWEEP_INTERVAL, cancel_token));
    if tracker.close() {
        tracker.wait().await;
    }
}
