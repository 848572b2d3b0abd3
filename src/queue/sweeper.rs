//! Periodic delayed-job promoter.
//!
//! Delayed releases only park payloads in a sorted set; nothing moves
//! them back on its own. Operators either spawn this sweeper or run an
//! external scheduler that calls `promote_delayed` on a cadence of
//! their choosing.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::driver::BalancedQueue;

/// Spawn a background task promoting due entries for one queue every
/// `every`. Stops when the shutdown channel fires or closes.
pub fn spawn_sweeper(
    driver: BalancedQueue,
    queue: impl Into<String>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let queue = queue.into();
    tokio::spawn(async move {
        let mut ticker = interval(every);
        info!(queue = %queue, interval_secs = every.as_secs(), "delayed-job sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match driver.promote_delayed(&queue).await {
                        Ok(0) => {}
                        Ok(promoted) => {
                            debug!(queue = %queue, promoted, "sweeper promoted delayed jobs");
                        }
                        Err(e) => {
                            warn!(queue = %queue, error = %e, "delayed promotion failed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!(queue = %queue, "delayed-job sweeper stopped");
                    return;
                }
            }
        }
    })
}
