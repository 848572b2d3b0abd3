//! Queue driver test suite.
//!
//! Everything runs against the in-memory KV backend, which gives the
//! same atomicity as server-side scripts on Redis.

mod caps;
mod core;
mod hooks;
mod release;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::kv::MemoryKv;
use crate::limiter::FixedLimiter;
use crate::strategy::RoundRobinStrategy;

use super::{BalancedQueue, PushOptions};

pub(crate) const PREFIX: &str = "test";

/// Driver with default strategy (smart) and no cap.
fn setup() -> BalancedQueue {
    setup_with_kv().0
}

/// Driver plus a handle on its KV for direct state inspection.
fn setup_with_kv() -> (BalancedQueue, Arc<MemoryKv>) {
    let kv = Arc::new(MemoryKv::new());
    let driver = BalancedQueue::builder(kv.clone()).prefix(PREFIX).build();
    (driver, kv)
}

/// Round-robin rotation, no cap.
fn setup_round_robin() -> (BalancedQueue, Arc<MemoryKv>) {
    let kv = Arc::new(MemoryKv::new());
    let driver = BalancedQueue::builder(kv.clone())
        .prefix(PREFIX)
        .strategy(Arc::new(RoundRobinStrategy))
        .build();
    (driver, kv)
}

/// Round-robin rotation with a fixed per-partition cap.
fn setup_with_cap(cap: u64) -> (BalancedQueue, Arc<MemoryKv>) {
    let kv = Arc::new(MemoryKv::new());
    let driver = BalancedQueue::builder(kv.clone())
        .prefix(PREFIX)
        .strategy(Arc::new(RoundRobinStrategy))
        .limiter(Arc::new(FixedLimiter::new(cap, Duration::from_secs(60))))
        .build();
    (driver, kv)
}

/// Push a labeled payload to an explicit partition.
async fn push_to(driver: &BalancedQueue, queue: &str, partition: &str, label: &str) {
    driver
        .push(
            json!({ "label": label }),
            queue,
            PushOptions::with_partition(partition),
        )
        .await
        .unwrap();
}

/// Pop and return the payload label; panics when the queue is dry.
async fn pop_label(driver: &BalancedQueue, queue: &str) -> String {
    let reservation = driver.pop(queue).await.unwrap().expect("expected a job");
    let label = reservation.payload()["label"].as_str().unwrap().to_string();
    reservation.delete().await.unwrap();
    label
}
