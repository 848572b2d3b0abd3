//! Minimal producer/worker pair against the in-memory backend.
//!
//! Run with `cargo run --example worker`. Swap the `MemoryKv` for
//! `RedisKv::connect("redis://127.0.0.1/")` to drive a real server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use balanced_queue::limiter::FixedLimiter;
use balanced_queue::metrics::{render_prometheus, MetricsReader};
use balanced_queue::strategy::RoundRobinStrategy;
use balanced_queue::{BalancedQueue, MemoryKv, PushOptions};

#[tokio::main]
async fn main() -> balanced_queue::Result<()> {
    let kv = Arc::new(MemoryKv::new());
    let queue = BalancedQueue::builder(kv.clone())
        .strategy(Arc::new(RoundRobinStrategy))
        .limiter(Arc::new(FixedLimiter::new(2, Duration::from_secs(300))))
        .build();

    // Two tenants submit uneven amounts of work.
    for i in 0..5 {
        queue
            .push(
                json!({"user_id": "heavy-tenant", "task": format!("report-{i}")}),
                "reports",
                PushOptions::default(),
            )
            .await?;
    }
    queue
        .push(
            json!({"user_id": "light-tenant", "task": "invoice"}),
            "reports",
            PushOptions::default(),
        )
        .await?;

    println!("queued {} jobs", queue.size("reports").await?);

    let reader = MetricsReader::new(kv, "balanced");
    print!("{}", render_prometheus(&reader.snapshot().await));

    // The rotation alternates tenants instead of draining the heavy
    // backlog first.
    while let Some(reservation) = queue.pop("reports").await? {
        println!(
            "serving {:<14} {}",
            reservation.partition(),
            reservation.payload()["task"]
        );
        reservation.delete().await?;
    }
    Ok(())
}
