//! balanced-queue - fair job-dispatch broker over a Redis-compatible KV.
//!
//! Partitions each logical queue by a caller-supplied tenant key so no
//! tenant monopolizes workers, and bounds in-flight jobs per tenant.
//! Jobs are never rejected; they queue and are served as capacity
//! frees. This library exposes the queue driver, the pluggable
//! partition strategies and concurrency limiters, the metrics reader
//! and exporters, and the admin CLI plumbing.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use balanced_queue::limiter::FixedLimiter;
//! use balanced_queue::strategy::RoundRobinStrategy;
//! use balanced_queue::{BalancedQueue, MemoryKv, PushOptions};
//! use serde_json::json;
//!
//! # async fn example() -> balanced_queue::Result<()> {
//! let queue = BalancedQueue::builder(Arc::new(MemoryKv::new()))
//!     .strategy(Arc::new(RoundRobinStrategy))
//!     .limiter(Arc::new(FixedLimiter::new(4, Duration::from_secs(300))))
//!     .build();
//!
//! // Producers tag work with a tenant; each tenant gets its own lane.
//! queue
//!     .push(json!({"user_id": "u1", "job": "render"}), "exports", PushOptions::default())
//!     .await?;
//!
//! // Workers poll; the strategy decides whose lane is served next.
//! if let Some(reservation) = queue.pop("exports").await? {
//!     // ... run the job ...
//!     reservation.delete().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Production deployments point the same driver at Redis with
//! [`RedisKv::connect`] instead of [`MemoryKv`].

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod kv;
pub mod limiter;
pub mod metrics;
pub mod queue;
pub mod strategy;
pub mod telemetry;

pub use config::Settings;
pub use error::{Error, Result};
pub use kv::{Kv, MemoryKv, RedisKv};
pub use limiter::{Limiter, LimiterRegistry};
pub use metrics::{MetricsReader, MetricsSnapshot};
pub use queue::{
    BalancedQueue, EventHook, PartitionResolver, PartitionedJob, PushOptions, Reservation,
};
pub use strategy::{Strategy, StrategyRegistry};
