//! KV abstraction.
//!
//! The broker keeps all persistent state in a Redis-compatible key-value
//! store. The [`Kv`] trait captures exactly the capabilities the data
//! model needs (sets, lists, hashes, a sorted container, counters, key
//! expiry) plus the composite operations that must execute atomically
//! server-side. Two backends ship:
//!
//! - [`RedisKv`] runs the composites as embedded Lua scripts.
//! - [`MemoryKv`] holds the keyspace under one mutex, which gives the
//!   same atomicity a script gives on the server.

pub mod keys;
pub mod scripts;

mod memory;
mod redis;

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::Result;

pub use keys::KeySpace;
pub use memory::MemoryKv;
pub use redis::RedisKv;

/// Cap value meaning "no limit". Larger than any real active-set size;
/// the scripts compare against it numerically.
pub const UNLIMITED_CAP: u64 = u64::MAX / 2;

/// Current unix time in whole seconds.
#[inline]
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Key bundle for the atomic push.
pub struct PushKeys<'a> {
    pub partitions: &'a str,
    pub queue: &'a str,
    pub metrics: &'a str,
}

/// Key bundle for the atomic pop-with-cap.
pub struct PopKeys<'a> {
    pub queue: &'a str,
    pub partitions: &'a str,
    pub active: &'a str,
    pub metrics: &'a str,
}

/// Key bundle for delayed-entry promotion.
pub struct PromoteKeys<'a> {
    pub delayed: &'a str,
    pub queue: &'a str,
    pub partitions: &'a str,
    pub metrics: &'a str,
}

#[async_trait]
pub trait Kv: Send + Sync {
    // ============== Sets ==============

    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;
    async fn srem(&self, key: &str, member: &str) -> Result<bool>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;
    async fn srandmember(&self, key: &str) -> Result<Option<String>>;

    // ============== Lists ==============

    async fn rpush(&self, key: &str, value: &str) -> Result<u64>;
    async fn lpop(&self, key: &str) -> Result<Option<String>>;
    async fn llen(&self, key: &str) -> Result<u64>;

    // ============== Hashes ==============

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
    async fn hdel(&self, key: &str, field: &str) -> Result<bool>;
    async fn hincr(&self, key: &str, field: &str, by: i64) -> Result<i64>;
    async fn hlen(&self, key: &str) -> Result<u64>;
    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>>;

    // ============== Sorted sets ==============

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()>;
    async fn zcard(&self, key: &str) -> Result<u64>;

    // ============== Counters and keys ==============

    async fn incr(&self, key: &str) -> Result<i64>;
    async fn del(&self, key: &str) -> Result<()>;
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()>;

    /// Cursor-based key scan. Never used on the hot path; the metrics
    /// reader runs it out-of-band.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    // ============== Atomic composites ==============

    /// PUSH script: register the partition, append the payload, stamp
    /// `first_job_time` on the push that creates a non-empty partition,
    /// bump `total_pushed`. Returns the new queue length.
    async fn push_job(
        &self,
        keys: &PushKeys<'_>,
        payload: &str,
        partition: &str,
        now: u64,
    ) -> Result<u64>;

    /// POP_WITH_CAP script: refuse at cap, pop the head, record the
    /// reservation, bump `total_popped`, and unregister the partition in
    /// the same step when the pop empties it.
    #[allow(clippy::too_many_arguments)]
    async fn pop_with_cap(
        &self,
        keys: &PopKeys<'_>,
        partition: &str,
        id: &str,
        cap: u64,
        ttl_secs: u64,
        now: u64,
    ) -> Result<Option<String>>;

    /// REAP_AND_COUNT script: drop reservations older than `threshold`,
    /// return the post-reap active count.
    async fn reap_and_count(&self, active_key: &str, threshold: u64) -> Result<u64>;

    /// ACQUIRE_WITH_REAP script: reap, then record the reservation iff
    /// the post-reap size is below the cap.
    async fn acquire_with_reap(
        &self,
        active_key: &str,
        id: &str,
        cap: u64,
        ttl_secs: u64,
        now: u64,
        threshold: u64,
    ) -> Result<bool>;

    /// PROMOTE_DUE script: move due delayed entries back onto the queue
    /// with push semantics. Returns how many were promoted.
    async fn promote_due(&self, keys: &PromoteKeys<'_>, partition: &str, now: u64) -> Result<u64>;
}
