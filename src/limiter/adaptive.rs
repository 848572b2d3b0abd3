//! Utilization-driven limiter.
//!
//! Resolves a dynamic cap from the queue's cross-partition utilization
//! signal. Below the configured threshold the cap scales up toward
//! `max_limit`; at or above it the cap drops back to `base_limit`. The
//! signal itself is pushed by operators into the global metrics hash;
//! when absent the limiter reads utilization 0 and so runs at
//! `max_limit`.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::kv::keys::{FIELD_LAST_UPDATED, FIELD_TOTAL_ACQUIRED, FIELD_UTILIZATION};
use crate::kv::{now_secs, KeySpace, Kv};

use super::Limiter;

pub struct AdaptiveLimiter {
    base_limit: u64,
    max_limit: u64,
    utilization_threshold: f64,
    lock_ttl: Duration,
}

impl AdaptiveLimiter {
    pub fn new(
        base_limit: u64,
        max_limit: u64,
        utilization_threshold: f64,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            base_limit,
            max_limit: max_limit.max(base_limit),
            utilization_threshold,
            lock_ttl,
        }
    }

    fn stale_threshold(&self) -> u64 {
        now_secs().saturating_sub(self.lock_ttl.as_secs())
    }

    fn cap_for(&self, utilization: f64) -> u64 {
        if utilization < self.utilization_threshold {
            let headroom = (self.max_limit - self.base_limit) as f64;
            let slack = (self.utilization_threshold - utilization) / self.utilization_threshold;
            (self.base_limit + (headroom * slack).floor() as u64).min(self.max_limit)
        } else {
            self.base_limit
        }
    }

    async fn current_cap(&self, kv: &dyn Kv, keys: &KeySpace, queue: &str) -> Result<u64> {
        let utilization = kv
            .hget(&keys.global_metrics(queue), FIELD_UTILIZATION)
            .await?
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        Ok(self.cap_for(utilization))
    }
}

#[async_trait]
impl Limiter for AdaptiveLimiter {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    async fn can_process(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
    ) -> Result<bool> {
        let cap = self.current_cap(kv, keys, queue).await?;
        let active = kv
            .reap_and_count(&keys.active(queue, partition), self.stale_threshold())
            .await?;
        Ok(active < cap)
    }

    async fn acquire(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
        id: &str,
    ) -> Result<bool> {
        let cap = self.current_cap(kv, keys, queue).await?;
        let acquired = kv
            .acquire_with_reap(
                &keys.active(queue, partition),
                id,
                cap,
                self.lock_ttl.as_secs(),
                now_secs(),
                self.stale_threshold(),
            )
            .await?;
        if acquired {
            self.on_acquired(kv, keys, queue).await?;
        }
        Ok(acquired)
    }

    async fn release(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
        id: &str,
    ) -> Result<()> {
        kv.hdel(&keys.active(queue, partition), id).await?;
        Ok(())
    }

    async fn active_count(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
    ) -> Result<u64> {
        kv.reap_and_count(&keys.active(queue, partition), self.stale_threshold())
            .await
    }

    async fn resolve_cap(&self, kv: &dyn Kv, keys: &KeySpace, queue: &str) -> Result<Option<u64>> {
        Ok(Some(self.current_cap(kv, keys, queue).await?))
    }

    fn max_concurrent(&self) -> Option<u64> {
        Some(self.max_limit)
    }

    fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    async fn on_acquired(&self, kv: &dyn Kv, keys: &KeySpace, queue: &str) -> Result<()> {
        let global = keys.global_metrics(queue);
        kv.hincr(&global, FIELD_TOTAL_ACQUIRED, 1).await?;
        kv.hset(&global, FIELD_LAST_UPDATED, &now_secs().to_string())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    fn limiter() -> AdaptiveLimiter {
        AdaptiveLimiter::new(5, 20, 0.7, Duration::from_secs(60))
    }

    #[test]
    fn cap_scales_with_utilization() {
        let l = limiter();
        // No signal: full headroom.
        assert_eq!(l.cap_for(0.0), 20);
        // Halfway to the threshold: half the headroom.
        assert_eq!(l.cap_for(0.35), 12);
        // At or past the threshold: back to base.
        assert_eq!(l.cap_for(0.7), 5);
        assert_eq!(l.cap_for(0.95), 5);
    }

    #[tokio::test]
    async fn missing_signal_degrades_to_max() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        let cap = limiter().resolve_cap(&kv, &keys, "q").await.unwrap();
        assert_eq!(cap, Some(20));
    }

    #[tokio::test]
    async fn pushed_signal_tightens_the_cap() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        kv.hset(&keys.global_metrics("q"), FIELD_UTILIZATION, "0.9")
            .await
            .unwrap();
        let cap = limiter().resolve_cap(&kv, &keys, "q").await.unwrap();
        assert_eq!(cap, Some(5));
    }

    #[tokio::test]
    async fn acquire_records_global_signals() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        let l = limiter();

        assert!(l.acquire(&kv, &keys, "q", "k", "r1").await.unwrap());
        let acquired = kv
            .hget(&keys.global_metrics("q"), FIELD_TOTAL_ACQUIRED)
            .await
            .unwrap();
        assert_eq!(acquired, Some("1".into()));
        assert!(kv
            .hget(&keys.global_metrics("q"), FIELD_LAST_UPDATED)
            .await
            .unwrap()
            .is_some());
    }
}
