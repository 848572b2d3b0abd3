//! Fixed-cap limiter.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::kv::{now_secs, KeySpace, Kv};

use super::Limiter;

/// At most `max_concurrent` reservations per partition. Reservations
/// older than `lock_ttl` are treated as abandoned and reaped before any
/// read or acquire, so the cap never counts vanished workers.
pub struct FixedLimiter {
    max_concurrent: u64,
    lock_ttl: Duration,
}

impl FixedLimiter {
    pub fn new(max_concurrent: u64, lock_ttl: Duration) -> Self {
        Self {
            max_concurrent,
            lock_ttl,
        }
    }

    fn stale_threshold(&self) -> u64 {
        now_secs().saturating_sub(self.lock_ttl.as_secs())
    }
}

#[async_trait]
impl Limiter for FixedLimiter {
    fn name(&self) -> &'static str {
        "simple"
    }

    async fn can_process(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
    ) -> Result<bool> {
        let active = kv
            .reap_and_count(&keys.active(queue, partition), self.stale_threshold())
            .await?;
        Ok(active < self.max_concurrent)
    }

    async fn acquire(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
        id: &str,
    ) -> Result<bool> {
        kv.acquire_with_reap(
            &keys.active(queue, partition),
            id,
            self.max_concurrent,
            self.lock_ttl.as_secs(),
            now_secs(),
            self.stale_threshold(),
        )
        .await
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

    async fn resolve_cap(
        &self,
        _kv: &dyn Kv,
        _keys: &KeySpace,
        _queue: &str,
    ) -> Result<Option<u64>> {
        Ok(Some(self.max_concurrent))
    }

    fn max_concurrent(&self) -> Option<u64> {
        Some(self.max_concurrent)
    }

    fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }
}
