//! Per-partition concurrency limiters.
//!
//! A limiter gates how many reservations may coexist on one partition.
//! Every mutating operation runs as an atomic script on the KV; the
//! fixed and adaptive limiters reap reservations older than their lock
//! TTL before reading or changing an active set, so a vanished worker
//! never pins a slot for longer than the grace window.

mod adaptive;
mod fixed;
mod null;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::kv::{KeySpace, Kv};

pub use adaptive::AdaptiveLimiter;
pub use fixed::FixedLimiter;
pub use null::NullLimiter;

/// Lock TTL used when a limiter does not carry one of its own. Bounds
/// how long an abandoned reservation survives on the KV.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

#[async_trait]
pub trait Limiter: Send + Sync {
    /// Display name, shown by the admin table.
    fn name(&self) -> &'static str;

    /// Whether a new reservation could currently be acquired. Reaps
    /// stale reservations as a side effect where the limiter tracks
    /// them.
    async fn can_process(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
    ) -> Result<bool>;

    /// Record a reservation if capacity allows. Returns whether the
    /// slot was taken.
    async fn acquire(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
        id: &str,
    ) -> Result<bool>;

    /// Drop a reservation. Unconditional and idempotent.
    async fn release(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
        id: &str,
    ) -> Result<()>;

    /// Live reservations on the partition, stale entries excluded.
    async fn active_count(
        &self,
        kv: &dyn Kv,
        keys: &KeySpace,
        queue: &str,
        partition: &str,
    ) -> Result<u64>;

    /// The cap a pop must respect right now. `None` means unlimited.
    /// The adaptive limiter resolves this from live utilization.
    async fn resolve_cap(&self, kv: &dyn Kv, keys: &KeySpace, queue: &str) -> Result<Option<u64>>;

    /// Static upper bound on concurrent reservations. `None` means
    /// unlimited.
    fn max_concurrent(&self) -> Option<u64>;

    /// Grace window after which an unreleased reservation is treated as
    /// abandoned. Must exceed the worker's job-retry timeout.
    fn lock_ttl(&self) -> Duration {
        DEFAULT_LOCK_TTL
    }

    /// Called by the driver after a pop's combined pop-and-acquire
    /// script succeeds. Limiters that feed cross-partition signals hook
    /// in here.
    async fn on_acquired(&self, _kv: &dyn Kv, _keys: &KeySpace, _queue: &str) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Limiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter").field("name", &self.name()).finish()
    }
}

pub type LimiterFactory = Arc<dyn Fn(&Settings) -> Arc<dyn Limiter> + Send + Sync>;

pub struct LimiterRegistry {
    factories: HashMap<String, LimiterFactory>,
}

impl LimiterRegistry {
    /// Registry pre-loaded with the built-in limiters.
    pub fn builtin() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("null", Arc::new(|_: &Settings| {
            Arc::new(NullLimiter) as Arc<dyn Limiter>
        }));
        registry.register(
            "simple",
            Arc::new(|settings: &Settings| {
                let s = &settings.limiters.simple;
                Arc::new(FixedLimiter::new(
                    s.max_concurrent,
                    Duration::from_secs(s.lock_ttl),
                )) as Arc<dyn Limiter>
            }),
        );
        registry.register(
            "adaptive",
            Arc::new(|settings: &Settings| {
                let s = &settings.limiters.adaptive;
                Arc::new(AdaptiveLimiter::new(
                    s.base_limit,
                    s.max_limit,
                    s.utilization_threshold,
                    Duration::from_secs(s.lock_ttl),
                )) as Arc<dyn Limiter>
            }),
        );
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: LimiterFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn build(&self, name: &str, settings: &Settings) -> Result<Arc<dyn Limiter>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::not_defined("limiter", name))?;
        Ok(factory(settings))
    }
}

impl Default for LimiterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_limiter_fails_fast() {
        let registry = LimiterRegistry::builtin();
        let err = registry
            .build("turbo", &Settings::default())
            .expect_err("unknown name must not resolve");
        assert!(err.to_string().contains("'turbo' is not defined"));
    }

    #[test]
    fn builtin_names_resolve() {
        let registry = LimiterRegistry::builtin();
        let settings = Settings::default();
        for name in ["null", "simple", "adaptive"] {
            assert!(registry.build(name, &settings).is_ok(), "{name}");
        }
    }
}
