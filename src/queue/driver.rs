//! Core queue driver struct and builder.

use std::sync::Arc;

use crate::kv::{KeySpace, Kv};
use crate::limiter::{Limiter, NullLimiter};
use crate::strategy::{SmartConfig, SmartStrategy, Strategy};

use super::events::{EventHook, NoopHook};
use super::partition::PartitionResolver;

/// Default key prefix. Override to run several brokers on one server.
pub const DEFAULT_PREFIX: &str = "balanced";

/// Fair job-dispatch driver over the KV.
///
/// Cheaply cloneable; every clone shares the same KV handle, strategy
/// and limiter. The driver holds no per-queue state of its own, so one
/// instance serves any number of queues.
#[derive(Clone)]
pub struct BalancedQueue {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for BalancedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalancedQueue").finish_non_exhaustive()
    }
}

pub(crate) struct Inner {
    pub(crate) kv: Arc<dyn Kv>,
    pub(crate) keys: KeySpace,
    pub(crate) strategy: Arc<dyn Strategy>,
    pub(crate) limiter: Arc<dyn Limiter>,
    pub(crate) resolver: Option<PartitionResolver>,
    pub(crate) hook: Arc<dyn EventHook>,
    pub(crate) enabled: bool,
}

impl BalancedQueue {
    pub fn builder(kv: Arc<dyn Kv>) -> Builder {
        Builder::new(kv)
    }

    pub(crate) fn kv(&self) -> &dyn Kv {
        self.inner.kv.as_ref()
    }

    pub(crate) fn keys(&self) -> &KeySpace {
        &self.inner.keys
    }

    pub fn strategy_name(&self) -> &'static str {
        self.inner.strategy.name()
    }

    pub fn limiter_name(&self) -> &'static str {
        self.inner.limiter.name()
    }

    /// Static cap of the configured limiter; `None` means unlimited.
    pub fn max_concurrent(&self) -> Option<u64> {
        self.inner.limiter.max_concurrent()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }
}

/// Builder for [`BalancedQueue`]. Defaults: `balanced` prefix, smart
/// strategy with stock weights, no concurrency cap, no resolver.
pub struct Builder {
    kv: Arc<dyn Kv>,
    prefix: String,
    strategy: Arc<dyn Strategy>,
    limiter: Arc<dyn Limiter>,
    resolver: Option<PartitionResolver>,
    hook: Arc<dyn EventHook>,
    enabled: bool,
}

impl Builder {
    fn new(kv: Arc<dyn Kv>) -> Self {
        Self {
            kv,
            prefix: DEFAULT_PREFIX.to_string(),
            strategy: Arc::new(SmartStrategy::new(SmartConfig::default())),
            limiter: Arc::new(NullLimiter),
            resolver: None,
            hook: Arc::new(NoopHook),
            enabled: true,
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn limiter(mut self, limiter: Arc<dyn Limiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn partition_resolver(mut self, resolver: PartitionResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn event_hook(mut self, hook: Arc<dyn EventHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn build(self) -> BalancedQueue {
        BalancedQueue {
            inner: Arc::new(Inner {
                kv: self.kv,
                keys: KeySpace::new(self.prefix),
                strategy: self.strategy,
                limiter: self.limiter,
                resolver: self.resolver,
                hook: self.hook,
                enabled: self.enabled,
            }),
        }
    }
}
