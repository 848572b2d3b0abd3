//! Partition selection strategies.
//!
//! A strategy decides which partition the next worker is served from.
//! The built-in set (`random`, `round-robin`, `smart`) is open for
//! extension: custom implementations register a factory under a name and
//! configuration resolves names through the registry. Unknown names fail
//! fast at first use.

mod random;
mod round_robin;
mod smart;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::kv::{KeySpace, Kv};

pub use random::RandomStrategy;
pub use round_robin::RoundRobinStrategy;
pub use smart::{SmartConfig, SmartStrategy};

#[async_trait]
pub trait Strategy: Send + Sync {
    /// Display name, shown by the admin table.
    fn name(&self) -> &'static str;

    /// Pick the partition to serve next, or `None` when the queue has
    /// no populated partitions.
    async fn select(&self, kv: &dyn Kv, keys: &KeySpace, queue: &str) -> Result<Option<String>>;
}

impl std::fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name()).finish()
    }
}

pub type StrategyFactory = Arc<dyn Fn(&Settings) -> Arc<dyn Strategy> + Send + Sync>;

pub struct StrategyRegistry {
    factories: HashMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    /// Registry pre-loaded with the built-in strategies.
    pub fn builtin() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("random", Arc::new(|_: &Settings| {
            Arc::new(RandomStrategy) as Arc<dyn Strategy>
        }));
        registry.register("round-robin", Arc::new(|_: &Settings| {
            Arc::new(RoundRobinStrategy) as Arc<dyn Strategy>
        }));
        registry.register(
            "smart",
            Arc::new(|settings: &Settings| {
                Arc::new(SmartStrategy::new(SmartConfig::from_settings(settings)))
                    as Arc<dyn Strategy>
            }),
        );
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: StrategyFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn build(&self, name: &str, settings: &Settings) -> Result<Arc<dyn Strategy>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::not_defined("strategy", name))?;
        Ok(factory(settings))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
