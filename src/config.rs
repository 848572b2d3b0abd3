//! Broker configuration.
//!
//! Loaded from a TOML file with field-level defaults, so an empty file
//! (or none at all) yields a working local setup. The `REDIS_URL`
//! environment variable overrides the configured connection for
//! containerized deployments.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::kv::Kv;
use crate::limiter::LimiterRegistry;
use crate::queue::{BalancedQueue, PartitionResolver};
use crate::strategy::StrategyRegistry;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    /// Gate for the whole driver; a disabled driver refuses pushes and
    /// pops so misrouted traffic fails loudly.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Strategy name resolved through the registry at build time.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default)]
    pub strategies: StrategySettings,

    /// Limiter name resolved through the registry at build time.
    #[serde(default = "default_limiter")]
    pub limiter: String,

    #[serde(default)]
    pub limiters: LimiterSettings,

    #[serde(default)]
    pub redis: RedisSettings,

    #[serde(default)]
    pub prometheus: PrometheusSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StrategySettings {
    #[serde(default)]
    pub smart: SmartSettings,

    /// Free-form bags for custom strategies, keyed by registry name.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmartSettings {
    #[serde(default = "default_weight_wait_time")]
    pub weight_wait_time: f64,
    #[serde(default = "default_weight_queue_size")]
    pub weight_queue_size: f64,
    #[serde(default = "default_true")]
    pub boost_small_queues: bool,
    #[serde(default = "default_small_queue_threshold")]
    pub small_queue_threshold: u64,
    #[serde(default = "default_boost_multiplier")]
    pub boost_multiplier: f64,
}

impl Default for SmartSettings {
    fn default() -> Self {
        Self {
            weight_wait_time: default_weight_wait_time(),
            weight_queue_size: default_weight_queue_size(),
            boost_small_queues: true,
            small_queue_threshold: default_small_queue_threshold(),
            boost_multiplier: default_boost_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LimiterSettings {
    #[serde(default)]
    pub simple: SimpleLimiterSettings,
    #[serde(default)]
    pub adaptive: AdaptiveLimiterSettings,

    /// Free-form bags for custom limiters, keyed by registry name.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleLimiterSettings {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u64,
    /// Seconds. Must exceed the worker's job-retry timeout or live
    /// reservations get reaped mid-run.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl: u64,
}

impl Default for SimpleLimiterSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            lock_ttl: default_lock_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdaptiveLimiterSettings {
    #[serde(default = "default_base_limit")]
    pub base_limit: u64,
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
    /// Seconds.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl: u64,
    #[serde(default = "default_utilization_threshold")]
    pub utilization_threshold: f64,
}

impl Default for AdaptiveLimiterSettings {
    fn default() -> Self {
        Self {
            base_limit: default_base_limit(),
            max_limit: default_max_limit(),
            lock_ttl: default_lock_ttl(),
            utilization_threshold: default_utilization_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Connection URL, `redis://` or `rediss://`.
    #[serde(default = "default_redis_connection")]
    pub connection: String,
    /// Key prefix shared by every queue of this broker.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            connection: default_redis_connection(),
            prefix: default_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Bind address for the metrics listener.
    #[serde(default = "default_prometheus_listen")]
    pub listen: String,
    #[serde(default = "default_prometheus_route")]
    pub route: String,
    /// `ip_whitelist`, `none`, or absent. `basic_auth` is recognized
    /// and rejected at startup.
    #[serde(default)]
    pub middleware: Option<String>,
    #[serde(default)]
    pub ip_whitelist: Vec<String>,
}

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_prometheus_listen(),
            route: default_prometheus_route(),
            middleware: None,
            ip_whitelist: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_strategy() -> String {
    "smart".to_string()
}

fn default_limiter() -> String {
    "null".to_string()
}

fn default_weight_wait_time() -> f64 {
    0.6
}

fn default_weight_queue_size() -> f64 {
    0.4
}

fn default_small_queue_threshold() -> u64 {
    5
}

fn default_boost_multiplier() -> f64 {
    1.5
}

fn default_max_concurrent() -> u64 {
    10
}

fn default_lock_ttl() -> u64 {
    300
}

fn default_base_limit() -> u64 {
    5
}

fn default_max_limit() -> u64 {
    20
}

fn default_utilization_threshold() -> f64 {
    0.7
}

fn default_redis_connection() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_prefix() -> String {
    "balanced".to_string()
}

fn default_prometheus_listen() -> String {
    "127.0.0.1:9464".to_string()
}

fn default_prometheus_route() -> String {
    "/metrics".to_string()
}

impl Settings {
    /// Load from a TOML file; a missing path yields the defaults. The
    /// `REDIS_URL` environment variable wins over the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings: Settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))?
            }
            None => Settings::default_with_serde(),
        };
        if let Ok(url) = std::env::var("REDIS_URL") {
            if !url.is_empty() {
                settings.redis.connection = url;
            }
        }
        Ok(settings)
    }

    /// Defaults as serde would produce them from an empty document.
    fn default_with_serde() -> Self {
        Self {
            enabled: true,
            strategy: default_strategy(),
            limiter: default_limiter(),
            ..Settings::default()
        }
    }

    /// Build a queue driver from these settings, resolving the strategy
    /// and limiter names through the given registries. Unknown names
    /// fail here, before any traffic flows.
    pub fn build_queue(
        &self,
        kv: Arc<dyn Kv>,
        strategies: &StrategyRegistry,
        limiters: &LimiterRegistry,
        resolver: Option<PartitionResolver>,
    ) -> Result<BalancedQueue> {
        let strategy = strategies.build(&self.strategy, self)?;
        let limiter = limiters.build(&self.limiter, self)?;
        let mut builder = BalancedQueue::builder(kv)
            .prefix(self.redis.prefix.clone())
            .strategy(strategy)
            .limiter(limiter)
            .enabled(self.enabled);
        if let Some(resolver) = resolver {
            builder = builder.partition_resolver(resolver);
        }
        Ok(builder.build())
    }
}
