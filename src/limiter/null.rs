//! No-op limiter.

use async_trait::async_trait;

use crate::error::Result;
use crate::kv::{KeySpace, Kv};

use super::Limiter;

/// Always allows. Used when partition fairness without caps is enough;
/// the active set is still written by pops so the metrics view stays
/// meaningful, but this limiter never reads it.
pub struct NullLimiter;

#[async_trait]
impl Limiter for NullLimiter {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn can_process(
        &self,
        _kv: &dyn Kv,
        _keys: &KeySpace,
        _queue: &str,
        _partition: &str,
    ) -> Result<bool> {
        Ok(true)
    }

    async fn acquire(
        &self,
        _kv: &dyn Kv,
        _keys: &KeySpace,
        _queue: &str,
        _partition: &str,
        _id: &str,
    ) -> Result<bool> {
        Ok(true)
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
        _kv: &dyn Kv,
        _keys: &KeySpace,
        _queue: &str,
        _partition: &str,
    ) -> Result<u64> {
        Ok(0)
    }

    async fn resolve_cap(
        &self,
        _kv: &dyn Kv,
        _keys: &KeySpace,
        _queue: &str,
    ) -> Result<Option<u64>> {
        Ok(None)
    }

    fn max_concurrent(&self) -> Option<u64> {
        None
    }
}
