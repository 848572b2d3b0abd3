//! Uniformly-random partition selection.

use async_trait::async_trait;

use crate::error::Result;
use crate::kv::{KeySpace, Kv};

use super::Strategy;

/// Picks a random member of the partition set with a single KV call.
/// Stateless and the cheapest strategy per selection; offers no
/// starvation guarantee.
pub struct RandomStrategy;

#[async_trait]
impl Strategy for RandomStrategy {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn select(&self, kv: &dyn Kv, keys: &KeySpace, queue: &str) -> Result<Option<String>> {
        kv.srandmember(&keys.partitions(queue)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    #[tokio::test]
    async fn returns_none_on_empty_set() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        let picked = RandomStrategy.select(&kv, &keys, "q").await.unwrap();
        assert_eq!(picked, None);
    }

    #[tokio::test]
    async fn picks_a_registered_partition() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        kv.sadd(&keys.partitions("q"), "a").await.unwrap();
        kv.sadd(&keys.partitions("q"), "b").await.unwrap();
        let picked = RandomStrategy.select(&kv, &keys, "q").await.unwrap();
        assert!(matches!(picked.as_deref(), Some("a") | Some("b")));
    }
}
