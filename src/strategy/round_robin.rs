//! Round-robin partition selection.

use async_trait::async_trait;

use crate::error::Result;
use crate::kv::{KeySpace, Kv};

use super::Strategy;

/// Deterministic rotation over the sorted partition set, driven by a
/// shared per-queue counter so concurrent workers continue one rotation
/// instead of each starting their own.
///
/// Starvation-free under steady membership: every partition is visited
/// within `n` consecutive selections.
pub struct RoundRobinStrategy;

#[async_trait]
impl Strategy for RoundRobinStrategy {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    async fn select(&self, kv: &dyn Kv, keys: &KeySpace, queue: &str) -> Result<Option<String>> {
        let mut members = kv.smembers(&keys.partitions(queue)).await?;
        if members.is_empty() {
            return Ok(None);
        }
        // Sort for a stable index; the set reports members in no
        // particular order across backends.
        members.sort();
        let tick = kv.incr(&keys.rr_state(queue)).await?;
        let idx = (tick - 1).rem_euclid(members.len() as i64) as usize;
        Ok(Some(members[idx].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    #[tokio::test]
    async fn visits_each_partition_once_per_cycle() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        for p in ["b", "c", "a"] {
            kv.sadd(&keys.partitions("q"), p).await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(
                RoundRobinStrategy
                    .select(&kv, &keys, "q")
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        assert_eq!(seen, vec!["a", "b", "c"]);

        // Second cycle repeats the same order.
        for expected in ["a", "b", "c"] {
            let picked = RoundRobinStrategy
                .select(&kv, &keys, "q")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(picked, expected);
        }
    }

    #[tokio::test]
    async fn empty_set_yields_none_without_ticking() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        assert_eq!(
            RoundRobinStrategy.select(&kv, &keys, "q").await.unwrap(),
            None
        );
        // The counter only moves when a selection happens.
        kv.sadd(&keys.partitions("q"), "only").await.unwrap();
        let picked = RoundRobinStrategy
            .select(&kv, &keys, "q")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked, "only");
    }
}
