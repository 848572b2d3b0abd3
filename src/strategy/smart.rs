//! Smart-fair partition selection.
//!
//! Scores every populated partition by how long its head job has waited
//! and how small its backlog is, then serves the highest score. Small
//! queues can receive an extra boost so light tenants are not starved
//! behind heavy ones.

use async_trait::async_trait;

use crate::config::Settings;
use crate::error::Result;
use crate::kv::keys::FIELD_FIRST_JOB_TIME;
use crate::kv::{now_secs, KeySpace, Kv};

use super::Strategy;

#[derive(Debug, Clone)]
pub struct SmartConfig {
    pub weight_wait_time: f64,
    pub weight_queue_size: f64,
    pub boost_small_queues: bool,
    pub small_queue_threshold: u64,
    pub boost_multiplier: f64,
}

impl Default for SmartConfig {
    fn default() -> Self {
        Self {
            weight_wait_time: 0.6,
            weight_queue_size: 0.4,
            boost_small_queues: true,
            small_queue_threshold: 5,
            boost_multiplier: 1.5,
        }
    }
}

impl SmartConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let s = &settings.strategies.smart;
        Self {
            weight_wait_time: s.weight_wait_time,
            weight_queue_size: s.weight_queue_size,
            boost_small_queues: s.boost_small_queues,
            small_queue_threshold: s.small_queue_threshold,
            boost_multiplier: s.boost_multiplier,
        }
    }
}

pub struct SmartStrategy {
    config: SmartConfig,
}

impl SmartStrategy {
    pub fn new(config: SmartConfig) -> Self {
        Self { config }
    }

    /// Score one partition. `size` must be non-zero.
    fn score(&self, size: u64, max_size: u64, wait_secs: f64) -> f64 {
        let normalized_size = 1.0 - (size as f64 / max_size as f64);
        let mut score = wait_secs * self.config.weight_wait_time
            + normalized_size * 100.0 * self.config.weight_queue_size;
        if self.config.boost_small_queues && size < self.config.small_queue_threshold {
            score *= self.config.boost_multiplier;
        }
        score
    }
}

#[async_trait]
impl Strategy for SmartStrategy {
    fn name(&self) -> &'static str {
        "smart"
    }

    async fn select(&self, kv: &dyn Kv, keys: &KeySpace, queue: &str) -> Result<Option<String>> {
        let members = kv.smembers(&keys.partitions(queue)).await?;
        if members.is_empty() {
            return Ok(None);
        }

        let mut sizes = Vec::with_capacity(members.len());
        for partition in &members {
            sizes.push(kv.llen(&keys.queue(queue, partition)).await?);
        }
        let max_size = sizes.iter().copied().max().unwrap_or(0);
        if max_size == 0 {
            return Ok(None);
        }

        let now = now_secs();
        let mut best: Option<(f64, usize)> = None;
        for (idx, (partition, &size)) in members.iter().zip(&sizes).enumerate() {
            if size == 0 {
                continue;
            }
            let first_job_time = kv
                .hget(&keys.metrics(queue, partition), FIELD_FIRST_JOB_TIME)
                .await?
                .and_then(|v| v.parse::<u64>().ok());
            let wait_secs = first_job_time.map_or(0.0, |t| now.saturating_sub(t) as f64);
            let score = self.score(size, max_size, wait_secs);
            // Strictly greater: ties keep the earliest member the KV
            // reported.
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, idx));
            }
        }
        Ok(best.map(|(_, idx)| members[idx].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryKv, PushKeys};

    fn strategy() -> SmartStrategy {
        SmartStrategy::new(SmartConfig::default())
    }

    async fn push(kv: &MemoryKv, keys: &KeySpace, queue: &str, partition: &str, now: u64) {
        let partitions = keys.partitions(queue);
        let list = keys.queue(queue, partition);
        let metrics = keys.metrics(queue, partition);
        kv.push_job(
            &PushKeys {
                partitions: &partitions,
                queue: &list,
                metrics: &metrics,
            },
            "{}",
            partition,
            now,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn empty_queue_selects_nothing() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        assert_eq!(strategy().select(&kv, &keys, "q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn longest_waiting_partition_wins() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        let now = now_secs();
        // "old" has waited 100 seconds, "new" just arrived; equal sizes.
        push(&kv, &keys, "q", "old", now - 100).await;
        push(&kv, &keys, "q", "new", now).await;

        let picked = strategy().select(&kv, &keys, "q").await.unwrap();
        assert_eq!(picked, Some("old".into()));
    }

    #[tokio::test]
    async fn small_queue_beats_large_backlog_at_equal_wait() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        let now = now_secs();
        for _ in 0..20 {
            push(&kv, &keys, "q", "heavy", now).await;
        }
        push(&kv, &keys, "q", "light", now).await;

        // Same wait, but "light" scores both the size term and the
        // small-queue boost.
        let picked = strategy().select(&kv, &keys, "q").await.unwrap();
        assert_eq!(picked, Some("light".into()));
    }

    #[tokio::test]
    async fn skips_registered_but_empty_partitions() {
        let kv = MemoryKv::new();
        let keys = KeySpace::new("bq");
        let now = now_secs();
        push(&kv, &keys, "q", "full", now).await;
        // Leave a dangling registration with no queued jobs.
        kv.sadd(&keys.partitions("q"), "empty").await.unwrap();

        let picked = strategy().select(&kv, &keys, "q").await.unwrap();
        assert_eq!(picked, Some("full".into()));
    }

    #[test]
    fn boost_multiplies_the_combined_score() {
        let s = strategy();
        let unboosted = s.score(10, 10, 50.0);
        let boosted = s.score(3, 10, 50.0);
        assert!(boosted > unboosted);
        // size 3 of max 10: 0.7 normalized, times 100 and weight 0.4,
        // plus 50s of wait at weight 0.6, all boosted by 1.5.
        let expected = (50.0 * 0.6 + 0.7 * 100.0 * 0.4) * 1.5;
        assert!((boosted - expected).abs() < 1e-9);
    }
}
