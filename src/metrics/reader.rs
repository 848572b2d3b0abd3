//! Queue discovery and per-partition counters.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::kv::keys::{FIELD_TOTAL_POPPED, FIELD_TOTAL_PUSHED};
use crate::kv::{now_secs, KeySpace, Kv};

/// Counters for one partition.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionSnapshot {
    pub partition: String,
    pub queued: u64,
    pub active: u64,
    pub processed: u64,
    pub total_pushed: u64,
}

/// Aggregated view of one queue with per-partition detail.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub queue: String,
    pub pending: u64,
    pub active: u64,
    pub processed: u64,
    pub partition_count: u64,
    pub partitions: Vec<PartitionSnapshot>,
}

/// Point-in-time view across every queue under the prefix.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: u64,
    pub queues: Vec<QueueSnapshot>,
}

/// Read-only view over the broker's keyspace. Runs out-of-band from
/// producers and workers; nothing here mutates the KV.
pub struct MetricsReader {
    kv: Arc<dyn Kv>,
    keys: KeySpace,
}

impl MetricsReader {
    pub fn new(kv: Arc<dyn Kv>, prefix: impl Into<String>) -> Self {
        Self {
            kv,
            keys: KeySpace::new(prefix),
        }
    }

    /// Snapshot every queue. Scan or read failures degrade to an empty
    /// or partial snapshot rather than failing the scrape.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let mut queues = Vec::new();
        let keys = match self.kv.scan(&self.keys.partitions_pattern()).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "metrics key scan failed");
                Vec::new()
            }
        };
        for key in keys {
            let Some(queue) = self.keys.queue_from_partitions_key(&key) else {
                continue;
            };
            match self.queue_snapshot(&queue).await {
                Ok(snapshot) => queues.push(snapshot),
                Err(e) => warn!(queue = %queue, error = %e, "metrics read failed"),
            }
        }
        queues.sort_by(|a, b| a.queue.cmp(&b.queue));
        MetricsSnapshot {
            timestamp: now_secs(),
            queues,
        }
    }

    /// Snapshot one queue.
    pub async fn queue_snapshot(&self, queue: &str) -> Result<QueueSnapshot> {
        let members = self.kv.smembers(&self.keys.partitions(queue)).await?;
        let mut partitions = Vec::with_capacity(members.len());
        let (mut pending, mut active, mut processed) = (0, 0, 0);
        for partition in members {
            let snapshot = self.partition_snapshot(queue, &partition).await?;
            pending += snapshot.queued;
            active += snapshot.active;
            processed += snapshot.processed;
            partitions.push(snapshot);
        }
        Ok(QueueSnapshot {
            queue: queue.to_string(),
            pending,
            active,
            processed,
            partition_count: partitions.len() as u64,
            partitions,
        })
    }

    async fn partition_snapshot(&self, queue: &str, partition: &str) -> Result<PartitionSnapshot> {
        let queued = self.kv.llen(&self.keys.queue(queue, partition)).await?;
        let active = self.kv.hlen(&self.keys.active(queue, partition)).await?;
        let metrics_key = self.keys.metrics(queue, partition);
        let processed = self.counter(&metrics_key, FIELD_TOTAL_POPPED).await?;
        let total_pushed = self.counter(&metrics_key, FIELD_TOTAL_PUSHED).await?;
        Ok(PartitionSnapshot {
            partition: partition.to_string(),
            queued,
            active,
            processed,
            total_pushed,
        })
    }

    async fn counter(&self, key: &str, field: &str) -> Result<u64> {
        Ok(self
            .kv
            .hget(key, field)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    #[tokio::test]
    async fn empty_keyspace_yields_an_empty_snapshot() {
        let reader = MetricsReader::new(Arc::new(MemoryKv::new()), "bq");
        let snapshot = reader.snapshot().await;
        assert!(snapshot.queues.is_empty());
        assert!(snapshot.timestamp > 0);
    }

    #[tokio::test]
    async fn missing_counters_read_as_zero() {
        let kv = Arc::new(MemoryKv::new());
        kv.sadd("bq:queues:q:partitions", "k").await.unwrap();
        kv.rpush("bq:queues:q:k", "{}").await.unwrap();

        let reader = MetricsReader::new(kv, "bq");
        let snapshot = reader.queue_snapshot("q").await.unwrap();
        assert_eq!(snapshot.pending, 1);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.partitions[0].total_pushed, 0);
    }

    #[test]
    fn json_document_has_the_published_shape() {
        let snapshot = MetricsSnapshot {
            timestamp: 1_700_000_000,
            queues: vec![QueueSnapshot {
                queue: "alpha".into(),
                pending: 3,
                active: 1,
                processed: 10,
                partition_count: 1,
                partitions: vec![PartitionSnapshot {
                    partition: "user:1".into(),
                    queued: 3,
                    active: 1,
                    processed: 10,
                    total_pushed: 13,
                }],
            }],
        };

        let doc = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(doc["timestamp"], 1_700_000_000);
        assert_eq!(doc["queues"][0]["queue"], "alpha");
        assert_eq!(doc["queues"][0]["pending"], 3);
        assert_eq!(doc["queues"][0]["partition_count"], 1);
        assert_eq!(doc["queues"][0]["partitions"][0]["partition"], "user:1");
        assert_eq!(doc["queues"][0]["partitions"][0]["total_pushed"], 13);
    }
}
