//! Push operations.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::kv::{now_secs, PushKeys};

use super::driver::BalancedQueue;
use super::partition::{resolve_partition, PartitionedJob};

/// Push-time options.
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Partition override; wins over every other resolution source.
    pub partition: Option<String>,
}

impl PushOptions {
    pub fn with_partition(partition: impl Into<String>) -> Self {
        Self {
            partition: Some(partition.into()),
        }
    }
}

impl BalancedQueue {
    /// Push a payload. The partition is resolved from the options, the
    /// registered resolver, or conventional payload fields, in that
    /// order. Returns the new length of the partition's queue.
    pub async fn push(&self, payload: Value, queue: &str, options: PushOptions) -> Result<u64> {
        let partition = resolve_partition(
            options.partition.as_deref(),
            None,
            self.inner.resolver.as_ref(),
            &payload,
        );
        self.push_to_partition(payload, queue, &partition).await
    }

    /// Push a job that carries its own partition capability.
    pub async fn push_job<J: PartitionedJob>(&self, job: &J, queue: &str) -> Result<u64> {
        let payload = job.payload();
        let partition = resolve_partition(
            job.partition_override().as_deref(),
            job.partition_key(),
            self.inner.resolver.as_ref(),
            &payload,
        );
        self.push_to_partition(payload, queue, &partition).await
    }

    pub(crate) async fn push_to_partition(
        &self,
        payload: Value,
        queue: &str,
        partition: &str,
    ) -> Result<u64> {
        if !self.inner.enabled {
            return Err(Error::Disabled);
        }
        let keys = self.keys();
        let partitions_key = keys.partitions(queue);
        let queue_key = keys.queue(queue, partition);
        let metrics_key = keys.metrics(queue, partition);
        let serialized = payload.to_string();

        let len = self
            .kv()
            .push_job(
                &PushKeys {
                    partitions: &partitions_key,
                    queue: &queue_key,
                    metrics: &metrics_key,
                },
                &serialized,
                partition,
                now_secs(),
            )
            .await?;

        debug!(queue, partition, len, "job pushed");
        self.inner.hook.on_pushed(queue, partition);
        Ok(len)
    }
}
