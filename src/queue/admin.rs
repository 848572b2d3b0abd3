//! Admin operations: sizes, enumeration, clear.

use tracing::info;

use crate::error::Result;

use super::driver::BalancedQueue;

impl BalancedQueue {
    /// Partitions currently holding at least one queued job.
    pub async fn partitions(&self, queue: &str) -> Result<Vec<String>> {
        self.kv().smembers(&self.keys().partitions(queue)).await
    }

    /// Total queued jobs across all partitions. A sampled estimate
    /// under concurrent mutation.
    pub async fn size(&self, queue: &str) -> Result<u64> {
        let mut total = 0;
        for partition in self.partitions(queue).await? {
            total += self.kv().llen(&self.keys().queue(queue, &partition)).await?;
        }
        Ok(total)
    }

    /// Alias for [`Self::size`]; kept for host frameworks that poll a
    /// readiness count.
    pub async fn ready_now(&self, queue: &str) -> Result<u64> {
        self.size(queue).await
    }

    /// Live reservations on one partition, stale entries excluded.
    pub async fn active_count(&self, queue: &str, partition: &str) -> Result<u64> {
        self.inner
            .limiter
            .active_count(self.kv(), self.keys(), queue, partition)
            .await
    }

    /// Drop every key belonging to one partition and unregister it.
    pub async fn clear_partition(&self, queue: &str, partition: &str) -> Result<()> {
        let keys = self.keys();
        self.kv().del(&keys.queue(queue, partition)).await?;
        self.kv().del(&keys.active(queue, partition)).await?;
        self.kv().del(&keys.delayed(queue, partition)).await?;
        self.kv().del(&keys.metrics(queue, partition)).await?;
        self.kv().srem(&keys.partitions(queue), partition).await?;
        info!(queue, partition, "partition cleared");
        Ok(())
    }

    /// Clear every partition of a queue, then the queue-level keys.
    /// Returns how many partitions were cleared. Clearing an empty
    /// queue is not an error.
    pub async fn clear_queue(&self, queue: &str) -> Result<u64> {
        let partitions = self.partitions(queue).await?;
        let cleared = partitions.len() as u64;
        for partition in &partitions {
            self.clear_partition(queue, partition).await?;
        }
        let keys = self.keys();
        self.kv().del(&keys.partitions(queue)).await?;
        self.kv().del(&keys.rr_state(queue)).await?;
        info!(queue, partitions = cleared, "queue cleared");
        Ok(cleared)
    }
}
