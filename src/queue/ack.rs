//! Completion, release, and delayed-promotion operations.
//!
//! Release and delete both drop the reservation with an unconditional
//! hash delete, which keeps them idempotent on the KV. Release-and-
//! reinsert is deliberately not one atomic step: a crash in between
//! leaks the payload back onto the queue without a reservation held,
//! and the queue simply hands it out again.

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::kv::{now_secs, PromoteKeys};

use super::driver::BalancedQueue;

impl BalancedQueue {
    /// Drop the reservation and put the payload back. Zero delay means
    /// an immediate tail re-push (the payload loses its original
    /// position); a positive delay parks it in the delayed set until
    /// promotion.
    pub(crate) async fn release_reserved(
        &self,
        queue: &str,
        partition: &str,
        id: &str,
        payload: &Value,
        delay_secs: u64,
    ) -> Result<()> {
        self.inner
            .limiter
            .release(self.kv(), self.keys(), queue, partition, id)
            .await?;

        if delay_secs > 0 {
            let due = (now_secs() + delay_secs) as f64;
            self.kv()
                .zadd(&self.keys().delayed(queue, partition), due, &payload.to_string())
                .await?;
        } else {
            self.push_to_partition(payload.clone(), queue, partition)
                .await?;
        }

        self.inner
            .hook
            .on_released(queue, partition, id, delay_secs);
        debug!(queue, partition, reservation = %id, delay_secs, "job released");
        Ok(())
    }

    /// Drop the reservation for good. The completion hook fires here.
    pub(crate) async fn delete_reserved(
        &self,
        queue: &str,
        partition: &str,
        id: &str,
    ) -> Result<()> {
        self.inner
            .limiter
            .release(self.kv(), self.keys(), queue, partition, id)
            .await?;
        self.inner.hook.on_completed(queue, partition, id);
        debug!(queue, partition, reservation = %id, "job completed");
        Ok(())
    }

    /// Move every due delayed entry back onto its partition queue.
    /// Discovers delayed sets by key scan, so this belongs off the hot
    /// path; run it from the sweeper or an external scheduler. Returns
    /// the number of promoted entries.
    pub async fn promote_delayed(&self, queue: &str) -> Result<u64> {
        let keys = self.keys();
        let delayed_keys = self.kv().scan(&keys.delayed_pattern(queue)).await?;
        let now = now_secs();
        let mut promoted = 0;
        for delayed_key in delayed_keys {
            let Some(partition) = keys.partition_from_delayed_key(queue, &delayed_key) else {
                continue;
            };
            let queue_key = keys.queue(queue, &partition);
            let partitions_key = keys.partitions(queue);
            let metrics_key = keys.metrics(queue, &partition);
            promoted += self
                .kv()
                .promote_due(
                    &PromoteKeys {
                        delayed: &delayed_key,
                        queue: &queue_key,
                        partitions: &partitions_key,
                        metrics: &metrics_key,
                    },
                    &partition,
                    now,
                )
                .await?;
        }
        if promoted > 0 {
            debug!(queue, promoted, "delayed jobs promoted");
        }
        Ok(promoted)
    }
}
