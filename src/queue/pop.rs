//! Pop operations.
//!
//! A pop asks the strategy for a partition, gates it through the
//! limiter (which reaps stale reservations as it checks), then runs the
//! combined pop-and-acquire script. When the chosen partition is at
//! capacity the remaining partitions get one pass each, so worst-case
//! work is bounded by the partition count.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::kv::{now_secs, PopKeys, UNLIMITED_CAP};

use super::driver::BalancedQueue;
use super::reservation::Reservation;

impl BalancedQueue {
    /// Pop the next job the strategy serves. Returns `None` when every
    /// populated partition is empty or at capacity.
    pub async fn pop(&self, queue: &str) -> Result<Option<Reservation>> {
        if !self.inner.enabled {
            return Err(Error::Disabled);
        }
        let Some(partition) = self
            .inner
            .strategy
            .select(self.kv(), self.keys(), queue)
            .await?
        else {
            return Ok(None);
        };

        if !self
            .inner
            .limiter
            .can_process(self.kv(), self.keys(), queue, &partition)
            .await?
        {
            return self.try_next_partition(queue, &partition).await;
        }

        self.pop_from(queue, &partition).await
    }

    /// Run the pop-and-acquire script against one partition.
    pub(crate) async fn pop_from(
        &self,
        queue: &str,
        partition: &str,
    ) -> Result<Option<Reservation>> {
        let keys = self.keys();
        let queue_key = keys.queue(queue, partition);
        let partitions_key = keys.partitions(queue);
        let active_key = keys.active(queue, partition);
        let metrics_key = keys.metrics(queue, partition);

        let cap = self
            .inner
            .limiter
            .resolve_cap(self.kv(), keys, queue)
            .await?
            .unwrap_or(UNLIMITED_CAP);
        let id = uuid::Uuid::new_v4().to_string();

        let Some(raw) = self
            .kv()
            .pop_with_cap(
                &PopKeys {
                    queue: &queue_key,
                    partitions: &partitions_key,
                    active: &active_key,
                    metrics: &metrics_key,
                },
                partition,
                &id,
                cap,
                self.inner.limiter.lock_ttl().as_secs(),
                now_secs(),
            )
            .await?
        else {
            return Ok(None);
        };

        self.inner
            .limiter
            .on_acquired(self.kv(), keys, queue)
            .await?;
        self.inner.hook.on_popped(queue, partition, &id);
        debug!(queue, partition, reservation = %id, "job reserved");

        // Foreign producers may enqueue non-JSON payloads; hand them
        // back verbatim as a string value.
        let payload = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        Ok(Some(Reservation::new(
            self.clone(),
            queue.to_string(),
            partition.to_string(),
            id,
            payload,
        )))
    }

    /// One pass over the remaining partitions, skipping those at
    /// capacity. Never revisits `exclude`.
    async fn try_next_partition(
        &self,
        queue: &str,
        exclude: &str,
    ) -> Result<Option<Reservation>> {
        let members = self.kv().smembers(&self.keys().partitions(queue)).await?;
        for partition in members.iter().filter(|p| p.as_str() != exclude) {
            if !self
                .inner
                .limiter
                .can_process(self.kv(), self.keys(), queue, partition)
                .await?
            {
                continue;
            }
            if let Some(reservation) = self.pop_from(queue, partition).await? {
                return Ok(Some(reservation));
            }
        }
        Ok(None)
    }
}
