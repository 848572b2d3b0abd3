//! Reservation handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;

use crate::error::Result;

use super::driver::BalancedQueue;

/// Exclusive handle over one in-flight job.
///
/// Bound to its `(queue, partition, id)` until settled. Calling
/// [`Self::release`] or [`Self::delete`] more than once is a local
/// no-op, and the underlying KV delete is idempotent anyway, so a
/// handle can never double-complete a job.
pub struct Reservation {
    driver: BalancedQueue,
    queue: String,
    partition: String,
    id: String,
    payload: Value,
    settled: AtomicBool,
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("queue", &self.queue)
            .field("partition", &self.partition)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Reservation {
    pub(crate) fn new(
        driver: BalancedQueue,
        queue: String,
        partition: String,
        id: String,
        payload: Value,
    ) -> Self {
        Self {
            driver,
            queue,
            partition,
            id,
            payload,
            settled: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Put the job back. `Duration::ZERO` re-queues it immediately at
    /// the tail; anything longer parks it in the delayed set until a
    /// promoter moves it back.
    pub async fn release(&self, delay: Duration) -> Result<()> {
        if !self.begin_settle() {
            return Ok(());
        }
        let result = self
            .driver
            .release_reserved(
                &self.queue,
                &self.partition,
                &self.id,
                &self.payload,
                delay.as_secs(),
            )
            .await;
        self.finish_settle(&result);
        result
    }

    /// Complete the job.
    pub async fn delete(&self) -> Result<()> {
        if !self.begin_settle() {
            return Ok(());
        }
        let result = self
            .driver
            .delete_reserved(&self.queue, &self.partition, &self.id)
            .await;
        self.finish_settle(&result);
        result
    }

    /// Claim the one settle slot. Loses to any earlier claim.
    fn begin_settle(&self) -> bool {
        self.settled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// A failed settle re-arms the handle so the caller can retry.
    fn finish_settle(&self, result: &Result<()>) {
        if result.is_err() {
            self.settled.store(false, Ordering::SeqCst);
        }
    }
}
