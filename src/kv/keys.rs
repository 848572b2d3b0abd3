//! Canonical key layout.
//!
//! Key names are wire-compatible with existing deployments; changing any
//! of these formats breaks running clusters.

/// Metrics hash fields.
pub const FIELD_TOTAL_PUSHED: &str = "total_pushed";
pub const FIELD_TOTAL_POPPED: &str = "total_popped";
pub const FIELD_FIRST_JOB_TIME: &str = "first_job_time";

/// Global (cross-partition) metrics hash fields, consumed by the
/// adaptive limiter.
pub const FIELD_UTILIZATION: &str = "utilization";
pub const FIELD_TOTAL_ACQUIRED: &str = "total_acquired";
pub const FIELD_LAST_UPDATED: &str = "last_updated";

/// Builds every key the broker touches under a single configurable prefix.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Set of partitions with at least one queued job.
    pub fn partitions(&self, queue: &str) -> String {
        format!("{}:queues:{}:partitions", self.prefix, queue)
    }

    /// FIFO job list for one partition.
    pub fn queue(&self, queue: &str, partition: &str) -> String {
        format!("{}:queues:{}:{}", self.prefix, queue, partition)
    }

    /// In-flight reservations, id -> acquired-at timestamp.
    pub fn active(&self, queue: &str, partition: &str) -> String {
        format!("{}:queues:{}:{}:active", self.prefix, queue, partition)
    }

    /// Jobs released with a delay, sorted by due-time.
    pub fn delayed(&self, queue: &str, partition: &str) -> String {
        format!("{}:queues:{}:{}:delayed", self.prefix, queue, partition)
    }

    /// Per-partition counters.
    pub fn metrics(&self, queue: &str, partition: &str) -> String {
        format!("{}:metrics:{}:{}", self.prefix, queue, partition)
    }

    /// Cross-partition signals for the adaptive limiter.
    pub fn global_metrics(&self, queue: &str) -> String {
        format!("{}:metrics:{}:global", self.prefix, queue)
    }

    /// Monotonic tick for the round-robin strategy.
    pub fn rr_state(&self, queue: &str) -> String {
        format!("{}:rr-state:{}", self.prefix, queue)
    }

    /// Scan pattern matching every queue's partition set.
    pub fn partitions_pattern(&self) -> String {
        format!("{}:queues:*:partitions", self.prefix)
    }

    /// Scan pattern matching every delayed zset of one queue.
    pub fn delayed_pattern(&self, queue: &str) -> String {
        format!("{}:queues:{}:*:delayed", self.prefix, queue)
    }

    /// Recover the partition name from a key produced by
    /// [`Self::delayed`].
    pub fn partition_from_delayed_key(&self, queue: &str, key: &str) -> Option<String> {
        let head = format!("{}:queues:{}:", self.prefix, queue);
        let partition = key.strip_prefix(&head)?.strip_suffix(":delayed")?;
        if partition.is_empty() {
            return None;
        }
        Some(partition.to_string())
    }

    /// Recover the queue name from a key produced by [`Self::partitions`].
    /// Returns `None` for keys that do not match the layout.
    pub fn queue_from_partitions_key(&self, key: &str) -> Option<String> {
        let head = format!("{}:queues:", self.prefix);
        let rest = key.strip_prefix(&head)?;
        let queue = rest.strip_suffix(":partitions")?;
        // A partition named "partitions" would produce a queue list key that
        // also matches the scan pattern; those contain a ':' in the middle.
        if queue.is_empty() || queue.contains(':') {
            return None;
        }
        Some(queue.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_is_wire_compatible() {
        let keys = KeySpace::new("bq");
        assert_eq!(keys.partitions("default"), "bq:queues:default:partitions");
        assert_eq!(keys.queue("default", "user:123"), "bq:queues:default:user:123");
        assert_eq!(
            keys.active("default", "user:123"),
            "bq:queues:default:user:123:active"
        );
        assert_eq!(
            keys.delayed("default", "user:123"),
            "bq:queues:default:user:123:delayed"
        );
        assert_eq!(keys.metrics("mail", "k"), "bq:metrics:mail:k");
        assert_eq!(keys.global_metrics("mail"), "bq:metrics:mail:global");
        assert_eq!(keys.rr_state("mail"), "bq:rr-state:mail");
    }

    #[test]
    fn queue_name_roundtrips_through_scan_key() {
        let keys = KeySpace::new("bq");
        let key = keys.partitions("orders");
        assert_eq!(keys.queue_from_partitions_key(&key), Some("orders".into()));
        assert_eq!(keys.queue_from_partitions_key("bq:rr-state:orders"), None);
        // Partition list for a partition literally named "partitions".
        assert_eq!(
            keys.queue_from_partitions_key("bq:queues:orders:sub:partitions"),
            None
        );
    }

    #[test]
    fn partition_roundtrips_through_delayed_key() {
        let keys = KeySpace::new("bq");
        let key = keys.delayed("orders", "user:42");
        assert_eq!(
            keys.partition_from_delayed_key("orders", &key),
            Some("user:42".into())
        );
        assert_eq!(keys.partition_from_delayed_key("other", &key), None);
    }
}
