//! Partition resolution.
//!
//! Jobs declare their partition through an explicit capability chain
//! instead of runtime field reflection: a push-time override wins, then
//! the job type's own key, then the per-queue resolver, then a
//! conventional-field lookup on the payload, and finally the shared
//! `"default"` partition.

use std::sync::Arc;

use serde_json::Value;

/// Partition used when nothing else resolves one. Jobs without a tenant
/// share a single FIFO lane.
pub const DEFAULT_PARTITION: &str = "default";

/// Payload fields checked during auto-detection, in order.
const CONVENTIONAL_FIELDS: [&str; 4] = ["userId", "user_id", "tenantId", "tenant_id"];

/// Per-queue resolver callable, registered on the driver builder.
pub type PartitionResolver = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Capability protocol for job types that know their own partition.
pub trait PartitionedJob {
    /// The payload pushed onto the queue.
    fn payload(&self) -> Value;

    /// The tenant key this job belongs to.
    fn partition_key(&self) -> Option<String> {
        None
    }

    /// Dispatch-time override slot; wins over [`Self::partition_key`].
    fn partition_override(&self) -> Option<String> {
        None
    }
}

/// Resolve the partition for a push. First non-empty source wins.
pub(crate) fn resolve_partition(
    push_override: Option<&str>,
    job_key: Option<String>,
    resolver: Option<&PartitionResolver>,
    payload: &Value,
) -> String {
    if let Some(partition) = push_override {
        if !partition.is_empty() {
            return partition.to_string();
        }
    }
    if let Some(partition) = job_key {
        if !partition.is_empty() {
            return partition;
        }
    }
    if let Some(resolve) = resolver {
        if let Some(partition) = resolve(payload) {
            if !partition.is_empty() {
                return partition;
            }
        }
    }
    if let Some(partition) = detect_conventional(payload) {
        return partition;
    }
    DEFAULT_PARTITION.to_string()
}

/// Look for a conventional tenant field on the payload. Numeric ids are
/// rendered as their decimal string, so `12345` partitions the same as
/// `"12345"`.
fn detect_conventional(payload: &Value) -> Option<String> {
    let object = payload.as_object()?;
    for field in CONVENTIONAL_FIELDS {
        match object.get(field) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}
