//! Line-protocol rendering.
//!
//! Output aggregates per queue only. Partition cardinality is
//! O(tenants) and would flood a metrics store, so per-partition detail
//! stays in the JSON document.

use super::reader::MetricsSnapshot;

/// Escape a label value for the text exposition format.
pub fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the four per-queue metrics with their HELP/TYPE headers.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::with_capacity(512 + snapshot.queues.len() * 256);

    output.push_str("# HELP balanced_queue_pending_jobs Jobs queued across all partitions\n");
    output.push_str("# TYPE balanced_queue_pending_jobs gauge\n");
    for q in &snapshot.queues {
        output.push_str(&format!(
            "balanced_queue_pending_jobs{{queue=\"{}\"}} {}\n",
            escape_label(&q.queue),
            q.pending
        ));
    }

    output.push_str("# HELP balanced_queue_active_jobs In-flight reservations across all partitions\n");
    output.push_str("# TYPE balanced_queue_active_jobs gauge\n");
    for q in &snapshot.queues {
        output.push_str(&format!(
            "balanced_queue_active_jobs{{queue=\"{}\"}} {}\n",
            escape_label(&q.queue),
            q.active
        ));
    }

    output.push_str("# HELP balanced_queue_processed_total Jobs popped since the queue was created\n");
    output.push_str("# TYPE balanced_queue_processed_total counter\n");
    for q in &snapshot.queues {
        output.push_str(&format!(
            "balanced_queue_processed_total{{queue=\"{}\"}} {}\n",
            escape_label(&q.queue),
            q.processed
        ));
    }

    output.push_str("# HELP balanced_queue_partitions_total Partitions currently holding jobs\n");
    output.push_str("# TYPE balanced_queue_partitions_total gauge\n");
    for q in &snapshot.queues {
        output.push_str(&format!(
            "balanced_queue_partitions_total{{queue=\"{}\"}} {}\n",
            escape_label(&q.queue),
            q.partition_count
        ));
    }

    output
}
