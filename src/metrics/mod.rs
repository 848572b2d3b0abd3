//! Read-only metrics view and exporters.
//!
//! The reader discovers queues by key scan and never touches the hot
//! path; the exporter renders the aggregated per-queue line-protocol
//! text and a per-partition JSON document.

mod exporter;
mod reader;

pub use exporter::{escape_label, render_prometheus};
pub use reader::{MetricsReader, MetricsSnapshot, PartitionSnapshot, QueueSnapshot};
