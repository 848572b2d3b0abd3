//! Driver event hook.
//!
//! Neutral callback surface for hosts that mirror queue activity into
//! their own observability stack. Every method defaults to a no-op and
//! is invoked after the corresponding KV operation commits.

/// Lifecycle notifications emitted by the queue driver.
pub trait EventHook: Send + Sync {
    fn on_pushed(&self, _queue: &str, _partition: &str) {}
    fn on_popped(&self, _queue: &str, _partition: &str, _reservation_id: &str) {}
    fn on_completed(&self, _queue: &str, _partition: &str, _reservation_id: &str) {}
    fn on_released(&self, _queue: &str, _partition: &str, _reservation_id: &str, _delay_secs: u64) {
    }
}

/// Default hook.
pub struct NoopHook;

impl EventHook for NoopHook {}
