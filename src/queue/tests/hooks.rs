//! Event hook delivery.

use super::*;
use crate::queue::EventHook;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordingHook {
    events: Mutex<Vec<String>>,
}

impl EventHook for RecordingHook {
    fn on_pushed(&self, queue: &str, partition: &str) {
        self.events.lock().push(format!("pushed {queue}/{partition}"));
    }
    fn on_popped(&self, queue: &str, partition: &str, _reservation_id: &str) {
        self.events.lock().push(format!("popped {queue}/{partition}"));
    }
    fn on_completed(&self, queue: &str, partition: &str, _reservation_id: &str) {
        self.events
            .lock()
            .push(format!("completed {queue}/{partition}"));
    }
    fn on_released(&self, queue: &str, partition: &str, _reservation_id: &str, delay_secs: u64) {
        self.events
            .lock()
            .push(format!("released {queue}/{partition} delay={delay_secs}"));
    }
}

fn setup_with_hook() -> (BalancedQueue, Arc<RecordingHook>) {
    let hook = Arc::new(RecordingHook::default());
    let driver = BalancedQueue::builder(Arc::new(MemoryKv::new()))
        .prefix(PREFIX)
        .event_hook(hook.clone())
        .build();
    (driver, hook)
}

#[tokio::test]
async fn lifecycle_events_fire_in_order() {
    let (driver, hook) = setup_with_hook();

    push_to(&driver, "q", "k", "job").await;
    let reservation = driver.pop("q").await.unwrap().unwrap();
    reservation.delete().await.unwrap();

    let events = hook.events.lock().clone();
    assert_eq!(
        events,
        vec!["pushed q/k", "popped q/k", "completed q/k"]
    );
}

#[tokio::test]
async fn release_reports_its_delay_and_requeue() {
    let (driver, hook) = setup_with_hook();

    push_to(&driver, "q", "k", "job").await;
    let reservation = driver.pop("q").await.unwrap().unwrap();
    reservation.release(Duration::from_secs(30)).await.unwrap();

    let events = hook.events.lock().clone();
    assert_eq!(
        events,
        vec!["pushed q/k", "popped q/k", "released q/k delay=30"]
    );

    // An immediate release re-pushes, so the push hook fires again.
    hook.events.lock().clear();
    push_to(&driver, "q", "k", "again").await;
    let reservation = driver.pop("q").await.unwrap().unwrap();
    reservation.release(Duration::ZERO).await.unwrap();

    let events = hook.events.lock().clone();
    assert_eq!(
        events,
        vec![
            "pushed q/k",
            "popped q/k",
            "pushed q/k",
            "released q/k delay=0"
        ]
    );
}
