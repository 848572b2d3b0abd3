//! Release, delete, and delayed-promotion behavior.

use super::*;
use crate::kv::{now_secs, KeySpace, Kv};
use crate::queue::spawn_sweeper;
use std::time::Duration;
use tokio::sync::broadcast;

#[tokio::test]
async fn release_without_delay_requeues_the_payload() {
    let driver = setup();
    push_to(&driver, "q", "k", "retry-me").await;

    let reservation = driver.pop("q").await.unwrap().unwrap();
    reservation.release(Duration::ZERO).await.unwrap();

    // No other producer on the partition: the same payload comes back.
    assert_eq!(pop_label(&driver, "q").await, "retry-me");
}

#[tokio::test]
async fn release_requeues_at_the_tail() {
    let driver = setup();
    push_to(&driver, "q", "k", "one").await;
    push_to(&driver, "q", "k", "two").await;

    let reservation = driver.pop("q").await.unwrap().unwrap();
    assert_eq!(reservation.payload()["label"], "one");
    reservation.release(Duration::ZERO).await.unwrap();

    // The released payload loses its original position.
    assert_eq!(pop_label(&driver, "q").await, "two");
    assert_eq!(pop_label(&driver, "q").await, "one");
}

#[tokio::test]
async fn delayed_release_parks_the_payload() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);
    push_to(&driver, "q", "k", "later").await;

    let reservation = driver.pop("q").await.unwrap().unwrap();
    reservation.release(Duration::from_secs(120)).await.unwrap();

    assert_eq!(kv.zcard(&keys.delayed("q", "k")).await.unwrap(), 1);
    // Not queued, not reserved, not due yet.
    assert!(driver.pop("q").await.unwrap().is_none());
    assert_eq!(driver.promote_delayed("q").await.unwrap(), 0);
}

#[tokio::test]
async fn promotion_returns_due_payloads_to_their_partition() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);

    // A payload whose due-time has already passed, as an external
    // scheduler would find it.
    let past_due = (now_secs() - 5) as f64;
    kv.zadd(&keys.delayed("q", "k"), past_due, "{\"label\":\"due\"}")
        .await
        .unwrap();

    assert_eq!(driver.promote_delayed("q").await.unwrap(), 1);
    assert_eq!(driver.size("q").await.unwrap(), 1);
    assert_eq!(pop_label(&driver, "q").await, "due");
}

#[tokio::test]
async fn sweeper_promotes_on_its_first_tick() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);

    let past_due = (now_secs() - 5) as f64;
    kv.zadd(&keys.delayed("q", "k"), past_due, "{\"label\":\"swept\"}")
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = spawn_sweeper(driver.clone(), "q", Duration::from_secs(60), shutdown_rx);

    // The first interval tick fires immediately.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(driver.size("q").await.unwrap(), 1);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn double_release_is_a_noop() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);
    push_to(&driver, "q", "k", "once").await;

    let reservation = driver.pop("q").await.unwrap().unwrap();
    reservation.release(Duration::ZERO).await.unwrap();
    reservation.release(Duration::ZERO).await.unwrap();
    reservation.delete().await.unwrap();

    // Exactly one copy on the queue.
    assert_eq!(kv.llen(&keys.queue("q", "k")).await.unwrap(), 1);
}

#[tokio::test]
async fn double_delete_is_a_noop() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);
    push_to(&driver, "q", "k", "done").await;

    let reservation = driver.pop("q").await.unwrap().unwrap();
    reservation.delete().await.unwrap();
    reservation.delete().await.unwrap();

    assert_eq!(kv.hlen(&keys.active("q", "k")).await.unwrap(), 0);
    assert_eq!(kv.llen(&keys.queue("q", "k")).await.unwrap(), 0);
}

#[tokio::test]
async fn release_drops_the_reservation_entry() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);
    push_to(&driver, "q", "k", "x").await;

    let reservation = driver.pop("q").await.unwrap().unwrap();
    assert_eq!(kv.hlen(&keys.active("q", "k")).await.unwrap(), 1);
    reservation.release(Duration::from_secs(30)).await.unwrap();
    assert_eq!(kv.hlen(&keys.active("q", "k")).await.unwrap(), 0);
}
