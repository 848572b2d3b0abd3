//! Concurrency cap enforcement.

use super::*;
use crate::kv::{now_secs, KeySpace, Kv};

#[tokio::test]
async fn cap_blocks_third_reservation_until_one_completes() {
    let (driver, _) = setup_with_cap(2);

    for label in ["1", "2", "3"] {
        push_to(&driver, "q", "u:888", label).await;
    }

    let first = driver.pop("q").await.unwrap().expect("first pop");
    let second = driver.pop("q").await.unwrap().expect("second pop");

    // Two in flight, cap reached, no other partition to fall back to.
    assert!(driver.pop("q").await.unwrap().is_none());

    first.delete().await.unwrap();
    let fourth = driver.pop("q").await.unwrap().expect("slot freed");
    assert_eq!(fourth.payload()["label"], "3");

    second.delete().await.unwrap();
    fourth.delete().await.unwrap();
}

#[tokio::test]
async fn active_set_never_exceeds_cap_after_acquire() {
    let (driver, kv) = setup_with_cap(3);
    let keys = KeySpace::new(PREFIX);

    for i in 0..10 {
        push_to(&driver, "q", "k", &i.to_string()).await;
    }

    let mut held = Vec::new();
    while let Some(reservation) = driver.pop("q").await.unwrap() {
        let active = kv.hlen(&keys.active("q", "k")).await.unwrap();
        assert!(active <= 3, "active {active} exceeded the cap");
        held.push(reservation);
    }
    assert_eq!(held.len(), 3);
}

#[tokio::test]
async fn capped_partition_falls_through_to_the_next() {
    let (driver, _) = setup_with_cap(1);

    push_to(&driver, "q", "busy", "b1").await;
    push_to(&driver, "q", "busy", "b2").await;
    push_to(&driver, "q", "idle", "i1").await;

    // "busy" sorts first for the rotation and takes the only slot.
    let first = driver.pop("q").await.unwrap().unwrap();
    assert_eq!(first.partition(), "busy");

    let second = driver.pop("q").await.unwrap().unwrap();
    assert_eq!(second.partition(), "idle");
    second.delete().await.unwrap();

    let third = driver.pop("q").await.unwrap();
    assert!(third.is_none(), "only the capped partition has jobs left");

    first.delete().await.unwrap();
    let fourth = driver.pop("q").await.unwrap().unwrap();
    assert_eq!(fourth.payload()["label"], "b2");
    fourth.delete().await.unwrap();
}

#[tokio::test]
async fn stale_reservation_is_reaped_and_slot_reused() {
    let (driver, kv) = setup_with_cap(1);
    let keys = KeySpace::new(PREFIX);

    push_to(&driver, "q", "k", "job").await;

    // A reservation whose worker vanished an hour ago.
    let stale_ts = now_secs() - 3600;
    kv.hset(&keys.active("q", "k"), "dead-worker", &stale_ts.to_string())
        .await
        .unwrap();

    let reservation = driver.pop("q").await.unwrap().expect("stale entry reaped");
    assert_eq!(reservation.payload()["label"], "job");
    reservation.delete().await.unwrap();
}
