//! Core push/pop behavior and partition resolution.

use super::*;
use crate::error::Error;
use crate::kv::{KeySpace, Kv};
use crate::kv::keys::{FIELD_FIRST_JOB_TIME, FIELD_TOTAL_POPPED, FIELD_TOTAL_PUSHED};
use crate::queue::{PartitionResolver, PartitionedJob};
use serde_json::Value;

#[tokio::test]
async fn push_creates_partition() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);

    let len = driver
        .push(
            json!({"body": "hello"}),
            "default",
            PushOptions::with_partition("user:123"),
        )
        .await
        .unwrap();
    assert_eq!(len, 1);

    assert_eq!(
        kv.smembers(&keys.partitions("default")).await.unwrap(),
        vec!["user:123"]
    );
    assert_eq!(kv.llen(&keys.queue("default", "user:123")).await.unwrap(), 1);
    assert_eq!(
        kv.hget(&keys.metrics("default", "user:123"), FIELD_TOTAL_PUSHED)
            .await
            .unwrap(),
        Some("1".into())
    );
}

#[tokio::test]
async fn pop_on_empty_queue_returns_none() {
    let driver = setup();
    assert!(driver.pop("nothing").await.unwrap().is_none());
}

#[tokio::test]
async fn numeric_partition_key_becomes_string() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);

    driver
        .push(json!({"user_id": 12345}), "q", PushOptions::default())
        .await
        .unwrap();

    assert_eq!(
        kv.smembers(&keys.partitions("q")).await.unwrap(),
        vec!["12345"]
    );
}

#[tokio::test]
async fn payload_without_tenant_lands_on_default_partition() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);

    driver
        .push(json!({"body": "anon"}), "q", PushOptions::default())
        .await
        .unwrap();

    assert_eq!(
        kv.smembers(&keys.partitions("q")).await.unwrap(),
        vec!["default"]
    );
}

#[tokio::test]
async fn registered_resolver_routes_pushes() {
    let kv = std::sync::Arc::new(MemoryKv::new());
    let resolver: PartitionResolver = std::sync::Arc::new(|payload: &Value| {
        payload
            .get("merchant")
            .and_then(|m| m.as_str())
            .map(|m| format!("merchant:{m}"))
    });
    let driver = BalancedQueue::builder(kv.clone())
        .prefix(PREFIX)
        .partition_resolver(resolver)
        .build();
    let keys = KeySpace::new(PREFIX);

    driver
        .push(json!({"merchant": "m42"}), "q", PushOptions::default())
        .await
        .unwrap();
    assert_eq!(
        kv.smembers(&keys.partitions("q")).await.unwrap(),
        vec!["merchant:m42"]
    );
}

#[tokio::test]
async fn job_capability_beats_resolver() {
    struct ReportJob;
    impl PartitionedJob for ReportJob {
        fn payload(&self) -> Value {
            json!({"kind": "report"})
        }
        fn partition_key(&self) -> Option<String> {
            Some("tenant:7".into())
        }
    }

    let kv = std::sync::Arc::new(MemoryKv::new());
    let resolver: PartitionResolver = std::sync::Arc::new(|_| Some("resolved".into()));
    let driver = BalancedQueue::builder(kv.clone())
        .prefix(PREFIX)
        .partition_resolver(resolver)
        .build();
    let keys = KeySpace::new(PREFIX);

    driver.push_job(&ReportJob, "q").await.unwrap();
    assert_eq!(
        kv.smembers(&keys.partitions("q")).await.unwrap(),
        vec!["tenant:7"]
    );
}

#[tokio::test]
async fn emptying_pop_cleans_partition_state() {
    let (driver, kv) = setup_with_kv();
    let keys = KeySpace::new(PREFIX);

    push_to(&driver, "q", "X", "only").await;
    let reservation = driver.pop("q").await.unwrap().unwrap();
    assert_eq!(reservation.partition(), "X");
    reservation.delete().await.unwrap();

    assert!(kv.smembers(&keys.partitions("q")).await.unwrap().is_empty());
    let metrics_key = keys.metrics("q", "X");
    assert_eq!(
        kv.hget(&metrics_key, FIELD_FIRST_JOB_TIME).await.unwrap(),
        None
    );
    assert_eq!(
        kv.hget(&metrics_key, FIELD_TOTAL_PUSHED).await.unwrap(),
        Some("1".into())
    );
    assert_eq!(
        kv.hget(&metrics_key, FIELD_TOTAL_POPPED).await.unwrap(),
        Some("1".into())
    );
    // The reservation itself was dropped on delete.
    assert_eq!(kv.hlen(&keys.active("q", "X")).await.unwrap(), 0);
}

#[tokio::test]
async fn pop_returns_the_pushed_payload() {
    let driver = setup();
    push_to(&driver, "q", "k", "first").await;
    push_to(&driver, "q", "k", "second").await;

    assert_eq!(pop_label(&driver, "q").await, "first");
    assert_eq!(pop_label(&driver, "q").await, "second");
    assert!(driver.pop("q").await.unwrap().is_none());
}

#[tokio::test]
async fn disabled_driver_refuses_traffic() {
    let kv = std::sync::Arc::new(MemoryKv::new());
    let driver = BalancedQueue::builder(kv).prefix(PREFIX).enabled(false).build();

    assert!(matches!(
        driver
            .push(json!({}), "q", PushOptions::default())
            .await
            .unwrap_err(),
        Error::Disabled
    ));
    assert!(matches!(driver.pop("q").await.unwrap_err(), Error::Disabled));
}
