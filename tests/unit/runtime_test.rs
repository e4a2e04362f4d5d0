//! Tests for tokio spawner, backoff, and API models

use std::collections::HashMap;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use occupancy_stream::config::BackoffConfig;
use occupancy_stream::runtime::tokio_spawner::{Spawn, TokioSpawner};
use occupancy_stream::runtime::{
    health, overlay_known_availability, AvailabilityReport, Backoff, ConnectionState,
    ConnectionStats,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_backoff_without_jitter_is_deterministic() {
    let mut backoff = Backoff::new(BackoffConfig {
        initial_delay_ms: 100,
        max_delay_secs: 1,
        multiplier: 3.0,
        jitter: false,
    });
    let delays: Vec<u128> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
    assert_eq!(delays, vec![100, 300, 900, 1_000, 1_000]);
    assert_eq!(backoff.attempt(), 5);

    backoff.reset();
    assert_eq!(backoff.next_delay(), Duration::from_millis(100));
}

#[test]
fn test_health_reflects_state() {
    let streaming = health(ConnectionState::Streaming, ConnectionStats::default());
    assert!(streaming.ok);

    let down = health(ConnectionState::Disconnected, ConnectionStats::default());
    assert!(!down.ok);

    let json = serde_json::to_value(&down).unwrap();
    assert_eq!(json["state"], "disconnected");
    assert_eq!(json["stats"]["failures"], 0);
}

#[test]
fn test_report_sorts_zones() {
    let as_of = Utc.with_ymd_and_hms(2020, 5, 21, 18, 5, 0).unwrap();
    let zones = HashMap::from([
        ("0003".to_string(), 1.0),
        ("0001".to_string(), 0.25),
    ]);
    let report = AvailabilityReport::new(as_of, zones);
    let ids: Vec<&str> = report.zones.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["0001", "0003"]);

    let json = serde_json::to_string(&report).unwrap();
    assert_eq!(
        json,
        r#"{"as_of":"2020-05-21T18:05:00Z","zones":{"0001":0.25,"0003":1.0}}"#
    );
}

#[test]
fn test_overlay_replaces_only_known_zones() {
    let mut predictions = HashMap::from([
        ("0001".to_string(), 0.9),
        ("0002".to_string(), 0.8),
    ]);
    let live = HashMap::from([
        ("0001".to_string(), 0.25),
        ("0005".to_string(), 0.5),
    ]);

    let replaced = overlay_known_availability(&mut predictions, &live);

    assert_eq!(replaced, 1);
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions["0001"], 0.25);
    assert_eq!(predictions["0002"], 0.8);
}
