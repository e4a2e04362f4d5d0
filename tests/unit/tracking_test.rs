//! Tests for the tracking index, reducer, and availability working together

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use occupancy_stream::core::{
    all_availability, availability, build_indices, decode_frames, decode_prefix, reduce,
    MeterAssignment, MeterIndex, Occupancy, SnapshotCell, StalenessPolicy, TrackingIndex,
};
use serde_json::json;

fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 5, 21, h, m, s).unwrap()
}

fn short_north() -> Vec<MeterAssignment> {
    [
        ("9861", "0001"),
        ("9862", "0001"),
        ("9863", "0001"),
        ("9864", "0001"),
        ("9871", "0002"),
        ("9872", "0002"),
        ("9873", "0002"),
        ("9881", "0003"),
        ("9882", "0003"),
    ]
    .into_iter()
    .map(|(meter, zone)| MeterAssignment::new(meter, zone))
    .collect()
}

fn update(id: &str, occupancy: &str, at: &str) -> String {
    json!({
        "event": "update",
        "payload": {
            "id": id,
            "occupancy": occupancy,
            "time_of_ingest": at,
            "price": 1.0,
            "status": "open",
            "limit": "no-limit"
        }
    })
    .to_string()
}

fn chunk(at: &str, readings: &[(&str, &str)]) -> Vec<String> {
    readings
        .iter()
        .map(|(id, occupancy)| update(id, occupancy, at))
        .collect()
}

fn ingest(index: &TrackingIndex, meters: &MeterIndex, frames: &[String]) -> TrackingIndex {
    let events = decode_frames(frames, meters).unwrap();
    reduce(index, meters, &events).index
}

fn expected(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

#[test]
fn test_build_indices_starts_unseen() {
    let (index, meters) = build_indices(&short_north());
    assert_eq!(index.len(), 3);
    assert_eq!(meters.len(), 9);
    assert_eq!(meters.zone_of("9872"), Some("0002"));
    assert_eq!(meters.zone_of("1234"), None);

    let zone = index.zone("0001").unwrap();
    assert_eq!(zone.len(), 4);
    assert!(zone
        .meters()
        .all(|m| m.occupancy() == Occupancy::Unknown && m.last_seen().is_none()));
    assert!(all_availability(&index, ts(18, 0, 0), StalenessPolicy::default()).is_empty());
}

#[test]
fn test_short_north_stream_end_to_end() {
    let (mut index, meters) = build_indices(&short_north());

    let preamble = vec![
        json!({"event": "phx_reply", "payload": {"status": "ok"}}).to_string(),
        update("9861", "UNOCCUPIED", "2020-05-21T17:59:45.000000"),
        json!({"event": "presence_diff"}).to_string(),
    ];
    let first = chunk(
        "2020-05-21T18:00:00.000000",
        &[
            ("9861", "UNOCCUPIED"),
            ("9862", "UNOCCUPIED"),
            ("9863", "UNOCCUPIED"),
            ("9864", "UNOCCUPIED"),
            ("9871", "UNOCCUPIED"),
            ("9872", "OCCUPIED"),
            ("9873", "UNOCCUPIED"),
            ("9881", "OCCUPIED"),
            ("9882", "UNOCCUPIED"),
        ],
    );
    let second = chunk(
        "2020-05-21T18:00:15.000000",
        &[
            ("9861", "UNOCCUPIED"),
            ("9862", "OCCUPIED"),
            ("9863", "OCCUPIED"),
            ("9864", "OCCUPIED"),
            ("9871", "OCCUPIED"),
            ("9872", "OCCUPIED"),
            ("9873", "UNOCCUPIED"),
            ("9881", "UNOCCUPIED"),
            ("9882", "UNOCCUPIED"),
        ],
    );
    let third = chunk(
        "2020-05-21T18:30:15.000000",
        &[
            ("9861", "OCCUPIED"),
            ("9862", "OCCUPIED"),
            ("9863", "OCCUPIED"),
            ("9864", "OCCUPIED"),
            ("9871", "UNOCCUPIED"),
            ("9872", "OCCUPIED"),
            ("9873", "UNOCCUPIED"),
            ("9881", "UNOCCUPIED"),
            ("9882", "OCCUPIED"),
        ],
    );

    index = ingest(&index, &meters, &preamble);
    index = ingest(&index, &meters, &first);
    index = ingest(&index, &meters, &second);

    let policy = StalenessPolicy::default();
    assert_eq!(
        all_availability(&index, ts(18, 5, 0), policy),
        expected(&[("0001", 0.25), ("0002", 0.3333), ("0003", 1.0)])
    );
    assert!(all_availability(&index, ts(18, 30, 0), policy).is_empty());

    index = ingest(&index, &meters, &third);
    assert_eq!(
        all_availability(&index, ts(18, 35, 0), policy),
        expected(&[("0001", 0.0), ("0002", 0.6667), ("0003", 0.5)])
    );
}

#[test]
fn test_one_silent_meter_invalidates_zone() {
    let (index, meters) = build_indices(&short_north());
    let frames = chunk(
        "2020-05-21T18:00:00",
        &[("9861", "UNOCCUPIED"), ("9862", "UNOCCUPIED"), ("9863", "UNOCCUPIED")],
    );
    let index = ingest(&index, &meters, &frames);
    assert_eq!(availability(&index, "0001", ts(18, 1, 0)), None);

    let index = ingest(
        &index,
        &meters,
        &chunk("2020-05-21T18:00:30", &[("9864", "OCCUPIED")]),
    );
    assert_eq!(availability(&index, "0001", ts(18, 1, 0)), Some(0.75));
}

#[test]
fn test_untracked_and_unknown_tokens() {
    let (index, meters) = build_indices(&[MeterAssignment::new("9881", "0003")]);
    let frames = vec![
        update("9999", "OCCUPIED", "2020-05-21T18:00:00"),
        update("9881", "occupied", "2020-05-21T18:00:00"),
    ];
    let outcome = reduce(&index, &meters, &decode_frames(&frames, &meters).unwrap());
    assert_eq!(outcome.untracked, 1);
    assert_eq!(outcome.changed, 1);
    // Only the exact upper-case token counts as occupied.
    assert_eq!(availability(&outcome.index, "0003", ts(18, 0, 0)), Some(1.0));
}

#[test]
fn test_malformed_tracked_update_is_an_error() {
    let (_, meters) = build_indices(&short_north());
    let frames = vec![
        update("9861", "OCCUPIED", "2020-05-21T18:00:00"),
        json!({"event": "update", "payload": {"id": "9862"}}).to_string(),
    ];
    assert!(decode_frames(&frames, &meters).is_err());

    let decoded = decode_prefix(&frames, &meters);
    assert_eq!(decoded.events.len(), 1);
    assert!(decoded.error.is_some());
}

#[test]
fn test_untracked_update_with_garbage_reading_is_skipped() {
    let (index, meters) = build_indices(&short_north());
    let frames = vec![
        update("not-tracked", "OCCUPIED", "garbage"),
        json!({"event": "update", "payload": {"id": "also-not-tracked"}}).to_string(),
        update("9881", "UNOCCUPIED", "2020-05-21T18:00:00"),
        update("9882", "OCCUPIED", "2020-05-21T18:00:00"),
    ];
    let outcome = reduce(&index, &meters, &decode_frames(&frames, &meters).unwrap());
    assert_eq!(outcome.untracked, 2);
    assert_eq!(outcome.changed, 2);
    assert_eq!(availability(&outcome.index, "0003", ts(18, 0, 0)), Some(0.5));

    let tracked_garbage = vec![update("9881", "OCCUPIED", "garbage")];
    assert!(decode_frames(&tracked_garbage, &meters).is_err());
}

#[test]
fn test_published_snapshots_are_stable_for_readers() {
    let (index, meters) = build_indices(&short_north());
    let cell = SnapshotCell::new(index);
    let before = cell.load();

    let next = ingest(
        &before,
        &meters,
        &chunk("2020-05-21T18:00:00", &[("9881", "OCCUPIED"), ("9882", "UNOCCUPIED")]),
    );
    assert_eq!(cell.publish(next), 1);

    let after = cell.load();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(availability(&before, "0003", ts(18, 0, 0)), None);
    assert_eq!(availability(&after, "0003", ts(18, 0, 0)), Some(0.5));
    assert!(after.shares_zone_with(&before, "0001"));
    assert!(!after.shares_zone_with(&before, "0003"));
}
