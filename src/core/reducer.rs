//! Event reducer: folds a batch of stream events into a new snapshot.

use crate::core::index::{MeterIndex, TrackingIndex};
use crate::core::protocol::StreamEvent;

/// Result of reducing one batch.
#[derive(Debug, Clone)]
pub struct ReduceOutcome {
    /// The new snapshot. Equal to the input when `changed == 0`.
    pub index: TrackingIndex,
    /// Updates that changed a meter's reading.
    pub changed: usize,
    /// Updates for tracked meters that repeated the current reading.
    pub unchanged: usize,
    /// Updates for meters not in the meter index.
    pub untracked: usize,
    /// Events of any kind other than `update`.
    pub ignored: usize,
}

impl ReduceOutcome {
    /// `true` when the batch altered at least one meter.
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        self.changed > 0
    }
}

/// Apply `events` in order to a copy of `snapshot`.
///
/// The input is never modified; zones not touched by the batch stay shared
/// with it. Within a batch the last report for a meter wins.
#[must_use]
pub fn reduce(snapshot: &TrackingIndex, meters: &MeterIndex, events: &[StreamEvent]) -> ReduceOutcome {
    let mut outcome = ReduceOutcome {
        index: snapshot.clone(),
        changed: 0,
        unchanged: 0,
        untracked: 0,
        ignored: 0,
    };

    for event in events {
        let update = match event {
            StreamEvent::Update(update) => update,
            StreamEvent::Untracked(_) => {
                outcome.untracked += 1;
                continue;
            }
            StreamEvent::Ignored(_) => {
                outcome.ignored += 1;
                continue;
            }
        };

        let Some(zone_id) = meters.zone_of(&update.meter_id) else {
            outcome.untracked += 1;
            continue;
        };

        // Check before taking the mutable path so repeats never copy a shared zone.
        let repeat = outcome
            .index
            .zone(zone_id)
            .and_then(|z| z.meter(&update.meter_id))
            .is_some_and(|m| m.matches(update.occupied, update.time_of_ingest));
        if repeat {
            outcome.unchanged += 1;
            continue;
        }

        let recorded = outcome
            .index
            .zone_mut(zone_id)
            .and_then(|z| z.meter_mut(&update.meter_id))
            .is_some_and(|m| m.record(update.occupied, update.time_of_ingest));
        if recorded {
            outcome.changed += 1;
        } else {
            outcome.untracked += 1;
        }
    }

    outcome
}

/// Shorthand for callers that only need the resulting snapshot.
#[must_use]
pub fn apply(snapshot: &TrackingIndex, meters: &MeterIndex, events: &[StreamEvent]) -> TrackingIndex {
    reduce(snapshot, meters, events).index
}
