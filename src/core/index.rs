//! Tracking index: zone → meter → last-known occupancy.
//!
//! Zones are stored behind `Arc` so a new snapshot shares every zone it did not
//! touch with the snapshot it was derived from. Zone membership is fixed at
//! construction; only a meter's occupancy and `last_seen` ever change.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static association of one meter with the zone it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterAssignment {
    /// Sensor identifier as reported on the stream (`payload.id`).
    pub meter_id: String,
    /// Zone the meter reports into.
    pub zone_id: String,
}

impl MeterAssignment {
    /// Convenience constructor.
    pub fn new(meter_id: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            meter_id: meter_id.into(),
            zone_id: zone_id.into(),
        }
    }
}

/// Occupancy of a single meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    /// No event received since process start.
    Unknown,
    /// Last report said the space is taken.
    Occupied,
    /// Last report said the space is free.
    Vacant,
}

impl Occupancy {
    /// Map a reported occupied flag onto a known state.
    #[must_use]
    pub const fn from_occupied(occupied: bool) -> Self {
        if occupied {
            Self::Occupied
        } else {
            Self::Vacant
        }
    }

    /// `true` only for a known vacant space.
    #[must_use]
    pub const fn is_vacant(self) -> bool {
        matches!(self, Self::Vacant)
    }
}

/// Last-known state of one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meter {
    id: String,
    occupancy: Occupancy,
    last_seen: Option<DateTime<Utc>>,
}

impl Meter {
    /// A meter that has not reported yet.
    pub fn unseen(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            occupancy: Occupancy::Unknown,
            last_seen: None,
        }
    }

    /// A meter with a known report.
    pub fn observed(id: impl Into<String>, occupied: bool, last_seen: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            occupancy: Occupancy::from_occupied(occupied),
            last_seen: Some(last_seen),
        }
    }

    /// Meter identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current occupancy; `Unknown` until the first report.
    #[must_use]
    pub const fn occupancy(&self) -> Occupancy {
        self.occupancy
    }

    /// Ingest time of the last applied report.
    #[must_use]
    pub const fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// `true` when the meter already holds exactly this reading.
    #[must_use]
    pub fn matches(&self, occupied: bool, at: DateTime<Utc>) -> bool {
        self.occupancy == Occupancy::from_occupied(occupied) && self.last_seen == Some(at)
    }

    /// Overwrite the reading. Returns `false` when it was already identical.
    pub(crate) fn record(&mut self, occupied: bool, at: DateTime<Utc>) -> bool {
        if self.matches(occupied, at) {
            return false;
        }
        self.occupancy = Occupancy::from_occupied(occupied);
        self.last_seen = Some(at);
        true
    }
}

/// A parking zone and its fixed set of meters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    id: String,
    meters: HashMap<String, Meter>,
}

impl Zone {
    /// Build a zone from its meters. Duplicate meter ids keep the last entry.
    pub fn new(id: impl Into<String>, meters: impl IntoIterator<Item = Meter>) -> Self {
        Self {
            id: id.into(),
            meters: meters.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Zone identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Look up one meter.
    #[must_use]
    pub fn meter(&self, meter_id: &str) -> Option<&Meter> {
        self.meters.get(meter_id)
    }

    /// Iterate the zone's meters in no particular order.
    pub fn meters(&self) -> impl Iterator<Item = &Meter> {
        self.meters.values()
    }

    /// Number of meters in the zone.
    #[must_use]
    pub fn len(&self) -> usize {
        self.meters.len()
    }

    /// `true` when the zone has no meters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    pub(crate) fn meter_mut(&mut self, meter_id: &str) -> Option<&mut Meter> {
        self.meters.get_mut(meter_id)
    }
}

/// Immutable-by-convention mapping of zone id to zone.
///
/// Cloning is cheap: it copies the zone map's `Arc` pointers, not the zones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingIndex {
    zones: HashMap<String, Arc<Zone>>,
}

impl TrackingIndex {
    /// Build an index directly from zones.
    pub fn from_zones(zones: impl IntoIterator<Item = Zone>) -> Self {
        Self {
            zones: zones
                .into_iter()
                .map(|z| (z.id.clone(), Arc::new(z)))
                .collect(),
        }
    }

    /// Look up one zone.
    #[must_use]
    pub fn zone(&self, zone_id: &str) -> Option<&Zone> {
        self.zones.get(zone_id).map(AsRef::as_ref)
    }

    /// Iterate all zones in no particular order.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values().map(AsRef::as_ref)
    }

    /// Iterate zone ids.
    pub fn zone_ids(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    /// Number of zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// `true` when no zones are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// `true` when both indices share the same allocation for `zone_id`.
    #[must_use]
    pub fn shares_zone_with(&self, other: &Self, zone_id: &str) -> bool {
        match (self.zones.get(zone_id), other.zones.get(zone_id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Mutable access to one zone, copying it first if a prior snapshot still
    /// holds it.
    pub(crate) fn zone_mut(&mut self, zone_id: &str) -> Option<&mut Zone> {
        self.zones.get_mut(zone_id).map(Arc::make_mut)
    }
}

/// Reverse lookup from meter id to zone id. Built once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeterIndex {
    zone_by_meter: HashMap<String, String>,
}

impl MeterIndex {
    /// Zone a meter belongs to, if it is tracked.
    #[must_use]
    pub fn zone_of(&self, meter_id: &str) -> Option<&str> {
        self.zone_by_meter.get(meter_id).map(String::as_str)
    }

    /// Number of tracked meters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zone_by_meter.len()
    }

    /// `true` when no meters are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zone_by_meter.is_empty()
    }
}

/// Build the meter index and the initial tracking index from static
/// assignments. Every meter starts unseen.
///
/// A meter listed more than once is placed only in the zone of its last entry.
#[must_use]
pub fn build_indices(assignments: &[MeterAssignment]) -> (TrackingIndex, MeterIndex) {
    let zone_by_meter: HashMap<String, String> = assignments
        .iter()
        .map(|a| (a.meter_id.clone(), a.zone_id.clone()))
        .collect();

    let mut grouped: HashMap<&str, Vec<Meter>> = HashMap::new();
    for (meter_id, zone_id) in &zone_by_meter {
        grouped
            .entry(zone_id.as_str())
            .or_default()
            .push(Meter::unseen(meter_id.clone()));
    }

    let index = TrackingIndex::from_zones(
        grouped
            .into_iter()
            .map(|(zone_id, meters)| Zone::new(zone_id, meters)),
    );

    (index, MeterIndex { zone_by_meter })
}
