//! Availability calculator with staleness-aware invalidation.
//!
//! A zone's availability is the share of its meters reporting vacant. The
//! figure is only trusted when every meter in the zone has reported within
//! the staleness window; one silent or stale meter invalidates the whole zone.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::core::index::{TrackingIndex, Zone};

/// Default staleness window in seconds.
pub const DEFAULT_STALENESS_SECS: u64 = 300;

/// Freshness rule applied to every meter of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessPolicy {
    /// Maximum age of a meter's last report, in seconds.
    pub window_secs: u64,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_STALENESS_SECS,
        }
    }
}

impl StalenessPolicy {
    /// Policy with a custom window.
    #[must_use]
    pub const fn new(window_secs: u64) -> Self {
        Self { window_secs }
    }

    /// Oldest `last_seen` still considered fresh at `now`.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn zone_is_fresh(&self, zone: &Zone, now: DateTime<Utc>) -> bool {
        let cutoff = self.cutoff(now);
        zone.meters()
            .all(|m| m.last_seen().is_some_and(|seen| seen >= cutoff))
    }
}

/// Availability of `zone_id` at `now` under the default five-minute window.
#[must_use]
pub fn availability(index: &TrackingIndex, zone_id: &str, now: DateTime<Utc>) -> Option<f64> {
    availability_with(index, zone_id, now, StalenessPolicy::default())
}

/// Availability of `zone_id` at `now`, or `None` when the zone is unknown,
/// empty, or has any meter that is unseen or older than the window.
#[must_use]
pub fn availability_with(
    index: &TrackingIndex,
    zone_id: &str,
    now: DateTime<Utc>,
    policy: StalenessPolicy,
) -> Option<f64> {
    let zone = index.zone(zone_id)?;
    zone_availability(zone, now, policy)
}

fn zone_availability(zone: &Zone, now: DateTime<Utc>, policy: StalenessPolicy) -> Option<f64> {
    if zone.is_empty() || !policy.zone_is_fresh(zone, now) {
        return None;
    }
    let vacant = zone.meters().filter(|m| m.occupancy().is_vacant()).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = vacant as f64 / zone.len() as f64;
    Some(round4(ratio))
}

/// Availability of every valid zone at `now`. Invalid zones are left out.
#[must_use]
pub fn all_availability(
    index: &TrackingIndex,
    now: DateTime<Utc>,
    policy: StalenessPolicy,
) -> HashMap<String, f64> {
    index
        .zones()
        .filter_map(|zone| {
            zone_availability(zone, now, policy).map(|ratio| (zone.id().to_string(), ratio))
        })
        .collect()
}

/// Round to four decimal places, halves away from zero.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
