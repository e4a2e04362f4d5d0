//! API-facing response models and the prediction overlay.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runtime::connection::{ConnectionState, ConnectionStats};

/// Live availability payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    /// Instant the availability was computed for.
    pub as_of: DateTime<Utc>,
    /// Zone id → vacant ratio, valid zones only, sorted by zone id.
    pub zones: BTreeMap<String, f64>,
}

impl AvailabilityReport {
    /// Build a report from a query result.
    #[must_use]
    pub fn new(as_of: DateTime<Utc>, zones: HashMap<String, f64>) -> Self {
        Self {
            as_of,
            zones: zones.into_iter().collect(),
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// `true` while events are flowing.
    pub ok: bool,
    /// Connection state.
    pub state: ConnectionState,
    /// Connection counters.
    pub stats: ConnectionStats,
}

/// Return a health payload for the given connection status.
#[must_use]
pub fn health(state: ConnectionState, stats: ConnectionStats) -> Health {
    Health {
        ok: state == ConnectionState::Streaming,
        state,
        stats,
    }
}

/// Replace predicted availability with live values for zones present in
/// both maps. Zones only present in `live` are not added. Returns the number
/// of predictions overridden.
pub fn overlay_known_availability(
    predictions: &mut HashMap<String, f64>,
    live: &HashMap<String, f64>,
) -> usize {
    let mut replaced = 0;
    for (zone_id, predicted) in predictions.iter_mut() {
        if let Some(known) = live.get(zone_id) {
            *predicted = *known;
            replaced += 1;
        }
    }
    replaced
}
