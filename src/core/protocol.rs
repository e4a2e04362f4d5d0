//! Wire format of the occupancy stream.
//!
//! The server speaks Phoenix channels over a websocket: a client joins a topic
//! with a `phx_join` message and then receives `{event, payload}` frames. Only
//! `update` frames carry occupancy; everything else (join replies, presence
//! diffs) is accepted and ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::index::MeterIndex;
use crate::core::{StreamError, StreamResult};
use crate::util::clock::parse_ingest_timestamp;

/// Event name of occupancy updates.
pub const UPDATE_EVENT: &str = "update";
/// Occupancy token meaning the space is taken. Matched case-sensitively.
pub const OCCUPIED_TOKEN: &str = "OCCUPIED";
/// Prefix of every streaming topic.
pub const TOPIC_PREFIX: &str = "streaming:";

/// Subscription message sent once right after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinMessage {
    /// `streaming:<dataset>`.
    pub topic: String,
    /// Always `phx_join`.
    pub event: &'static str,
    /// Always an empty object.
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// Message reference; the stream only ever needs one.
    #[serde(rename = "ref")]
    pub reference: &'static str,
}

impl JoinMessage {
    /// Join message for a dataset's streaming topic.
    pub fn for_dataset(dataset: &str) -> Self {
        Self {
            topic: format!("{TOPIC_PREFIX}{dataset}"),
            event: "phx_join",
            payload: serde_json::Map::new(),
            reference: "1",
        }
    }

    /// Serialize to the text frame sent on the wire.
    ///
    /// # Errors
    /// Returns `StreamError::Transport` if serialization fails.
    pub fn to_frame(&self) -> StreamResult<String> {
        serde_json::to_string(self).map_err(|e| StreamError::Transport(e.to_string()))
    }
}

/// Occupancy report for one meter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyUpdate {
    /// Sensor identifier.
    pub meter_id: String,
    /// `true` iff the reported token was exactly `OCCUPIED`.
    pub occupied: bool,
    /// Ingest time normalized to UTC.
    pub time_of_ingest: DateTime<Utc>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An occupancy report for a tracked meter.
    Update(OccupancyUpdate),
    /// An update for a meter outside the meter index. Its reading is never
    /// inspected.
    Untracked(String),
    /// Any other event kind, kept only for logging.
    Ignored(String),
}

impl StreamEvent {
    /// Shorthand for an update event.
    pub fn update(meter_id: impl Into<String>, occupied: bool, time_of_ingest: DateTime<Utc>) -> Self {
        Self::Update(OccupancyUpdate {
            meter_id: meter_id.into(),
            occupied,
            time_of_ingest,
        })
    }
}

#[derive(Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct UpdatePayload {
    id: String,
    #[serde(default)]
    occupancy: Option<serde_json::Value>,
    #[serde(default)]
    time_of_ingest: Option<serde_json::Value>,
}

impl UpdatePayload {
    fn required_str<'a>(&self, field: &str, value: Option<&'a serde_json::Value>) -> StreamResult<&'a str> {
        value.and_then(serde_json::Value::as_str).ok_or_else(|| {
            StreamError::Decode(format!("update for meter {} has no string `{field}`", self.id))
        })
    }
}

/// Decode one text frame.
///
/// Only `payload.id` is read before the meter is looked up in `meters`; an
/// update for an untracked meter decodes to [`StreamEvent::Untracked`]
/// whatever the rest of its payload holds.
///
/// # Errors
/// Returns `StreamError::Decode` for invalid JSON, a missing `event`, an
/// `update` without `id`, or a tracked meter's update without a string
/// `occupancy` or a parseable `time_of_ingest`.
pub fn decode_frame(text: &str, meters: &MeterIndex) -> StreamResult<StreamEvent> {
    let frame: InboundFrame =
        serde_json::from_str(text).map_err(|e| StreamError::Decode(e.to_string()))?;

    if frame.event != UPDATE_EVENT {
        return Ok(StreamEvent::Ignored(frame.event));
    }

    let payload: UpdatePayload = serde_json::from_value(frame.payload)
        .map_err(|e| StreamError::Decode(format!("update payload: {e}")))?;
    if meters.zone_of(&payload.id).is_none() {
        return Ok(StreamEvent::Untracked(payload.id));
    }

    let occupancy = payload.required_str("occupancy", payload.occupancy.as_ref())?;
    let raw_time = payload.required_str("time_of_ingest", payload.time_of_ingest.as_ref())?;
    let time_of_ingest = parse_ingest_timestamp(raw_time).ok_or_else(|| {
        StreamError::Decode(format!(
            "unparseable time_of_ingest `{raw_time}` for meter {}",
            payload.id
        ))
    })?;

    Ok(StreamEvent::Update(OccupancyUpdate {
        occupied: occupancy == OCCUPIED_TOKEN,
        meter_id: payload.id,
        time_of_ingest,
    }))
}

/// Decode a batch of frames, failing on the first bad one.
///
/// # Errors
/// Propagates the first `decode_frame` error.
pub fn decode_frames<S: AsRef<str>>(frames: &[S], meters: &MeterIndex) -> StreamResult<Vec<StreamEvent>> {
    frames.iter().map(|f| decode_frame(f.as_ref(), meters)).collect()
}

/// Events decoded from the front of a batch, up to the first bad frame.
#[derive(Debug)]
pub struct DecodedPrefix {
    /// Events of every frame before the first bad one, in order.
    pub events: Vec<StreamEvent>,
    /// The first decode error, if any frame was bad.
    pub error: Option<StreamError>,
}

/// Decode frames in order and stop at the first bad one, keeping the events
/// decoded before it.
pub fn decode_prefix<S: AsRef<str>>(frames: &[S], meters: &MeterIndex) -> DecodedPrefix {
    let mut events = Vec::with_capacity(frames.len());
    for frame in frames {
        match decode_frame(frame.as_ref(), meters) {
            Ok(event) => events.push(event),
            Err(error) => {
                return DecodedPrefix {
                    events,
                    error: Some(error),
                }
            }
        }
    }
    DecodedPrefix { events, error: None }
}
