//! Tracking index, event reduction, and availability.

pub mod availability;
pub mod error;
pub mod index;
pub mod protocol;
pub mod reducer;
pub mod snapshot;

pub use availability::{
    all_availability, availability, availability_with, round4, StalenessPolicy,
    DEFAULT_STALENESS_SECS,
};
pub use error::{AppResult, ConfigError, StreamError, StreamResult};
pub use index::{build_indices, Meter, MeterAssignment, MeterIndex, Occupancy, TrackingIndex, Zone};
pub use protocol::{
    decode_frame, decode_frames, decode_prefix, DecodedPrefix, JoinMessage, OccupancyUpdate,
    StreamEvent,
};
pub use reducer::{apply, reduce, ReduceOutcome};
pub use snapshot::SnapshotCell;
