//! Configuration models for the stream connection, backoff, and meter layout.

pub mod tracker;

pub use tracker::{
    load_meter_list, BackoffConfig, StreamConfig, TrackerConfig, DEFAULT_DATASET, DEFAULT_ENDPOINT,
};
