//! # Occupancy Stream
//!
//! A real-time parking occupancy stream processor.
//!
//! The crate keeps a persistent websocket subscription to a sensor occupancy
//! feed, folds every inbound event into a per-zone tracking index, and answers
//! "how many spaces are free right now" for each zone. A zone's figure is only
//! reported when every one of its meters has been heard from recently.
//!
//! ## Core Problem Solved
//!
//! - **Unreliable upstream**: the stream drops, stalls, and sends garbage. The
//!   connection manager retries forever with capped exponential backoff.
//! - **Concurrent readers**: queries run while events are applied. Each batch
//!   produces a new immutable snapshot published by pointer swap, so a reader
//!   never sees a half-applied batch.
//! - **Trustworthy output**: one silent or stale meter invalidates its whole
//!   zone rather than surfacing a partial estimate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use occupancy_stream::config::{StreamConfig, TrackerConfig};
//! use occupancy_stream::core::MeterAssignment;
//! use occupancy_stream::runtime::{AvailabilityProvider, TokioSpawner};
//!
//! let config = TrackerConfig::new(
//!     StreamConfig::default(),
//!     vec![
//!         MeterAssignment::new("9861", "0001"),
//!         MeterAssignment::new("9862", "0001"),
//!     ],
//! );
//! let provider = AvailabilityProvider::new(config)?;
//! let handle = provider.start(&TokioSpawner::current())?;
//!
//! // Any time later, from any task:
//! let live = provider.current_availability();
//!
//! handle.shutdown().await;
//! ```
//!
//! For complete examples, see:
//! - `tests/stream_integration_test.rs` - end-to-end runs against a local websocket server

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Tracking index, event reduction, availability, and snapshot publication.
pub mod core;
/// Configuration models for the stream, backoff, and meter layout.
pub mod config;
/// Connection lifecycle, backoff, and the provider facade.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
