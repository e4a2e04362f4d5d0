//! Stream runtime: connection lifecycle, backoff, and the provider facade.

pub mod api;
pub mod backoff;
pub mod connection;
pub mod provider;
pub mod tokio_spawner;

pub use api::{health, overlay_known_availability, AvailabilityReport, Health};
pub use backoff::Backoff;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStats, ConnectionStatus};
pub use provider::{AvailabilityProvider, StreamHandle};
pub use tokio_spawner::{Spawn, TokioSpawner};
