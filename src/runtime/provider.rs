//! Availability provider: the entry point embedding services hold on to.
//!
//! It builds the indices from configuration, owns the shared snapshot cell,
//! starts the connection manager as a background task, and answers
//! availability queries from whatever snapshot is current.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tracing::info;

use crate::config::TrackerConfig;
use crate::core::{
    all_availability, build_indices, ConfigError, MeterIndex, SnapshotCell, StalenessPolicy,
    StreamError, StreamResult, TrackingIndex,
};
use crate::runtime::api::AvailabilityReport;
use crate::runtime::connection::{ConnectionManager, ConnectionState, ConnectionStats, ConnectionStatus};
use crate::runtime::tokio_spawner::Spawn;
use crate::util::clock::now_utc;

/// Live zone availability backed by the occupancy stream.
pub struct AvailabilityProvider {
    config: TrackerConfig,
    meters: Arc<MeterIndex>,
    snapshots: Arc<SnapshotCell>,
    status: Arc<ConnectionStatus>,
    running: Arc<AtomicBool>,
}

impl AvailabilityProvider {
    /// Validate `config` and build the initial, all-unseen index.
    ///
    /// # Errors
    /// Returns the validation error of `config`.
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (index, meters) = build_indices(&config.meters);
        info!(
            zones = index.len(),
            meters = meters.len(),
            "built occupancy tracking index"
        );
        Ok(Self {
            config,
            meters: Arc::new(meters),
            snapshots: Arc::new(SnapshotCell::new(index)),
            status: Arc::new(ConnectionStatus::default()),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start the stream task on `spawner`.
    ///
    /// Only one stream task may run per provider; the slot frees up once the
    /// previous task has stopped.
    ///
    /// # Errors
    /// Returns `StreamError::AlreadyStarted` while a task is running.
    pub fn start<S: Spawn>(&self, spawner: &S) -> StreamResult<StreamHandle> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StreamError::AlreadyStarted);
        }

        let manager = ConnectionManager::new(
            self.config.stream.clone(),
            Arc::clone(&self.meters),
            Arc::clone(&self.snapshots),
        )
        .with_status(Arc::clone(&self.status));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (done_tx, done_rx) = oneshot::channel();
        let running = Arc::clone(&self.running);

        spawner.spawn(async move {
            manager.run(shutdown_rx).await;
            running.store(false, Ordering::Release);
            let _ = done_tx.send(());
        });

        Ok(StreamHandle {
            shutdown: shutdown_tx,
            done: done_rx,
        })
    }

    /// Availability of every valid zone at `now`, from one snapshot.
    pub fn get_all_availability(&self, now: DateTime<Utc>) -> HashMap<String, f64> {
        all_availability(&self.snapshots.load(), now, self.staleness())
    }

    /// Availability of every valid zone right now.
    pub fn current_availability(&self) -> HashMap<String, f64> {
        self.get_all_availability(now_utc())
    }

    /// Serializable availability payload at `now`.
    pub fn report(&self, now: DateTime<Utc>) -> AvailabilityReport {
        AvailabilityReport::new(now, self.get_all_availability(now))
    }

    /// The snapshot current at call time.
    pub fn snapshot(&self) -> Arc<TrackingIndex> {
        self.snapshots.load()
    }

    /// Snapshots published since construction.
    pub fn generation(&self) -> u64 {
        self.snapshots.generation()
    }

    /// Staleness policy in effect.
    pub const fn staleness(&self) -> StalenessPolicy {
        self.config.staleness()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.status.state()
    }

    /// Connection counters.
    pub fn stats(&self) -> ConnectionStats {
        self.status.stats()
    }

    /// `true` while a stream task is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Control handle of a running stream task.
///
/// Dropping the handle also stops the task.
pub struct StreamHandle {
    shutdown: watch::Sender<bool>,
    done: oneshot::Receiver<()>,
}

impl StreamHandle {
    /// Ask the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }

    /// Stop the task and wait until it has closed the connection.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        let _ = self.done.await;
    }
}
