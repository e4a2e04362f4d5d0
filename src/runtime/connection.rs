//! Connection manager: the single writer of tracking snapshots.
//!
//! One cycle is `Connecting → Subscribed → Streaming`. Any error ends the
//! cycle, moves the state back to `Disconnected`, and schedules the next
//! cycle after a backoff delay. Attempts are unbounded; the loop only exits
//! when the shutdown signal fires, which is checked at every blocking await.
//!
//! Frames already received when a cycle fails are reduced and published
//! before the error is reported, up to the first frame that fails to decode.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{FutureExt, Sink, SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::core::{
    decode_prefix, reduce, JoinMessage, MeterIndex, ReduceOutcome, SnapshotCell, StreamError,
    StreamResult,
};
use crate::runtime::backoff::Backoff;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;

/// Lifecycle state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection; either not started yet or waiting out a backoff delay.
    Disconnected,
    /// Opening the websocket.
    Connecting,
    /// Join message sent; no event received yet.
    Subscribed,
    /// Events are arriving and being applied.
    Streaming,
    /// Shut down; terminal.
    Cancelled,
}

/// Point-in-time copy of the connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// Connection cycles started.
    pub connect_attempts: u64,
    /// Join messages successfully sent.
    pub subscriptions: u64,
    /// Text frames received.
    pub frames_received: u64,
    /// Batches reduced and published.
    pub batches_applied: u64,
    /// Cycles that ended in an error.
    pub failures: u64,
}

/// Shared, lock-cheap view of the manager's state and counters.
#[derive(Debug)]
pub struct ConnectionStatus {
    state: RwLock<ConnectionState>,
    connect_attempts: AtomicU64,
    subscriptions: AtomicU64,
    frames_received: AtomicU64,
    batches_applied: AtomicU64,
    failures: AtomicU64,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            connect_attempts: AtomicU64::new(0),
            subscriptions: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            batches_applied: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }
}

impl ConnectionStatus {
    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Snapshot of all counters.
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            subscriptions: self.subscriptions.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            batches_applied: self.batches_applied.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn transition(&self, next: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "connection state changed");
        }
    }
}

/// Resolves once shutdown is requested or the signalling side is dropped.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Owns the websocket lifecycle and publishes every reduced batch.
pub struct ConnectionManager {
    config: StreamConfig,
    meters: Arc<MeterIndex>,
    snapshots: Arc<SnapshotCell>,
    status: Arc<ConnectionStatus>,
    backoff: Backoff,
}

impl ConnectionManager {
    /// Create a manager writing into `snapshots`.
    pub fn new(config: StreamConfig, meters: Arc<MeterIndex>, snapshots: Arc<SnapshotCell>) -> Self {
        let backoff = Backoff::new(config.backoff.clone());
        Self {
            config,
            meters,
            snapshots,
            status: Arc::new(ConnectionStatus::default()),
            backoff,
        }
    }

    /// Share an existing status handle instead of a private one.
    #[must_use]
    pub fn with_status(mut self, status: Arc<ConnectionStatus>) -> Self {
        self.status = status;
        self
    }

    /// Handle for observing state and counters while the manager runs.
    pub fn status(&self) -> Arc<ConnectionStatus> {
        Arc::clone(&self.status)
    }

    /// Run connect/subscribe/stream cycles until `shutdown` fires.
    ///
    /// Never returns otherwise. Errors are logged and retried with backoff.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            endpoint = %self.config.endpoint,
            dataset = %self.config.dataset,
            "occupancy stream starting"
        );

        while !*shutdown.borrow() {
            let err = match self.run_cycle(&mut shutdown).await {
                Ok(()) => break,
                Err(err) => err,
            };

            self.status.transition(ConnectionState::Disconnected);
            self.status.failures.fetch_add(1, Ordering::Relaxed);
            let delay = self.backoff.next_delay();
            warn!(
                attempt = self.backoff.attempt(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "occupancy stream cycle failed; backing off"
            );

            tokio::select! {
                () = cancelled(&mut shutdown) => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.status.transition(ConnectionState::Cancelled);
        info!("occupancy stream stopped");
    }

    /// One full cycle. `Ok(())` means shutdown was requested mid-cycle.
    async fn run_cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> StreamResult<()> {
        self.status.transition(ConnectionState::Connecting);
        self.status.connect_attempts.fetch_add(1, Ordering::Relaxed);
        debug!(endpoint = %self.config.endpoint, "connecting");

        let connect = tokio::time::timeout(
            self.config.connect_timeout(),
            connect_async(self.config.endpoint.as_str()),
        );
        let ws = tokio::select! {
            () = cancelled(shutdown) => return Ok(()),
            result = connect => match result {
                Err(_) => return Err(StreamError::ConnectTimeout(self.config.connect_timeout_secs)),
                Ok(Err(e)) => return Err(StreamError::Connect(e.to_string())),
                Ok(Ok((ws, _response))) => ws,
            },
        };

        let (mut write, mut read) = ws.split();

        let join = JoinMessage::for_dataset(&self.config.dataset);
        if !send_or_cancel(&mut write, Message::Text(join.to_frame()?), shutdown).await? {
            close(write).await;
            return Ok(());
        }
        self.status.transition(ConnectionState::Subscribed);
        self.status.subscriptions.fetch_add(1, Ordering::Relaxed);
        info!(topic = %join.topic, "joined occupancy topic");

        loop {
            let first = tokio::select! {
                () = cancelled(shutdown) => {
                    close(write).await;
                    return Ok(());
                }
                message = read.next() => message,
            };

            let mut frames = Vec::new();
            collect_frame(first, &mut frames)?;
            // A close or error behind buffered frames ends the cycle only
            // after those frames are applied.
            let mut terminal = None;
            while frames.len() < self.config.max_batch {
                let Some(message) = read.next().now_or_never() else {
                    break;
                };
                if let Err(err) = collect_frame(message, &mut frames) {
                    terminal = Some(err);
                    break;
                }
            }

            if !frames.is_empty() {
                self.status.transition(ConnectionState::Streaming);
                self.status
                    .frames_received
                    .fetch_add(frames.len() as u64, Ordering::Relaxed);

                let batch = tokio::select! {
                    () = cancelled(shutdown) => {
                        close(write).await;
                        return Ok(());
                    }
                    batch = self.reduce_batch(frames) => batch?,
                };
                let clean = batch.error.is_none() && terminal.is_none();
                self.publish(&batch.outcome, clean);
                if let Some(err) = batch.error {
                    return Err(err);
                }
            }

            if let Some(err) = terminal {
                return Err(err);
            }
        }
    }

    /// Decode and reduce on the blocking pool against the current snapshot.
    ///
    /// Frames before the first undecodable one are still reduced.
    async fn reduce_batch(&self, frames: Vec<String>) -> StreamResult<ReducedBatch> {
        let snapshot = self.snapshots.load();
        let meters = Arc::clone(&self.meters);
        tokio::task::spawn_blocking(move || {
            let decoded = decode_prefix(&frames, &meters);
            ReducedBatch {
                outcome: reduce(&snapshot, &meters, &decoded.events),
                error: decoded.error,
            }
        })
        .await
        .map_err(|e| StreamError::Worker(e.to_string()))
    }

    /// Publish a reduced batch. Backoff only resets when the whole batch
    /// went through.
    fn publish(&mut self, outcome: &ReduceOutcome, clean: bool) {
        if outcome.is_changed() {
            let generation = self.snapshots.publish(outcome.index.clone());
            debug!(
                generation,
                changed = outcome.changed,
                untracked = outcome.untracked,
                ignored = outcome.ignored,
                "published occupancy snapshot"
            );
        }
        self.status.batches_applied.fetch_add(1, Ordering::Relaxed);
        if clean {
            self.backoff.reset();
        }
    }
}

struct ReducedBatch {
    outcome: ReduceOutcome,
    error: Option<StreamError>,
}

/// Sort one received message into the batch, or turn it into a cycle error.
fn collect_frame(
    message: Option<Result<Message, tungstenite::Error>>,
    frames: &mut Vec<String>,
) -> StreamResult<()> {
    match message {
        None => Err(StreamError::Closed("end of stream".into())),
        Some(Err(e)) => Err(StreamError::Transport(e.to_string())),
        Some(Ok(Message::Text(text))) => {
            frames.push(text);
            Ok(())
        }
        Some(Ok(Message::Close(frame))) => Err(StreamError::Closed(
            frame.map_or_else(|| "close frame".to_string(), |f| f.to_string()),
        )),
        Some(Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
            Ok(())
        }
    }
}

/// Send one message unless shutdown fires first. `Ok(false)` means cancelled.
async fn send_or_cancel<S>(
    write: &mut S,
    message: Message,
    shutdown: &mut watch::Receiver<bool>,
) -> StreamResult<bool>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    tokio::select! {
        () = cancelled(shutdown) => Ok(false),
        sent = write.send(message) => sent
            .map(|()| true)
            .map_err(|e| StreamError::Transport(e.to_string())),
    }
}

async fn close(mut write: WsSink) {
    if let Err(e) = write.close().await {
        debug!(error = %e, "error closing occupancy stream");
    }
}
