//! Error types for stream ingestion and configuration.

use thiserror::Error;

/// Errors that abort one connection cycle of the stream.
///
/// None of these are fatal: the connection manager logs them and retries
/// the full connect/subscribe/stream cycle after a backoff delay.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Opening the websocket failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// Opening the websocket did not finish in time.
    #[error("connect timed out after {0}s")]
    ConnectTimeout(u64),
    /// Sending or receiving on an open connection failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// An inbound frame could not be decoded into a stream event.
    #[error("decode error: {0}")]
    Decode(String),
    /// The server closed the connection or the stream ended.
    #[error("stream closed: {0}")]
    Closed(String),
    /// The blocking reduce worker panicked or was cancelled.
    #[error("reduce worker failed: {0}")]
    Worker(String),
    /// A stream task is already running for this provider.
    #[error("stream already started")]
    AlreadyStarted,
}

/// Result alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value outside its accepted range.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The configuration document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
    /// A referenced file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
