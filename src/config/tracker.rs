//! Tracker and stream configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{ConfigError, MeterAssignment, StalenessPolicy, DEFAULT_STALENESS_SECS};

/// Production occupancy stream endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://streams.smartcolumbusos.com/socket/websocket";
/// Dataset whose streaming topic is joined.
pub const DEFAULT_DATASET: &str = "fybr__short_north_parking_occupancy";

const ENV_ENDPOINT: &str = "OCCUPANCY_STREAM_ENDPOINT";
const ENV_DATASET: &str = "OCCUPANCY_STREAM_DATASET";
const ENV_STALENESS_SECS: &str = "OCCUPANCY_STALENESS_SECS";
const ENV_BACKOFF_MAX_SECS: &str = "OCCUPANCY_BACKOFF_MAX_SECS";
const ENV_METERS_FILE: &str = "OCCUPANCY_METERS_FILE";

/// Reconnect backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in seconds.
    pub max_delay_secs: u64,
    /// Growth factor applied per consecutive failure.
    pub multiplier: f64,
    /// Randomize each delay uniformly in `[delay / 2, delay]`.
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_secs: 60,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl BackoffConfig {
    /// Delay before the first retry.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Cap on any single delay.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    /// Validate backoff values.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` on a zero delay or a multiplier below 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay_ms == 0 {
            return Err(ConfigError::Invalid("initial_delay_ms must be greater than 0".into()));
        }
        if self.max_delay_secs == 0 {
            return Err(ConfigError::Invalid("max_delay_secs must be greater than 0".into()));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid("multiplier must be a finite value >= 1.0".into()));
        }
        Ok(())
    }
}

/// Connection settings for the occupancy stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Websocket URL (`ws://` or `wss://`).
    pub endpoint: String,
    /// Dataset name; the joined topic is `streaming:<dataset>`.
    pub dataset: String,
    /// Seconds allowed for opening the connection.
    pub connect_timeout_secs: u64,
    /// Most frames reduced together in one batch.
    pub max_batch: usize,
    /// Reconnect backoff.
    pub backoff: BackoffConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            connect_timeout_secs: 30,
            max_batch: 64,
            backoff: BackoffConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Stream settings for a specific endpoint, defaults elsewhere.
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate stream values.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for a non-websocket endpoint, an empty
    /// dataset, or zero timeout/batch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint `{}` must use ws:// or wss://",
                self.endpoint
            )));
        }
        if self.dataset.trim().is_empty() {
            return Err(ConfigError::Invalid("dataset must not be empty".into()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid("connect_timeout_secs must be greater than 0".into()));
        }
        if self.max_batch == 0 {
            return Err(ConfigError::Invalid("max_batch must be greater than 0".into()));
        }
        self.backoff.validate()
    }
}

/// Root configuration of the occupancy tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Stream connection settings.
    #[serde(default)]
    pub stream: StreamConfig,
    /// Static meter → zone membership.
    pub meters: Vec<MeterAssignment>,
    /// Staleness window in seconds.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
}

const fn default_staleness_secs() -> u64 {
    DEFAULT_STALENESS_SECS
}

impl TrackerConfig {
    /// Configuration with default stream settings for the given meters.
    #[must_use]
    pub fn new(stream: StreamConfig, meters: Vec<MeterAssignment>) -> Self {
        Self {
            stream,
            meters,
            staleness_secs: DEFAULT_STALENESS_SECS,
        }
    }

    /// Staleness policy derived from `staleness_secs`.
    #[must_use]
    pub const fn staleness(&self) -> StalenessPolicy {
        StalenessPolicy::new(self.staleness_secs)
    }

    /// Validate all sections.
    ///
    /// An empty meter list is allowed: the tracker then reports nothing.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for any invalid section or blank ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.validate()?;
        if self.staleness_secs == 0 {
            return Err(ConfigError::Invalid("staleness_secs must be greater than 0".into()));
        }
        if let Some(bad) = self
            .meters
            .iter()
            .find(|m| m.meter_id.trim().is_empty() || m.zone_id.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "meter assignment has blank id: {bad:?}"
            )));
        }
        Ok(())
    }

    /// Parse tracker configuration from a JSON string and validate.
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, loading `.env` first.
    ///
    /// Unset variables keep their defaults; the meter list is read from the
    /// JSON file named by `OCCUPANCY_METERS_FILE` and is empty when unset.
    ///
    /// # Errors
    /// Returns `ConfigError` for unparseable values, an unreadable meter file,
    /// or an invalid result.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TrackerConfig::from_env`] over an arbitrary key lookup.
    ///
    /// # Errors
    /// See [`TrackerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut stream = StreamConfig::default();
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            stream.endpoint = endpoint;
        }
        if let Some(dataset) = lookup(ENV_DATASET) {
            stream.dataset = dataset;
        }
        if let Some(raw) = lookup(ENV_BACKOFF_MAX_SECS) {
            stream.backoff.max_delay_secs = parse_number(ENV_BACKOFF_MAX_SECS, &raw)?;
        }

        let staleness_secs = match lookup(ENV_STALENESS_SECS) {
            Some(raw) => parse_number(ENV_STALENESS_SECS, &raw)?,
            None => DEFAULT_STALENESS_SECS,
        };

        let meters = match lookup(ENV_METERS_FILE) {
            Some(path) => load_meter_list(Path::new(&path))?,
            None => Vec::new(),
        };

        let cfg = Self {
            stream,
            meters,
            staleness_secs,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Read a JSON array of `{meter_id, zone_id}` objects.
///
/// # Errors
/// Returns `ConfigError::Io` or `ConfigError::Parse`.
pub fn load_meter_list(path: &Path) -> Result<Vec<MeterAssignment>, ConfigError> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data)
        .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::Parse(format!("{key}=`{raw}`: {e}")))
}
