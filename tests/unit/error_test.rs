//! Tests for error types

use occupancy_stream::core::{ConfigError, StreamError};

#[test]
fn test_connect_error() {
    let err = StreamError::Connect("connection refused".to_string());
    assert_eq!(format!("{}", err), "connect failed: connection refused");
}

#[test]
fn test_connect_timeout_error() {
    let err = StreamError::ConnectTimeout(30);
    assert_eq!(format!("{}", err), "connect timed out after 30s");
}

#[test]
fn test_decode_error() {
    let err = StreamError::Decode("expected value at line 1 column 1".to_string());
    assert_eq!(
        format!("{}", err),
        "decode error: expected value at line 1 column 1"
    );
}

#[test]
fn test_closed_error() {
    let err = StreamError::Closed("end of stream".to_string());
    assert_eq!(format!("{}", err), "stream closed: end of stream");
}

#[test]
fn test_already_started_error() {
    assert_eq!(format!("{}", StreamError::AlreadyStarted), "stream already started");
}

#[test]
fn test_config_errors() {
    let err = ConfigError::Invalid("dataset must not be empty".to_string());
    assert_eq!(format!("{}", err), "invalid config: dataset must not be empty");

    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "meters.json");
    let err: ConfigError = io.into();
    assert!(matches!(err, ConfigError::Io(_)));
    assert_eq!(format!("{}", err), "io error: meters.json");
}

#[test]
fn test_app_result_wraps_config_error() {
    fn load() -> occupancy_stream::core::AppResult<()> {
        let parsed: Result<(), ConfigError> = Err(ConfigError::Parse("bad json".to_string()));
        parsed?;
        Ok(())
    }
    let err = load().unwrap_err();
    assert_eq!(err.to_string(), "parse error: bad json");
}
