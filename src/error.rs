//! Error types shared across the crate

use thiserror::Error;

use crate::sensors::SensorKey;

/// Configuration rejected before the first poll
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("sensor range for {key} is degenerate: min {min} must be below max {max}")]
    DegenerateRange { key: SensorKey, min: f64, max: f64 },

    #[error("sensor range for {key} has a non-finite bound ({min}, {max})")]
    NonFiniteRange { key: SensorKey, min: f64, max: f64 },

    #[error("sensor {0} is configured twice")]
    DuplicateSensor(SensorKey),

    #[error("{0}")]
    UnknownSensor(String),

    #[error("no sensors configured")]
    NoSensors,

    #[error("grid must have at least one row and one column (got {rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },

    #[error("poll interval must be at least one second")]
    ZeroInterval,

    #[error("request timeout must be at least one second")]
    ZeroTimeout,

    #[error("invalid {curve} curve: floor {floor} and span {span} must be finite and non-negative")]
    InvalidCurve {
        curve: &'static str,
        floor: f64,
        span: f64,
    },

    #[error("invalid colour '{0}': expected #rrggbb")]
    InvalidColor(String),
}

/// One failed poll cycle
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("response is not JSON (content-type {content_type:?}): {preview}")]
    NotJson {
        content_type: Option<String>,
        preview: String,
    },

    #[error("response body is not valid JSON: {0}")]
    Parse(String),

    #[error("expected a JSON array, got {kind}: {preview}")]
    NotArray { kind: &'static str, preview: String },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}
