//! # rma-telemetry
//!
//! Logging initialisation for services embedding the query pipeline, plus an
//! in-memory [`SpanRecorder`] for asserting on pipeline spans in tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! rma_telemetry::init_telemetry("rma-api").expect("telemetry");
//! tracing::info!("ready");
//! ```
//!
//! The filter comes from `RUST_LOG` and defaults to `info`. Set
//! `RMA_LOG_FORMAT=json` (or call [`init_json`]) for one JSON object per line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub mod recorder;

pub use recorder::{RecordedSpan, SpanRecorder, SpanRecorderLayer};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "RMA_LOG_FORMAT";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// The output format name is unknown.
    #[error("unknown log format '{0}' (expected 'pretty' or 'json')")]
    UnknownFormat(String),

    /// A global subscriber is already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// A convenience result type for telemetry setup.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Console output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event, including the current span.
    Json,
}

impl LogFormat {
    /// Read the format from `RMA_LOG_FORMAT`, defaulting to [`LogFormat::Pretty`].
    pub fn from_env() -> Result<Self> {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(LogFormat::Pretty),
        }
    }
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Build the event filter from `RUST_LOG`, falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_directive).map_err(|e| TelemetryError::InvalidFilter {
        directive: default_directive.to_string(),
        message: e.to_string(),
    })
}

/// Install the global subscriber using the format from `RMA_LOG_FORMAT`.
pub fn init_telemetry(service_name: &str) -> Result<()> {
    install(service_name, LogFormat::from_env()?, None)
}

/// Install the global subscriber with JSON output.
pub fn init_json(service_name: &str) -> Result<()> {
    install(service_name, LogFormat::Json, None)
}

/// Install the global subscriber with an explicit format.
pub fn init_with_format(service_name: &str, format: LogFormat) -> Result<()> {
    install(service_name, format, None)
}

/// Install the global subscriber and also feed closed spans to `recorder`.
pub fn init_with_recorder(service_name: &str, recorder: &SpanRecorder) -> Result<()> {
    install(service_name, LogFormat::from_env()?, Some(recorder.layer()))
}

fn install(service_name: &str, format: LogFormat, recorder: Option<SpanRecorderLayer>) -> Result<()> {
    let filter = env_filter(DEFAULT_DIRECTIVE)?;
    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer().with_target(false)), None),
        LogFormat::Json => (
            None,
            Some(tracing_subscriber::fmt::layer().json().with_current_span(true).with_span_list(false)),
        ),
    };

    tracing_subscriber::registry()
        .with(recorder)
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;

    tracing::info!(service = service_name, %format, "telemetry initialised");
    Ok(())
}
