//! Tracing subscriber setup.

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Emit JSON lines instead of the human format.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
        }
    }
}

/// Errors from logging setup.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// Install the global tracing subscriber.
///
/// Call once from `main`; a second call fails.
pub fn init(config: &LogConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let result = if config.json {
        tracing::subscriber::set_global_default(
            fmt::Subscriber::builder()
                .with_env_filter(filter)
                .json()
                .finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            fmt::Subscriber::builder().with_env_filter(filter).finish(),
        )
    };

    result.map_err(|e| TelemetryError::Subscriber(e.to_string()))
}
