//! Log levels and subscriber setup
//!
//! Configuration files speak in terms of `error`/`warn`/`info`/`debug`; this
//! module maps those onto `tracing` and installs the process subscriber.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log level as written in the configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,
    /// Errors and warnings
    Warn,
    /// Lifecycle events (default)
    #[default]
    Info,
    /// Everything
    Debug,
}

impl LogLevel {
    /// Equivalent `tracing` level
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
        }
    }

    /// Directive used when `RUST_LOG` is not set
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_directive())
    }
}

/// Install a formatting subscriber at the given level
///
/// `RUST_LOG` takes precedence over `level` when present. Returns `false` if a
/// global subscriber was already installed.
pub fn init(level: LogLevel) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

/// Emit a message of a path at a level chosen at runtime
pub fn log(level: LogLevel, path: &str, message: &str) {
    match level {
        LogLevel::Error => tracing::error!(path = %path, "{}", message),
        LogLevel::Warn => tracing::warn!(path = %path, "{}", message),
        LogLevel::Info => tracing::info!(path = %path, "{}", message),
        LogLevel::Debug => tracing::debug!(path = %path, "{}", message),
    }
}
