//! Structured debug logging setup

use crate::DiagnosticsError;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber
#[derive(Debug, Clone)]
pub struct DebugLogger {
    default_filter: String,
}

impl DebugLogger {
    /// Logger falling back to `default_filter` when `RUST_LOG` is unset
    pub fn new(default_filter: impl Into<String>) -> Self {
        Self {
            default_filter: default_filter.into(),
        }
    }

    /// Filter applied when `RUST_LOG` is unset
    pub fn default_filter(&self) -> &str {
        &self.default_filter
    }

    /// Build the filter: `RUST_LOG` if set and valid, the default otherwise
    pub fn env_filter(&self) -> Result<EnvFilter, DiagnosticsError> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_filter))
            .map_err(|e| DiagnosticsError::LoggingInit {
                reason: e.to_string(),
            })
    }

    /// Install a formatting subscriber for the whole process
    pub fn install(&self) -> Result<(), DiagnosticsError> {
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter()?)
            .with_target(true)
            .try_init()
            .map_err(|e| DiagnosticsError::LoggingInit {
                reason: e.to_string(),
            })
    }

    /// Install a subscriber that writes through the test harness capture.
    /// Safe to call from every test; later calls are ignored.
    pub fn install_for_tests(&self) {
        if let Ok(filter) = self.env_filter() {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_test_writer()
                .try_init();
        }
    }

    /// Initialize logging with `default_filter` unless `RUST_LOG` overrides it
    pub fn init_logging(default_filter: &str) -> Result<(), DiagnosticsError> {
        Self::new(default_filter).install()
    }
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new("info")
    }
}
