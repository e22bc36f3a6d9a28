//! Configuration types and defaults

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sourcebuf_media::SourceBufferConfig;
use std::path::Path;

/// Engine-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Configuration applied to every source buffer
    pub buffer: SourceBufferConfig,
    /// Enable debug logging
    pub debug_logging: bool,
    /// Maximum number of attached source buffers
    pub max_source_buffers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer: SourceBufferConfig::default(),
            debug_logging: false,
            max_source_buffers: 8,
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse session configuration")
    }

    /// Load a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Serialize the configuration as pretty-printed JSON
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize session configuration")
    }
}
