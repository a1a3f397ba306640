//! Store and runtime configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{
    error::{CoreError, CoreResult},
    roster::DEFAULT_HASH_COST,
};

/// Bounded retry used when polling for schema changes to become visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Number of checks before giving up.
    pub attempts: u32,
    /// Delay between checks in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay between checks.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Settings for opening a [`crate::store::Store`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Schema visibility polling.
    pub schema_retry: RetryPolicy,
    /// bcrypt work factor for stored credentials.
    pub hash_cost: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
            schema_retry: RetryPolicy::default(),
            hash_cost: DEFAULT_HASH_COST,
        }
    }
}

/// Settings for the single-writer runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the command queue.
    pub command_queue_bound: usize,
    /// Capacity of the publication broadcast channel.
    pub publication_capacity: usize,
    /// Run a publish cycle after each successful mutation.
    pub publish_after_mutation: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            publication_capacity: 1024,
            publish_after_mutation: true,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClubConfig {
    /// Store settings.
    pub store: StoreConfig,
    /// Runtime settings.
    pub runtime: RuntimeConfig,
}

impl ClubConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!("could not read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }
}
