use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::constants::DEFAULT_DEBOUNCE_MS;
use crate::constants::DEFAULT_DOCUMENT_KEY;
use crate::constants::DEFAULT_FAULT_CHANNEL_CAPACITY;
use crate::constants::DEFAULT_RETENTION_MS;
use crate::constants::DEFAULT_SUPPRESSION_MS;
use crate::Error;
use crate::Result;

/// Timing and retention parameters of the synchronization engine
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SyncConfig {
    /// Host store key of the persisted document
    #[serde(default = "default_document_key")]
    pub document_key: String,

    /// Quiet period (milliseconds) a key must see before its pending write is performed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long (milliseconds) change notifications are ignored after a self-issued write
    ///
    /// Should exceed the host's notification latency.
    #[serde(default = "default_suppression_ms")]
    pub suppression_ms: u64,

    /// Retention horizon for fresh documents and for persisted documents that do not
    /// carry one. `0` disables pruning.
    #[serde(default = "default_retention_ms")]
    pub default_retention_ms: u64,

    /// Buffered faults per subscriber before the oldest are dropped
    #[serde(default = "default_fault_channel_capacity")]
    pub fault_channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            document_key: default_document_key(),
            debounce_ms: default_debounce_ms(),
            suppression_ms: default_suppression_ms(),
            default_retention_ms: default_retention_ms(),
            fault_channel_capacity: default_fault_channel_capacity(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.document_key.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "document_key must not be empty".into(),
            )));
        }
        if self.debounce_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "debounce_ms must be greater than 0".into(),
            )));
        }
        if self.suppression_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "suppression_ms must be greater than 0".into(),
            )));
        }
        if self.fault_channel_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "fault_channel_capacity must be greater than 0".into(),
            )));
        }
        if self.suppression_ms < self.debounce_ms {
            warn!(
                suppression_ms = self.suppression_ms,
                debounce_ms = self.debounce_ms,
                "suppression window is shorter than the debounce interval"
            );
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn suppression(&self) -> Duration {
        Duration::from_millis(self.suppression_ms)
    }
}

fn default_document_key() -> String {
    DEFAULT_DOCUMENT_KEY.to_string()
}
fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_suppression_ms() -> u64 {
    DEFAULT_SUPPRESSION_MS
}
fn default_retention_ms() -> u64 {
    DEFAULT_RETENTION_MS
}
fn default_fault_channel_capacity() -> usize {
    DEFAULT_FAULT_CHANNEL_CAPACITY
}
