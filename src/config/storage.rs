use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::validate_directory;
use crate::constants::DEFAULT_POLL_INTERVAL_MS;
use crate::Error;
use crate::Result;

/// File-backed host store settings
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StorageConfig {
    /// Directory holding one `<key>.json` record per key
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How often (milliseconds) records are polled for external changes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "poll_interval_ms must be greater than 0".into(),
            )));
        }
        validate_directory(&self.data_dir, "data")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
