//! Document Synchronization Error Hierarchy
//!
//! Defines the error types of the persistence engine, categorized by the layer they
//! originate from. Errors raised by the host store never unwind into the mutation path:
//! they are logged and republished on the fault channel as [`SyncFault`] values.

use std::fmt;
use std::path::PathBuf;

use config::ConfigError;

use crate::EntryId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Engine configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Host store failures (get/set/remove)
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Persisted bytes could not be turned into a document (or back)
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Background worker is gone; the engine was shut down
    #[error("Engine is shut down: {0}")]
    EngineClosed(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Disk I/O failures while reading or writing a record
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// I/O failure tied to a concrete record path
    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Key cannot be mapped onto the backing store
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Failure reported by a host-provided store
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Undecodable persisted data
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The blob is not valid JSON or does not match the envelope shape
    #[error("Malformed persisted data: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The blob decoded but carries no document state
    #[error("Persisted envelope has no state")]
    MissingState,
}

/// Why a mutation was refused. Carried inside [`crate::MutationStatus::Rejected`];
/// never returned as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// Deleting would leave the document without entries
    #[error("cannot delete the last remaining entry")]
    LastEntry,

    #[error("unknown entry: {0}")]
    UnknownEntry(EntryId),
}

/// Pipeline stage a [`SyncFault`] was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    /// Initial document load at engine start
    Load,
    /// Reload triggered by an external change notification
    Rehydrate,
    /// Coalesced `set` of a document snapshot
    Write,
    /// Coalesced `remove` of a key
    Remove,
    /// Snapshot serialization before scheduling a write
    Encode,
}

impl fmt::Display for FaultStage {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            FaultStage::Load => "load",
            FaultStage::Rehydrate => "rehydrate",
            FaultStage::Write => "write",
            FaultStage::Remove => "remove",
            FaultStage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// Non-blocking error notification published to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFault {
    pub stage: FaultStage,
    pub key: String,
    pub message: String,
    /// Set when the fault comes from undecodable persisted bytes
    pub malformed: bool,
}

impl SyncFault {
    pub fn new(
        stage: FaultStage,
        key: impl Into<String>,
        error: &Error,
    ) -> Self {
        Self {
            stage,
            key: key.into(),
            message: error.to_string(),
            malformed: matches!(error, Error::Codec(_)),
        }
    }
}

impl fmt::Display for SyncFault {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.key, self.message)
    }
}

// ============== Conversion Implementations ============== //
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(PersistenceError::IoError(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(CodecError::Malformed(e))
    }
}
