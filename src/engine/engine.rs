//! The running synchronization engine.
//!
//! A [`SyncEngine`] owns the background tasks started by [`crate::EngineBuilder`]. The UI
//! layer mutates and reads through [`SyncEngine::store`] and renders
//! [`SyncEngine::subscribe_faults`]. Dropping the engine stops the background tasks;
//! [`SyncEngine::shutdown`] additionally waits for pending writes to land.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::EntryId;
use crate::Error;
use crate::FaultReporter;
use crate::KvStore;
use crate::RepairReport;
use crate::Result;
use crate::SelfWriteGuard;
use crate::StateStore;
use crate::SyncFault;
use crate::WriteCoalescer;

/// How the initial document was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// Nothing was persisted under the key; a default document was created
    Fresh,
    /// The persisted document was decoded, repaired if needed, and pruned
    Restored {
        expired: Vec<EntryId>,
        synthesized: Option<EntryId>,
        repairs: RepairReport,
    },
    /// The persisted document could not be read or decoded; a default document was
    /// created and a load fault published
    Recovered,
}

impl BootOutcome {
    /// Whether load-time pruning changed the document.
    pub fn pruned(&self) -> bool {
        match self {
            BootOutcome::Restored {
                expired, synthesized, ..
            } => !expired.is_empty() || synthesized.is_some(),
            _ => false,
        }
    }
}

pub struct SyncEngine<S: KvStore> {
    pub(super) store: Arc<StateStore>,
    pub(super) kv: Arc<S>,
    pub(super) guard: Arc<SelfWriteGuard>,
    pub(super) coalescer: WriteCoalescer,
    pub(super) faults: FaultReporter,
    pub(super) boot: BootOutcome,
    pub(super) shutdown_tx: watch::Sender<()>,
    pub(super) handles: Vec<JoinHandle<()>>,
}

impl<S: KvStore> SyncEngine<S> {
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// The host store the document persists to.
    pub fn kv(&self) -> &Arc<S> {
        &self.kv
    }

    pub fn boot_outcome(&self) -> &BootOutcome {
        &self.boot
    }

    pub fn subscribe_faults(&self) -> broadcast::Receiver<SyncFault> {
        self.faults.subscribe()
    }

    /// Whether change notifications are currently treated as self-caused.
    pub fn is_suppressing_notifications(&self) -> bool {
        self.guard.is_suppressed()
    }

    /// Writes everything pending now instead of waiting for the quiet period.
    pub async fn flush(&self) -> Result<()> {
        self.coalescer.flush().await
    }

    /// Stops the background tasks. Pending writes are performed before this returns.
    pub async fn shutdown(self) -> Result<()> {
        info!(key = self.store.key(), "sync engine shutting down");
        // receivers may already be gone if a task ended early
        let _ = self.shutdown_tx.send(());
        for handle in self.handles {
            handle
                .await
                .map_err(|e| Error::Fatal(format!("background task panicked: {e}")))?;
        }
        Ok(())
    }
}
