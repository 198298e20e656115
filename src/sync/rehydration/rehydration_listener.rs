use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::trace;

use crate::ChangeReceiver;
use crate::EntryId;
use crate::FaultReporter;
use crate::FaultStage;
use crate::KvStore;
use crate::PersistenceAdapter;
use crate::Result;
use crate::SelfWriteGuard;
use crate::StaleEntryPruner;
use crate::StateStore;
use crate::WallClock;

/// What handling one change notification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RehydrationOutcome {
    /// Inside a self-write window; nothing was read
    Suppressed,
    /// The live document was replaced
    Reloaded {
        expired: Vec<EntryId>,
        synthesized: Option<EntryId>,
    },
    /// The key no longer exists in the host store; the live document was kept
    Absent,
    /// Read or decode failed; the live document was kept and a fault was published
    Failed,
}

/// Reloads the document whenever the host store reports a change that this engine did
/// not cause.
pub struct RehydrationListener<S: KvStore> {
    store: Arc<StateStore>,
    adapter: Arc<PersistenceAdapter<S>>,
    guard: Arc<SelfWriteGuard>,
    pruner: StaleEntryPruner,
    clock: Arc<dyn WallClock>,
    faults: FaultReporter,
}

impl<S: KvStore> RehydrationListener<S> {
    pub fn new(
        store: Arc<StateStore>,
        adapter: Arc<PersistenceAdapter<S>>,
        guard: Arc<SelfWriteGuard>,
        pruner: StaleEntryPruner,
        clock: Arc<dyn WallClock>,
        faults: FaultReporter,
    ) -> Self {
        Self {
            store,
            adapter,
            guard,
            pruner,
            clock,
            faults,
        }
    }

    /// Handles a single change notification.
    pub async fn on_change(&self) -> RehydrationOutcome {
        let key = self.store.key();
        if self.guard.is_suppressed() {
            trace!(key, "change notification suppressed");
            return RehydrationOutcome::Suppressed;
        }

        let decoded = match self.adapter.load(key).await {
            Ok(Some(decoded)) => decoded,
            Ok(None) => {
                debug!(key, "persisted document vanished, keeping live document");
                return RehydrationOutcome::Absent;
            }
            Err(e) => {
                self.faults.report(FaultStage::Rehydrate, key, &e);
                return RehydrationOutcome::Failed;
            }
        };

        // A write issued while we were reading supersedes what we read.
        if self.guard.is_suppressed() {
            debug!(key, "self write started during reload, discarding it");
            return RehydrationOutcome::Suppressed;
        }

        let retention_ms = decoded.document.settings().retention_ms;
        let outcome = self
            .pruner
            .prune(decoded.document, self.clock.now_ms(), retention_ms);
        info!(
            key,
            entries = outcome.document.len(),
            expired = outcome.expired.len(),
            "document rehydrated from host store"
        );
        self.store.replace_persisted(outcome.document);

        RehydrationOutcome::Reloaded {
            expired: outcome.expired,
            synthesized: outcome.synthesized,
        }
    }

    /// Consumes change notifications until shutdown or until the host store drops the
    /// channel. Missed notifications collapse into one reload.
    pub async fn run(
        self,
        mut changes: ChangeReceiver,
        mut shutdown_signal: watch::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                // P0: shutdown received
                _ = shutdown_signal.changed() => {
                    info!("rehydration listener shutdown signal received");
                    return Ok(());
                }
                // P1: host store change notifications
                signal = changes.recv() => {
                    match signal {
                        Ok(()) => {}
                        Err(RecvError::Lagged(missed)) => {
                            debug!(missed, "change notifications lagged");
                        }
                        Err(RecvError::Closed) => {
                            info!("change notification channel closed");
                            return Ok(());
                        }
                    }
                    let outcome = self.on_change().await;
                    trace!(?outcome, "change notification handled");
                }
            }
        }
    }
}
