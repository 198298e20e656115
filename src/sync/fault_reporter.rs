use tokio::sync::broadcast;
use tracing::error;
use tracing::warn;

use crate::Error;
use crate::FaultStage;
use crate::SyncFault;

/// Publishing side of the non-blocking error surface.
///
/// Faults are logged and broadcast; having no subscriber is not an error.
#[derive(Debug, Clone)]
pub struct FaultReporter {
    tx: broadcast::Sender<SyncFault>,
}

impl FaultReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncFault> {
        self.tx.subscribe()
    }

    pub(crate) fn report(
        &self,
        stage: FaultStage,
        key: &str,
        error: &Error,
    ) {
        let fault = SyncFault::new(stage, key, error);
        if fault.malformed {
            error!(%stage, key, ?error, "persisted document is malformed");
        } else {
            warn!(%stage, key, ?error, "persistence fault");
        }
        let _ = self.tx.send(fault);
    }
}
