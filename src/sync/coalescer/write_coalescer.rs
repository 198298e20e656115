use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::Error;
use crate::FaultReporter;
use crate::FaultStage;
use crate::KvStore;
use crate::PersistenceAdapter;
use crate::Result;
use crate::SelfWriteGuard;

/// Operation waiting for its key's quiet period to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    Set(Vec<u8>),
    Remove,
}

#[derive(Debug)]
pub(crate) enum CoalescerCommand {
    Schedule { key: String, op: PendingOp },
    Cancel { key: String },
    Flush { done: oneshot::Sender<()> },
}

#[derive(Debug)]
struct Pending {
    op: PendingOp,
    deadline: Instant,
}

/// Handle for scheduling coalesced writes. Never blocks and never fails the caller; if the
/// worker has stopped, the request is dropped with a warning.
#[derive(Debug, Clone)]
pub struct WriteCoalescer {
    command_tx: mpsc::UnboundedSender<CoalescerCommand>,
}

impl WriteCoalescer {
    /// Records `snapshot` as the value to persist under `key` and restarts the key's quiet
    /// period. A snapshot still waiting for the same key is discarded.
    pub fn schedule(
        &self,
        key: &str,
        snapshot: Vec<u8>,
    ) {
        self.send(CoalescerCommand::Schedule {
            key: key.to_string(),
            op: PendingOp::Set(snapshot),
        });
    }

    /// Like [`WriteCoalescer::schedule`], but removes the key when the timer fires.
    pub fn schedule_remove(
        &self,
        key: &str,
    ) {
        self.send(CoalescerCommand::Schedule {
            key: key.to_string(),
            op: PendingOp::Remove,
        });
    }

    /// Drops whatever is pending for `key`. A write already in flight is not affected.
    pub fn cancel(
        &self,
        key: &str,
    ) {
        self.send(CoalescerCommand::Cancel { key: key.to_string() });
    }

    /// Performs every pending operation now and resolves once they have completed.
    pub async fn flush(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.command_tx
            .send(CoalescerCommand::Flush { done })
            .map_err(|_| Error::EngineClosed("write coalescer stopped".to_string()))?;
        wait.await
            .map_err(|_| Error::EngineClosed("write coalescer stopped during flush".to_string()))
    }

    fn send(
        &self,
        command: CoalescerCommand,
    ) {
        if let Err(e) = self.command_tx.send(command) {
            warn!(command = ?e.0, "write coalescer stopped, dropping command");
        }
    }
}

/// Background half of the coalescer.
pub struct CoalescerWorker<S: KvStore> {
    debounce: Duration,
    pending: HashMap<String, Pending>,
    adapter: Arc<PersistenceAdapter<S>>,
    guard: Arc<SelfWriteGuard>,
    faults: FaultReporter,
    command_rx: mpsc::UnboundedReceiver<CoalescerCommand>,
    shutdown_signal: watch::Receiver<()>,
}

impl<S: KvStore> CoalescerWorker<S> {
    pub fn new(
        debounce: Duration,
        adapter: Arc<PersistenceAdapter<S>>,
        guard: Arc<SelfWriteGuard>,
        faults: FaultReporter,
        shutdown_signal: watch::Receiver<()>,
    ) -> (WriteCoalescer, Self) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker = Self {
            debounce,
            pending: HashMap::new(),
            adapter,
            guard,
            faults,
            command_rx,
            shutdown_signal,
        };
        (WriteCoalescer { command_tx }, worker)
    }

    /// Runs until shutdown or until every handle is dropped; flushes pending operations
    /// on the way out.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let tick = sleep_until_deadline(self.next_deadline());

            tokio::select! {
                biased;
                // P0: shutdown received
                _ = self.shutdown_signal.changed() => {
                    info!("write coalescer shutdown signal received");
                    self.drain_commands().await;
                    self.flush_all().await;
                    return Ok(());
                }
                // P1: a quiet period ended
                _ = tick => {
                    self.fire_due().await;
                }
                // P2: commands from the store
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!("all coalescer handles dropped");
                            self.flush_all().await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    async fn handle_command(
        &mut self,
        command: CoalescerCommand,
    ) {
        match command {
            CoalescerCommand::Schedule { key, op } => {
                let deadline = Instant::now() + self.debounce;
                if self.pending.insert(key.clone(), Pending { op, deadline }).is_some() {
                    trace!(key, "coalesced with pending operation");
                }
            }
            CoalescerCommand::Cancel { key } => {
                if self.pending.remove(&key).is_some() {
                    debug!(key, "pending operation cancelled");
                }
            }
            CoalescerCommand::Flush { done } => {
                self.flush_all().await;
                let _ = done.send(());
            }
        }
    }

    /// Applies commands already queued, so nothing scheduled before shutdown is lost.
    async fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            self.handle_command(command).await;
        }
    }

    async fn fire_due(&mut self) {
        let now = Instant::now();
        let mut due: Vec<(String, Instant)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, p)| (k.clone(), p.deadline))
            .collect();
        due.sort_by_key(|(_, deadline)| *deadline);

        for (key, _) in due {
            if let Some(pending) = self.pending.remove(&key) {
                self.perform(&key, pending.op).await;
            }
        }
    }

    async fn flush_all(&mut self) {
        let mut drained: Vec<(String, Pending)> = self.pending.drain().collect();
        drained.sort_by_key(|(_, p)| p.deadline);
        for (key, pending) in drained {
            self.perform(&key, pending.op).await;
        }
    }

    async fn perform(
        &self,
        key: &str,
        op: PendingOp,
    ) {
        // the host will report this write back to us as a change
        self.guard.mark_self_write();
        let (stage, result) = match op {
            PendingOp::Set(bytes) => {
                debug!(key, bytes = bytes.len(), "persisting document");
                (FaultStage::Write, self.adapter.write(key, bytes).await)
            }
            PendingOp::Remove => {
                debug!(key, "removing persisted document");
                (FaultStage::Remove, self.adapter.remove(key).await)
            }
        };

        match result {
            Ok(()) => self.guard.mark_self_write(),
            Err(e) => self.faults.report(stage, key, &e),
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
