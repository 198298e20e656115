//! Assembles a [`SyncEngine`] over a host store.
//!
//! [`EngineBuilder::build`] performs the initial load (decode, repair, prune), spawns the
//! write coalescer worker and the rehydration listener, and hands back the running
//! engine.
//!
//! ## Example
//! ```ignore
//! let kv = Arc::new(MemKvStore::new());
//! let builder = EngineBuilder::new(kv, SyncConfig::default());
//! let mut faults = builder.subscribe_faults();
//! let engine = builder.build().await?;
//! let id = engine.store().create_entry();
//! engine.shutdown().await?;
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::async_task::spawn_task;
use crate::BootOutcome;
use crate::CoalescerWorker;
use crate::Document;
use crate::DocumentSettings;
use crate::FaultReporter;
use crate::FaultStage;
use crate::IdGenerator;
use crate::KvStore;
use crate::NanoIdGenerator;
use crate::PersistenceAdapter;
use crate::RehydrationListener;
use crate::Result;
use crate::SelfWriteGuard;
use crate::StaleEntryPruner;
use crate::StateStore;
use crate::SyncConfig;
use crate::SyncEngine;
use crate::SyncFault;
use crate::SystemClock;
use crate::WallClock;

pub struct EngineBuilder<S: KvStore> {
    kv: Arc<S>,
    config: SyncConfig,
    clock: Arc<dyn WallClock>,
    ids: Arc<dyn IdGenerator>,
    faults: FaultReporter,
}

impl<S: KvStore> EngineBuilder<S> {
    /// Production defaults: system clock and nanoid entry ids.
    pub fn new(
        kv: Arc<S>,
        config: SyncConfig,
    ) -> Self {
        // a zero capacity is rejected by validation in build()
        let faults = FaultReporter::new(config.fault_channel_capacity.max(1));
        Self {
            kv,
            config,
            clock: Arc::new(SystemClock),
            ids: Arc::new(NanoIdGenerator),
            faults,
        }
    }

    pub fn with_clock(
        mut self,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(
        mut self,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        self.ids = ids;
        self
    }

    /// Subscribes before [`EngineBuilder::build`], so faults raised by the initial load
    /// are not missed.
    pub fn subscribe_faults(&self) -> broadcast::Receiver<SyncFault> {
        self.faults.subscribe()
    }

    pub async fn build(self) -> Result<SyncEngine<S>> {
        self.config.validate()?;
        let key = self.config.document_key.clone();

        let adapter = Arc::new(PersistenceAdapter::new(
            self.kv.clone(),
            self.config.default_retention_ms,
            self.ids.clone(),
            self.clock.clone(),
        ));
        let guard = Arc::new(SelfWriteGuard::new(self.config.suppression()));
        let pruner = StaleEntryPruner::new(self.ids.clone());

        // Subscribe before the first read so a change landing in between is not lost.
        let changes = adapter.subscribe(&key);
        let (document, boot) = self.load_initial(&adapter, &pruner, &key).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let (coalescer, worker) = CoalescerWorker::new(
            self.config.debounce(),
            adapter.clone(),
            guard.clone(),
            self.faults.clone(),
            shutdown_rx.clone(),
        );
        let store = Arc::new(StateStore::new(
            key.clone(),
            document,
            coalescer.clone(),
            self.faults.clone(),
            self.clock.clone(),
            self.ids.clone(),
        ));
        if boot.pruned() {
            debug!(key, "persisting pruned document");
            store.persist_current();
        }

        let listener = RehydrationListener::new(
            store.clone(),
            adapter,
            guard.clone(),
            pruner,
            self.clock.clone(),
            self.faults.clone(),
        );
        let handles = vec![
            spawn_task("write-coalescer", worker.run()),
            spawn_task("rehydration-listener", listener.run(changes, shutdown_rx)),
        ];

        info!(key, ?boot, entries = store.read(|doc| doc.len()), "sync engine started");
        Ok(SyncEngine {
            store,
            kv: self.kv,
            guard,
            coalescer,
            faults: self.faults,
            boot,
            shutdown_tx,
            handles,
        })
    }

    async fn load_initial(
        &self,
        adapter: &PersistenceAdapter<S>,
        pruner: &StaleEntryPruner,
        key: &str,
    ) -> (Document, BootOutcome) {
        let now = self.clock.now_ms();
        match adapter.load(key).await {
            Ok(None) => {
                info!(key, "no persisted document, starting fresh");
                (self.default_document(now), BootOutcome::Fresh)
            }
            Ok(Some(decoded)) => {
                if !decoded.repairs.is_clean() {
                    warn!(key, repairs = ?decoded.repairs, "persisted document needed repair");
                }
                let retention_ms = decoded.document.settings().retention_ms;
                let outcome = pruner.prune(decoded.document, now, retention_ms);
                let boot = BootOutcome::Restored {
                    expired: outcome.expired,
                    synthesized: outcome.synthesized,
                    repairs: decoded.repairs,
                };
                (outcome.document, boot)
            }
            Err(e) => {
                // the unreadable record is left in place until the next write
                self.faults.report(FaultStage::Load, key, &e);
                (self.default_document(now), BootOutcome::Recovered)
            }
        }
    }

    fn default_document(
        &self,
        now_ms: u64,
    ) -> Document {
        Document::with_default_entry(
            self.ids.next_id(),
            now_ms,
            DocumentSettings::with_retention(self.config.default_retention_ms),
        )
    }
}
