use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;
use tracing::trace;

use crate::encode_document;
use crate::CustomHeader;
use crate::Document;
use crate::EntryId;
use crate::EntryPatch;
use crate::FaultReporter;
use crate::FaultStage;
use crate::IdGenerator;
use crate::InvariantViolation;
use crate::MutationStatus;
use crate::SettingsPatch;
use crate::WallClock;
use crate::WriteCoalescer;

/// Sole owner of the live [`Document`].
///
/// Every operation runs in one short, synchronous critical section: the document is
/// changed, the persisted subset is encoded and handed to the [`WriteCoalescer`], and the
/// revision counter moves, all before the lock is released. Rehydration goes through the
/// same lock, so readers never observe a half-applied change.
pub struct StateStore {
    key: String,
    document: Mutex<Document>,
    coalescer: WriteCoalescer,
    faults: FaultReporter,
    clock: Arc<dyn WallClock>,
    ids: Arc<dyn IdGenerator>,
    revision_tx: watch::Sender<u64>,
}

/// Whether a successful change must reach the host store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    Yes,
    /// Session-only state
    No,
}

impl StateStore {
    pub fn new(
        key: impl Into<String>,
        document: Document,
        coalescer: WriteCoalescer,
        faults: FaultReporter,
        clock: Arc<dyn WallClock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            key: key.into(),
            document: Mutex::new(document),
            coalescer,
            faults,
            clock,
            ids,
            revision_tx,
        }
    }

    /// Host store key the document persists under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn snapshot(&self) -> Document {
        self.document.lock().clone()
    }

    /// Runs `f` against the live document without cloning it.
    pub fn read<R>(
        &self,
        f: impl FnOnce(&Document) -> R,
    ) -> R {
        f(&self.document.lock())
    }

    pub fn revision(&self) -> u64 {
        *self.revision_tx.borrow()
    }

    /// Receiver that changes on every applied mutation and every rehydration.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    //-----------------------------------------------------------
    // Entries

    /// Prepends a default entry, makes it active and starts editing its title.
    pub fn create_entry(&self) -> EntryId {
        let id = self.ids.next_id();
        let now = self.clock.now_ms();
        self.apply(Persist::Yes, |doc| {
            doc.create_entry(id.clone(), now);
            Ok(true)
        });
        debug!(%id, "entry created");
        id
    }

    /// Copies `source` right after itself. `None` when `source` does not exist.
    pub fn duplicate_entry(
        &self,
        source: &EntryId,
    ) -> Option<EntryId> {
        let new_id = self.ids.next_id();
        let now = self.clock.now_ms();
        let status = self.apply(Persist::Yes, |doc| {
            doc.duplicate_entry(source, new_id.clone(), now).map(|_| true)
        });
        status.is_applied().then_some(new_id)
    }

    pub fn delete_entry(
        &self,
        id: &EntryId,
    ) -> MutationStatus {
        self.apply(Persist::Yes, |doc| doc.delete_entry(id).map(|_| true))
    }

    pub fn move_entry(
        &self,
        from: &EntryId,
        to: &EntryId,
    ) -> MutationStatus {
        self.apply(Persist::Yes, |doc| doc.move_entry(from, to))
    }

    pub fn set_active(
        &self,
        id: &EntryId,
    ) -> MutationStatus {
        self.apply(Persist::Yes, |doc| doc.set_active(id))
    }

    /// Applies `patch` and refreshes the entry's `updated_at`.
    pub fn update_entry(
        &self,
        id: &EntryId,
        patch: EntryPatch,
    ) -> MutationStatus {
        let now = self.clock.now_ms();
        self.apply(Persist::Yes, |doc| doc.update_entry(id, patch, now).map(|_| true))
    }

    pub fn update_active_entry(
        &self,
        patch: EntryPatch,
    ) -> MutationStatus {
        let now = self.clock.now_ms();
        self.apply(Persist::Yes, |doc| {
            let active = doc.active_id().clone();
            doc.update_entry(&active, patch, now).map(|_| true)
        })
    }

    //-----------------------------------------------------------
    // Settings

    pub fn update_settings(
        &self,
        patch: SettingsPatch,
    ) -> MutationStatus {
        self.apply(Persist::Yes, |doc| Ok(doc.update_settings(patch)))
    }

    pub fn add_proto_paths(
        &self,
        paths: &[String],
    ) -> MutationStatus {
        self.apply(Persist::Yes, |doc| Ok(doc.add_proto_paths(paths)))
    }

    pub fn remove_proto_paths(
        &self,
        paths: &[String],
    ) -> MutationStatus {
        self.apply(Persist::Yes, |doc| Ok(doc.remove_proto_paths(paths)))
    }

    pub fn add_proto_files(
        &self,
        files: &[String],
    ) -> MutationStatus {
        self.apply(Persist::Yes, |doc| Ok(doc.add_proto_files(files)))
    }

    pub fn remove_proto_files(
        &self,
        files: &[String],
    ) -> MutationStatus {
        self.apply(Persist::Yes, |doc| Ok(doc.remove_proto_files(files)))
    }

    //-----------------------------------------------------------
    // Session state, never persisted

    pub fn set_editing_title_of(
        &self,
        id: Option<EntryId>,
    ) -> MutationStatus {
        self.apply(Persist::No, |doc| doc.set_editing_title_of(id))
    }

    pub fn set_custom_headers(
        &self,
        headers: Vec<CustomHeader>,
    ) -> MutationStatus {
        self.apply(Persist::No, |doc| Ok(doc.set_custom_headers(headers)))
    }

    //-----------------------------------------------------------
    // Persistence control

    /// Schedules removal of the persisted document. The live document is kept, and the
    /// next persisted mutation writes it back.
    pub fn clear_persisted(&self) {
        // ordered against writes scheduled by concurrent mutations
        let _doc = self.document.lock();
        debug!(key = %self.key, "scheduling removal of persisted document");
        self.coalescer.schedule_remove(&self.key);
    }

    /// Schedules a write of the current document without changing it.
    pub(crate) fn persist_current(&self) {
        let doc = self.document.lock();
        self.schedule_write(&doc);
    }

    /// Installs a document reloaded from the host store. Session state is kept; a write
    /// still waiting in the coalescer is dropped since it would overwrite what was just
    /// adopted.
    pub(crate) fn replace_persisted(
        &self,
        incoming: Document,
    ) {
        let mut doc = self.document.lock();
        self.coalescer.cancel(&self.key);
        doc.replace_persisted(incoming);
        self.bump_revision();
    }

    fn apply(
        &self,
        persist: Persist,
        mutation: impl FnOnce(&mut Document) -> Result<bool, InvariantViolation>,
    ) -> MutationStatus {
        let mut doc = self.document.lock();
        let status = MutationStatus::from(mutation(&mut doc));
        match &status {
            MutationStatus::Applied => {
                if persist == Persist::Yes {
                    self.schedule_write(&doc);
                }
                self.bump_revision();
            }
            MutationStatus::Unchanged => trace!("mutation left document unchanged"),
            MutationStatus::Rejected(violation) => debug!(%violation, "mutation rejected"),
        }
        status
    }

    fn schedule_write(
        &self,
        doc: &Document,
    ) {
        match encode_document(doc) {
            Ok(bytes) => self.coalescer.schedule(&self.key, bytes),
            Err(e) => self.faults.report(FaultStage::Encode, &self.key, &e),
        }
    }

    fn bump_revision(&self) {
        self.revision_tx.send_modify(|revision| *revision += 1);
    }
}
