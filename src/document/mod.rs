//! The persisted aggregate: entries, their display order, the active selection and
//! document-level settings.
//!
//! [`Document`] enforces its structural invariants in every operation below, so a
//! document observed from outside is always consistent:
//! 1. `entries` is never empty.
//! 2. `order` is a duplicate-free permutation of the keys of `entries`.
//! 3. `active_id` is a key of `entries`.
//!
//! Timestamps are passed in by the caller ([`crate::StateStore`]); nothing here reads a
//! clock.

mod codec;
mod entry;
mod settings;

pub use codec::*;
pub use entry::*;
pub use settings::*;


use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::constants::DUPLICATE_TITLE_PREFIX;
use crate::InvariantViolation;

/// Result of a synchronous mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationStatus {
    /// Document changed; a write has been scheduled
    Applied,
    /// Valid request that left the document as it was
    Unchanged,
    /// Refused to keep the document valid; nothing changed
    Rejected(InvariantViolation),
}

impl MutationStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationStatus::Applied)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, MutationStatus::Rejected(_))
    }
}

impl From<Result<bool, InvariantViolation>> for MutationStatus {
    fn from(r: Result<bool, InvariantViolation>) -> Self {
        match r {
            Ok(true) => MutationStatus::Applied,
            Ok(false) => MutationStatus::Unchanged,
            Err(v) => MutationStatus::Rejected(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub(crate) entries: BTreeMap<EntryId, Entry>,
    pub(crate) order: Vec<EntryId>,
    pub(crate) active_id: EntryId,
    pub(crate) settings: DocumentSettings,
    pub(crate) session: SessionState,
}

/// What [`Document::repair`] had to fix in decoded data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Ids removed from `order` because they were duplicated or dangling
    pub dropped_from_order: Vec<EntryId>,
    /// Ids present in `entries` but missing from `order`
    pub appended_to_order: Vec<EntryId>,
    /// `active_id` did not resolve and was reset
    pub active_reset: bool,
    /// The document had no entries and received this default one
    pub synthesized: Option<EntryId>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

impl Document {
    /// A fresh document holding a single default entry, which is active.
    pub fn with_default_entry(
        id: EntryId,
        now_ms: u64,
        settings: DocumentSettings,
    ) -> Self {
        let entry = Entry::new(id.clone(), now_ms);
        let mut entries = BTreeMap::new();
        entries.insert(id.clone(), entry);
        Self {
            entries,
            order: vec![id.clone()],
            active_id: id,
            settings,
            session: SessionState::default(),
        }
    }

    pub fn entries(&self) -> &BTreeMap<EntryId, Entry> {
        &self.entries
    }

    pub fn entry(
        &self,
        id: &EntryId,
    ) -> Option<&Entry> {
        self.entries.get(id)
    }

    /// Entries in display order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &Entry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn order(&self) -> &[EntryId] {
        &self.order
    }

    pub fn active_id(&self) -> &EntryId {
        &self.active_id
    }

    pub fn active_entry(&self) -> Option<&Entry> {
        self.entries.get(&self.active_id)
    }

    pub fn settings(&self) -> &DocumentSettings {
        &self.settings
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy without session-only state: exactly what a write persists.
    pub fn persisted(&self) -> Document {
        Document {
            session: SessionState::default(),
            ..self.clone()
        }
    }

    /// Checks every structural invariant; the error names the first one broken.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.entries.is_empty() {
            return Err("document has no entries".into());
        }
        if self.order.len() != self.entries.len() {
            return Err(format!(
                "order has {} ids but there are {} entries",
                self.order.len(),
                self.entries.len()
            ));
        }
        let mut seen = BTreeSet::new();
        for id in &self.order {
            if !self.entries.contains_key(id) {
                return Err(format!("order references unknown entry {id}"));
            }
            if !seen.insert(id) {
                return Err(format!("order lists {id} twice"));
            }
        }
        if !self.entries.contains_key(&self.active_id) {
            return Err(format!("active entry {} does not exist", self.active_id));
        }
        for (key, entry) in &self.entries {
            if key != &entry.id {
                return Err(format!("entry stored under {key} carries id {}", entry.id));
            }
        }
        Ok(())
    }

    fn position(
        &self,
        id: &EntryId,
    ) -> Option<usize> {
        self.order.iter().position(|o| o == id)
    }

    //-----------------------------------------------------------
    // Mutations. Each one leaves the document valid when it returns.

    /// Prepends a default entry and makes it active.
    pub(crate) fn create_entry(
        &mut self,
        id: EntryId,
        now_ms: u64,
    ) {
        self.entries.insert(id.clone(), Entry::new(id.clone(), now_ms));
        self.order.insert(0, id.clone());
        self.active_id = id.clone();
        self.session.editing_title_of = Some(id);
    }

    /// Copies `source` right after itself in `order`. The active entry does not change.
    pub(crate) fn duplicate_entry(
        &mut self,
        source: &EntryId,
        new_id: EntryId,
        now_ms: u64,
    ) -> Result<(), InvariantViolation> {
        let index = self
            .position(source)
            .ok_or_else(|| InvariantViolation::UnknownEntry(source.clone()))?;
        let original = self
            .entries
            .get(source)
            .ok_or_else(|| InvariantViolation::UnknownEntry(source.clone()))?;

        let mut copy = original.clone();
        copy.id = new_id.clone();
        copy.title = format!("{}{}", DUPLICATE_TITLE_PREFIX, original.title);
        copy.updated_at = now_ms;

        self.entries.insert(new_id.clone(), copy);
        self.order.insert(index + 1, new_id);
        Ok(())
    }

    /// Removes an entry. If it was active, the entry now occupying its old position
    /// becomes active, or the previous one when it was last.
    pub(crate) fn delete_entry(
        &mut self,
        id: &EntryId,
    ) -> Result<(), InvariantViolation> {
        let index = self
            .position(id)
            .ok_or_else(|| InvariantViolation::UnknownEntry(id.clone()))?;
        if self.entries.len() <= 1 {
            return Err(InvariantViolation::LastEntry);
        }

        self.entries.remove(id);
        self.order.remove(index);

        if &self.active_id == id {
            let fallback = if index == self.order.len() { index - 1 } else { index };
            self.active_id = self.order[fallback].clone();
        }
        if self.session.editing_title_of.as_ref() == Some(id) {
            self.session.editing_title_of = None;
        }
        Ok(())
    }

    /// Array-move: takes `from` out of `order` and inserts it at the index `to` had.
    pub(crate) fn move_entry(
        &mut self,
        from: &EntryId,
        to: &EntryId,
    ) -> Result<bool, InvariantViolation> {
        let old_index = self
            .position(from)
            .ok_or_else(|| InvariantViolation::UnknownEntry(from.clone()))?;
        let new_index = self
            .position(to)
            .ok_or_else(|| InvariantViolation::UnknownEntry(to.clone()))?;
        if old_index == new_index {
            return Ok(false);
        }

        let moved = self.order.remove(old_index);
        self.order.insert(new_index, moved);
        Ok(true)
    }

    pub(crate) fn set_active(
        &mut self,
        id: &EntryId,
    ) -> Result<bool, InvariantViolation> {
        if !self.entries.contains_key(id) {
            return Err(InvariantViolation::UnknownEntry(id.clone()));
        }
        if &self.active_id == id {
            return Ok(false);
        }
        self.active_id = id.clone();
        Ok(true)
    }

    pub(crate) fn update_entry(
        &mut self,
        id: &EntryId,
        patch: EntryPatch,
        now_ms: u64,
    ) -> Result<(), InvariantViolation> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| InvariantViolation::UnknownEntry(id.clone()))?;
        entry.apply_patch(patch, now_ms);
        Ok(())
    }

    pub(crate) fn update_settings(
        &mut self,
        patch: SettingsPatch,
    ) -> bool {
        self.settings.apply_patch(patch)
    }

    pub(crate) fn add_proto_paths(
        &mut self,
        paths: &[String],
    ) -> bool {
        union_sorted(&mut self.settings.proto_paths, paths)
    }

    pub(crate) fn remove_proto_paths(
        &mut self,
        paths: &[String],
    ) -> bool {
        remove_all(&mut self.settings.proto_paths, paths)
    }

    pub(crate) fn add_proto_files(
        &mut self,
        files: &[String],
    ) -> bool {
        union_sorted(&mut self.settings.proto_files, files)
    }

    pub(crate) fn remove_proto_files(
        &mut self,
        files: &[String],
    ) -> bool {
        remove_all(&mut self.settings.proto_files, files)
    }

    pub(crate) fn set_editing_title_of(
        &mut self,
        id: Option<EntryId>,
    ) -> Result<bool, InvariantViolation> {
        if let Some(id) = &id {
            if !self.entries.contains_key(id) {
                return Err(InvariantViolation::UnknownEntry(id.clone()));
            }
        }
        if self.session.editing_title_of == id {
            return Ok(false);
        }
        self.session.editing_title_of = id;
        Ok(true)
    }

    pub(crate) fn set_custom_headers(
        &mut self,
        headers: Vec<CustomHeader>,
    ) -> bool {
        if self.session.custom_headers == headers {
            return false;
        }
        self.session.custom_headers = headers;
        true
    }

    /// Installs the persisted part of `incoming` wholesale and keeps this document's
    /// session state, dropping references the new entries no longer satisfy.
    pub(crate) fn replace_persisted(
        &mut self,
        incoming: Document,
    ) {
        let session = std::mem::take(&mut self.session);
        *self = Document { session, ..incoming };

        let editing_gone = self
            .session
            .editing_title_of
            .as_ref()
            .is_some_and(|id| !self.entries.contains_key(id));
        if editing_gone {
            self.session.editing_title_of = None;
        }
    }

    /// Restores the invariants on a document assembled from untrusted data.
    ///
    /// `new_id` is only called when the document has no entries at all.
    pub(crate) fn repair(
        &mut self,
        now_ms: u64,
        new_id: impl FnOnce() -> EntryId,
    ) -> RepairReport {
        let mut report = RepairReport::default();

        for (key, entry) in self.entries.iter_mut() {
            if &entry.id != key {
                entry.id = key.clone();
            }
        }

        if self.entries.is_empty() {
            let id = new_id();
            report.dropped_from_order = std::mem::take(&mut self.order);
            self.entries.insert(id.clone(), Entry::new(id.clone(), now_ms));
            self.order = vec![id.clone()];
            self.active_id = id.clone();
            report.synthesized = Some(id);
            return report;
        }

        let mut seen = BTreeSet::new();
        let entries = &self.entries;
        self.order.retain(|id| {
            let keep = entries.contains_key(id) && seen.insert(id.clone());
            if !keep {
                report.dropped_from_order.push(id.clone());
            }
            keep
        });

        let mut missing: Vec<&Entry> = self
            .entries
            .values()
            .filter(|e| !seen.contains(&e.id))
            .collect();
        missing.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        for entry in missing {
            report.appended_to_order.push(entry.id.clone());
        }
        self.order.extend(report.appended_to_order.iter().cloned());

        if !self.entries.contains_key(&self.active_id) {
            self.active_id = self.order[0].clone();
            report.active_reset = true;
        }

        report
    }
}
