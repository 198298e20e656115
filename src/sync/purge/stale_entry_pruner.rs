use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::Document;
use crate::Entry;
use crate::EntryId;
use crate::IdGenerator;

/// Result of one pruning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    pub document: Document,
    /// Ids removed for being older than the horizon, in their former display order
    pub expired: Vec<EntryId>,
    /// Set when every entry expired and a default one took their place
    pub synthesized: Option<EntryId>,
}

impl PruneOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.expired.is_empty() && self.synthesized.is_none()
    }
}

pub struct StaleEntryPruner {
    ids: Arc<dyn IdGenerator>,
}

impl StaleEntryPruner {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// Drops every entry whose age (`now_ms - updated_at`) has reached `retention_ms`.
    /// Entries stamped in the future have age zero.
    ///
    /// `retention_ms == 0` disables pruning. A document left without entries receives a
    /// single fresh default entry, so the result always satisfies the document
    /// invariants.
    pub fn prune(
        &self,
        mut document: Document,
        now_ms: u64,
        retention_ms: u64,
    ) -> PruneOutcome {
        if retention_ms == 0 {
            return PruneOutcome {
                document,
                expired: Vec::new(),
                synthesized: None,
            };
        }

        let expired: Vec<EntryId> = document
            .order
            .iter()
            .filter(|id| {
                document
                    .entries
                    .get(*id)
                    .is_some_and(|entry| now_ms.saturating_sub(entry.updated_at) >= retention_ms)
            })
            .cloned()
            .collect();
        if expired.is_empty() {
            return PruneOutcome {
                document,
                expired,
                synthesized: None,
            };
        }

        let gone: BTreeSet<&EntryId> = expired.iter().collect();
        document.entries.retain(|id, _| !gone.contains(id));
        document.order.retain(|id| !gone.contains(id));
        if document
            .session
            .editing_title_of
            .as_ref()
            .is_some_and(|id| gone.contains(id))
        {
            document.session.editing_title_of = None;
        }

        let mut synthesized = None;
        if document.entries.is_empty() {
            let id = self.ids.next_id();
            document.entries.insert(id.clone(), Entry::new(id.clone(), now_ms));
            document.order = vec![id.clone()];
            document.active_id = id.clone();
            synthesized = Some(id);
        } else if gone.contains(&document.active_id) {
            document.active_id = document.order[0].clone();
        }

        debug!(
            expired = expired.len(),
            retention_ms,
            synthesized = synthesized.is_some(),
            "pruned stale entries"
        );
        PruneOutcome {
            document,
            expired,
            synthesized,
        }
    }
}
