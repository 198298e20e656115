use crate::encode_document;
use crate::Document;
use crate::DocumentSettings;
use crate::Entry;
use crate::EntryId;

pub(crate) fn id(s: &str) -> EntryId {
    EntryId::from(s)
}

/// Document holding `(id, updated_at)` entries in display order; the first one is active.
pub(crate) fn document_with_entries(
    entries: &[(&str, u64)],
    settings: DocumentSettings,
) -> Document {
    let (first, first_ts) = entries[0];
    let mut doc = Document::with_default_entry(id(first), first_ts, settings);
    for (e, ts) in entries.iter().skip(1) {
        doc.entries.insert(id(e), Entry::new(id(e), *ts));
        doc.order.push(id(e));
    }
    doc
}

/// Persisted bytes of [`document_with_entries`] with the given retention.
pub(crate) fn encoded_document_with_entries(
    entries: &[(&str, u64)],
    retention_ms: u64,
) -> Vec<u8> {
    let doc = document_with_entries(entries, DocumentSettings::with_retention(retention_ms));
    encode_document(&doc).expect("fixture encodes")
}
