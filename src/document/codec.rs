//! JSON envelope for the persisted document.
//!
//! ```text
//! { "state": { "requests": {..}, "sortOrder": [..], "activeRequestId": "..", .. },
//!   "version": 0 }
//! ```
//!
//! Decoding is forward-tolerant: unknown fields are ignored and missing fields take
//! defaults. Structural damage (dangling ids, empty entry maps) is repaired before the
//! document is handed out, see [`Document::repair`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::Document;
use super::DocumentSettings;
use super::Entry;
use super::EntryId;
use super::RepairReport;
use super::SessionState;
use crate::constants::DEFAULT_ENTRY_TITLE;
use crate::constants::DEFAULT_THEME;
use crate::constants::DOCUMENT_SCHEMA_VERSION;
use crate::CodecError;
use crate::IdGenerator;
use crate::Result;

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(default)]
    state: Option<PersistedState>,
    #[serde(default)]
    version: u32,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PersistedState {
    requests: BTreeMap<EntryId, PersistedEntry>,
    sort_order: Vec<EntryId>,
    active_request_id: EntryId,
    theme: Option<String>,
    delete_request_after_ms: Option<u64>,
    proto_paths: Vec<String>,
    proto_files: Vec<String>,
    has_seen_onboarding: bool,
    has_seen_tour: Option<bool>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PersistedEntry {
    id: EntryId,
    title: Option<String>,
    address: String,
    method: String,
    metadata: String,
    method_source: String,
    request: String,
    response: String,
    #[serde(deserialize_with = "deserialize_updated_at")]
    updated_at: u64,
}

/// `updatedAt` as found on disk: epoch milliseconds, or the ISO-8601 string older
/// writers stored.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(u64),
    Text(String),
}

/// Unparseable strings read as the epoch, so retention treats them as expired.
fn deserialize_updated_at<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(ms) => ms,
        RawTimestamp::Text(text) => match chrono::DateTime::parse_from_rfc3339(text.trim()) {
            Ok(dt) => u64::try_from(dt.timestamp_millis()).unwrap_or(0),
            Err(e) => {
                warn!(updated_at = %text, error = %e, "unreadable entry timestamp");
                0
            }
        },
    };
    Ok(ms)
}

/// Inputs needed to turn untrusted bytes into a valid [`Document`].
pub struct DecodeContext<'a> {
    /// Used for the default entry synthesized when a blob holds no entries
    pub now_ms: u64,
    /// Applied when the blob does not carry `deleteRequestAfterMs`
    pub default_retention_ms: u64,
    pub ids: &'a dyn IdGenerator,
}

/// A decoded document plus what had to be fixed on the way in.
#[derive(Debug)]
pub struct Decoded {
    pub document: Document,
    pub version: u32,
    pub repairs: RepairReport,
}

/// Serializes the persisted subset of `document` (session state is left out).
pub fn encode_document(document: &Document) -> Result<Vec<u8>> {
    let state = PersistedState {
        requests: document
            .entries
            .iter()
            .map(|(id, e)| (id.clone(), PersistedEntry::from(e)))
            .collect(),
        sort_order: document.order.clone(),
        active_request_id: document.active_id.clone(),
        theme: Some(document.settings.theme.clone()),
        delete_request_after_ms: Some(document.settings.retention_ms),
        proto_paths: document.settings.proto_paths.clone(),
        proto_files: document.settings.proto_files.clone(),
        has_seen_onboarding: document.settings.has_seen_onboarding,
        has_seen_tour: Some(document.settings.has_seen_tour),
    };
    let envelope = Envelope {
        state: Some(state),
        version: DOCUMENT_SCHEMA_VERSION,
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

pub fn decode_document(
    bytes: &[u8],
    ctx: &DecodeContext<'_>,
) -> Result<Decoded> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(CodecError::Malformed)?;
    let state = envelope.state.ok_or(CodecError::MissingState)?;

    if envelope.version > DOCUMENT_SCHEMA_VERSION {
        warn!(
            version = envelope.version,
            supported = DOCUMENT_SCHEMA_VERSION,
            "persisted document has a newer schema version; reading known fields only"
        );
    }

    let mut document = Document {
        entries: state
            .requests
            .into_iter()
            .map(|(id, e)| {
                let entry = e.into_entry(id.clone());
                (id, entry)
            })
            .collect(),
        order: state.sort_order,
        active_id: state.active_request_id,
        settings: DocumentSettings {
            theme: state.theme.unwrap_or_else(|| DEFAULT_THEME.to_string()),
            retention_ms: state
                .delete_request_after_ms
                .unwrap_or(ctx.default_retention_ms),
            proto_paths: state.proto_paths,
            proto_files: state.proto_files,
            has_seen_onboarding: state.has_seen_onboarding,
            has_seen_tour: state.has_seen_tour.unwrap_or(true),
        },
        session: SessionState::default(),
    };

    let repairs = document.repair(ctx.now_ms, || ctx.ids.next_id());
    if !repairs.is_clean() {
        debug!(?repairs, "repaired decoded document");
    }

    Ok(Decoded {
        document,
        version: envelope.version,
        repairs,
    })
}

impl From<&Entry> for PersistedEntry {
    fn from(e: &Entry) -> Self {
        Self {
            id: e.id.clone(),
            title: Some(e.title.clone()),
            address: e.address.clone(),
            method: e.method.clone(),
            metadata: e.metadata.clone(),
            method_source: e.method_source.clone(),
            request: e.request.clone(),
            response: e.response.clone(),
            updated_at: e.updated_at,
        }
    }
}

impl PersistedEntry {
    /// The map key is authoritative for the id.
    fn into_entry(
        self,
        id: EntryId,
    ) -> Entry {
        Entry {
            id,
            title: self.title.unwrap_or_else(|| DEFAULT_ENTRY_TITLE.to_string()),
            address: self.address,
            method: self.method,
            metadata: self.metadata,
            method_source: self.method_source,
            request: self.request,
            response: self.response,
            updated_at: self.updated_at,
        }
    }
}
