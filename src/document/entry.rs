use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_ENTRY_TITLE;

/// Opaque, globally unique entry identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntryId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Allocates fresh entry ids.
pub trait IdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> EntryId;
}

/// Production generator backed by `nanoid`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NanoIdGenerator;

impl IdGenerator for NanoIdGenerator {
    fn next_id(&self) -> EntryId {
        EntryId(nanoid::nanoid!())
    }
}

/// Deterministic generator producing `<prefix>1`, `<prefix>2`, ...
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> EntryId {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        EntryId(format!("{}{}", self.prefix, n))
    }
}

/// One user work item: a named request with editable string fields.
///
/// `id` is fixed at creation and `updated_at` is maintained by the store, so both are
/// only readable from outside the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub(crate) id: EntryId,
    pub title: String,
    pub address: String,
    pub method: String,
    pub metadata: String,
    pub method_source: String,
    pub request: String,
    pub response: String,
    pub(crate) updated_at: u64,
}

impl Entry {
    pub(crate) fn new(
        id: EntryId,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            title: DEFAULT_ENTRY_TITLE.to_string(),
            address: String::new(),
            method: String::new(),
            metadata: String::new(),
            method_source: String::new(),
            request: String::new(),
            response: String::new(),
            updated_at: now_ms,
        }
    }

    pub fn id(&self) -> &EntryId {
        &self.id
    }

    /// Milliseconds since the Unix epoch of the last mutation.
    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Never moves `updated_at` backwards, even if the wall clock does.
    pub(crate) fn touch(
        &mut self,
        now_ms: u64,
    ) {
        self.updated_at = self.updated_at.max(now_ms);
    }

    pub(crate) fn apply_patch(
        &mut self,
        patch: EntryPatch,
        now_ms: u64,
    ) {
        let EntryPatch {
            title,
            address,
            method,
            metadata,
            method_source,
            request,
            response,
        } = patch;

        if let Some(v) = title {
            self.title = v;
        }
        if let Some(v) = address {
            self.address = v;
        }
        if let Some(v) = method {
            self.method = v;
        }
        if let Some(v) = metadata {
            self.metadata = v;
        }
        if let Some(v) = method_source {
            self.method_source = v;
        }
        if let Some(v) = request {
            self.request = v;
        }
        if let Some(v) = response {
            self.response = v;
        }
        self.touch(now_ms);
    }
}

/// Field-level partial update of an [`Entry`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub address: Option<String>,
    pub method: Option<String>,
    pub metadata: Option<String>,
    pub method_source: Option<String>,
    pub request: Option<String>,
    pub response: Option<String>,
}

impl EntryPatch {
    pub fn title(
        mut self,
        v: impl Into<String>,
    ) -> Self {
        self.title = Some(v.into());
        self
    }

    pub fn address(
        mut self,
        v: impl Into<String>,
    ) -> Self {
        self.address = Some(v.into());
        self
    }

    pub fn method(
        mut self,
        v: impl Into<String>,
    ) -> Self {
        self.method = Some(v.into());
        self
    }

    pub fn metadata(
        mut self,
        v: impl Into<String>,
    ) -> Self {
        self.metadata = Some(v.into());
        self
    }

    pub fn method_source(
        mut self,
        v: impl Into<String>,
    ) -> Self {
        self.method_source = Some(v.into());
        self
    }

    pub fn request(
        mut self,
        v: impl Into<String>,
    ) -> Self {
        self.request = Some(v.into());
        self
    }

    pub fn response(
        mut self,
        v: impl Into<String>,
    ) -> Self {
        self.response = Some(v.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
