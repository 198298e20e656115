// -
// Persistence keys

/// Key under which the window document is persisted
pub const DEFAULT_DOCUMENT_KEY: &str = "window-store";

/// Schema version written into the persisted envelope
pub const DOCUMENT_SCHEMA_VERSION: u32 = 0;

/// File extension used by the file-backed store
pub(crate) const RECORD_FILE_EXTENSION: &str = "json";

// -
// Entry defaults

pub const DEFAULT_ENTRY_TITLE: &str = "New Request";
pub const DUPLICATE_TITLE_PREFIX: &str = "Copy of ";
pub const DEFAULT_THEME: &str = "light";

// -
// Timing defaults (milliseconds)

pub(crate) const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
pub(crate) const DEFAULT_SUPPRESSION_MS: u64 = 2_000;
/// 7 days
pub const DEFAULT_RETENTION_MS: u64 = 604_800_000;
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
pub(crate) const DEFAULT_FAULT_CHANNEL_CAPACITY: usize = 64;

/// Buffer of each per-key change broadcast channel
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 16;
