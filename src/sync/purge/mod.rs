//! Load-time expiry of entries older than the document's retention horizon.
//!
//! Pruning only ever runs on documents coming out of the host store (engine boot and
//! rehydration). In-memory mutations never prune.

mod stale_entry_pruner;
pub use stale_entry_pruner::*;
