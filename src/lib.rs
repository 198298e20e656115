//! # docsync
//!
//! A persistent document synchronization engine. One in-memory [`Document`] is kept
//! durably mirrored in a host key-value store:
//!
//! - mutations apply synchronously through [`StateStore`],
//! - write-back is debounced per key by the [`WriteCoalescer`],
//! - the engine's own writes are kept from re-triggering reloads by the
//!   [`SelfWriteGuard`],
//! - external changes are reloaded wholesale by the [`RehydrationListener`], after the
//!   [`StaleEntryPruner`] drops entries past their retention horizon.
//!
//! Persistence failures never fail a mutation; they are published as [`SyncFault`]
//! values on a broadcast channel.
//!
//! ## Example
//! ```ignore
//! let kv = Arc::new(FileKvStore::new("./data")?);
//! let engine = EngineBuilder::new(kv, SyncConfig::default()).build().await?;
//!
//! let id = engine.store().create_entry();
//! engine.store().update_entry(&id, EntryPatch::default().title("List users"));
//!
//! engine.shutdown().await?;
//! ```

pub mod config;
pub mod constants;
mod document;
mod engine;
mod errors;
mod storage;
mod sync;
pub mod utils;

pub use config::*;
pub use document::*;
pub use engine::*;
pub use errors::*;
pub use storage::*;
pub use sync::*;
#[doc(hidden)]
pub use utils::*;

#[cfg(test)]
mod test_utils;
