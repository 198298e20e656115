//! Host key-value primitives and the adapter the engine persists through.
//!
//! The host environment provides three raw operations (`get`, `set`, `remove`) plus a
//! payload-free change notification per key. [`KvStore`] models that boundary; the
//! adaptors under `adaptors/` are the in-memory and file-backed implementations.

mod adaptors;
mod kv_store;
mod persistence_adapter;

pub use adaptors::*;
pub use kv_store::*;
pub use persistence_adapter::*;
