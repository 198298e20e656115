//! Synchronization core: the live document, debounced write-back, self-write
//! suppression, load-time pruning and rehydration.

mod coalescer;
mod fault_reporter;
mod guard;
mod purge;
mod rehydration;
mod store;

pub use coalescer::*;
pub use fault_reporter::*;
pub use guard::*;
pub use purge::*;
pub use rehydration::*;
pub use store::*;
