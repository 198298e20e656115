//! Per-key debounced write-back.
//!
//! [`WriteCoalescer`] is the cheap, cloneable handle mutation paths use; it only enqueues
//! commands. [`CoalescerWorker`] owns the pending operations and the timers and is the
//! only place that talks to the host store on the write path.

mod write_coalescer;
pub use write_coalescer::*;
