mod self_write_guard;
pub use self_write_guard::*;
