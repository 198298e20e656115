mod rehydration_listener;
pub use rehydration_listener::*;
