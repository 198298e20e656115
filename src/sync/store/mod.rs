mod state_store;
pub use state_store::*;

#[cfg(test)]
mod state_store_test;
