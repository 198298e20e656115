mod common;
mod file_store;
mod invariants;
mod scenarios;
