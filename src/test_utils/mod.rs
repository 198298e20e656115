//! Fixtures shared by unit tests across modules.
mod document_fixtures;

pub(crate) use document_fixtures::*;
