// Core modules implementing documents, extraction, diagnostics, and
// error modeling.
pub mod diag;
pub mod doc;
pub mod error;
pub mod extract;
