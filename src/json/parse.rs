//! Purpose: Provide the runtime JSON decode entrypoints.
//! Exports: `doc_from_str`, `doc_from_slice`.
//! Role: Parser boundary that centralizes serde_json usage details.
//! Invariants: Parse failures map to `ErrorKind::Parse` and carry the
//! offending line and column.

use crate::core::doc::Doc;
use crate::core::error::{Error, ErrorKind};

/// Decode a whole document for field extraction.
pub fn doc_from_str(input: &str) -> Result<Doc, Error> {
    serde_json::from_str::<serde_json::Value>(input)
        .map(Doc::new)
        .map_err(parse_error)
}

/// Byte-slice variant of [`doc_from_str`]; input must be UTF-8 JSON.
pub fn doc_from_slice(input: &[u8]) -> Result<Doc, Error> {
    serde_json::from_slice::<serde_json::Value>(input)
        .map(Doc::new)
        .map_err(parse_error)
}

fn parse_error(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Parse)
        .with_message(format!(
            "invalid json at line {}, column {}",
            err.line(),
            err.column()
        ))
        .with_source(err)
}
