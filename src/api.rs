//! Purpose: Define the stable public Rust API boundary for Pluckite.
//! Exports: Document, extraction, and diagnostics types needed by
//! bindings and CLI.
//! Role: Public, additive-only surface; hides the internal module
//! layout.
//! Invariants: This module is the only supported public path to the
//! extraction primitives.

pub use crate::core::diag::{Diagnostics, MESSAGE_CAP};
pub use crate::core::doc::{Doc, DocRef};
#[doc(hidden)]
pub use crate::core::error::{to_exit_code, to_status_code};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::extract::{Extractor, FieldType, FromField, in_range};
pub use crate::json::parse::{doc_from_slice, doc_from_str};
