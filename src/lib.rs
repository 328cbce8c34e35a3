//! Purpose: Shared core library crate used by the `pluckite` CLI and C bindings.
//! Exports: `core` (documents, extraction, diagnostics, errors), `json`, `api`, `abi`.
//! Role: Internal library backing the binaries; `api` is the supported Rust surface.
//! Invariants: Rust callers consume the crate through `api`; C callers through `abi`.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod abi;
pub mod api;
pub mod core;
pub mod json;
