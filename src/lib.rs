//! Purpose: Library crate behind the `sheetstore` CLI and its tests.
//! Exports: `api` (record store, remote tables, query helpers) and `core` (codec, ids, errors).
//! Role: Employee records kept one-per-row in a remote spreadsheet range.
//! Invariants: No global state; every store owns its config and its table client.
//! Invariants: Core modules are pure; all remote I/O goes through `api::RemoteTable`.
pub mod api;
pub mod core;
