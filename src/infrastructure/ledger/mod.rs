//! Ledger adapters for persisted admission-control state.
//!
//! This module provides adapters implementing the Ledger port:
//! JSON files on disk for production and an in-memory ledger for dry runs
//! and tests.

pub mod file;
pub mod memory;

pub use file::FileLedger;
pub use memory::MemoryLedger;
