//! Core domain types
//!
//! The execution record is persisted by the orchestrator and updated from
//! worker reports.

pub mod artifacts;
pub mod execution;
