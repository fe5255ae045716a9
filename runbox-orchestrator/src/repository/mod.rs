//! Repository Module
//!
//! Data access layer for execution records. The orchestrator talks to the
//! record store only through `ExecutionRepository`.

pub mod execution;
#[cfg(test)]
pub mod memory;

pub use execution::{ExecutionRepository, PgExecutionRepository, UpdateOutcome};
#[cfg(test)]
pub use memory::InMemoryExecutionRepository;
