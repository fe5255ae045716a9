//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories, the artifact store and the
//! scheduler.

pub mod callback;
pub mod execution;

pub use callback::{CallbackError, CallbackReceiver};
pub use execution::{ExecutionError, ExecutionService};
