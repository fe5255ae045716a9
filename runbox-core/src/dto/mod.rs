//! Data Transfer Objects
//!
//! Payloads exchanged between the orchestrator, the worker, and clients.

pub mod execution;
