//! Runbox Core
//!
//! Core types shared by the Runbox services.
//!
//! This crate contains:
//! - Domain types: the execution record and its status
//! - DTOs: request and callback payloads exchanged over HTTP
//! - The job environment contract between scheduler and worker

pub mod domain;
pub mod dto;
pub mod job_env;
