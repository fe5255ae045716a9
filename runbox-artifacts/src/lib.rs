//! Runbox Artifacts
//!
//! Key-addressed object storage used to stage execution inputs and collect
//! outputs. The orchestrator writes code and requirements; the worker reads
//! them back and writes the packaged output.

mod error;
mod memory;
mod s3;

pub use error::{ArtifactError, Result};
pub use memory::InMemoryArtifactStore;
pub use s3::{S3ArtifactStore, S3Settings};

use async_trait::async_trait;
use bytes::Bytes;

/// Content type used for staged source code
pub const CONTENT_TYPE_PYTHON: &str = "text/x-python";
/// Content type used for staged requirements
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
/// Content type used for packaged outputs
pub const CONTENT_TYPE_ZIP: &str = "application/zip";

/// Object store bound to a single bucket
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetches the object stored under `key`
    async fn get_object(&self, key: &str) -> Result<Bytes>;

    /// Stores `body` under `key`, replacing any previous object
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;
}
