//! In-memory artifact store

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{ArtifactError, ArtifactStore, Result};

/// Artifact store backed by a map, for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    fail_puts: Mutex<bool>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without going through the trait
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Bytes>, content_type: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.into(), (body.into(), content_type.to_string()));
    }

    /// Returns the stored body and content type for `key`
    pub fn object(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Makes every subsequent `put_object` fail
    pub fn fail_puts(&self, fail: bool) {
        *self.fail_puts.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn get_object(&self, key: &str) -> Result<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| ArtifactError::NotFound(key.to_string()))
    }

    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        if *self.fail_puts.lock().unwrap() {
            return Err(ArtifactError::Put {
                key: key.to_string(),
                message: "store unavailable".to_string(),
            });
        }
        self.insert(key, body, content_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryArtifactStore::new();
        store
            .put_object("executions/1/main.py", Bytes::from_static(b"print(1)"), "text/x-python")
            .await
            .unwrap();

        let body = store.get_object("executions/1/main.py").await.unwrap();
        assert_eq!(&body[..], b"print(1)");
        assert_eq!(store.object("executions/1/main.py").unwrap().1, "text/x-python");
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = InMemoryArtifactStore::new();
        let err = store.get_object("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failing_puts() {
        let store = InMemoryArtifactStore::new();
        store.fail_puts(true);
        let err = store
            .put_object("k", Bytes::new(), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Put { .. }));
        assert!(store.keys().is_empty());
    }
}
