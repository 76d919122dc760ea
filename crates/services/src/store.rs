//! Object storage by path.

use std::collections::BTreeMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::{BoxFuture, ServiceError};

/// Blob storage keyed by slash-separated paths.
pub trait ObjectStore: Send + Sync {
    fn put<'a>(&'a self, path: &'a str, data: Vec<u8>) -> BoxFuture<'a, Result<(), ServiceError>>;

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ServiceError>>;

    fn remove<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), ServiceError>>;

    /// Paths under `prefix`, sorted.
    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, ServiceError>>;
}

/// Lowercase hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put<'a>(&'a self, path: &'a str, data: Vec<u8>) -> BoxFuture<'a, Result<(), ServiceError>> {
        Box::pin(async move {
            self.objects().insert(path.to_string(), data);
            Ok(())
        })
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ServiceError>> {
        Box::pin(async move {
            self.objects()
                .get(path)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(path.to_string()))
        })
    }

    fn remove<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), ServiceError>> {
        Box::pin(async move {
            self.objects()
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| ServiceError::NotFound(path.to_string()))
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, ServiceError>> {
        Box::pin(async move {
            Ok(self
                .objects()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        })
    }
}
