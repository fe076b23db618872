use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::filesystem::{Filesystem, FilesystemError, Result, content_address};

/// An in-memory implementation of `Filesystem`, intended primarily for testing.
pub struct MemoryFilesystem {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryFilesystem {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Filesystem for MemoryFilesystem {
    fn kind(&self) -> &'static str {
        "mem"
    }

    async fn put(&self, data: Bytes) -> Result<String> {
        let path = content_address(self.kind(), &data);
        let mut objects = self.objects.write().unwrap();
        objects.entry(path.clone()).or_insert(data);
        Ok(path)
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().unwrap();
        objects
            .get(path)
            .cloned()
            .ok_or_else(|| FilesystemError::NotFound(path.to_string()))
    }

    async fn has(&self, path: &str) -> Result<bool> {
        let objects = self.objects.read().unwrap();
        Ok(objects.contains_key(path))
    }
}
