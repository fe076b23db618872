use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Error type for object store operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// No object is stored at this path.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The path does not belong to this store or is not a content address.
    #[error("invalid object path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FilesystemError>;

/// A content-addressed store of immutable blobs.
///
/// Paths have the form `/<kind>/<sha256 hex>`. Putting the same bytes twice
/// yields the same path.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// The path prefix this store issues, e.g. `mem` or `local`.
    fn kind(&self) -> &'static str;

    /// Store a blob and return its content address.
    async fn put(&self, data: Bytes) -> Result<String>;

    /// Read a blob by content address.
    ///
    /// Returns `FilesystemError::NotFound` if nothing is stored there.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Check whether a blob is stored at this address.
    async fn has(&self, path: &str) -> Result<bool>;
}

/// Compute the content address of `data` for a store of the given kind.
pub fn content_address(kind: &str, data: &[u8]) -> String {
    format!("/{}/{:x}", kind, Sha256::digest(data))
}

/// Extract and validate the hash part of a content address.
pub fn object_hash<'a>(kind: &str, path: &'a str) -> Result<&'a str> {
    let invalid = |reason: &str| FilesystemError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let hash = path
        .strip_prefix('/')
        .and_then(|rest| rest.strip_prefix(kind))
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| invalid(&format!("expected a /{}/ address", kind)))?;

    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("hash must be hexadecimal"));
    }
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_address() {
        let path = content_address("mem", b"hello");
        assert_eq!(
            path,
            "/mem/2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(object_hash("mem", &path).unwrap().len(), 64);
    }

    #[test]
    fn test_object_hash_rejects_foreign_paths() {
        assert!(object_hash("mem", "/local/abcd").is_err());
        assert!(object_hash("mem", "/mem/").is_err());
        assert!(object_hash("mem", "/mem/../etc").is_err());
        assert_eq!(object_hash("mem", "/mem/abcd").unwrap(), "abcd");
    }
}
