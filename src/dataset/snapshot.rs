//! Content-addressed snapshot encoding.
//!
//! A snapshot is stored as two blobs: the body (canonical JSON of the body
//! value) and the dataset document (canonical JSON with transient fields
//! stripped and `bodyPath` pointing at the body blob). The dataset blob's
//! address is the snapshot's path. The body is written first, so a reader
//! can never observe a dataset blob whose body is missing.

use bytes::Bytes;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::backend::{Filesystem, FilesystemError};

use super::dataset::{Dataset, Structure};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while reading or writing snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The object store failed.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// A document could not be encoded.
    #[error("encoding snapshot: {0}")]
    Encode(serde_json::Error),

    /// A stored blob could not be decoded.
    #[error("decoding {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

// =============================================================================
// Write
// =============================================================================

/// Store a dataset and return its content address.
///
/// Derived structure fields are recomputed from the body. The dataset's
/// transient fields are ignored.
pub async fn write_snapshot(fs: &dyn Filesystem, dataset: &Dataset) -> Result<String> {
    let mut stored = dataset.clone();

    if let Some(body) = stored.body.take() {
        let bytes = serde_json_canonicalizer::to_vec(&body).map_err(SnapshotError::Encode)?;
        let structure = stored.structure.get_or_insert_with(|| Structure {
            format: "json".to_string(),
            ..Default::default()
        });
        update_derived(structure, &body, &bytes);
        stored.body_path = fs.put(Bytes::from(bytes)).await?;
    }

    stored.strip_transient();
    let bytes = serde_json_canonicalizer::to_vec(&stored).map_err(SnapshotError::Encode)?;
    let path = fs.put(Bytes::from(bytes)).await?;
    Ok(path)
}

/// Recompute the structure fields derived from the body.
fn update_derived(structure: &mut Structure, body: &Value, encoded: &[u8]) {
    structure.checksum = format!("{:x}", Sha256::digest(encoded));
    structure.length = encoded.len() as u64;
    structure.depth = depth(body);
    structure.entries = match body {
        Value::Array(rows) => rows.len() as u64,
        Value::Object(fields) => fields.len() as u64,
        _ => 0,
    };
}

/// Nesting depth of a JSON value. Scalars have depth zero.
fn depth(value: &Value) -> u64 {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(fields) => 1 + fields.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

// =============================================================================
// Read
// =============================================================================

/// Read a stored dataset document, without its body.
///
/// The returned dataset has `path` set; identity fields are left empty.
pub async fn read_snapshot(fs: &dyn Filesystem, path: &str) -> Result<Dataset> {
    let bytes = fs.get(path).await?;
    let mut dataset: Dataset =
        serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Decode {
            path: path.to_string(),
            source,
        })?;
    dataset.path = path.to_string();
    Ok(dataset)
}

/// Read the body blob a dataset points at. Returns `None` if it has no body.
pub async fn read_body(fs: &dyn Filesystem, dataset: &Dataset) -> Result<Option<Value>> {
    if dataset.body_path.is_empty() {
        return Ok(None);
    }
    let bytes = fs.get(&dataset.body_path).await?;
    let body = serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Decode {
        path: dataset.body_path.clone(),
        source,
    })?;
    Ok(Some(body))
}

/// Read a dataset document and its body.
pub async fn read_full_snapshot(fs: &dyn Filesystem, path: &str) -> Result<Dataset> {
    let mut dataset = read_snapshot(fs, path).await?;
    dataset.body = read_body(fs, &dataset).await?;
    Ok(dataset)
}
