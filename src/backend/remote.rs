use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::dataset::{self, Dataset};
use crate::dsref::{Ref, VersionInfo};

use super::filesystem::Filesystem;
use super::memory_filesystem::MemoryFilesystem;

/// Error type for remote transport operations.
///
/// Cloneable so a single pull failure can be shared by every caller waiting
/// on the same pull.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The remote does not know this dataset.
    #[error("{remote}: dataset {reference} not found")]
    NotFound { remote: String, reference: String },

    /// The remote could not be reached.
    #[error("{remote} is unreachable: {reason}")]
    Unreachable { remote: String, reason: String },

    /// Data could not be transferred into local storage.
    #[error("pulling {reference} from {remote}: {reason}")]
    Transfer {
        remote: String,
        reference: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// A source of datasets held elsewhere.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Identifier reported as the resolved source of references this remote resolves.
    fn name(&self) -> &str;

    /// Resolve a reference to the remote's head version.
    async fn resolve_ref(&self, reference: &Ref) -> Result<VersionInfo>;

    /// Copy a snapshot into local storage and return its local path.
    ///
    /// The body is stored before the dataset document, so an interrupted pull
    /// never leaves a loadable partial snapshot behind.
    async fn pull(&self, reference: &Ref, into: &dyn Filesystem) -> Result<String>;
}

// =============================================================================
// MemoryRemote
// =============================================================================

/// An in-memory peer that resolves and serves published datasets.
pub struct MemoryRemote {
    name: String,
    store: MemoryFilesystem,
    heads: RwLock<HashMap<String, VersionInfo>>,
    pulls: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryRemote {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: MemoryFilesystem::new(),
            heads: RwLock::new(HashMap::new()),
            pulls: AtomicUsize::new(0),
            latency: None,
        }
    }

    /// Delay every pull by `latency` before transferring (builder pattern).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Store a dataset on the remote as the head of `username/name`.
    pub async fn publish(
        &self,
        init_id: &str,
        username: &str,
        name: &str,
        dataset: &Dataset,
    ) -> std::result::Result<VersionInfo, dataset::SnapshotError> {
        let path = dataset::write_snapshot(&self.store, dataset).await?;
        let mut info = VersionInfo::new(init_id, username, name);
        info.path = path;
        info.commit_title = dataset.commit.as_ref().map(|c| c.title.clone());
        self.heads
            .write()
            .unwrap()
            .insert(info.alias(), info.clone());
        Ok(info)
    }

    /// Number of pulls started against this remote.
    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    fn not_found(&self, reference: &Ref) -> RemoteError {
        RemoteError::NotFound {
            remote: self.name.clone(),
            reference: reference.human(),
        }
    }
}

#[async_trait]
impl RemoteTransport for MemoryRemote {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve_ref(&self, reference: &Ref) -> Result<VersionInfo> {
        let heads = self.heads.read().unwrap();
        heads
            .get(&reference.alias())
            .cloned()
            .ok_or_else(|| self.not_found(reference))
    }

    async fn pull(&self, reference: &Ref, into: &dyn Filesystem) -> Result<String> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let path = if reference.path.is_empty() {
            self.resolve_ref(reference).await?.path
        } else {
            reference.path.clone()
        };

        let transfer = |reason: String| RemoteError::Transfer {
            remote: self.name.clone(),
            reference: reference.human(),
            reason,
        };

        let snapshot = match dataset::read_full_snapshot(&self.store, &path).await {
            Ok(ds) => ds,
            Err(dataset::SnapshotError::Filesystem(super::FilesystemError::NotFound(_))) => {
                return Err(self.not_found(reference));
            }
            Err(e) => return Err(transfer(e.to_string())),
        };

        dataset::write_snapshot(into, &snapshot)
            .await
            .map_err(|e| transfer(e.to_string()))
    }
}
