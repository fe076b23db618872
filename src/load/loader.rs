//! Materializing resolved references into dataset documents.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::backend::{Event, EventBus, Filesystem, NoopBus, RemoteError, RemoteTransport};
use crate::dataset::{self, Dataset, SnapshotError};
use crate::dsref::{Ref, fsi_dir};
use crate::fsi::{self, FsiError};
use crate::repo::Repo;
use crate::util::Dedup;

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while loading a dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The reference has no path; resolve it first.
    #[error("reference {reference} is not resolved")]
    Unresolved { reference: String },

    #[error("loader is not configured: {message}")]
    Config { message: String },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The snapshot loaded but its body did not.
    #[error("loading body of {reference}: {source}")]
    Body {
        reference: String,
        source: SnapshotError,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("no remote named '{remote}' is configured")]
    UnknownRemote { remote: String },

    #[error(transparent)]
    Fsi(#[from] FsiError),
}

pub type Result<T> = std::result::Result<T, LoadError>;

// =============================================================================
// Loader
// =============================================================================

/// Loads datasets from local storage, linked directories, or remotes.
///
/// Concurrent pulls of the same snapshot from the same remote share one
/// transfer.
pub struct Loader {
    fs: Option<Arc<dyn Filesystem>>,
    remotes: HashMap<String, Arc<dyn RemoteTransport>>,
    pulls: Dedup<String, String, RemoteError>,
    bus: Arc<dyn EventBus>,
}

impl Loader {
    /// A loader over a local object store. `None` leaves the loader
    /// unconfigured: every snapshot load fails with [`LoadError::Config`].
    pub fn new(fs: Option<Arc<dyn Filesystem>>) -> Self {
        Self {
            fs,
            remotes: HashMap::new(),
            pulls: Dedup::new(),
            bus: Arc::new(NoopBus),
        }
    }

    /// A loader over a repository's object store and event bus.
    pub fn for_repo(repo: &Repo) -> Self {
        Self::new(Some(Arc::clone(repo.filesystem()))).with_bus(Arc::clone(repo.bus()))
    }

    /// Register a remote that can be pulled from (builder pattern).
    pub fn with_remote(mut self, remote: Arc<dyn RemoteTransport>) -> Self {
        self.remotes.insert(remote.name().to_string(), remote);
        self
    }

    /// Set the event bus (builder pattern).
    pub fn with_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Load the dataset a resolved reference points at.
    ///
    /// `source` is the resolver's answer: empty for local storage, otherwise
    /// the remote to pull from first. Working directory paths are read from
    /// the directory. Identity fields are stamped onto the result.
    pub async fn load_dataset(&self, reference: &Ref, source: &str) -> Result<Dataset> {
        if let Some(dir) = fsi_dir(&reference.path) {
            let mut ds = fsi::read_dir(&dir).await?;
            ds.stamp_identity(&reference.username, &reference.name, &reference.path);
            return Ok(ds);
        }

        let fs = self.fs.as_ref().ok_or_else(|| LoadError::Config {
            message: "no filesystem".to_string(),
        })?;

        let path = if source.is_empty() {
            if reference.path.is_empty() {
                return Err(LoadError::Unresolved {
                    reference: reference.human(),
                });
            }
            reference.path.clone()
        } else {
            self.pull(reference, source, fs).await?
        };

        let mut ds = dataset::read_snapshot(fs.as_ref(), &path).await?;
        ds.body = dataset::read_body(fs.as_ref(), &ds)
            .await
            .map_err(|source| LoadError::Body {
                reference: reference.human(),
                source,
            })?;
        ds.stamp_identity(&reference.username, &reference.name, &path);
        Ok(ds)
    }

    /// Pull a snapshot into local storage. Returns its local path.
    async fn pull(&self, reference: &Ref, source: &str, fs: &Arc<dyn Filesystem>) -> Result<String> {
        let remote = self
            .remotes
            .get(source)
            .ok_or_else(|| LoadError::UnknownRemote {
                remote: source.to_string(),
            })?;

        let key = format!("{}:{}", source, reference.human());
        self.bus.publish(Event::PullProgress {
            reference: reference.human(),
            remote: source.to_string(),
            message: format!("pulling {} from {}", reference.human(), source),
        });
        tracing::info!(reference = %reference.human(), remote = %source, "pulling dataset");

        let path = self
            .pulls
            .call(key, || {
                let remote = Arc::clone(remote);
                let fs = Arc::clone(fs);
                let reference = reference.clone();
                async move { remote.pull(&reference, fs.as_ref()).await }
            })
            .await?;

        self.bus.publish(Event::PullCompleted {
            reference: reference.human(),
            path: path.clone(),
        });
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bytes::Bytes;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::backend::{BroadcastBus, MemoryFilesystem, MemoryRemote, content_address};
    use crate::dataset::{Commit, Meta};
    use crate::dsref::fsi_path;

    fn movies() -> Dataset {
        Dataset {
            commit: Some(Commit {
                title: "initial commit".to_string(),
                ..Default::default()
            }),
            meta: Some(Meta {
                title: Some("Movies".to_string()),
                ..Default::default()
            }),
            body: Some(json!([["Alien", 1979]])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_local_load_stamps_identity() {
        let fs = Arc::new(MemoryFilesystem::new());
        let path = dataset::write_snapshot(fs.as_ref(), &movies()).await.unwrap();
        let loader = Loader::new(Some(fs));

        let reference = Ref::new("peer", "movies").with_path(&path);
        let ds = loader.load_dataset(&reference, "").await.unwrap();
        assert_eq!(ds.username, "peer");
        assert_eq!(ds.name, "movies");
        assert_eq!(ds.path, path);
        assert_eq!(ds.body, Some(json!([["Alien", 1979]])));
    }

    #[tokio::test]
    async fn test_unconfigured_and_unresolved() {
        let reference = Ref::new("peer", "movies").with_path("/mem/abc");
        let err = Loader::new(None).load_dataset(&reference, "").await.unwrap_err();
        assert!(matches!(err, LoadError::Config { .. }));

        let loader = Loader::new(Some(Arc::new(MemoryFilesystem::new())));
        let err = loader
            .load_dataset(&Ref::new("peer", "movies"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Unresolved { .. }));

        let err = loader
            .load_dataset(&Ref::new("peer", "movies"), "nowhere")
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::UnknownRemote { .. }));
    }

    #[tokio::test]
    async fn test_body_failure_has_context() {
        let fs = Arc::new(MemoryFilesystem::new());
        let doc = Dataset {
            body_path: content_address("mem", b"never stored"),
            ..Default::default()
        };
        let path = fs
            .put(Bytes::from(serde_json::to_vec(&doc).unwrap()))
            .await
            .unwrap();

        let loader = Loader::new(Some(fs));
        let reference = Ref::new("peer", "movies").with_path(&path);
        let err = loader.load_dataset(&reference, "").await.unwrap_err();
        match err {
            LoadError::Body { reference, .. } => assert!(reference.starts_with("peer/movies")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fsi_path_reads_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("meta.json"), r#"{"title": "Local"}"#).unwrap();

        let loader = Loader::new(None);
        let reference = Ref::new("peer", "movies").with_path(fsi_path(temp.path()));
        let ds = loader.load_dataset(&reference, "").await.unwrap();
        assert_eq!(ds.meta.unwrap().title.as_deref(), Some("Local"));
        assert_eq!(ds.name, "movies");
    }

    #[tokio::test]
    async fn test_concurrent_pulls_share_one_transfer() {
        let remote = Arc::new(MemoryRemote::new("peer-node").with_latency(Duration::from_millis(50)));
        let info = remote
            .publish("init-1", "peer", "movies", &movies())
            .await
            .unwrap();

        let bus = Arc::new(BroadcastBus::new(16));
        let mut events = bus.subscribe();
        let loader = Loader::new(Some(Arc::new(MemoryFilesystem::new())))
            .with_remote(remote.clone())
            .with_bus(bus);

        let reference = info.simple_ref();
        let (a, b) = tokio::join!(
            loader.load_dataset(&reference, "peer-node"),
            loader.load_dataset(&reference, "peer-node"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a, b);
        assert_eq!(a.path, info.path);
        assert_eq!(remote.pull_count(), 1);

        assert!(matches!(events.recv().await.unwrap(), Event::PullProgress { .. }));
    }
}
