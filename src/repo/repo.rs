//! Repository facade over the object store, index and logbook.
//!
//! The [`Repo`] struct bundles the collaborators every operation needs and
//! implements the write path for new dataset identities and snapshots.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::backend::{
    Event, EventBus, Filesystem, IndexError, LogEntry, Logbook, LogbookError, MemoryFilesystem,
    MemoryLogbook, MemoryRepoIndex, NoopBus, RepoIndex,
};
use crate::dataset::{self, Commit, Dataset, SnapshotError};
use crate::dsref::{Ref, VersionInfo};
use crate::resolve::VersionCache;

// =============================================================================
// Error Types
// =============================================================================

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The repository does not know this dataset.
    #[error("dataset {reference} not found in repository")]
    NotFound { reference: String },

    /// A dataset with this alias already exists.
    #[error("dataset {alias} already exists")]
    AlreadyExists { alias: String },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Logbook(#[from] LogbookError),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;

// =============================================================================
// Repo
// =============================================================================

/// A dataset repository.
///
/// `Repo` is cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct Repo {
    fs: Arc<dyn Filesystem>,
    index: Arc<dyn RepoIndex>,
    logbook: Arc<dyn Logbook>,
    cache: Arc<VersionCache>,
    bus: Arc<dyn EventBus>,
}

impl Repo {
    /// Create a repository from its collaborators, with an empty version cache
    /// and no event subscribers.
    pub fn new(
        fs: Arc<dyn Filesystem>,
        index: Arc<dyn RepoIndex>,
        logbook: Arc<dyn Logbook>,
    ) -> Self {
        Self {
            fs,
            index,
            logbook,
            cache: Arc::new(VersionCache::new()),
            bus: Arc::new(NoopBus),
        }
    }

    /// A repository held entirely in memory.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryFilesystem::new()),
            Arc::new(MemoryRepoIndex::new()),
            Arc::new(MemoryLogbook::new()),
        )
    }

    /// Set the event bus (builder pattern).
    pub fn with_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Set the version cache (builder pattern).
    pub fn with_cache(mut self, cache: Arc<VersionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn filesystem(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    pub fn index(&self) -> &Arc<dyn RepoIndex> {
        &self.index
    }

    pub fn logbook(&self) -> &Arc<dyn Logbook> {
        &self.logbook
    }

    pub fn cache(&self) -> &Arc<VersionCache> {
        &self.cache
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    /// Find a dataset's index entry by init id, falling back to its alias.
    pub async fn lookup(&self, reference: &Ref) -> Result<VersionInfo> {
        if !reference.init_id.is_empty() {
            match self.index.get(&reference.init_id).await {
                Ok(info) => return Ok(info),
                Err(IndexError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.index
            .get_by_alias(&reference.username, &reference.name)
            .await?
            .ok_or_else(|| RepoError::NotFound {
                reference: reference.human(),
            })
    }

    /// Create a new dataset identity with no history.
    pub async fn init_dataset(&self, username: &str, name: &str) -> Result<VersionInfo> {
        let alias = format!("{}/{}", username, name);
        if self.index.get_by_alias(username, name).await?.is_some() {
            return Err(RepoError::AlreadyExists { alias });
        }

        let init_id = match self.logbook.init_dataset(username, name).await {
            Ok(id) => id,
            Err(LogbookError::AlreadyExists { alias }) => {
                return Err(RepoError::AlreadyExists { alias });
            }
            Err(e) => return Err(e.into()),
        };

        let info = VersionInfo::new(init_id, username, name);
        self.index.put(info.clone()).await?;
        tracing::info!(alias = %alias, init_id = %info.init_id, "initialized dataset");
        Ok(info)
    }

    /// Persist a new snapshot as the head of an existing dataset.
    ///
    /// The body blob is stored before the dataset document; the logbook and
    /// index are only updated once both are in place.
    pub async fn save_dataset(&self, reference: &Ref, dataset: &Dataset) -> Result<VersionInfo> {
        let mut info = self.lookup(reference).await?;

        let mut snapshot = dataset.clone();
        snapshot.previous_path = info.path.clone();
        let commit = snapshot.commit.get_or_insert_with(Commit::default);
        if commit.timestamp.is_empty() {
            commit.timestamp = Utc::now().to_rfc3339();
        }
        let title = commit.title.clone();
        let timestamp = commit.timestamp.clone();

        let path = dataset::write_snapshot(self.fs.as_ref(), &snapshot).await?;
        self.logbook
            .write_version(
                &info.init_id,
                LogEntry {
                    path: path.clone(),
                    title: title.clone(),
                    timestamp: timestamp.clone(),
                },
            )
            .await?;

        info.path = path.clone();
        info.commit_title = Some(title);
        info.commit_time = Some(timestamp);
        self.index.put(info.clone()).await?;
        self.cache.put(info.clone());

        tracing::info!(alias = %info.alias(), path = %path, "saved dataset version");
        self.bus.publish(Event::DatasetSaved {
            alias: info.alias(),
            path,
        });
        Ok(info)
    }

    /// Version history of a dataset, newest first.
    pub async fn history(&self, reference: &Ref) -> Result<Vec<LogEntry>> {
        let info = self.lookup(reference).await?;
        let log = self.logbook.get(&info.init_id).await?;
        Ok(log.versions.into_iter().rev().collect())
    }

    /// Load a stored snapshot with its body.
    pub async fn read_snapshot(&self, path: &str) -> Result<Dataset> {
        Ok(dataset::read_full_snapshot(self.fs.as_ref(), path).await?)
    }
}
