use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::dsref::VersionInfo;

use super::json_file::{self, JsonFileError};

/// Error type for repository index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// No entry exists for this init id.
    #[error("no index entry for dataset {init_id}")]
    NotFound { init_id: String },

    /// The index file could not be read or written.
    #[error(transparent)]
    File(#[from] JsonFileError),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// The repository's index of known datasets.
///
/// Entries are keyed by init id and carry the head snapshot path and, when
/// linked, the working directory.
#[async_trait]
pub trait RepoIndex: Send + Sync {
    /// Look up an entry by init id.
    async fn get(&self, init_id: &str) -> Result<VersionInfo>;

    /// Look up an entry by `username/name`.
    async fn get_by_alias(&self, username: &str, name: &str) -> Result<Option<VersionInfo>>;

    /// Look up the entry linked to a working directory.
    async fn get_by_fsi_path(&self, dir: &Path) -> Result<Option<VersionInfo>>;

    /// Insert or replace an entry.
    async fn put(&self, info: VersionInfo) -> Result<()>;

    /// Remove an entry. Removing a missing entry is not an error.
    async fn remove(&self, init_id: &str) -> Result<()>;

    /// All entries, ordered by alias.
    async fn list(&self) -> Result<Vec<VersionInfo>>;
}

// =============================================================================
// Index data
// =============================================================================

type IndexData = BTreeMap<String, VersionInfo>;

fn find_alias(data: &IndexData, username: &str, name: &str) -> Option<VersionInfo> {
    data.values()
        .find(|info| info.username == username && info.name == name)
        .cloned()
}

fn find_fsi_path(data: &IndexData, dir: &Path) -> Option<VersionInfo> {
    data.values()
        .find(|info| info.fsi_path.as_deref() == Some(dir))
        .cloned()
}

fn sorted(data: &IndexData) -> Vec<VersionInfo> {
    let mut entries: Vec<_> = data.values().cloned().collect();
    entries.sort_by_key(|info| info.alias());
    entries
}

// =============================================================================
// MemoryRepoIndex
// =============================================================================

/// An in-memory implementation of `RepoIndex`, intended primarily for testing.
#[derive(Default)]
pub struct MemoryRepoIndex {
    entries: RwLock<IndexData>,
}

impl MemoryRepoIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepoIndex for MemoryRepoIndex {
    async fn get(&self, init_id: &str) -> Result<VersionInfo> {
        let entries = self.entries.read().unwrap();
        entries.get(init_id).cloned().ok_or_else(|| IndexError::NotFound {
            init_id: init_id.to_string(),
        })
    }

    async fn get_by_alias(&self, username: &str, name: &str) -> Result<Option<VersionInfo>> {
        let entries = self.entries.read().unwrap();
        Ok(find_alias(&entries, username, name))
    }

    async fn get_by_fsi_path(&self, dir: &Path) -> Result<Option<VersionInfo>> {
        let entries = self.entries.read().unwrap();
        Ok(find_fsi_path(&entries, dir))
    }

    async fn put(&self, info: VersionInfo) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(info.init_id.clone(), info);
        Ok(())
    }

    async fn remove(&self, init_id: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.remove(init_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<VersionInfo>> {
        let entries = self.entries.read().unwrap();
        Ok(sorted(&entries))
    }
}

// =============================================================================
// FileRepoIndex
// =============================================================================

/// A `RepoIndex` persisted as a single JSON file.
///
/// Every operation reads the file; mutations rewrite it atomically. The
/// mutex serializes read-modify-write cycles within this process.
pub struct FileRepoIndex {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRepoIndex {
    /// Create an index stored at `<repo_dir>/index.json`.
    pub fn new(repo_dir: impl AsRef<Path>) -> Self {
        Self {
            path: repo_dir.as_ref().join("index.json"),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<IndexData> {
        Ok(json_file::load(&self.path).await?)
    }

    async fn save(&self, data: &IndexData) -> Result<()> {
        Ok(json_file::save(&self.path, data).await?)
    }
}

#[async_trait]
impl RepoIndex for FileRepoIndex {
    async fn get(&self, init_id: &str) -> Result<VersionInfo> {
        let data = self.load().await?;
        data.get(init_id).cloned().ok_or_else(|| IndexError::NotFound {
            init_id: init_id.to_string(),
        })
    }

    async fn get_by_alias(&self, username: &str, name: &str) -> Result<Option<VersionInfo>> {
        let data = self.load().await?;
        Ok(find_alias(&data, username, name))
    }

    async fn get_by_fsi_path(&self, dir: &Path) -> Result<Option<VersionInfo>> {
        let data = self.load().await?;
        Ok(find_fsi_path(&data, dir))
    }

    async fn put(&self, info: VersionInfo) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        data.insert(info.init_id.clone(), info);
        self.save(&data).await
    }

    async fn remove(&self, init_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        if data.remove(init_id).is_some() {
            self.save(&data).await?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<VersionInfo>> {
        let data = self.load().await?;
        Ok(sorted(&data))
    }
}
