use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use super::json_file::{self, JsonFileError};

/// Error type for logbook operations.
#[derive(Debug, Error)]
pub enum LogbookError {
    /// No history exists for this init id.
    #[error("no logbook entry for dataset {init_id}")]
    NotFound { init_id: String },

    /// A dataset with this alias already exists.
    #[error("dataset {alias} already exists")]
    AlreadyExists { alias: String },

    /// The logbook file could not be read or written.
    #[error(transparent)]
    File(#[from] JsonFileError),
}

pub type Result<T> = std::result::Result<T, LogbookError>;

/// One saved version of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Content address of the snapshot.
    pub path: String,
    /// Commit title.
    pub title: String,
    /// Commit time in RFC 3339 format.
    pub timestamp: String,
}

/// The append-only history of one dataset identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetLog {
    pub init_id: String,
    pub username: String,
    pub name: String,
    /// Creation time in RFC 3339 format.
    pub created: String,
    /// Versions, oldest first.
    #[serde(default)]
    pub versions: Vec<LogEntry>,
}

impl DatasetLog {
    /// The most recent version, if any.
    pub fn head(&self) -> Option<&LogEntry> {
        self.versions.last()
    }
}

/// The append-only identity and history log.
#[async_trait]
pub trait Logbook: Send + Sync {
    /// Create a new dataset identity with no history. Returns its init id.
    async fn init_dataset(&self, username: &str, name: &str) -> Result<String>;

    /// Append a version to a dataset's history.
    async fn write_version(&self, init_id: &str, entry: LogEntry) -> Result<()>;

    /// The history of a dataset.
    async fn get(&self, init_id: &str) -> Result<DatasetLog>;

    /// Find a dataset's history by `username/name`.
    async fn find_alias(&self, username: &str, name: &str) -> Result<Option<DatasetLog>>;
}

// =============================================================================
// Logbook data
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogbookData {
    datasets: BTreeMap<String, DatasetLog>,
}

impl LogbookData {
    fn find_alias(&self, username: &str, name: &str) -> Option<&DatasetLog> {
        self.datasets
            .values()
            .find(|log| log.username == username && log.name == name)
    }

    fn init_dataset(&mut self, username: &str, name: &str) -> Result<String> {
        if self.find_alias(username, name).is_some() {
            return Err(LogbookError::AlreadyExists {
                alias: format!("{}/{}", username, name),
            });
        }
        let init_id = uuid::Uuid::new_v4().to_string();
        self.datasets.insert(
            init_id.clone(),
            DatasetLog {
                init_id: init_id.clone(),
                username: username.to_string(),
                name: name.to_string(),
                created: chrono::Utc::now().to_rfc3339(),
                versions: Vec::new(),
            },
        );
        Ok(init_id)
    }

    fn write_version(&mut self, init_id: &str, entry: LogEntry) -> Result<()> {
        let log = self
            .datasets
            .get_mut(init_id)
            .ok_or_else(|| LogbookError::NotFound {
                init_id: init_id.to_string(),
            })?;
        log.versions.push(entry);
        Ok(())
    }

    fn get(&self, init_id: &str) -> Result<DatasetLog> {
        self.datasets
            .get(init_id)
            .cloned()
            .ok_or_else(|| LogbookError::NotFound {
                init_id: init_id.to_string(),
            })
    }
}

// =============================================================================
// MemoryLogbook
// =============================================================================

/// An in-memory implementation of `Logbook`, intended primarily for testing.
#[derive(Default)]
pub struct MemoryLogbook {
    data: RwLock<LogbookData>,
}

impl MemoryLogbook {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Logbook for MemoryLogbook {
    async fn init_dataset(&self, username: &str, name: &str) -> Result<String> {
        self.data.write().unwrap().init_dataset(username, name)
    }

    async fn write_version(&self, init_id: &str, entry: LogEntry) -> Result<()> {
        self.data.write().unwrap().write_version(init_id, entry)
    }

    async fn get(&self, init_id: &str) -> Result<DatasetLog> {
        self.data.read().unwrap().get(init_id)
    }

    async fn find_alias(&self, username: &str, name: &str) -> Result<Option<DatasetLog>> {
        Ok(self.data.read().unwrap().find_alias(username, name).cloned())
    }
}

// =============================================================================
// FileLogbook
// =============================================================================

/// A `Logbook` persisted as a single JSON file at `<repo_dir>/logbook.json`.
pub struct FileLogbook {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLogbook {
    pub fn new(repo_dir: impl AsRef<Path>) -> Self {
        Self {
            path: repo_dir.as_ref().join("logbook.json"),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<LogbookData> {
        Ok(json_file::load(&self.path).await?)
    }

    async fn save(&self, data: &LogbookData) -> Result<()> {
        Ok(json_file::save(&self.path, data).await?)
    }
}

#[async_trait]
impl Logbook for FileLogbook {
    async fn init_dataset(&self, username: &str, name: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        let init_id = data.init_dataset(username, name)?;
        self.save(&data).await?;
        Ok(init_id)
    }

    async fn write_version(&self, init_id: &str, entry: LogEntry) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        data.write_version(init_id, entry)?;
        self.save(&data).await
    }

    async fn get(&self, init_id: &str) -> Result<DatasetLog> {
        self.load().await?.get(init_id)
    }

    async fn find_alias(&self, username: &str, name: &str) -> Result<Option<DatasetLog>> {
        Ok(self.load().await?.find_alias(username, name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(path: &str, title: &str) -> LogEntry {
        LogEntry {
            path: path.to_string(),
            title: title.to_string(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    async fn exercise(logbook: &dyn Logbook) {
        let init_id = logbook.init_dataset("peer", "movies").await.unwrap();
        assert!(!init_id.is_empty());

        let log = logbook.get(&init_id).await.unwrap();
        assert!(log.head().is_none());

        assert!(matches!(
            logbook.init_dataset("peer", "movies").await,
            Err(LogbookError::AlreadyExists { .. })
        ));

        logbook
            .write_version(&init_id, entry("/mem/a", "first"))
            .await
            .unwrap();
        logbook
            .write_version(&init_id, entry("/mem/b", "second"))
            .await
            .unwrap();

        let log = logbook.find_alias("peer", "movies").await.unwrap().unwrap();
        assert_eq!(log.init_id, init_id);
        assert_eq!(log.versions.len(), 2);
        assert_eq!(log.head().unwrap().path, "/mem/b");

        assert!(logbook.find_alias("peer", "other").await.unwrap().is_none());
        assert!(matches!(
            logbook.write_version("missing", entry("/mem/c", "x")).await,
            Err(LogbookError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_logbook() {
        exercise(&MemoryLogbook::new()).await;
    }

    #[tokio::test]
    async fn test_file_logbook() {
        let temp_dir = TempDir::new().unwrap();
        exercise(&FileLogbook::new(temp_dir.path())).await;
        assert!(temp_dir.path().join("logbook.json").exists());
    }
}
