use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::filesystem::{Filesystem, FilesystemError, Result, content_address, object_hash};

/// Counter for generating unique temp file names.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A directory-backed implementation of `Filesystem`.
///
/// Blobs live at `<base>/objects/<hex>`. Writes are atomic: data is written to
/// a temp file in `<base>/tmp/` then renamed into place.
pub struct LocalFilesystem {
    base_path: PathBuf,
}

impl LocalFilesystem {
    /// Create a store rooted at the given repository directory.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    fn temp_dir(&self) -> PathBuf {
        self.base_path.join("tmp")
    }

    fn temp_file_path(&self) -> PathBuf {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        self.temp_dir().join(format!("tmp.{}.{}", pid, counter))
    }

    fn object_path(&self, path: &str) -> Result<PathBuf> {
        let hash = object_hash(self.kind(), path)?;
        Ok(self.objects_dir().join(hash))
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn put(&self, data: Bytes) -> Result<String> {
        let path = content_address(self.kind(), &data);
        let full_path = self.object_path(&path)?;
        if fs::try_exists(&full_path).await? {
            return Ok(path);
        }

        let temp_path = self.temp_file_path();
        fs::create_dir_all(self.temp_dir()).await?;
        fs::write(&temp_path, &data).await?;

        fs::create_dir_all(self.objects_dir()).await?;
        fs::rename(&temp_path, &full_path).await?;
        Ok(path)
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let full_path = self.object_path(path)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FilesystemError::NotFound(path.to_string()))
            }
            Err(e) => Err(FilesystemError::Io(e)),
        }
    }

    async fn has(&self, path: &str) -> Result<bool> {
        let full_path = self.object_path(path)?;
        Ok(fs::try_exists(&full_path).await?)
    }
}
