//! Whole-file JSON persistence shared by the on-disk index and logbook.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Error reading or writing a JSON state file.
#[derive(Debug, Error)]
pub enum JsonFileError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Load a JSON file, returning the default value if it does not exist.
pub async fn load<T>(path: &Path) -> Result<T, JsonFileError>
where
    T: DeserializeOwned + Default,
{
    let data = match fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(JsonFileError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&data).map_err(|source| JsonFileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a value as pretty JSON, atomically replacing the file.
pub async fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), JsonFileError> {
    let io_err = |source| JsonFileError::Io {
        path: path.to_path_buf(),
        source,
    };

    let data = serde_json::to_vec_pretty(value).map_err(|source| JsonFileError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).await.map_err(io_err)?;

    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(".{}.tmp.{}.{}", file_name, std::process::id(), counter));

    fs::write(&temp_path, &data).await.map_err(io_err)?;
    fs::rename(&temp_path, path).await.map_err(io_err)?;
    Ok(())
}
