//! Building a [`Repo`] from configuration.

use std::sync::Arc;

use crate::backend::{EventBus, FileLogbook, FileRepoIndex, LocalFilesystem};
use crate::config::{RepoConfig, StoreKind};

use super::Repo;

/// Open the repository described by the `[repo]` config section.
///
/// On-disk state is created lazily by the first write, so opening a
/// repository that does not exist yet is not an error.
pub fn open_repo(config: &RepoConfig, bus: Arc<dyn EventBus>) -> Repo {
    let repo = match config.store {
        StoreKind::Disk => {
            tracing::debug!(path = %config.path.display(), "opening on-disk repository");
            Repo::new(
                Arc::new(LocalFilesystem::new(&config.path)),
                Arc::new(FileRepoIndex::new(&config.path)),
                Arc::new(FileLogbook::new(&config.path)),
            )
        }
        StoreKind::Memory => {
            tracing::debug!("opening in-memory repository");
            Repo::in_memory()
        }
    };
    repo.with_bus(bus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NoopBus;
    use crate::dsref::Ref;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disk_repo_persists_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let config = RepoConfig {
            path: temp_dir.path().to_path_buf(),
            store: StoreKind::Disk,
        };

        let repo = open_repo(&config, Arc::new(NoopBus));
        repo.init_dataset("peer", "movies").await.unwrap();
        assert_eq!(repo.filesystem().kind(), "local");

        let reopened = open_repo(&config, Arc::new(NoopBus));
        assert!(reopened.lookup(&Ref::new("peer", "movies")).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_repo() {
        let config = RepoConfig {
            path: "/unused".into(),
            store: StoreKind::Memory,
        };
        let repo = open_repo(&config, Arc::new(NoopBus));
        assert_eq!(repo.filesystem().kind(), "mem");
    }
}
