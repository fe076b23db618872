//! Links between working directories and dataset identities.
//!
//! A link is recorded twice: a marker file inside the directory holding the
//! dataset alias, and the `fsi_path` of the dataset's index entry. Both sides
//! change together through a [`LinkTransaction`].

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::backend::{Event, RepoIndex};
use crate::dsref::{self, Ref, VersionInfo};
use crate::repo::Repo;

use super::error::{FsiError, Result};

/// Name of the marker file in a linked directory.
pub const LINK_MARKER: &str = ".dataset-ref";

/// What the marker and the index say about a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum LinkState {
    Unlinked,
    /// Marker and index agree.
    Linked { info: VersionInfo },
    /// A marker names a dataset whose index entry does not point here.
    MarkerWithoutIndex { alias: String },
    /// An index entry points here but the marker is missing.
    IndexWithoutMarker { info: VersionInfo },
}

fn require_absolute(dir: &Path) -> Result<()> {
    if dir.is_absolute() {
        Ok(())
    } else {
        Err(FsiError::RelativePath {
            dir: dir.to_path_buf(),
        })
    }
}

fn marker_path(dir: &Path) -> PathBuf {
    dir.join(LINK_MARKER)
}

/// Read and parse a directory's marker file, if there is one.
pub async fn read_marker(dir: &Path) -> Result<Option<Ref>> {
    let path = marker_path(dir);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(Some(dsref::parse(text.trim())?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FsiError::io(path)(e)),
    }
}

// =============================================================================
// LinkTransaction
// =============================================================================

/// A paired change to a marker file and an index entry.
///
/// The marker side is applied first. If the index update fails, the marker
/// change is undone before the error is returned.
struct LinkTransaction<'a> {
    index: &'a dyn RepoIndex,
    dir: &'a Path,
}

impl<'a> LinkTransaction<'a> {
    fn new(index: &'a dyn RepoIndex, dir: &'a Path) -> Self {
        Self { index, dir }
    }

    /// Write a fresh marker and point the index entry at the directory.
    ///
    /// Marker creation is exclusive: an existing marker is never overwritten.
    async fn create(&self, mut info: VersionInfo) -> Result<VersionInfo> {
        let path = marker_path(self.dir);
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let alias = read_marker(self.dir)
                    .await?
                    .map(|r| r.alias())
                    .unwrap_or_default();
                return Err(FsiError::DirAlreadyLinked {
                    dir: self.dir.to_path_buf(),
                    alias,
                });
            }
            Err(e) => return Err(FsiError::io(path)(e)),
        };

        let written = async {
            file.write_all(info.alias().as_bytes()).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            if let Err(undo) = tokio::fs::remove_file(&path).await {
                return Err(self.rollback_failed("marker write failed", e, undo));
            }
            return Err(FsiError::io(path)(e));
        }

        info.fsi_path = Some(self.dir.to_path_buf());
        if let Err(e) = self.index.put(info.clone()).await {
            tracing::warn!(dir = %self.dir.display(), error = %e, "index update failed, removing link marker");
            if let Err(undo) = tokio::fs::remove_file(&path).await {
                return Err(self.rollback_failed("index update failed", e, undo));
            }
            return Err(e.into());
        }
        Ok(info)
    }

    /// Remove the marker and clear the index entry's directory.
    async fn remove(&self, mut info: VersionInfo) -> Result<VersionInfo> {
        let path = marker_path(self.dir);
        let contents = tokio::fs::read(&path)
            .await
            .map_err(FsiError::io(&path))?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(FsiError::io(&path))?;

        info.fsi_path = None;
        if let Err(e) = self.index.put(info.clone()).await {
            tracing::warn!(dir = %self.dir.display(), error = %e, "index update failed, restoring link marker");
            if let Err(undo) = tokio::fs::write(&path, contents).await {
                return Err(self.rollback_failed("index update failed", e, undo));
            }
            return Err(e.into());
        }
        Ok(info)
    }

    /// The marker could not be put back after a failed step.
    fn rollback_failed(
        &self,
        step: &str,
        cause: impl std::fmt::Display,
        undo: std::io::Error,
    ) -> FsiError {
        tracing::error!(dir = %self.dir.display(), error = %cause, rollback_error = %undo, "link rollback failed");
        FsiError::InconsistentLink {
            dir: self.dir.to_path_buf(),
            reason: format!("{}: {}; rollback failed: {}", step, cause, undo),
        }
    }
}

// =============================================================================
// LinkRegistry
// =============================================================================

/// Creates, removes and inspects working directory links.
#[derive(Clone)]
pub struct LinkRegistry {
    repo: Repo,
}

impl LinkRegistry {
    pub fn new(repo: Repo) -> Self {
        Self { repo }
    }

    /// Report what the marker and the index say about `dir`, without
    /// repairing anything.
    pub async fn link_state(&self, dir: &Path) -> Result<LinkState> {
        let marker = read_marker(dir).await?;
        let indexed = self.repo.index().get_by_fsi_path(dir).await?;

        let state = match (marker, indexed) {
            (None, None) => LinkState::Unlinked,
            (None, Some(info)) => LinkState::IndexWithoutMarker { info },
            (Some(reference), _) => {
                let entry = self
                    .repo
                    .index()
                    .get_by_alias(&reference.username, &reference.name)
                    .await?;
                match entry {
                    Some(info) if info.fsi_path.as_deref() == Some(dir) => {
                        LinkState::Linked { info }
                    }
                    _ => LinkState::MarkerWithoutIndex {
                        alias: reference.alias(),
                    },
                }
            }
        };
        Ok(state)
    }

    /// The dataset linked to `dir`. Inconsistent links are errors.
    pub async fn linked_info(&self, dir: &Path) -> Result<VersionInfo> {
        match self.link_state(dir).await? {
            LinkState::Linked { info } => Ok(info),
            LinkState::Unlinked => Err(FsiError::NotLinked {
                target: dir.display().to_string(),
            }),
            LinkState::MarkerWithoutIndex { alias } => Err(FsiError::InconsistentLink {
                dir: dir.to_path_buf(),
                reason: format!("marker names {} but the index does not link it here", alias),
            }),
            LinkState::IndexWithoutMarker { info } => Err(FsiError::InconsistentLink {
                dir: dir.to_path_buf(),
                reason: format!("index links {} here but the marker is missing", info.alias()),
            }),
        }
    }

    /// Fail if the dataset is already linked to a directory.
    pub fn ensure_ref_not_linked(&self, info: &VersionInfo) -> Result<()> {
        match &info.fsi_path {
            Some(dir) => Err(FsiError::AlreadyLinked {
                alias: info.alias(),
                dir: dir.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Link `dir` to a dataset. Returns the entry with its new directory.
    pub async fn create_link(&self, dir: &Path, reference: &Ref) -> Result<VersionInfo> {
        require_absolute(dir)?;
        let info = self.repo.lookup(reference).await?;
        self.ensure_ref_not_linked(&info)?;
        if let Some(other) = self.repo.index().get_by_fsi_path(dir).await? {
            return Err(FsiError::DirAlreadyLinked {
                dir: dir.to_path_buf(),
                alias: other.alias(),
            });
        }

        let info = LinkTransaction::new(self.repo.index().as_ref(), dir)
            .create(info)
            .await?;

        tracing::info!(alias = %info.alias(), dir = %dir.display(), "linked working directory");
        self.repo.bus().publish(Event::LinkCreated {
            alias: info.alias(),
            dir: dir.to_path_buf(),
        });
        Ok(info)
    }

    /// Remove a link given either its directory or its dataset. Returns the
    /// dataset alias.
    pub async fn unlink(&self, dir: Option<&Path>, reference: Option<&Ref>) -> Result<String> {
        let dir = match (dir, reference) {
            (Some(dir), Some(reference)) => {
                return Err(FsiError::AmbiguousTarget {
                    dir: dir.to_path_buf(),
                    reference: reference.human(),
                });
            }
            (None, None) => return Err(FsiError::MissingTarget),
            (Some(dir), None) => {
                require_absolute(dir)?;
                dir.to_path_buf()
            }
            (None, Some(reference)) => {
                let info = self.repo.lookup(reference).await?;
                info.fsi_path.ok_or_else(|| FsiError::NotLinked {
                    target: reference.human(),
                })?
            }
        };

        let info = self.linked_info(&dir).await?;
        let info = LinkTransaction::new(self.repo.index().as_ref(), &dir)
            .remove(info)
            .await?;

        let alias = info.alias();
        tracing::info!(alias = %alias, dir = %dir.display(), "unlinked working directory");
        self.repo.bus().publish(Event::LinkRemoved {
            alias: alias.clone(),
            dir,
        });
        Ok(alias)
    }

    /// Point the index entry named by `dir`'s marker back at `dir`.
    ///
    /// Used after a linked directory has moved. The marker is not touched.
    pub async fn ensure_ref(&self, dir: &Path) -> Result<VersionInfo> {
        require_absolute(dir)?;
        let reference = read_marker(dir).await?.ok_or_else(|| FsiError::NotLinked {
            target: dir.display().to_string(),
        })?;
        self.modify_link_directory(dir, &reference).await
    }

    /// Rewrite a dataset's index entry to point at `dir`. The marker is not
    /// touched.
    pub async fn modify_link_directory(&self, dir: &Path, reference: &Ref) -> Result<VersionInfo> {
        require_absolute(dir)?;
        let mut info = self.repo.lookup(reference).await?;
        if info.fsi_path.as_deref() == Some(dir) {
            return Ok(info);
        }
        if let Some(other) = self.repo.index().get_by_fsi_path(dir).await? {
            if other.init_id != info.init_id {
                return Err(FsiError::DirAlreadyLinked {
                    dir: dir.to_path_buf(),
                    alias: other.alias(),
                });
            }
        }
        let previous = info.fsi_path.replace(dir.to_path_buf());
        self.repo.index().put(info.clone()).await?;
        tracing::info!(
            alias = %info.alias(),
            from = ?previous,
            to = %dir.display(),
            "moved link directory"
        );
        Ok(info)
    }

    /// Rewrite the marker in `dir` to name `reference`, after a rename. The
    /// index entry is not touched.
    pub async fn modify_link_reference(&self, dir: &Path, reference: &Ref) -> Result<()> {
        require_absolute(dir)?;
        if read_marker(dir).await?.is_none() {
            return Err(FsiError::NotLinked {
                target: dir.display().to_string(),
            });
        }
        let path = marker_path(dir);
        tokio::fs::write(&path, reference.alias())
            .await
            .map_err(FsiError::io(&path))?;
        Ok(())
    }
}
