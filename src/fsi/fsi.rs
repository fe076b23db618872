//! The working directory service.

use std::path::Path;
use std::sync::Arc;

use crate::dsref::{Ref, VersionInfo};
use crate::repo::Repo;
use crate::resolve::ResolverChain;

use super::component::ComponentContainer;
use super::component_files::{FileOptions, read_components};
use super::error::{FsiError, Result};
use super::link::LinkRegistry;
use super::status::{StatusItem, diff};

/// Links working directories to datasets and keeps them in sync.
///
/// Operations are spread across submodules: checkout, write and restore,
/// init and save. This file holds construction and status.
#[derive(Clone)]
pub struct Fsi {
    pub(super) repo: Repo,
    pub(super) resolver: Arc<ResolverChain>,
    pub(super) links: LinkRegistry,
    pub(super) options: FileOptions,
}

impl Fsi {
    pub fn new(repo: Repo, resolver: Arc<ResolverChain>) -> Self {
        Self {
            links: LinkRegistry::new(repo.clone()),
            repo,
            resolver,
            options: FileOptions::default(),
        }
    }

    /// Set the formats used for newly written files (builder pattern).
    pub fn with_options(mut self, options: FileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    /// Copy a reference with `me` replaced by the active identity.
    pub(super) fn contextual(&self, reference: &Ref) -> Result<Ref> {
        let mut reference = reference.clone();
        self.resolver.rewrite_me(&mut reference)?;
        Ok(reference)
    }

    /// The index entry for a reference, which must be linked. Returns the
    /// entry and its directory.
    pub(super) async fn linked(&self, reference: &Ref) -> Result<(VersionInfo, std::path::PathBuf)> {
        let reference = self.contextual(reference)?;
        let info = self.repo.lookup(&reference).await?;
        match info.fsi_path.clone() {
            Some(dir) => Ok((info, dir)),
            None => Err(FsiError::NotLinked {
                target: reference.human(),
            }),
        }
    }

    /// Snapshot-side container for a version, ready for comparison. A
    /// dataset with no history yields an empty container.
    pub(super) async fn history_container(&self, path: &str) -> Result<ComponentContainer> {
        if path.is_empty() {
            return Ok(ComponentContainer::new());
        }
        let dataset = self.repo.read_snapshot(path).await?;
        let mut container = ComponentContainer::from_dataset(&dataset)?;
        container.drop_derived_values();
        container.drop_unmaterialized();
        Ok(container)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Status of a linked working directory against its dataset's head.
    pub async fn status(&self, dir: &Path) -> Result<Vec<StatusItem>> {
        let info = self.links.linked_info(dir).await?;
        self.status_at(&info, dir).await
    }

    /// Status of the directory linked to a dataset.
    pub async fn status_for_alias(&self, reference: &Ref) -> Result<Vec<StatusItem>> {
        let (info, dir) = self.linked(reference).await?;
        self.status_at(&info, &dir).await
    }

    /// Compare `dir` with the head snapshot named by `info`.
    pub async fn status_at(&self, info: &VersionInfo, dir: &Path) -> Result<Vec<StatusItem>> {
        let history = self.history_container(&info.path).await?;
        let mut disk = read_components(dir).await?;
        disk.drop_derived_values();
        disk.drop_unmaterialized();
        Ok(diff(&history, &disk))
    }
}
