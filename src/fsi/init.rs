use std::path::{Path, PathBuf};

use serde_json::json;

use crate::dataset::{BodyFormat, Commit, ComponentKind, Meta, Structure};
use crate::dsref::{Ref, VersionInfo};

use super::component::Component;
use super::component_files::{delete_component, read_components, write_component};
use super::error::{FsiError, Result};
use super::fsi::Fsi;
use super::link::read_marker;
use super::status::{ChangeType, StatusItem, diff, is_clean};

/// Commit title describing which components changed.
fn summarize(items: &[StatusItem]) -> String {
    let changed: Vec<&str> = items
        .iter()
        .filter(|item| item.change != ChangeType::Unmodified)
        .map(|item| item.component.as_str())
        .collect();
    match changed.as_slice() {
        [] => "no changes".to_string(),
        [one] => format!("updated {}", one),
        [init @ .., last] => format!("updated {} and {}", init.join(", "), last),
    }
}

fn starter_structure(format: BodyFormat) -> Structure {
    let format_config = match format {
        BodyFormat::Csv => Some(json!({"headerRow": false})),
        BodyFormat::Json => None,
    };
    Structure {
        format: format.to_string(),
        format_config,
        schema: Some(json!({"type": "array", "items": {"type": "array"}})),
        ..Default::default()
    }
}

impl Fsi {
    /// Create a new dataset and link it to `dir`, writing starter files for
    /// meta, structure and body unless the directory already has them.
    ///
    /// The dataset has no history until the first save.
    pub async fn init(
        &self,
        dir: &Path,
        reference: &Ref,
        body_format: Option<BodyFormat>,
    ) -> Result<VersionInfo> {
        if !dir.is_absolute() {
            return Err(FsiError::RelativePath {
                dir: dir.to_path_buf(),
            });
        }
        let reference = self.contextual(reference)?;
        if let Some(existing) = read_marker(dir).await? {
            return Err(FsiError::DirAlreadyLinked {
                dir: dir.to_path_buf(),
                alias: existing.alias(),
            });
        }

        let info = self
            .repo
            .init_dataset(&reference.username, &reference.name)
            .await?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(FsiError::io(dir))?;
        let info = self.links.create_link(dir, &info.simple_ref()).await?;

        let format = body_format.unwrap_or(self.options.body_format);
        let structure = starter_structure(format);
        let existing = read_components(dir).await?;
        let starters = [
            (
                ComponentKind::Meta,
                serde_json::to_value(Meta {
                    title: Some(reference.name.clone()),
                    ..Default::default()
                }),
            ),
            (ComponentKind::Structure, serde_json::to_value(&structure)),
            (ComponentKind::Body, Ok(json!([]))),
        ];
        for (kind, value) in starters {
            if existing.get(kind).is_some() {
                continue;
            }
            let value = value.map_err(|e| FsiError::Component {
                component: kind,
                file: dir.to_path_buf(),
                message: e.to_string(),
            })?;
            let structure = existing.structure().unwrap_or_else(|| structure.clone());
            write_component(dir, &Component::loaded(kind, value), Some(&structure), self.options)
                .await?;
        }

        tracing::info!(alias = %info.alias(), dir = %dir.display(), "initialized working directory");
        Ok(info)
    }

    /// Save a linked directory as a new snapshot.
    ///
    /// Any unreadable component file aborts the save. With history present,
    /// a clean directory fails with [`FsiError::NoChanges`]. An empty `title`
    /// is replaced by a summary of the changed components.
    pub async fn save(&self, dir: &Path, title: &str, message: &str) -> Result<VersionInfo> {
        let info = self.links.linked_info(dir).await?;
        let disk = read_components(dir).await?;
        let mut dataset = disk.to_dataset()?;

        let summary = if info.has_history() {
            let history = self.history_container(&info.path).await?;
            let mut compared = disk.clone();
            compared.drop_derived_values();
            compared.drop_unmaterialized();
            let items = diff(&history, &compared);
            if is_clean(&items) {
                return Err(FsiError::NoChanges {
                    dir: dir.to_path_buf(),
                });
            }

            // Script files hold only the script; the rest lives in snapshots.
            let previous = self.repo.read_snapshot(&info.path).await?;
            if let (Some(viz), Some(old)) = (dataset.viz.as_mut(), previous.viz) {
                viz.format = old.format;
            }
            if let (Some(transform), Some(old)) = (dataset.transform.as_mut(), previous.transform) {
                transform.syntax = old.syntax;
                if transform.config.is_none() {
                    transform.config = old.config;
                }
            }
            summarize(&items)
        } else {
            "created dataset".to_string()
        };
        let title = if title.is_empty() {
            summary
        } else {
            title.to_string()
        };

        dataset.commit = Some(Commit {
            title,
            message: message.to_string(),
            author: self.resolver.identity().map(str::to_string),
            ..Default::default()
        });
        let saved = self.repo.save_dataset(&info.simple_ref(), &dataset).await?;
        Ok(saved)
    }

    /// Remove a link given either its directory or its dataset. With
    /// `remove_files`, component files and the directory itself (if then
    /// empty) are deleted too. Returns the dataset alias.
    pub async fn unlink(
        &self,
        dir: Option<&Path>,
        reference: Option<&Ref>,
        remove_files: bool,
    ) -> Result<String> {
        let reference = reference.map(|r| self.contextual(r)).transpose()?;
        let target: Option<PathBuf> = match (dir, &reference) {
            (Some(dir), None) => Some(dir.to_path_buf()),
            (None, Some(reference)) if remove_files => self.repo.lookup(reference).await?.fsi_path,
            _ => None,
        };

        let alias = self.links.unlink(dir, reference.as_ref()).await?;

        if let (true, Some(dir)) = (remove_files, target) {
            for kind in ComponentKind::WORKING {
                delete_component(&dir, kind).await?;
            }
            if let Err(e) = tokio::fs::remove_dir(&dir).await {
                tracing::debug!(dir = %dir.display(), error = %e, "left working directory in place");
            }
        }
        Ok(alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::fsi::LINK_MARKER;
    use crate::repo::Repo;
    use crate::resolve::ResolverChain;

    fn fsi() -> Fsi {
        let repo = Repo::in_memory();
        let chain = ResolverChain::new(&repo).with_identity(Some("peer".to_string()));
        Fsi::new(repo, Arc::new(chain))
    }

    #[tokio::test]
    async fn test_init_save_cycle() {
        let fsi = fsi();
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cities");

        let info = fsi
            .init(&dir, &"me/cities".parse().unwrap(), Some(BodyFormat::Csv))
            .await
            .unwrap();
        assert_eq!(info.alias(), "peer/cities");
        assert!(!info.has_history());
        assert!(dir.join("body.csv").exists());
        assert!(dir.join(LINK_MARKER).exists());

        let status = fsi.status(&dir).await.unwrap();
        assert!(status.iter().all(|item| item.change == ChangeType::Add));

        let saved = fsi.save(&dir, "", "first import").await.unwrap();
        assert!(saved.has_history());
        assert_eq!(saved.commit_title.as_deref(), Some("created dataset"));
        assert_eq!(saved.fsi_path.as_deref(), Some(dir.as_path()));
        assert!(is_clean(&fsi.status(&dir).await.unwrap()));

        let err = fsi.save(&dir, "again", "").await.unwrap_err();
        assert!(matches!(err, FsiError::NoChanges { .. }));

        std::fs::write(dir.join("body.csv"), "toronto,2794356\n").unwrap();
        let saved = fsi.save(&dir, "", "").await.unwrap();
        assert_eq!(saved.commit_title.as_deref(), Some("updated body"));

        let history = fsi.repo().history(&saved.simple_ref()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].title, "updated body");
    }

    #[tokio::test]
    async fn test_save_aborts_on_parse_error() {
        let fsi = fsi();
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("broken");
        fsi.init(&dir, &Ref::new("peer", "broken"), None)
            .await
            .unwrap();
        std::fs::write(dir.join("meta.json"), "{oops").unwrap();

        let err = fsi.save(&dir, "", "").await.unwrap_err();
        match err {
            FsiError::Component { component, .. } => assert_eq!(component, ComponentKind::Meta),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_init_refuses_linked_dir() {
        let fsi = fsi();
        let temp = TempDir::new().unwrap();
        fsi.init(temp.path(), &Ref::new("peer", "one"), None)
            .await
            .unwrap();
        let err = fsi
            .init(temp.path(), &Ref::new("peer", "two"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FsiError::DirAlreadyLinked { .. }));
        assert!(
            fsi.repo()
                .lookup(&Ref::new("peer", "two"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_unlink_removes_files() {
        let fsi = fsi();
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tmp-data");
        fsi.init(&dir, &Ref::new("peer", "tmp"), None).await.unwrap();

        let alias = fsi
            .unlink(None, Some(&"me/tmp".parse().unwrap()), true)
            .await
            .unwrap();
        assert_eq!(alias, "peer/tmp");
        assert!(!dir.exists());

        let err = fsi
            .status_for_alias(&Ref::new("peer", "tmp"))
            .await
            .unwrap_err();
        assert!(matches!(err, FsiError::NotLinked { .. }));
    }

    #[test]
    fn test_summarize() {
        let item = |component, change| StatusItem {
            component,
            change,
            file: None,
            message: None,
        };
        let items = vec![
            item(ComponentKind::Meta, ChangeType::Modified),
            item(ComponentKind::Structure, ChangeType::Unmodified),
            item(ComponentKind::Viz, ChangeType::Add),
            item(ComponentKind::Body, ChangeType::Removed),
        ];
        assert_eq!(summarize(&items), "updated meta, viz and body");
    }
}
