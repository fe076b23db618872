use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::backend::Event;
use crate::dataset::Dataset;
use crate::dsref::{Ref, VersionInfo};
use crate::resolve::ResolveError;

use super::component::ComponentContainer;
use super::component_files::{WriteFailure, write_components};
use super::error::{FsiError, Result};
use super::fsi::Fsi;

/// Outcome of a checkout.
///
/// Component write failures do not undo the checkout; the directory stays
/// linked and can be repaired with a restore.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub info: VersionInfo,
    pub written: Vec<PathBuf>,
    pub failures: Vec<WriteFailure>,
}

impl CheckoutResult {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Fsi {
    /// Materialize a dataset into a new directory and link it.
    ///
    /// Every precondition is checked before the filesystem is touched: `dir`
    /// must be absolute and must not exist, the reference must resolve to
    /// local storage, and the dataset must not be linked elsewhere.
    pub async fn checkout(&self, dir: &Path, reference: &Ref) -> Result<CheckoutResult> {
        if !dir.is_absolute() {
            return Err(FsiError::RelativePath {
                dir: dir.to_path_buf(),
            });
        }
        if tokio::fs::try_exists(dir)
            .await
            .map_err(FsiError::io(dir))?
        {
            return Err(FsiError::AlreadyExists {
                dir: dir.to_path_buf(),
            });
        }

        let mut reference = reference.clone();
        let mode = self.resolver.default_mode().to_string();
        match self.resolver.resolve(&mut reference, &mode).await {
            Ok(resolved) if !resolved.is_local() => {
                return Err(FsiError::RemoteCheckout {
                    reference: reference.human(),
                    remote: resolved.source,
                });
            }
            Ok(_) | Err(ResolveError::NoHistory { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let info = self.repo.lookup(&reference).await?;
        self.links.ensure_ref_not_linked(&info)?;

        let dataset = if reference.path.is_empty() {
            Dataset::default()
        } else {
            self.repo.read_snapshot(&reference.path).await?
        };
        let mut container = ComponentContainer::from_dataset(&dataset)?;
        container.drop_derived_values();

        if let Some(parent) = dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(FsiError::io(parent))?;
        }
        // Exclusive create: of two racing checkouts only one gets here.
        match tokio::fs::create_dir(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(FsiError::AlreadyExists {
                    dir: dir.to_path_buf(),
                });
            }
            Err(e) => return Err(FsiError::io(dir)(e)),
        }

        let info = self.links.create_link(dir, &reference).await?;
        let report = write_components(dir, &container, self.options).await;

        tracing::info!(
            alias = %info.alias(),
            dir = %dir.display(),
            files = report.written.len(),
            failures = report.failures.len(),
            "checked out dataset"
        );
        self.repo.bus().publish(Event::CheckoutCompleted {
            alias: info.alias(),
            dir: dir.to_path_buf(),
        });

        Ok(CheckoutResult {
            info,
            written: report.written,
            failures: report.failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use crate::backend::MemoryRemote;
    use crate::dataset::{Commit, Meta, Transform, Viz};
    use crate::fsi::{ChangeType, LINK_MARKER};
    use crate::repo::Repo;
    use crate::resolve::{RemoteResolver, ResolverChain};

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
            body: Some(json!([["Alien", 1979], ["Heat", 1995]])),
            ..Default::default()
        }
    }

    async fn setup() -> (TempDir, Fsi) {
        let repo = Repo::in_memory();
        repo.init_dataset("peer", "movies").await.unwrap();
        repo.save_dataset(&Ref::new("peer", "movies"), &movies())
            .await
            .unwrap();
        let chain = Arc::new(ResolverChain::new(&repo));
        (TempDir::new().unwrap(), Fsi::new(repo, chain))
    }

    #[tokio::test]
    async fn test_checkout_writes_files_and_links() {
        let (temp, fsi) = setup().await;
        let dir = temp.path().join("movies");

        let result = fsi.checkout(&dir, &Ref::new("peer", "movies")).await.unwrap();
        assert!(result.is_complete());
        assert_eq!(result.info.fsi_path.as_deref(), Some(dir.as_path()));
        for name in [LINK_MARKER, "meta.json", "structure.json", "body.json"] {
            assert!(dir.join(name).exists(), "missing {}", name);
        }

        let status = fsi.status(&dir).await.unwrap();
        assert_eq!(status.len(), 3);
        assert!(status.iter().all(|item| item.change == ChangeType::Unmodified));
    }

    #[tokio::test]
    async fn test_checkout_into_existing_dir_fails() {
        let (temp, fsi) = setup().await;
        let err = fsi
            .checkout(temp.path(), &Ref::new("peer", "movies"))
            .await
            .unwrap_err();
        assert!(matches!(err, FsiError::AlreadyExists { .. }));
        assert!(!temp.path().join(LINK_MARKER).exists());
        let info = fsi.repo().lookup(&Ref::new("peer", "movies")).await.unwrap();
        assert!(info.fsi_path.is_none());
    }

    #[tokio::test]
    async fn test_second_checkout_of_linked_dataset_fails_before_mkdir() {
        let (temp, fsi) = setup().await;
        fsi.checkout(&temp.path().join("a"), &Ref::new("peer", "movies"))
            .await
            .unwrap();

        let second = temp.path().join("b");
        let err = fsi
            .checkout(&second, &Ref::new("peer", "movies"))
            .await
            .unwrap_err();
        assert!(matches!(err, FsiError::AlreadyLinked { .. }));
        assert!(!second.exists());
    }

    #[tokio::test]
    async fn test_checkout_without_history() {
        let (temp, fsi) = setup().await;
        fsi.repo().init_dataset("peer", "empty").await.unwrap();
        let dir = temp.path().join("empty");
        let result = fsi.checkout(&dir, &Ref::new("peer", "empty")).await.unwrap();
        assert!(result.written.is_empty());
        assert!(dir.join(LINK_MARKER).exists());
    }

    #[tokio::test]
    async fn test_checkout_never_pulls() {
        let repo = Repo::in_memory();
        let remote = Arc::new(MemoryRemote::new("peer-node"));
        remote
            .publish("init-1", "peer", "remote-only", &movies())
            .await
            .unwrap();
        let chain = Arc::new(
            ResolverChain::new(&repo).with_remote(Arc::new(RemoteResolver::new(remote.clone()))),
        );
        let fsi = Fsi::new(repo, chain);

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("remote-only");
        let err = fsi
            .checkout(&dir, &Ref::new("peer", "remote-only"))
            .await
            .unwrap_err();
        match err {
            FsiError::RemoteCheckout { remote: name, .. } => assert_eq!(name, "peer-node"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.exists());
        assert_eq!(remote.pull_count(), 0);
    }

    #[tokio::test]
    async fn test_relative_dir_rejected() {
        let (_temp, fsi) = setup().await;
        let err = fsi
            .checkout(Path::new("movies"), &Ref::new("peer", "movies"))
            .await
            .unwrap_err();
        assert!(matches!(err, FsiError::RelativePath { .. }));
    }

    #[tokio::test]
    async fn test_scripts_with_custom_format_round_trip() {
        let (temp, fsi) = setup().await;
        let mut scripted = movies();
        scripted.viz = Some(Viz {
            format: "text".to_string(),
            script: "{{ title }}".to_string(),
        });
        scripted.transform = Some(Transform {
            syntax: "python".to_string(),
            script: "def transform(ds): pass".to_string(),
            config: Some(json!({"limit": 10})),
        });
        let reference = Ref::new("peer", "movies");
        fsi.repo().save_dataset(&reference, &scripted).await.unwrap();

        let dir = temp.path().join("movies");
        fsi.checkout(&dir, &reference).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.join("viz.html")).unwrap(),
            "{{ title }}"
        );
        let status = fsi.status(&dir).await.unwrap();
        assert_eq!(status.len(), 5);
        assert!(status.iter().all(|item| item.change == ChangeType::Unmodified));

        let restored = fsi.restore(&reference, None, None).await.unwrap();
        assert_eq!(restored, status);

        // Saving an edited script keeps the snapshot-only fields.
        std::fs::write(dir.join("viz.html"), "{{ year }}").unwrap();
        let saved = fsi.save(&dir, "", "").await.unwrap();
        let head = fsi.repo().read_snapshot(&saved.path).await.unwrap();
        let viz = head.viz.unwrap();
        assert_eq!(viz.format, "text");
        assert_eq!(viz.script, "{{ year }}");
        let transform = head.transform.unwrap();
        assert_eq!(transform.syntax, "python");
        assert_eq!(transform.config, Some(json!({"limit": 10})));
    }
}
