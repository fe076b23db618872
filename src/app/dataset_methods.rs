//! Resolution and loading method group.

use serde::Serialize;

use crate::backend::LogEntry;
use crate::dataset::Dataset;
use crate::dsref::Ref;

use super::{App, Result};

/// A resolved reference and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveOutput {
    pub reference: Ref,
    /// Empty for local storage.
    pub source: String,
    pub resolver: String,
}

/// Dataset lookup operations, taking user-supplied reference strings.
pub struct DatasetMethods<'a> {
    app: &'a App,
}

impl<'a> DatasetMethods<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    fn mode<'m>(&'m self, mode: Option<&'m str>) -> &'m str {
        mode.unwrap_or(self.app.resolver().default_mode())
    }

    /// Resolve a reference to its head snapshot.
    pub async fn resolve(&self, reference: &str, mode: Option<&str>) -> Result<ResolveOutput> {
        let mut reference = self.app.parse_ref(reference)?;
        let resolved = self
            .app
            .resolver()
            .resolve(&mut reference, self.mode(mode))
            .await?;
        Ok(ResolveOutput {
            reference,
            source: resolved.source,
            resolver: resolved.resolver,
        })
    }

    /// Load a dataset. A linked dataset is read from its working directory
    /// unless the reference pins a snapshot path.
    pub async fn get(&self, reference: &str, mode: Option<&str>) -> Result<Dataset> {
        let mut reference = self.app.parse_ref(reference)?;
        let resolved = self
            .app
            .resolver()
            .resolve_working(&mut reference, self.mode(mode))
            .await?;
        Ok(self
            .app
            .loader()
            .load_dataset(&reference, &resolved.source)
            .await?)
    }

    /// Version history, newest first.
    pub async fn log(&self, reference: &str) -> Result<Vec<LogEntry>> {
        let mut reference = self.app.parse_ref(reference)?;
        self.app.resolver().rewrite_me(&mut reference)?;
        Ok(self.app.repo().history(&reference).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::app::AppError;
    use crate::app::app::tests::memory_config;
    use crate::backend::{MemoryRemote, RemoteTransport};
    use crate::dataset::{Commit, Meta};
    use crate::repo::Repo;
    use crate::resolve::ResolveError;

    fn cities(title: &str) -> Dataset {
        Dataset {
            commit: Some(Commit {
                title: title.to_string(),
                ..Default::default()
            }),
            meta: Some(Meta {
                title: Some("Cities".to_string()),
                ..Default::default()
            }),
            body: Some(json!([["Lagos", 15388000], ["Oslo", 709037]])),
            ..Default::default()
        }
    }

    async fn local_app() -> App {
        let repo = Repo::in_memory();
        repo.init_dataset("peer", "cities").await.unwrap();
        let reference = Ref::new("peer", "cities");
        repo.save_dataset(&reference, &cities("first")).await.unwrap();
        repo.save_dataset(&reference, &cities("second")).await.unwrap();
        App::with_remotes(memory_config(Some("peer")), repo, Vec::new())
    }

    #[tokio::test]
    async fn test_resolve_me() {
        let app = local_app().await;
        let output = app.dataset_methods().resolve("me/cities", None).await.unwrap();
        assert_eq!(output.reference.username, "peer");
        assert!(!output.reference.init_id.is_empty());
        assert!(!output.reference.path.is_empty());
        assert!(output.source.is_empty());
    }

    #[tokio::test]
    async fn test_log_is_newest_first() {
        let app = local_app().await;
        let entries = app.dataset_methods().log("me/cities").await.unwrap();
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_get_prefers_working_directory_unless_pinned() {
        let app = local_app().await;
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cities");
        app.fsi_methods().checkout(&dir, "peer/cities").await.unwrap();
        std::fs::write(dir.join("meta.json"), r#"{"title": "Edited"}"#).unwrap();

        let working = app.dataset_methods().get("peer/cities", None).await.unwrap();
        assert_eq!(working.meta.unwrap().title.as_deref(), Some("Edited"));

        let head = app.dataset_methods().resolve("peer/cities", None).await.unwrap();
        let pinned = format!("peer/cities@{}", head.reference.path);
        let stored = app.dataset_methods().get(&pinned, None).await.unwrap();
        assert_eq!(stored.meta.unwrap().title.as_deref(), Some("Cities"));
        assert_eq!(stored.path, head.reference.path);
    }

    #[tokio::test]
    async fn test_get_pulls_from_remote() {
        let remote = Arc::new(MemoryRemote::new("peer-node"));
        remote
            .publish("init-remote", "peer", "cities", &cities("remote"))
            .await
            .unwrap();
        let remotes: Vec<Arc<dyn RemoteTransport>> = vec![remote.clone()];
        let app = App::with_remotes(memory_config(None), Repo::in_memory(), remotes);

        let resolved = app.dataset_methods().resolve("peer/cities", None).await.unwrap();
        assert_eq!(resolved.source, "peer-node");

        let ds = app.dataset_methods().get("peer/cities", None).await.unwrap();
        assert_eq!(ds.body, cities("remote").body);
        assert_eq!(remote.pull_count(), 1);

        let err = app
            .dataset_methods()
            .get("peer/cities", Some("local"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Resolve(ResolveError::NotFound { .. })));
        assert_eq!(remote.pull_count(), 1);
    }
}
