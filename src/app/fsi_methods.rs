//! Working directory method group.

use std::path::Path;

use crate::dataset::{BodyFormat, ComponentKind, Dataset};
use crate::dsref::{Ref, VersionInfo};
use crate::fsi::{CheckoutResult, LinkState, StatusItem};

use super::{App, Result};

/// Working directory operations, taking user-supplied reference strings.
pub struct FsiMethods<'a> {
    app: &'a App,
}

impl<'a> FsiMethods<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    /// Parse a reference and replace `me` with the active identity.
    fn reference(&self, input: &str) -> Result<Ref> {
        let mut reference = self.app.parse_ref(input)?;
        self.app.resolver().rewrite_me(&mut reference)?;
        Ok(reference)
    }

    pub async fn checkout(&self, dir: &Path, reference: &str) -> Result<CheckoutResult> {
        let reference = self.reference(reference)?;
        Ok(self.app.fsi().checkout(dir, &reference).await?)
    }

    pub async fn status(&self, dir: &Path) -> Result<Vec<StatusItem>> {
        Ok(self.app.fsi().status(dir).await?)
    }

    pub async fn status_for_alias(&self, reference: &str) -> Result<Vec<StatusItem>> {
        let reference = self.reference(reference)?;
        Ok(self.app.fsi().status_for_alias(&reference).await?)
    }

    pub async fn write(&self, reference: &str, dataset: &Dataset) -> Result<Vec<StatusItem>> {
        let reference = self.reference(reference)?;
        Ok(self.app.fsi().write(&reference, dataset).await?)
    }

    /// Restore component files. `component` names one component by name or
    /// short alias; `None` restores all of them.
    pub async fn restore(
        &self,
        reference: &str,
        version: Option<&str>,
        component: Option<&str>,
    ) -> Result<Vec<StatusItem>> {
        let reference = self.reference(reference)?;
        let component = component.map(str::parse::<ComponentKind>).transpose()?;
        Ok(self
            .app
            .fsi()
            .restore(&reference, version, component)
            .await?)
    }

    pub async fn link(&self, dir: &Path, reference: &str) -> Result<VersionInfo> {
        let reference = self.reference(reference)?;
        Ok(self.app.fsi().links().create_link(dir, &reference).await?)
    }

    pub async fn unlink(
        &self,
        dir: Option<&Path>,
        reference: Option<&str>,
        remove_files: bool,
    ) -> Result<String> {
        let reference = reference.map(|r| self.reference(r)).transpose()?;
        Ok(self
            .app
            .fsi()
            .unlink(dir, reference.as_ref(), remove_files)
            .await?)
    }

    /// Repair the index after a linked directory has moved.
    pub async fn ensure_ref(&self, dir: &Path) -> Result<VersionInfo> {
        Ok(self.app.fsi().links().ensure_ref(dir).await?)
    }

    /// The dataset linked to `dir`.
    pub async fn linked_info(&self, dir: &Path) -> Result<VersionInfo> {
        Ok(self.app.fsi().links().linked_info(dir).await?)
    }

    pub async fn link_state(&self, dir: &Path) -> Result<LinkState> {
        Ok(self.app.fsi().links().link_state(dir).await?)
    }

    pub async fn init(
        &self,
        dir: &Path,
        reference: &str,
        body_format: Option<BodyFormat>,
    ) -> Result<VersionInfo> {
        let reference = self.reference(reference)?;
        Ok(self.app.fsi().init(dir, &reference, body_format).await?)
    }

    pub async fn save(&self, dir: &Path, title: &str, message: &str) -> Result<VersionInfo> {
        Ok(self.app.fsi().save(dir, title, message).await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::app::AppError;
    use crate::app::app::tests::memory_config;
    use crate::dataset::{Commit, Meta};
    use crate::fsi::{ChangeType, FsiError};
    use crate::repo::Repo;

    async fn movies_app() -> App {
        let repo = Repo::in_memory();
        repo.init_dataset("peer", "movies").await.unwrap();
        let movies = Dataset {
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
        };
        repo.save_dataset(&Ref::new("peer", "movies"), &movies)
            .await
            .unwrap();
        App::with_remotes(memory_config(Some("peer")), repo, Vec::new())
    }

    fn change_of(items: &[StatusItem], kind: ComponentKind) -> ChangeType {
        items
            .iter()
            .find(|item| item.component == kind)
            .map(|item| item.change)
            .unwrap()
    }

    #[tokio::test]
    async fn test_edit_then_status_then_restore() {
        let app = movies_app().await;
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("movies");
        let methods = app.fsi_methods();

        methods.checkout(&dir, "me/movies").await.unwrap();
        std::fs::write(dir.join("meta.json"), r#"{"title": "Films"}"#).unwrap();

        let status = methods.status(&dir).await.unwrap();
        assert_eq!(change_of(&status, ComponentKind::Meta), ChangeType::Modified);
        let modified = status
            .iter()
            .filter(|item| item.change != ChangeType::Unmodified)
            .count();
        assert_eq!(modified, 1);

        let restored = methods.restore("peer/movies", None, Some("md")).await.unwrap();
        assert!(restored.iter().all(|item| item.change == ChangeType::Unmodified));

        let err = methods
            .restore("peer/movies", None, Some("bogus"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Component(_)));
    }

    #[tokio::test]
    async fn test_link_state_and_unlink_by_reference() {
        let app = movies_app().await;
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("movies");
        let methods = app.fsi_methods();

        methods.checkout(&dir, "peer/movies").await.unwrap();
        assert!(matches!(
            methods.link_state(&dir).await.unwrap(),
            LinkState::Linked { .. }
        ));
        assert_eq!(methods.linked_info(&dir).await.unwrap().alias(), "peer/movies");

        let alias = methods.unlink(None, Some("me/movies"), false).await.unwrap();
        assert_eq!(alias, "peer/movies");
        assert!(dir.join("meta.json").exists());
        assert!(matches!(
            methods.link_state(&dir).await.unwrap(),
            LinkState::Unlinked
        ));

        let err = methods.status_for_alias("peer/movies").await.unwrap_err();
        assert!(matches!(err, AppError::Fsi(FsiError::NotLinked { .. })));
    }

    #[tokio::test]
    async fn test_init_and_save_as_me() {
        let app = movies_app().await;
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cities");
        let methods = app.fsi_methods();

        let info = methods
            .init(&dir, "me/cities", Some(BodyFormat::Csv))
            .await
            .unwrap();
        assert_eq!(info.alias(), "peer/cities");
        assert!(dir.join("body.csv").exists());

        std::fs::write(dir.join("body.csv"), "Lagos,15388000\n").unwrap();
        let saved = methods.save(&dir, "", "").await.unwrap();
        assert!(!saved.path.is_empty());

        let status = methods.status(&dir).await.unwrap();
        assert!(status.iter().all(|item| item.change == ChangeType::Unmodified));
    }
}
