//! End-to-end working directory scenarios over in-memory repositories.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use dsvc_rs::dataset::{Commit, ComponentKind, Dataset, Meta, Structure};
use dsvc_rs::dsref::Ref;
use dsvc_rs::fsi::{ChangeType, Fsi, FsiError, LINK_MARKER, StatusItem};
use dsvc_rs::repo::Repo;
use dsvc_rs::resolve::{ResolveError, Resolver, ResolverChain};

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
        structure: Some(Structure {
            format: "json".to_string(),
            schema: Some(json!({"type": "array"})),
            ..Default::default()
        }),
        body: Some(json!([["Alien", 1979], ["Heat", 1995]])),
        ..Default::default()
    }
}

async fn movies_fsi() -> Fsi {
    let repo = Repo::in_memory();
    repo.init_dataset("peer", "movies").await.unwrap();
    repo.save_dataset(&Ref::new("peer", "movies"), &movies())
        .await
        .unwrap();
    let chain = ResolverChain::new(&repo).with_identity(Some("peer".to_string()));
    Fsi::new(repo, Arc::new(chain))
}

fn change_of(items: &[StatusItem], kind: ComponentKind) -> Option<ChangeType> {
    items
        .iter()
        .find(|item| item.component == kind)
        .map(|item| item.change)
}

#[tokio::test]
async fn edited_meta_is_the_only_modified_component() {
    let fsi = movies_fsi().await;
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("movies");

    fsi.checkout(&dir, &Ref::new("peer", "movies")).await.unwrap();
    let status = fsi.status(&dir).await.unwrap();
    assert!(status.iter().all(|item| item.change == ChangeType::Unmodified));

    std::fs::write(dir.join("meta.json"), r#"{"title": "Films"}"#).unwrap();
    let status = fsi.status(&dir).await.unwrap();
    let changed: Vec<_> = status
        .iter()
        .filter(|item| item.change != ChangeType::Unmodified)
        .collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].component, ComponentKind::Meta);
    assert_eq!(changed[0].change, ChangeType::Modified);
    assert!(change_of(&status, ComponentKind::Commit).is_none());
}

#[tokio::test]
async fn selective_restore_leaves_other_edits() {
    let fsi = movies_fsi().await;
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("movies");
    fsi.checkout(&dir, &Ref::new("peer", "movies")).await.unwrap();

    std::fs::write(dir.join("meta.json"), r#"{"title": "Films"}"#).unwrap();
    std::fs::write(
        dir.join("structure.json"),
        r#"{"format": "json", "schema": {"type": "object"}}"#,
    )
    .unwrap();

    let reference = Ref::new("peer", "movies");
    let status = fsi
        .restore(&reference, None, Some(ComponentKind::Meta))
        .await
        .unwrap();
    assert_eq!(change_of(&status, ComponentKind::Meta), Some(ChangeType::Unmodified));
    assert_eq!(
        change_of(&status, ComponentKind::Structure),
        Some(ChangeType::Modified)
    );

    // A full restore brings everything back and repeating it changes nothing.
    let first = fsi.restore(&reference, None, None).await.unwrap();
    let second = fsi.restore(&reference, None, None).await.unwrap();
    assert!(first.iter().all(|item| item.change == ChangeType::Unmodified));
    assert_eq!(first, second);
}

#[tokio::test]
async fn write_then_status_reports_written_components() {
    let fsi = movies_fsi().await;
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("movies");
    fsi.checkout(&dir, &Ref::new("peer", "movies")).await.unwrap();

    let mut edited = movies();
    edited.meta = Some(Meta {
        title: Some("Films".to_string()),
        ..Default::default()
    });
    let status = fsi.write(&Ref::new("peer", "movies"), &edited).await.unwrap();
    assert_eq!(change_of(&status, ComponentKind::Meta), Some(ChangeType::Modified));
    assert_eq!(change_of(&status, ComponentKind::Body), Some(ChangeType::Unmodified));
    assert!(status.iter().all(|item| item.change != ChangeType::Add));
}

#[tokio::test]
async fn unlink_then_status_by_alias_is_not_linked() {
    let fsi = movies_fsi().await;
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("movies");
    fsi.checkout(&dir, &Ref::new("peer", "movies")).await.unwrap();

    let alias = fsi
        .unlink(None, Some(&Ref::new("peer", "movies")), false)
        .await
        .unwrap();
    assert_eq!(alias, "peer/movies");
    assert!(!dir.join(LINK_MARKER).exists());

    let err = fsi
        .status_for_alias(&Ref::new("peer", "movies"))
        .await
        .unwrap_err();
    assert!(matches!(err, FsiError::NotLinked { .. }));
}

#[tokio::test]
async fn create_link_on_marked_directory_keeps_marker() {
    let fsi = movies_fsi().await;
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(LINK_MARKER), "peer/other").unwrap();

    let err = fsi
        .links()
        .create_link(temp.path(), &Ref::new("peer", "movies"))
        .await
        .unwrap_err();
    assert!(matches!(err, FsiError::DirAlreadyLinked { .. }));
    assert_eq!(
        std::fs::read_to_string(temp.path().join(LINK_MARKER)).unwrap(),
        "peer/other"
    );
    let info = fsi.repo().lookup(&Ref::new("peer", "movies")).await.unwrap();
    assert!(info.fsi_path.is_none());
}

#[tokio::test]
async fn checkout_into_existing_directory_mutates_nothing() {
    let fsi = movies_fsi().await;
    let temp = TempDir::new().unwrap();

    let err = fsi
        .checkout(temp.path(), &Ref::new("peer", "movies"))
        .await
        .unwrap_err();
    assert!(matches!(err, FsiError::AlreadyExists { .. }));
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn concurrent_checkouts_have_one_winner() {
    let fsi = movies_fsi().await;
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("movies");
    let reference = Ref::new("peer", "movies");

    let (a, b) = tokio::join!(
        fsi.checkout(&dir, &reference),
        fsi.checkout(&dir, &reference)
    );
    assert!(a.is_ok() != b.is_ok());
}

struct PanicResolver;

#[async_trait]
impl Resolver for PanicResolver {
    fn name(&self) -> &str {
        "network"
    }

    async fn resolve_ref(&self, _reference: &mut Ref) -> dsvc_rs::resolve::Result<String> {
        panic!("local resolution reached a network backend");
    }
}

#[tokio::test]
async fn me_and_local_mode_resolution() {
    let repo = Repo::in_memory();
    repo.init_dataset("peer", "cities").await.unwrap();
    repo.save_dataset(&Ref::new("peer", "cities"), &Dataset::default())
        .await
        .unwrap();
    repo.cache().remove("peer/cities");

    let chain = ResolverChain::new(&repo)
        .with_identity(Some("peer".to_string()))
        .with_remote(Arc::new(PanicResolver));

    let mut contextual: Ref = "me/cities".parse().unwrap();
    let resolved = chain.resolve(&mut contextual, "local").await.unwrap();
    assert_eq!(resolved.resolver, "repo-index");

    let mut explicit = Ref::new("peer", "cities");
    chain.resolve(&mut explicit, "local").await.unwrap();
    assert_eq!(contextual, explicit);

    let mut missing = Ref::new("peer", "nowhere");
    let err = chain.resolve(&mut missing, "local").await.unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }));
}

#[test]
fn alias_round_trips_through_parser() {
    for alias in ["peer/movies", "a1/b-2", "user_x/data_set"] {
        let reference: Ref = alias.parse().unwrap();
        assert_eq!(reference.alias(), alias);
    }
}
