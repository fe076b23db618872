use std::path::PathBuf;

use thiserror::Error;

use crate::backend::IndexError;
use crate::dataset::{ComponentKind, SnapshotError};
use crate::dsref::ParseError;
use crate::repo::RepoError;
use crate::resolve::ResolveError;

/// Errors produced by working directory operations.
#[derive(Debug, Error)]
pub enum FsiError {
    /// Both a directory and a reference were given where only one is allowed.
    #[error("specify either a directory or a reference, not both (got {dir} and {reference})")]
    AmbiguousTarget { dir: PathBuf, reference: String },

    /// Neither a directory nor a reference was given.
    #[error("a directory or a reference is required")]
    MissingTarget,

    #[error("directory must be an absolute path: {dir}")]
    RelativePath { dir: PathBuf },

    /// The operation needs a linked working directory and there is none.
    #[error("{target} is not linked to a working directory")]
    NotLinked { target: String },

    /// The dataset is already linked to a directory.
    #[error("dataset {alias} is already linked to {dir}")]
    AlreadyLinked { alias: String, dir: PathBuf },

    /// The directory is already linked to a dataset.
    #[error("directory {dir} is already linked to {alias}")]
    DirAlreadyLinked { dir: PathBuf, alias: String },

    #[error("directory {dir} already exists")]
    AlreadyExists { dir: PathBuf },

    /// The link marker and the repository index disagree.
    #[error("inconsistent link for {dir}: {reason}")]
    InconsistentLink { dir: PathBuf, reason: String },

    /// Checkout only reads local snapshots.
    #[error("dataset {reference} is stored on {remote}; pull it into the local repository before checking it out")]
    RemoteCheckout { reference: String, remote: String },

    #[error("no changes to save in {dir}")]
    NoChanges { dir: PathBuf },

    /// A component is never written to a working directory.
    #[error("component {component} is not stored in working directories")]
    NotMaterialized { component: ComponentKind },

    /// A component file could not be parsed or encoded.
    #[error("{component} ({file}): {message}")]
    Component {
        component: ComponentKind,
        file: PathBuf,
        message: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl FsiError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> FsiError {
        let path = path.into();
        move |source| FsiError::Io { path, source }
    }
}

/// Result type for working directory operations.
pub type Result<T> = std::result::Result<T, FsiError>;
