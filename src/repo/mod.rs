//! Dataset repository.
//!
//! This module provides the [`Repo`] struct, the write path for dataset
//! identities and snapshots, and [`open_repo`] for building one from config.

mod open_repo;
#[allow(clippy::module_inception)]
mod repo;

pub use open_repo::open_repo;
pub use repo::{Repo, RepoError, Result};
