//! Reference resolution.
//!
//! A [`Resolver`] fills in the missing parts of a [`Ref`] and reports where
//! the snapshot lives. The [`ResolverChain`] orders several resolvers by
//! mode, cheapest first.

mod chain;
mod error;
mod local;
mod remote;
mod version_cache;

use async_trait::async_trait;

use crate::dsref::{Ref, VersionInfo};

pub use chain::{ResolveMode, Resolved, ResolverChain};
pub use error::{ResolveError, Result};
pub use local::{LogbookResolver, RepoIndexResolver};
pub use remote::RemoteResolver;
pub use version_cache::VersionCache;

/// A backend that can resolve references.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Short backend name used in logs and resolution reports.
    fn name(&self) -> &str;

    /// Fill in the reference's missing init id and path.
    ///
    /// Returns the snapshot's source: empty for local storage, otherwise the
    /// name of the remote holding it. Returns [`ResolveError::NotFound`] if
    /// this backend does not know the reference.
    async fn resolve_ref(&self, reference: &mut Ref) -> Result<String>;
}

/// Copy the fields a reference is missing from a version summary.
pub fn fill_ref(reference: &mut Ref, info: &VersionInfo) {
    if reference.init_id.is_empty() {
        reference.init_id = info.init_id.clone();
    }
    if reference.username.is_empty() {
        reference.username = info.username.clone();
    }
    if reference.name.is_empty() {
        reference.name = info.name.clone();
    }
    if reference.path.is_empty() {
        reference.path = info.path.clone();
    }
}
