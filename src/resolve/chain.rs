//! The resolver chain: mode selection, `me` rewriting, and backend ordering.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;

use crate::backend::{IndexError, RepoIndex};
use crate::dsref::{ME, Ref, VersionInfo, fsi_path};
use crate::repo::Repo;

use super::{
    LogbookResolver, RepoIndexResolver, ResolveError, Resolver, Result, VersionCache,
};

// =============================================================================
// ResolveMode
// =============================================================================

/// Which backends a resolution may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Cache and index first, then the logbook and remotes in parallel.
    #[default]
    Default,
    /// Cache, index and logbook only. Never touches the network.
    Local,
    Network,
    Registry,
    P2p,
}

impl ResolveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveMode::Default => "",
            ResolveMode::Local => "local",
            ResolveMode::Network => "network",
            ResolveMode::Registry => "registry",
            ResolveMode::P2p => "p2p",
        }
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveMode::Default => f.write_str("default"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl FromStr for ResolveMode {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "default" => Ok(ResolveMode::Default),
            "local" => Ok(ResolveMode::Local),
            "network" => Ok(ResolveMode::Network),
            "registry" => Ok(ResolveMode::Registry),
            "p2p" => Ok(ResolveMode::P2p),
            other => Err(ResolveError::UnknownMode {
                mode: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Resolved
// =============================================================================

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    /// Where the snapshot lives. Empty means local storage.
    pub source: String,
    /// Name of the backend that answered.
    pub resolver: String,
}

impl Resolved {
    pub fn is_local(&self) -> bool {
        self.source.is_empty()
    }
}

// =============================================================================
// ResolverChain
// =============================================================================

/// Turns partial references into concrete snapshot locations.
pub struct ResolverChain {
    cache: Arc<VersionCache>,
    index: Arc<dyn RepoIndex>,
    index_resolver: Arc<dyn Resolver>,
    logbook_resolver: Arc<dyn Resolver>,
    remotes: Vec<Arc<dyn Resolver>>,
    identity: Option<String>,
    default_mode: String,
}

impl ResolverChain {
    /// A chain over a repository's cache, index and logbook, with no remotes
    /// and no active identity.
    pub fn new(repo: &Repo) -> Self {
        Self {
            cache: Arc::clone(repo.cache()),
            index: Arc::clone(repo.index()),
            index_resolver: Arc::new(RepoIndexResolver::new(Arc::clone(repo.index()))),
            logbook_resolver: Arc::new(LogbookResolver::new(Arc::clone(repo.logbook()))),
            remotes: Vec::new(),
            identity: None,
            default_mode: String::new(),
        }
    }

    /// Set the username substituted for `me` (builder pattern).
    pub fn with_identity(mut self, username: Option<String>) -> Self {
        self.identity = username;
        self
    }

    /// Add a backend to the default-mode parallel fan-out (builder pattern).
    pub fn with_remote(mut self, remote: Arc<dyn Resolver>) -> Self {
        self.remotes.push(remote);
        self
    }

    /// Set the mode used by [`Resolver::resolve_ref`] (builder pattern).
    pub fn with_default_mode(mut self, mode: impl Into<String>) -> Self {
        self.default_mode = mode.into();
        self
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn default_mode(&self) -> &str {
        &self.default_mode
    }

    /// Replace a leading `me` with the active identity.
    pub fn rewrite_me(&self, reference: &mut Ref) -> Result<()> {
        if !reference.is_me() {
            return Ok(());
        }
        match &self.identity {
            Some(username) => {
                reference.username = username.clone();
                Ok(())
            }
            None => Err(ResolveError::InvalidContextualRef {
                reference: reference.human(),
                remediation: format!(
                    "no identity is configured; set identity.username or replace \"{}\" with your username, as in \"<username>/{}\"",
                    ME, reference.name
                ),
            }),
        }
    }

    /// Resolve a reference in place using the named mode.
    ///
    /// On success the reference carries its init id and path. A dataset with
    /// no snapshots fails with [`ResolveError::NoHistory`] after the
    /// reference has been filled.
    pub async fn resolve(&self, reference: &mut Ref, mode: &str) -> Result<Resolved> {
        let resolved = self.resolve_identity(reference, mode).await?;
        if reference.path.is_empty() {
            return Err(ResolveError::NoHistory {
                reference: reference.alias(),
            });
        }
        Ok(resolved)
    }

    /// Resolve a reference and return only the source, as [`Resolver`] does.
    pub async fn resolve_ref_with_mode(&self, reference: &mut Ref, mode: &str) -> Result<String> {
        Ok(self.resolve(reference, mode).await?.source)
    }

    /// Resolve a reference, preferring its linked working directory.
    ///
    /// If the dataset is linked and no snapshot path was pinned, the path is
    /// rewritten to the directory's `/fsi/...` form. Otherwise this resolves
    /// as [`Self::resolve`] does.
    pub async fn resolve_working(&self, reference: &mut Ref, mode: &str) -> Result<Resolved> {
        let pinned = !reference.path.is_empty();
        let resolved = self.resolve_identity(reference, mode).await?;
        if resolved.is_local() && !pinned {
            match self.index.get(&reference.init_id).await {
                Ok(VersionInfo {
                    fsi_path: Some(dir),
                    ..
                }) => {
                    reference.path = fsi_path(&dir);
                    return Ok(resolved);
                }
                Ok(_) | Err(IndexError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        if reference.path.is_empty() {
            return Err(ResolveError::NoHistory {
                reference: reference.alias(),
            });
        }
        Ok(resolved)
    }

    /// Resolve identity fields, tolerating an empty path.
    async fn resolve_identity(&self, reference: &mut Ref, mode: &str) -> Result<Resolved> {
        let mode: ResolveMode = mode.parse()?;
        self.rewrite_me(reference)?;
        let original = reference.human();
        let pinned = !reference.path.is_empty();

        let resolved = match mode {
            ResolveMode::Default => {
                let sequential = [self.cache_resolver(), Arc::clone(&self.index_resolver)];
                match self.resolve_sequential(reference, &sequential).await? {
                    Some(resolved) => Some(resolved),
                    None => {
                        let mut parallel = vec![Arc::clone(&self.logbook_resolver)];
                        parallel.extend(self.remotes.iter().cloned());
                        self.resolve_parallel(reference, &parallel).await?
                    }
                }
            }
            ResolveMode::Local => {
                let sequential = [
                    self.cache_resolver(),
                    Arc::clone(&self.index_resolver),
                    Arc::clone(&self.logbook_resolver),
                ];
                self.resolve_sequential(reference, &sequential).await?
            }
            ResolveMode::Network | ResolveMode::Registry | ResolveMode::P2p => {
                return Err(ResolveError::NotFinished {
                    mode: mode.to_string(),
                });
            }
        };

        let resolved = resolved.ok_or(ResolveError::NotFound {
            reference: original,
        })?;

        tracing::debug!(
            reference = %reference.human(),
            resolver = %resolved.resolver,
            source = %resolved.source,
            "resolved reference"
        );

        if resolved.is_local() && !pinned && !reference.path.is_empty() && resolved.resolver != "cache"
        {
            let mut info =
                VersionInfo::new(&reference.init_id, &reference.username, &reference.name);
            info.path = reference.path.clone();
            self.cache.put(info);
        }
        Ok(resolved)
    }

    fn cache_resolver(&self) -> Arc<dyn Resolver> {
        Arc::clone(&self.cache) as Arc<dyn Resolver>
    }

    /// Try backends in order. Returns `None` if every one reports not-found.
    async fn resolve_sequential(
        &self,
        reference: &mut Ref,
        resolvers: &[Arc<dyn Resolver>],
    ) -> Result<Option<Resolved>> {
        for resolver in resolvers {
            match resolver.resolve_ref(reference).await {
                Ok(source) => {
                    return Ok(Some(Resolved {
                        source,
                        resolver: resolver.name().to_string(),
                    }));
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Query backends concurrently. The first hit wins; the first error
    /// other than not-found aborts. Outstanding queries are dropped.
    async fn resolve_parallel(
        &self,
        reference: &mut Ref,
        resolvers: &[Arc<dyn Resolver>],
    ) -> Result<Option<Resolved>> {
        let mut pending: FuturesUnordered<_> = resolvers
            .iter()
            .map(|resolver| {
                let resolver = Arc::clone(resolver);
                let mut candidate = reference.clone();
                async move {
                    let result = resolver.resolve_ref(&mut candidate).await;
                    (resolver.name().to_string(), candidate, result)
                }
            })
            .collect();

        while let Some((name, candidate, result)) = pending.next().await {
            match result {
                Ok(source) => {
                    *reference = candidate;
                    return Ok(Some(Resolved {
                        source,
                        resolver: name,
                    }));
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Resolver for ResolverChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn resolve_ref(&self, reference: &mut Ref) -> Result<String> {
        self.resolve_ref_with_mode(reference, &self.default_mode).await
    }
}
