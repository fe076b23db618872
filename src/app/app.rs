//! Top-level application component.
//!
//! The [`App`] owns every long-lived service and is the only place they are
//! wired together. Nothing below it reads configuration or global state.

use std::sync::Arc;

use thiserror::Error;

use crate::backend::{NoopBus, RemoteTransport};
use crate::config::{Config, ConfigSource, read_config};
use crate::dataset::UnknownComponent;
use crate::dsref::{ParseError, Parser, Ref};
use crate::fsi::{FileOptions, Fsi, FsiError};
use crate::load::{LoadError, Loader};
use crate::repo::{Repo, RepoError, open_repo};
use crate::resolve::{RemoteResolver, ResolveError, ResolverChain};

use super::{DatasetMethods, FsiMethods};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during App operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Component(#[from] UnknownComponent),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Fsi(#[from] FsiError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result type for App operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Context for creating an App.
#[derive(Default)]
pub struct AppContext {
    /// Source for configuration files.
    pub config_source: ConfigSource,
}

// =============================================================================
// App
// =============================================================================

/// The top-level application component.
pub struct App {
    config: Config,
    repo: Repo,
    resolver: Arc<ResolverChain>,
    loader: Loader,
    fsi: Fsi,
    parser: Parser,
}

impl App {
    /// Read configuration and open the configured repository.
    pub fn new(ctx: AppContext) -> Result<Self> {
        let config_result =
            read_config(&ctx.config_source).map_err(|e| AppError::Config(e.to_string()))?;
        for warning in &config_result.warnings {
            tracing::warn!("{}", warning);
        }
        Ok(Self::from_config(config_result.config))
    }

    /// Build an App from an already-parsed configuration.
    pub fn from_config(config: Config) -> Self {
        let repo = open_repo(&config.repo, Arc::new(NoopBus));
        Self::with_remotes(config, repo, Vec::new())
    }

    /// Build an App over an existing repository and a set of remotes.
    ///
    /// Each remote becomes a default-mode resolver and a pull source for the
    /// loader.
    pub fn with_remotes(
        config: Config,
        repo: Repo,
        remotes: Vec<Arc<dyn RemoteTransport>>,
    ) -> Self {
        let mut chain = ResolverChain::new(&repo)
            .with_identity(config.identity.username.clone())
            .with_default_mode(config.resolve.mode.clone());
        let mut loader = Loader::for_repo(&repo);
        for remote in remotes {
            chain = chain.with_remote(Arc::new(RemoteResolver::new(Arc::clone(&remote))));
            loader = loader.with_remote(remote);
        }
        let resolver = Arc::new(chain);

        let fsi = Fsi::new(repo.clone(), Arc::clone(&resolver)).with_options(FileOptions {
            meta_format: config.fsi.meta_format,
            body_format: config.fsi.body_format,
        });
        let parser = Parser::new(config.reference.bad_case);

        Self {
            config,
            repo,
            resolver,
            loader,
            fsi,
            parser,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    pub fn resolver(&self) -> &Arc<ResolverChain> {
        &self.resolver
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn fsi(&self) -> &Fsi {
        &self.fsi
    }

    /// Parse a reference with the configured bad-case policy.
    pub fn parse_ref(&self, input: &str) -> Result<Ref> {
        Ok(self.parser.parse(input)?)
    }

    /// Working directory operations.
    pub fn fsi_methods(&self) -> FsiMethods<'_> {
        FsiMethods::new(self)
    }

    /// Resolution and loading operations.
    pub fn dataset_methods(&self) -> DatasetMethods<'_> {
        DatasetMethods::new(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::config::{FsiConfig, IdentityConfig, ReferenceConfig, RepoConfig, ResolveConfig, StoreKind};
    use crate::dsref::BadCasePolicy;

    pub(crate) fn memory_config(username: Option<&str>) -> Config {
        Config {
            repo: RepoConfig {
                path: PathBuf::from("/unused"),
                store: StoreKind::Memory,
            },
            identity: IdentityConfig {
                username: username.map(str::to_string),
            },
            reference: ReferenceConfig::default(),
            resolve: ResolveConfig::default(),
            fsi: FsiConfig::default(),
        }
    }

    #[test]
    fn test_parse_ref_follows_policy() {
        let app = App::from_config(memory_config(None));
        assert!(app.parse_ref("peer/Movies").is_ok());

        let mut config = memory_config(None);
        config.reference.bad_case = BadCasePolicy::Error;
        let app = App::from_config(config);
        assert!(matches!(
            app.parse_ref("peer/Movies"),
            Err(AppError::Parse(ParseError::BadCase { .. }))
        ));
    }

    #[test]
    fn test_identity_reaches_resolver() {
        let app = App::from_config(memory_config(Some("peer")));
        assert_eq!(app.resolver().identity(), Some("peer"));
        assert_eq!(app.resolver().default_mode(), "");
    }
}
