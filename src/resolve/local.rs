//! Resolvers backed by the local repository.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{DatasetLog, IndexError, LogbookError, Logbook, RepoIndex};
use crate::dsref::{Ref, VersionInfo};

use super::{ResolveError, Resolver, Result, fill_ref};

fn not_found(reference: &Ref) -> ResolveError {
    ResolveError::NotFound {
        reference: reference.human(),
    }
}

// =============================================================================
// RepoIndexResolver
// =============================================================================

/// Resolves references against the repository index.
pub struct RepoIndexResolver {
    index: Arc<dyn RepoIndex>,
}

impl RepoIndexResolver {
    pub fn new(index: Arc<dyn RepoIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Resolver for RepoIndexResolver {
    fn name(&self) -> &str {
        "repo-index"
    }

    async fn resolve_ref(&self, reference: &mut Ref) -> Result<String> {
        let info = if reference.init_id.is_empty() {
            self.index
                .get_by_alias(&reference.username, &reference.name)
                .await?
        } else {
            match self.index.get(&reference.init_id).await {
                Ok(info) => Some(info),
                Err(IndexError::NotFound { .. }) => None,
                Err(e) => return Err(e.into()),
            }
        };

        let info = info.ok_or_else(|| not_found(reference))?;
        fill_ref(reference, &info);
        Ok(String::new())
    }
}

// =============================================================================
// LogbookResolver
// =============================================================================

/// Resolves references against the identity log.
pub struct LogbookResolver {
    logbook: Arc<dyn Logbook>,
}

impl LogbookResolver {
    pub fn new(logbook: Arc<dyn Logbook>) -> Self {
        Self { logbook }
    }
}

fn log_version_info(log: &DatasetLog) -> VersionInfo {
    let mut info = VersionInfo::new(&log.init_id, &log.username, &log.name);
    if let Some(head) = log.head() {
        info.path = head.path.clone();
        info.commit_title = Some(head.title.clone());
        info.commit_time = Some(head.timestamp.clone());
    }
    info
}

#[async_trait]
impl Resolver for LogbookResolver {
    fn name(&self) -> &str {
        "logbook"
    }

    async fn resolve_ref(&self, reference: &mut Ref) -> Result<String> {
        let log = if reference.init_id.is_empty() {
            self.logbook
                .find_alias(&reference.username, &reference.name)
                .await?
        } else {
            match self.logbook.get(&reference.init_id).await {
                Ok(log) => Some(log),
                Err(LogbookError::NotFound { .. }) => None,
                Err(e) => return Err(e.into()),
            }
        };

        let log = log.ok_or_else(|| not_found(reference))?;
        fill_ref(reference, &log_version_info(&log));
        Ok(String::new())
    }
}
