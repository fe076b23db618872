use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{RemoteError, RemoteTransport};
use crate::dsref::Ref;

use super::{ResolveError, Resolver, Result, fill_ref};

/// Resolves references against a remote peer.
///
/// A hit reports the remote's name as the resolved source, telling the
/// loader to pull before reading.
pub struct RemoteResolver {
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteResolver {
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Resolver for RemoteResolver {
    fn name(&self) -> &str {
        self.transport.name()
    }

    async fn resolve_ref(&self, reference: &mut Ref) -> Result<String> {
        match self.transport.resolve_ref(reference).await {
            Ok(info) => {
                fill_ref(reference, &info);
                Ok(self.transport.name().to_string())
            }
            Err(RemoteError::NotFound { .. }) => Err(ResolveError::NotFound {
                reference: reference.human(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
