use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::dsref::{Ref, VersionInfo};

use super::{ResolveError, Resolver, Result, fill_ref};

/// In-process cache of recently resolved versions.
///
/// Consulted first by the resolver chain. Entries are keyed by alias and
/// by init id; only locally stored versions are cached.
#[derive(Default)]
pub struct VersionCache {
    entries: RwLock<CacheEntries>,
}

#[derive(Default)]
struct CacheEntries {
    by_alias: HashMap<String, VersionInfo>,
    alias_by_init_id: HashMap<String, String>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a reference by init id, then by alias.
    pub fn get(&self, reference: &Ref) -> Option<VersionInfo> {
        let entries = self.entries.read().unwrap();
        let alias = if reference.init_id.is_empty() {
            reference.alias()
        } else {
            entries
                .alias_by_init_id
                .get(&reference.init_id)
                .cloned()
                .unwrap_or_else(|| reference.alias())
        };
        entries.by_alias.get(&alias).cloned()
    }

    /// Insert or replace an entry.
    pub fn put(&self, info: VersionInfo) {
        let mut entries = self.entries.write().unwrap();
        let alias = info.alias();
        if !info.init_id.is_empty() {
            entries
                .alias_by_init_id
                .insert(info.init_id.clone(), alias.clone());
        }
        entries.by_alias.insert(alias, info);
    }

    /// Drop the entry for an alias.
    pub fn remove(&self, alias: &str) {
        let mut entries = self.entries.write().unwrap();
        if let Some(info) = entries.by_alias.remove(alias) {
            entries.alias_by_init_id.remove(&info.init_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Resolver for VersionCache {
    fn name(&self) -> &str {
        "cache"
    }

    async fn resolve_ref(&self, reference: &mut Ref) -> Result<String> {
        match self.get(reference) {
            Some(info) => {
                fill_ref(reference, &info);
                Ok(String::new())
            }
            None => Err(ResolveError::NotFound {
                reference: reference.human(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> VersionInfo {
        let mut info = VersionInfo::new("id-1", "peer", "movies");
        info.path = "/mem/abc".to_string();
        info
    }

    #[tokio::test]
    async fn test_cache_hit_fills_ref() {
        let cache = VersionCache::new();
        cache.put(info());

        let mut reference = Ref::new("peer", "movies");
        let source = cache.resolve_ref(&mut reference).await.unwrap();
        assert_eq!(source, "");
        assert_eq!(reference.init_id, "id-1");
        assert_eq!(reference.path, "/mem/abc");
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = VersionCache::new();
        let mut reference = Ref::new("peer", "movies");
        let err = cache.resolve_ref(&mut reference).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_lookup_by_init_id_and_remove() {
        let cache = VersionCache::new();
        cache.put(info());

        let by_id = Ref {
            init_id: "id-1".to_string(),
            ..Default::default()
        };
        assert_eq!(cache.get(&by_id).map(|i| i.alias()), Some("peer/movies".to_string()));

        cache.remove("peer/movies");
        assert!(cache.is_empty());
        assert!(cache.get(&by_id).is_none());
    }
}
