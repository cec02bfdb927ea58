//! Natural key to remote id resolution

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{ExchangeError, Result};
use crate::resource::{ResourceKind, Scope};
use crate::store::{from_value, object_id, RemoteStore};

type CacheKey = (Scope, ResourceKind, String);

/// Resolves names and identifiers into remote objects.
///
/// With caching enabled only hits are remembered; a miss is asked again the
/// next time since the object may have been created in between.
pub struct ReferenceResolver<'a> {
    store: &'a dyn RemoteStore,
    cache: Option<HashMap<CacheKey, Value>>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(store: &'a dyn RemoteStore, cache: bool) -> Self {
        Self {
            store,
            cache: cache.then(HashMap::new),
        }
    }

    /// The remote object of `kind` named `key` in `scope`, if any.
    pub async fn lookup(&mut self, scope: &Scope, kind: ResourceKind, key: &str) -> Result<Option<Value>> {
        let cache_key = (scope.clone(), kind, key.to_string());
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&cache_key)) {
            return Ok(Some(hit.clone()));
        }
        let found = self.store.get(scope, kind, key).await?;
        if let (Some(cache), Some(object)) = (self.cache.as_mut(), found.as_ref()) {
            cache.insert(cache_key, object.clone());
        }
        Ok(found)
    }

    /// Typed variant of [`Self::lookup`].
    pub async fn fetch<T: DeserializeOwned>(
        &mut self,
        scope: &Scope,
        kind: ResourceKind,
        key: &str,
    ) -> Result<Option<T>> {
        match self.lookup(scope, kind, key).await? {
            Some(object) => Ok(Some(from_value(object)?)),
            None => Ok(None),
        }
    }

    /// Id of a reference that must exist.
    pub async fn require(&mut self, scope: &Scope, kind: ResourceKind, key: &str) -> Result<i64> {
        match self.lookup(scope, kind, key).await? {
            Some(object) => object_id(&object),
            None => Err(ExchangeError::missing(kind, key)),
        }
    }

    /// Id of a reference that may be absent.
    pub async fn optional(&mut self, scope: &Scope, kind: ResourceKind, key: &str) -> Result<Option<i64>> {
        match self.lookup(scope, kind, key).await? {
            Some(object) => Ok(Some(object_id(&object)?)),
            None => {
                tracing::warn!("Optional {} reference {} not found in {}", kind, key, scope);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_require_missing_reference() {
        let store = MemoryStore::new();
        let mut resolver = ReferenceResolver::new(&store, false);
        let err = resolver
            .require(&Scope::root(), ResourceKind::Tenant, "ACME")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing Tenant reference: ACME");
    }

    #[tokio::test]
    async fn test_optional_reference() {
        let store = MemoryStore::new();
        let scope = Scope::tenant(1);
        let id = store.seed(&scope, ResourceKind::Division, json!({"name": "HR"})).await;

        let mut resolver = ReferenceResolver::new(&store, false);
        assert_eq!(resolver.optional(&scope, ResourceKind::Division, "HR").await.unwrap(), Some(id));
        assert_eq!(resolver.optional(&scope, ResourceKind::Division, "IT").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_keeps_hits_only() {
        let store = MemoryStore::new();
        let scope = Scope::root();
        let mut resolver = ReferenceResolver::new(&store, true);

        assert!(resolver.lookup(&scope, ResourceKind::Tenant, "ACME").await.unwrap().is_none());
        let id = store.seed(&scope, ResourceKind::Tenant, json!({"identifier": "ACME"})).await;
        assert_eq!(resolver.require(&scope, ResourceKind::Tenant, "ACME").await.unwrap(), id);

        // Served from the cache even after the store forgot it.
        store.delete(&scope, ResourceKind::Tenant, id).await.unwrap();
        assert_eq!(resolver.require(&scope, ResourceKind::Tenant, "ACME").await.unwrap(), id);
    }
}
