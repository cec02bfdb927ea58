//! Remote store abstraction
//!
//! The system of record is reachable only through name-keyed CRUD calls
//! scoped by parent path. Implementations exchange plain JSON objects; the
//! typed helpers in [`StoreExt`] convert to and from model types.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ExchangeError, Result};
use crate::payroll::PayrunJobStatus;
use crate::resource::{Filter, NaturalKey, Resource, ResourceKind, Scope};

/// Generic remote store interface
///
/// Every call is awaited to completion before the importer moves on.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Get the object of `kind` whose key field equals `key`
    async fn get(&self, scope: &Scope, kind: ResourceKind, key: &str) -> Result<Option<Value>>;

    /// List objects of `kind` matching `filter`
    async fn query(&self, scope: &Scope, kind: ResourceKind, filter: &Filter) -> Result<Vec<Value>>;

    /// Create an object; returns the stored object including its new id
    async fn create(&self, scope: &Scope, kind: ResourceKind, object: Value) -> Result<Value>;

    /// Create several objects in one call
    async fn create_batch(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        objects: Vec<Value>,
    ) -> Result<Vec<Value>>;

    /// Overwrite the object with the given id
    async fn update(&self, scope: &Scope, kind: ResourceKind, id: i64, object: Value) -> Result<Value>;

    /// Delete the object with the given id, including its children
    async fn delete(&self, scope: &Scope, kind: ResourceKind, id: i64) -> Result<()>;

    /// Move a payrun job to another status
    async fn change_job_status(
        &self,
        scope: &Scope,
        job_id: i64,
        status: PayrunJobStatus,
        user_id: i64,
        reason: Option<&str>,
    ) -> Result<()>;
}

pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

/// Read the `id` of a stored object.
pub fn object_id(object: &Value) -> Result<i64> {
    object
        .get("id")
        .and_then(Value::as_i64)
        .filter(|id| *id != 0)
        .ok_or_else(|| ExchangeError::remote(format!("Remote object without id: {}", object)))
}

/// Typed access on top of any [`RemoteStore`].
#[async_trait]
pub trait StoreExt: RemoteStore {
    async fn get_as<T: DeserializeOwned + Send>(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        key: &str,
    ) -> Result<Option<T>> {
        match self.get(scope, kind, key).await? {
            Some(value) => Ok(Some(from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn query_as<T: DeserializeOwned + Send>(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        filter: &Filter,
    ) -> Result<Vec<T>> {
        self.query(scope, kind, filter)
            .await?
            .into_iter()
            .map(from_value)
            .collect()
    }

    async fn create_as<T: Serialize + Sync, R: DeserializeOwned + Send>(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        object: &T,
    ) -> Result<R> {
        let created = self.create(scope, kind, serde_json::to_value(object)?).await?;
        from_value(created)
    }

    /// Find the stored counterpart of `node` by its natural key.
    async fn find_target<T: Resource>(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        node: &T,
    ) -> Result<Option<T>> {
        match node.natural_key() {
            NaturalKey::Single(key) => self.get_as(scope, kind, &key).await,
            NaturalKey::Compound(filter) => {
                let mut matches: Vec<T> = self.query_as(scope, kind, &filter).await?;
                if matches.len() > 1 {
                    return Err(ExchangeError::remote(format!(
                        "{} matches for {} {} in {}",
                        matches.len(),
                        kind,
                        node.natural_key(),
                        scope
                    )));
                }
                Ok(matches.pop())
            }
            NaturalKey::None => Ok(None),
        }
    }
}

impl<S: RemoteStore + ?Sized> StoreExt for S {}
