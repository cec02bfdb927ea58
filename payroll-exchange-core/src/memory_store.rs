//! In-memory remote store
//!
//! Keeps every collection as a list of JSON objects keyed by scope and kind,
//! assigns ids like the real backend and journals each mutating call so
//! callers can see what an import did.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ExchangeError, Result};
use crate::payroll::PayrunJobStatus;
use crate::resource::{Filter, ResourceKind, Scope};
use crate::store::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Create,
    Update,
    Delete,
    StatusChange,
}

/// One mutating call received by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub kind: ResourceKind,
    pub scope: Scope,
    pub id: i64,
}

/// In-memory store
pub struct MemoryStore {
    /// (scope, kind) -> stored objects
    collections: Arc<RwLock<HashMap<(Scope, ResourceKind), Vec<Value>>>>,

    /// Mutating calls in arrival order
    journal: Arc<RwLock<Vec<StoreCall>>>,

    /// Status given to newly created payrun jobs
    new_job_status: Arc<RwLock<PayrunJobStatus>>,

    /// Issues reported back for every case change submission
    case_change_issues: Arc<RwLock<Vec<String>>>,

    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            journal: Arc::new(RwLock::new(Vec::new())),
            new_job_status: Arc::new(RwLock::new(PayrunJobStatus::Draft)),
            case_change_issues: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicI64::new(1),
        }
    }

    /// Store an object without journaling it; returns its id.
    pub async fn seed(&self, scope: &Scope, kind: ResourceKind, mut object: Value) -> i64 {
        let id = self.assign_id(&mut object);
        self.collections
            .write()
            .await
            .entry((scope.clone(), kind))
            .or_default()
            .push(object);
        id
    }

    /// All objects of a collection.
    pub async fn objects(&self, scope: &Scope, kind: ResourceKind) -> Vec<Value> {
        self.collections
            .read()
            .await
            .get(&(scope.clone(), kind))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn journal(&self) -> Vec<StoreCall> {
        self.journal.read().await.clone()
    }

    pub async fn clear_journal(&self) {
        self.journal.write().await.clear();
    }

    /// Number of journaled calls of `op` on `kind`.
    pub async fn count(&self, op: StoreOp, kind: ResourceKind) -> usize {
        self.journal
            .read()
            .await
            .iter()
            .filter(|call| call.op == op && call.kind == kind)
            .count()
    }

    pub async fn set_new_job_status(&self, status: PayrunJobStatus) {
        *self.new_job_status.write().await = status;
    }

    pub async fn set_case_change_issues(&self, issues: Vec<String>) {
        *self.case_change_issues.write().await = issues;
    }

    fn assign_id(&self, object: &mut Value) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Value::Object(map) = object {
            map.insert("id".to_string(), id.into());
        }
        id
    }

    async fn record(&self, op: StoreOp, kind: ResourceKind, scope: &Scope, id: i64) {
        self.journal.write().await.push(StoreCall {
            op,
            kind,
            scope: scope.clone(),
            id,
        });
    }

    async fn insert(&self, scope: &Scope, kind: ResourceKind, mut object: Value) -> Result<Value> {
        if !object.is_object() {
            return Err(ExchangeError::remote(format!(
                "Cannot store non-object {} in {}",
                kind, scope
            )));
        }
        let id = self.assign_id(&mut object);
        match kind {
            ResourceKind::PayrunJob => {
                let status = *self.new_job_status.read().await;
                object["jobStatus"] = serde_json::to_value(status)?;
            }
            ResourceKind::CaseChange => {
                let issues: Vec<Value> = self
                    .case_change_issues
                    .read()
                    .await
                    .iter()
                    .map(|message| serde_json::json!({ "message": message }))
                    .collect();
                if !issues.is_empty() {
                    return Ok(serde_json::json!({ "id": 0, "issues": issues }));
                }
            }
            _ => {}
        }
        self.collections
            .write()
            .await
            .entry((scope.clone(), kind))
            .or_default()
            .push(object.clone());
        self.record(StoreOp::Create, kind, scope, id).await;
        Ok(object)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, scope: &Scope, kind: ResourceKind, key: &str) -> Result<Option<Value>> {
        let field = kind.key_field();
        let collections = self.collections.read().await;
        Ok(collections.get(&(scope.clone(), kind)).and_then(|objects| {
            objects
                .iter()
                .find(|object| object.get(field).and_then(Value::as_str) == Some(key))
                .cloned()
        }))
    }

    async fn query(&self, scope: &Scope, kind: ResourceKind, filter: &Filter) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&(scope.clone(), kind))
            .map(|objects| {
                objects
                    .iter()
                    .filter(|object| filter.matches(object))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, scope: &Scope, kind: ResourceKind, object: Value) -> Result<Value> {
        self.insert(scope, kind, object).await
    }

    async fn create_batch(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        objects: Vec<Value>,
    ) -> Result<Vec<Value>> {
        let mut created = Vec::with_capacity(objects.len());
        for mut object in objects {
            // Lookups carry their values; those land one level down.
            let values = match (kind, object.as_object_mut()) {
                (ResourceKind::Lookup, Some(map)) => map.remove("values"),
                _ => None,
            };
            let stored = self.insert(scope, kind, object).await?;
            if let Some(Value::Array(values)) = values {
                let lookup_scope = scope.child(ResourceKind::Lookup, crate::store::object_id(&stored)?);
                for value in values {
                    self.insert(&lookup_scope, ResourceKind::LookupValue, value).await?;
                }
            }
            created.push(stored);
        }
        Ok(created)
    }

    async fn update(&self, scope: &Scope, kind: ResourceKind, id: i64, mut object: Value) -> Result<Value> {
        if let Value::Object(map) = &mut object {
            map.insert("id".to_string(), id.into());
        }
        {
            let mut collections = self.collections.write().await;
            let slot = collections
                .get_mut(&(scope.clone(), kind))
                .and_then(|objects| {
                    objects
                        .iter_mut()
                        .find(|existing| existing.get("id").and_then(Value::as_i64) == Some(id))
                })
                .ok_or_else(|| ExchangeError::remote(format!("{} {} not found in {}", kind, id, scope)))?;
            *slot = object.clone();
        }
        self.record(StoreOp::Update, kind, scope, id).await;
        Ok(object)
    }

    async fn delete(&self, scope: &Scope, kind: ResourceKind, id: i64) -> Result<()> {
        {
            let mut collections = self.collections.write().await;
            let objects = collections
                .get_mut(&(scope.clone(), kind))
                .ok_or_else(|| ExchangeError::remote(format!("{} {} not found in {}", kind, id, scope)))?;
            let before = objects.len();
            objects.retain(|object| object.get("id").and_then(Value::as_i64) != Some(id));
            if objects.len() == before {
                return Err(ExchangeError::remote(format!("{} {} not found in {}", kind, id, scope)));
            }
            let owned = scope.child(kind, id);
            collections.retain(|(child_scope, _), _| !child_scope.segments().starts_with(owned.segments()));
        }
        self.record(StoreOp::Delete, kind, scope, id).await;
        Ok(())
    }

    async fn change_job_status(
        &self,
        scope: &Scope,
        job_id: i64,
        status: PayrunJobStatus,
        _user_id: i64,
        _reason: Option<&str>,
    ) -> Result<()> {
        {
            let mut collections = self.collections.write().await;
            let job = collections
                .get_mut(&(scope.clone(), ResourceKind::PayrunJob))
                .and_then(|jobs| {
                    jobs.iter_mut()
                        .find(|job| job.get("id").and_then(Value::as_i64) == Some(job_id))
                })
                .ok_or_else(|| ExchangeError::remote(format!("Payrun job {} not found in {}", job_id, scope)))?;
            job["jobStatus"] = serde_json::to_value(status)?;
        }
        self.record(StoreOp::StatusChange, ResourceKind::PayrunJob, scope, job_id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_assigns_ids_and_journals() {
        let store = MemoryStore::new();
        let scope = Scope::root();
        let a = store.create(&scope, ResourceKind::Tenant, json!({"identifier": "A"})).await.unwrap();
        let b = store.create(&scope, ResourceKind::Tenant, json!({"identifier": "B"})).await.unwrap();
        assert_ne!(a["id"], b["id"]);
        assert_eq!(store.count(StoreOp::Create, ResourceKind::Tenant).await, 2);

        let found = store.get(&scope, ResourceKind::Tenant, "B").await.unwrap().unwrap();
        assert_eq!(found["id"], b["id"]);
        assert!(store.get(&scope, ResourceKind::Tenant, "C").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_child_collections() {
        let store = MemoryStore::new();
        let scope = Scope::tenant(1).child(ResourceKind::Regulation, 2);
        let lookups = store
            .create_batch(
                &scope,
                ResourceKind::Lookup,
                vec![json!({"name": "Tax", "values": [{"key": "A"}, {"key": "B"}]})],
            )
            .await
            .unwrap();
        let lookup_id = lookups[0]["id"].as_i64().unwrap();
        let values_scope = scope.child(ResourceKind::Lookup, lookup_id);
        assert_eq!(store.objects(&values_scope, ResourceKind::LookupValue).await.len(), 2);

        store.delete(&scope, ResourceKind::Lookup, lookup_id).await.unwrap();
        assert!(store.objects(&scope, ResourceKind::Lookup).await.is_empty());
        assert!(store.objects(&values_scope, ResourceKind::LookupValue).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_id_fails() {
        let store = MemoryStore::new();
        let result = store
            .update(&Scope::root(), ResourceKind::Tenant, 42, json!({"identifier": "X"}))
            .await;
        assert!(matches!(result, Err(ExchangeError::Remote { .. })));
    }

    #[tokio::test]
    async fn test_change_job_status() {
        let store = MemoryStore::new();
        let scope = Scope::tenant(1);
        let job = store.create(&scope, ResourceKind::PayrunJob, json!({"name": "Jan"})).await.unwrap();
        assert_eq!(job["jobStatus"], "Draft");
        let id = job["id"].as_i64().unwrap();
        store
            .change_job_status(&scope, id, PayrunJobStatus::Process, 0, None)
            .await
            .unwrap();
        let jobs = store.objects(&scope, ResourceKind::PayrunJob).await;
        assert_eq!(jobs[0]["jobStatus"], "Process");
    }
}
