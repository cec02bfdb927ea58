//! HTTP remote store for the payroll REST API.
//!
//! Maps exchange scopes onto REST collections:
//! - `GET  {scope}/{kind}?$filter=...` for natural key lookups and queries
//! - `POST {scope}/{kind}` to create, `POST {scope}/{kind}/bulk` to create in batch
//! - `PUT`/`DELETE {scope}/{kind}/{id}` to update and delete
//! - `POST tenants/{id}/payruns/jobs/{id}/status` to move payrun jobs

use async_trait::async_trait;
use payroll_exchange_core::{
    ExchangeError, Filter, PayrunJobStatus, RemoteStore, ResourceKind, Result, Scope,
};
use serde_json::{json, Value};
use std::time::Duration;

/// Remote store backed by the REST API at `base_url`.
pub struct HttpStore {
    base_url: String,
    http: reqwest::Client,
}

impl HttpStore {
    /// Create a store targeting `base_url` (e.g. `http://localhost:44354/api`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::remote_with("Failed to create HTTP client", e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn collection_url(&self, scope: &Scope, kind: ResourceKind) -> String {
        let path = scope.path();
        if path.is_empty() {
            format!("{}/{}", self.base_url, kind.segment())
        } else {
            format!("{}/{}/{}", self.base_url, path, kind.segment())
        }
    }

    fn object_url(&self, scope: &Scope, kind: ResourceKind, id: i64) -> String {
        format!("{}/{}", self.collection_url(scope, kind), id)
    }

    /// Send `request`; non-success statuses become remote errors carrying the body.
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let resp = request
            .send()
            .await
            .map_err(|e| ExchangeError::remote_with(format!("{} failed", what), e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExchangeError::remote(format!("{} failed ({}): {}", what, status, body)));
        }
        Ok(resp)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| ExchangeError::remote_with(format!("Failed to parse response of {}", what), e))
    }
}

/// OData style `$filter` expression for `filter`.
fn filter_expression(filter: &Filter) -> String {
    filter
        .conditions()
        .iter()
        .map(|(field, value)| format!("{} eq {}", field, filter_literal(value)))
        .collect::<Vec<_>>()
        .join(" and ")
}

fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn get(&self, scope: &Scope, kind: ResourceKind, key: &str) -> Result<Option<Value>> {
        let filter = Filter::new().eq(kind.key_field(), key);
        Ok(self.query(scope, kind, &filter).await?.into_iter().next())
    }

    async fn query(&self, scope: &Scope, kind: ResourceKind, filter: &Filter) -> Result<Vec<Value>> {
        let url = self.collection_url(scope, kind);
        let mut request = self.http.get(&url);
        if !filter.is_empty() {
            request = request.query(&[("$filter", filter_expression(filter))]);
        }
        tracing::debug!("GET {} ({})", url, filter_expression(filter));
        self.send_json(request, &format!("GET {}", url)).await
    }

    async fn create(&self, scope: &Scope, kind: ResourceKind, object: Value) -> Result<Value> {
        let url = self.collection_url(scope, kind);
        tracing::debug!("POST {}", url);
        self.send_json(self.http.post(&url).json(&object), &format!("POST {}", url))
            .await
    }

    async fn create_batch(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        objects: Vec<Value>,
    ) -> Result<Vec<Value>> {
        let url = format!("{}/bulk", self.collection_url(scope, kind));
        tracing::debug!("POST {} ({} objects)", url, objects.len());
        self.send_json(self.http.post(&url).json(&objects), &format!("POST {}", url))
            .await
    }

    async fn update(&self, scope: &Scope, kind: ResourceKind, id: i64, object: Value) -> Result<Value> {
        let url = self.object_url(scope, kind, id);
        tracing::debug!("PUT {}", url);
        self.send_json(self.http.put(&url).json(&object), &format!("PUT {}", url))
            .await
    }

    async fn delete(&self, scope: &Scope, kind: ResourceKind, id: i64) -> Result<()> {
        let url = self.object_url(scope, kind, id);
        tracing::debug!("DELETE {}", url);
        self.send(self.http.delete(&url), &format!("DELETE {}", url)).await?;
        Ok(())
    }

    async fn change_job_status(
        &self,
        scope: &Scope,
        job_id: i64,
        status: PayrunJobStatus,
        user_id: i64,
        reason: Option<&str>,
    ) -> Result<()> {
        let url = format!("{}/status", self.object_url(scope, ResourceKind::PayrunJob, job_id));
        let body = json!({
            "jobStatus": status,
            "userId": user_id,
            "reason": reason,
        });
        tracing::debug!("POST {} ({:?})", url, status);
        self.send(self.http.post(&url).json(&body), &format!("POST {}", url))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpStore {
        HttpStore::new("http://localhost:44354/api/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_collection_urls() {
        let store = store();
        assert_eq!(
            store.collection_url(&Scope::root(), ResourceKind::Tenant),
            "http://localhost:44354/api/tenants"
        );
        let regulation = Scope::tenant(1).child(ResourceKind::Regulation, 4);
        assert_eq!(
            store.collection_url(&regulation, ResourceKind::Case),
            "http://localhost:44354/api/tenants/1/regulations/4/cases"
        );
        assert_eq!(
            store.object_url(&Scope::tenant(1), ResourceKind::PayrunJob, 9),
            "http://localhost:44354/api/tenants/1/payruns/jobs/9"
        );
    }

    #[test]
    fn test_filter_expression() {
        let filter = Filter::new()
            .eq("key", "O'Brien")
            .eq("rangeValue", Value::Null)
            .eq("wageTypeNumber", 100.5);
        assert_eq!(
            filter_expression(&filter),
            "key eq 'O''Brien' and rangeValue eq null and wageTypeNumber eq 100.5"
        );
    }
}
