//! Case change submission
//!
//! Case changes are history entries: every setup in the document is
//! submitted, never matched against existing changes. A change may cancel an
//! earlier one, given either by id or by the earlier change's exact
//! creation date.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::error::{ExchangeError, Result};
use crate::import::Importer;
use crate::inline;
use crate::payroll::{CaseChangeEntry, CaseChangeResult, CaseChangeSetup};
use crate::regulation::{Case, CaseType};
use crate::resource::{Filter, Resource, ResourceKind, Scope};
use crate::store::{from_value, StoreExt};
use crate::visit::Ancestry;

impl<'a> Importer<'a> {
    pub(crate) async fn submit_case_change(&mut self, ctx: &Ancestry, change: &mut CaseChangeSetup) -> Result<()> {
        let tenant_id = ctx.tenant.as_ref().map(|t| t.id).unwrap_or_default();
        let tenant = Scope::tenant(tenant_id);

        if change.user_id == 0 {
            let identifier = change.user_identifier.clone().unwrap_or_default();
            change.user_id = self.resolver.require(&tenant, ResourceKind::User, &identifier).await?;
        }
        if change.employee_id == 0 {
            if let Some(identifier) = change.employee_identifier.clone() {
                change.employee_id = self.resolver.require(&tenant, ResourceKind::Employee, &identifier).await?;
            }
        }
        if change.division_id == 0 {
            if let Some(name) = change.division_name.clone() {
                change.division_id = self.resolver.require(&tenant, ResourceKind::Division, &name).await?;
            }
        }

        self.resolve_value_divisions(&tenant, change).await?;
        inline::load_case_documents(&mut self.texts, &mut change.case)?;

        if change.cancellation_id.is_none() {
            if let Some(date) = change.cancellation_date {
                change.cancellation_id = Some(self.cancellation_target(ctx, &tenant, change, date).await?);
            }
        }

        self.stamp(&mut change.created);
        let created = self.created_date;
        change.case.for_each_value_mut(&mut |value| {
            if value.created.is_none() {
                value.created = created;
            }
        });

        let scope = ctx.scope();
        let stored = self
            .store
            .create(&scope, ResourceKind::CaseChange, change.payload()?)
            .await?;
        let result: CaseChangeResult = from_value(stored)?;
        if !result.issues.is_empty() {
            let issues: Vec<String> = result
                .issues
                .iter()
                .map(|issue| match &issue.case_field_name {
                    Some(field) => format!("{}: {}", field, issue.message),
                    None => issue.message.clone(),
                })
                .collect();
            return Err(ExchangeError::CaseChangeIssues {
                case: change.case.case_name.clone(),
                issues: issues.join("; "),
            });
        }
        change.id = result.id;
        self.report.record_created(ResourceKind::CaseChange);
        tracing::debug!("Submitted case change {} ({}) in {}", change.case.case_name, change.id, scope);
        Ok(())
    }

    /// Resolve value divisions given by name, then hand the change's
    /// division to every value still without one.
    async fn resolve_value_divisions(&mut self, tenant: &Scope, change: &mut CaseChangeSetup) -> Result<()> {
        let mut names = BTreeSet::new();
        change.case.for_each_value_mut(&mut |value| {
            if value.division_id == 0 {
                if let Some(name) = &value.division_name {
                    names.insert(name.clone());
                }
            }
        });

        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            if let Some(id) = self.resolver.optional(tenant, ResourceKind::Division, &name).await? {
                resolved.push((name, id));
            }
        }

        let division_id = change.division_id;
        change.case.for_each_value_mut(&mut |value| {
            if value.division_id != 0 {
                return;
            }
            let named = value.division_name.as_deref().and_then(|name| {
                resolved
                    .iter()
                    .find(|(resolved_name, _)| resolved_name == name)
                    .map(|(_, id)| *id)
            });
            value.division_id = named.unwrap_or(division_id);
        });
        Ok(())
    }

    /// Id of the single earlier change of the same case category created
    /// exactly at `date`.
    async fn cancellation_target(
        &mut self,
        ctx: &Ancestry,
        tenant: &Scope,
        change: &CaseChangeSetup,
        date: DateTime<Utc>,
    ) -> Result<i64> {
        let case_name = change.case.case_name.as_str();
        let case = self.find_case(ctx, tenant, case_name).await?;

        let scope = match case.case_type {
            CaseType::Employee => tenant.child(ResourceKind::Employee, change.employee_id),
            _ => tenant.clone(),
        };
        let filter = Filter::new().eq("created", serde_json::to_value(date)?);
        let matches: Vec<CaseChangeEntry> = self
            .store
            .query_as(&scope, case.case_type.change_kind(), &filter)
            .await?;
        match matches.as_slice() {
            [entry] => Ok(entry.id),
            _ => Err(ExchangeError::CancellationTarget {
                case: case_name.to_string(),
                created: date.to_rfc3339(),
                matches: matches.len(),
            }),
        }
    }

    /// The case definition in the first payroll regulation declaring it.
    async fn find_case(&mut self, ctx: &Ancestry, tenant: &Scope, case_name: &str) -> Result<Case> {
        for regulation_name in ctx.payroll_regulations.clone() {
            let Some(regulation_id) = self
                .resolver
                .lookup(tenant, ResourceKind::Regulation, &regulation_name)
                .await?
                .and_then(|regulation| regulation.get("id").and_then(serde_json::Value::as_i64))
            else {
                continue;
            };
            let scope = tenant.child(ResourceKind::Regulation, regulation_id);
            if let Some(case) = self.resolver.fetch::<Case>(&scope, Case::KIND, case_name).await? {
                return Ok(case);
            }
        }
        Err(ExchangeError::missing(ResourceKind::Case, case_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportOptions;
    use crate::files::{FsFileProvider, IdentityTransform};
    use crate::memory_store::MemoryStore;
    use crate::model::ExchangeDocument;
    use serde_json::json;
    use std::sync::Arc;

    async fn seeded() -> (MemoryStore, i64, i64) {
        let store = MemoryStore::new();
        let tenant_id = store
            .seed(&Scope::root(), ResourceKind::Tenant, json!({"identifier": "ACME"}))
            .await;
        let tenant = Scope::tenant(tenant_id);
        store.seed(&tenant, ResourceKind::User, json!({"identifier": "admin"})).await;
        let division = store.seed(&tenant, ResourceKind::Division, json!({"name": "HR"})).await;
        let regulation = store
            .seed(&tenant, ResourceKind::Regulation, json!({"name": "ACME.Base"}))
            .await;
        store
            .seed(
                &tenant.child(ResourceKind::Regulation, regulation),
                ResourceKind::Case,
                json!({"name": "Salary", "caseType": "Company"}),
            )
            .await;
        (store, tenant_id, division)
    }

    fn document(change: serde_json::Value) -> ExchangeDocument {
        serde_json::from_value(json!({
            "tenants": [{
                "identifier": "ACME",
                "payrolls": [{
                    "name": "Main",
                    "divisionName": "HR",
                    "layers": [{"level": 1, "regulationName": "ACME.Base"}],
                    "caseChangeSetups": [change]
                }]
            }]
        }))
        .unwrap()
    }

    async fn run(store: &MemoryStore, doc: &mut ExchangeDocument) -> Result<()> {
        let mut importer = Importer::new(
            store,
            Arc::new(FsFileProvider::new(".")),
            Arc::new(IdentityTransform),
            ImportOptions::default(),
        );
        importer.import(doc).await
    }

    #[tokio::test]
    async fn test_division_propagates_to_nested_values() {
        let (store, _, division) = seeded().await;
        let mut doc = document(json!({
            "userIdentifier": "admin",
            "divisionName": "HR",
            "case": {
                "caseName": "Salary",
                "values": [{"caseFieldName": "Wage", "value": "5000"}],
                "relatedCases": [{
                    "caseName": "Bonus",
                    "values": [{"caseFieldName": "BonusAmount", "divisionName": "Unknown"}]
                }]
            }
        }));
        run(&store, &mut doc).await.unwrap();

        let change = &doc.tenants[0].payrolls[0].case_change_setups[0];
        assert_ne!(change.id, 0);
        assert_eq!(change.case.values[0].division_id, division);
        assert_eq!(change.case.related_cases[0].values[0].division_id, division);
    }

    #[tokio::test]
    async fn test_issues_are_reported_verbatim() {
        let (store, _, _) = seeded().await;
        store
            .set_case_change_issues(vec!["Value required".into(), "Start before end".into()])
            .await;
        let mut doc = document(json!({
            "userIdentifier": "admin",
            "case": {"caseName": "Salary"}
        }));
        let err = run(&store, &mut doc).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Case change Salary rejected: Value required; Start before end"
        );
    }

    #[tokio::test]
    async fn test_missing_user_aborts() {
        let (store, _, _) = seeded().await;
        let mut doc = document(json!({
            "userIdentifier": "nobody",
            "case": {"caseName": "Salary"}
        }));
        let err = run(&store, &mut doc).await.unwrap_err();
        assert!(matches!(err, ExchangeError::MissingReference { ref key, .. } if key == "nobody"));
    }
}
