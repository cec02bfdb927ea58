//! Namespace rewrite
//!
//! All natural keys of a tenant share the tenant identifier as prefix
//! (`ACME`, `ACME.Base`, `ACME.Salary`). Rewriting replaces that prefix in
//! every name and in every field referring to a name, without any remote
//! call.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::{ExchangeError, Result};
use crate::model::{Division, Employee, ExchangeDocument, RegulationPermission, Task, Tenant, User, Webhook};
use crate::payroll::{
    CaseChangeSetup, CaseSetup, CaseValue, CaseValueSetup, CollectorResult, Payroll, PayrollLayer, PayrollResultSet,
    Payrun, PayrunJobInvocation, WageTypeResult,
};
use crate::regulation::{Case, CaseField, CaseRelation, Collector, Lookup, Regulation, Report, Script, WageType};
use crate::visit::{self, Ancestry, CaseValueSet, Visitor};

struct NamespaceRewriter<'n> {
    current: &'n str,
    target: &'n str,
}

impl NamespaceRewriter<'_> {
    fn rename(&self, value: &mut String) {
        // With nested namespaces the longer matching prefix owns the name.
        let in_target = self.target.len() > self.current.len() && value.starts_with(self.target);
        if in_target || !value.starts_with(self.current) {
            return;
        }
        value.replace_range(..self.current.len(), self.target);
    }

    fn rename_opt(&self, value: &mut Option<String>) {
        if let Some(value) = value {
            self.rename(value);
        }
    }

    fn rename_all(&self, values: &mut [String]) {
        for value in values {
            self.rename(value);
        }
    }
}

#[async_trait]
impl<'n> Visitor for NamespaceRewriter<'n> {
    async fn visit_tenant(&mut self, ctx: &Ancestry, tenant: &mut Tenant) -> Result<()> {
        self.rename(&mut tenant.identifier);
        visit::walk_tenant(self, ctx, tenant).await
    }

    async fn visit_regulation_permission(
        &mut self,
        _ctx: &Ancestry,
        permission: &mut RegulationPermission,
    ) -> Result<()> {
        self.rename_opt(&mut permission.tenant_identifier);
        self.rename_opt(&mut permission.regulation_name);
        self.rename_opt(&mut permission.permission_tenant_identifier);
        self.rename_opt(&mut permission.permission_division_name);
        Ok(())
    }

    async fn visit_user(&mut self, _ctx: &Ancestry, user: &mut User) -> Result<()> {
        self.rename(&mut user.identifier);
        Ok(())
    }

    async fn visit_division(&mut self, _ctx: &Ancestry, division: &mut Division) -> Result<()> {
        self.rename(&mut division.name);
        Ok(())
    }

    async fn visit_task(&mut self, _ctx: &Ancestry, task: &mut Task) -> Result<()> {
        self.rename(&mut task.name);
        self.rename_opt(&mut task.scheduled_user_identifier);
        self.rename_opt(&mut task.completed_user_identifier);
        Ok(())
    }

    async fn visit_webhook(&mut self, _ctx: &Ancestry, webhook: &mut Webhook) -> Result<()> {
        self.rename(&mut webhook.name);
        Ok(())
    }

    async fn visit_regulation(&mut self, ctx: &Ancestry, regulation: &mut Regulation) -> Result<()> {
        self.rename(&mut regulation.name);
        self.rename_all(&mut regulation.base_regulations);
        visit::walk_regulation(self, ctx, regulation).await
    }

    async fn visit_script(&mut self, _ctx: &Ancestry, script: &mut Script) -> Result<()> {
        self.rename(&mut script.name);
        Ok(())
    }

    async fn visit_case(&mut self, ctx: &Ancestry, case: &mut Case) -> Result<()> {
        self.rename(&mut case.name);
        self.rename_opt(&mut case.base_case);
        visit::walk_case(self, ctx, case).await
    }

    async fn visit_case_field(&mut self, _ctx: &Ancestry, field: &mut CaseField) -> Result<()> {
        if let Some(settings) = &mut field.lookup_settings {
            self.rename(&mut settings.lookup_name);
        }
        Ok(())
    }

    async fn visit_case_relation(&mut self, _ctx: &Ancestry, relation: &mut CaseRelation) -> Result<()> {
        self.rename(&mut relation.source_case_name);
        self.rename(&mut relation.target_case_name);
        Ok(())
    }

    async fn visit_collector(&mut self, _ctx: &Ancestry, collector: &mut Collector) -> Result<()> {
        self.rename(&mut collector.name);
        self.rename_all(&mut collector.collector_groups);
        self.rename_all(&mut collector.clusters);
        Ok(())
    }

    async fn visit_wage_type(&mut self, _ctx: &Ancestry, wage_type: &mut WageType) -> Result<()> {
        self.rename(&mut wage_type.name);
        self.rename_all(&mut wage_type.collectors);
        self.rename_all(&mut wage_type.collector_groups);
        self.rename_all(&mut wage_type.clusters);
        Ok(())
    }

    async fn visit_lookup(&mut self, ctx: &Ancestry, lookup: &mut Lookup) -> Result<()> {
        self.rename(&mut lookup.name);
        visit::walk_lookup(self, ctx, lookup).await
    }

    async fn visit_report(&mut self, ctx: &Ancestry, report: &mut Report) -> Result<()> {
        self.rename(&mut report.name);
        visit::walk_report(self, ctx, report).await
    }

    async fn visit_employee(&mut self, _ctx: &Ancestry, employee: &mut Employee) -> Result<()> {
        self.rename(&mut employee.identifier);
        self.rename_all(&mut employee.divisions);
        Ok(())
    }

    async fn visit_payroll(&mut self, ctx: &Ancestry, payroll: &mut Payroll) -> Result<()> {
        self.rename(&mut payroll.name);
        self.rename_opt(&mut payroll.division_name);
        visit::walk_payroll(self, ctx, payroll).await
    }

    async fn visit_payroll_layer(&mut self, _ctx: &Ancestry, layer: &mut PayrollLayer) -> Result<()> {
        self.rename(&mut layer.regulation_name);
        Ok(())
    }

    async fn visit_case_change_setup(&mut self, ctx: &Ancestry, change: &mut CaseChangeSetup) -> Result<()> {
        self.rename_opt(&mut change.user_identifier);
        self.rename_opt(&mut change.employee_identifier);
        self.rename_opt(&mut change.division_name);
        visit::walk_case_change_setup(self, ctx, change).await
    }

    async fn visit_case_setup(&mut self, ctx: &Ancestry, setup: &mut CaseSetup) -> Result<()> {
        self.rename(&mut setup.case_name);
        visit::walk_case_setup(self, ctx, setup).await
    }

    async fn visit_case_value_setup(&mut self, _ctx: &Ancestry, value: &mut CaseValueSetup) -> Result<()> {
        self.rename_opt(&mut value.division_name);
        Ok(())
    }

    async fn visit_case_value(&mut self, _ctx: &Ancestry, _set: CaseValueSet, value: &mut CaseValue) -> Result<()> {
        self.rename_opt(&mut value.case_name);
        self.rename_opt(&mut value.division_name);
        Ok(())
    }

    async fn visit_payrun(&mut self, ctx: &Ancestry, payrun: &mut Payrun) -> Result<()> {
        self.rename(&mut payrun.name);
        self.rename_opt(&mut payrun.payroll_name);
        visit::walk_payrun(self, ctx, payrun).await
    }

    async fn visit_payrun_job_invocation(
        &mut self,
        _ctx: &Ancestry,
        invocation: &mut PayrunJobInvocation,
    ) -> Result<()> {
        self.rename(&mut invocation.payrun_name);
        self.rename_opt(&mut invocation.payroll_name);
        self.rename_opt(&mut invocation.user_identifier);
        self.rename_all(&mut invocation.employee_identifiers);
        Ok(())
    }

    async fn visit_payroll_result(&mut self, ctx: &Ancestry, results: &mut PayrollResultSet) -> Result<()> {
        self.rename(&mut results.payroll_name);
        self.rename(&mut results.payrun_name);
        self.rename(&mut results.employee_identifier);
        self.rename_opt(&mut results.division_name);
        visit::walk_payroll_result(self, ctx, results).await
    }

    async fn visit_wage_type_result(&mut self, _ctx: &Ancestry, result: &mut WageTypeResult) -> Result<()> {
        self.rename_opt(&mut result.wage_type_name);
        Ok(())
    }

    async fn visit_collector_result(&mut self, _ctx: &Ancestry, result: &mut CollectorResult) -> Result<()> {
        self.rename(&mut result.collector_name);
        Ok(())
    }
}

/// The single tenant identifier of `document`, `None` without tenants.
pub fn current_namespace(document: &ExchangeDocument) -> Result<Option<String>> {
    let identifiers: BTreeSet<&str> = document
        .tenants
        .iter()
        .map(|tenant| tenant.identifier.as_str())
        .collect();
    match identifiers.len() {
        0 => Ok(None),
        1 => Ok(identifiers.into_iter().next().map(str::to_string)),
        _ => Err(ExchangeError::MultipleTenants(
            identifiers.into_iter().collect::<Vec<_>>().join(", "),
        )),
    }
}

/// Move every namespace qualified name of `document` to `target`.
///
/// Names already in `target`, or outside the current namespace, stay as
/// they are, so applying the same rewrite twice changes nothing.
///
/// The namespace is matched as a plain string prefix, not per dotted
/// segment: moving tenant `AC` to `Z` also turns `ACME.Base` into `ZME.Base`.
pub fn rewrite_namespace(document: &mut ExchangeDocument, target: &str) -> Result<()> {
    let Some(current) = current_namespace(document)? else {
        return Ok(());
    };
    if current == target {
        return Ok(());
    }
    tracing::info!("Rewriting namespace {} to {}", current, target);
    let mut rewriter = NamespaceRewriter {
        current: &current,
        target,
    };
    futures::executor::block_on(visit::walk_document(&mut rewriter, document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> ExchangeDocument {
        serde_json::from_value(json!({
            "tenants": [{
                "identifier": "ACME",
                "users": [{"identifier": "ACME.peter"}, {"identifier": "lucy@example.com"}],
                "divisions": [{"name": "ACME.HR"}],
                "employees": [{"identifier": "ACME.mario", "divisions": ["ACME.HR"]}],
                "regulations": [{
                    "name": "ACME.Base",
                    "baseRegulations": ["Core"],
                    "cases": [{
                        "name": "ACME.Salary",
                        "fields": [{"name": "ACME.Wage", "lookupSettings": {"lookupName": "ACME.Tax"}}],
                        "relatedCases": [{"name": "ACME.Bonus"}]
                    }],
                    "caseRelations": [{"sourceCaseName": "ACME.Salary", "targetCaseName": "ACME.Bonus"}],
                    "collectors": [{"name": "ACME.Gross", "collectorGroups": ["ACME.Income"]}],
                    "lookups": [{"name": "ACME.Tax", "values": [{"key": "ACME.A"}]}]
                }],
                "payrolls": [{
                    "name": "ACME.Payroll",
                    "divisionName": "ACME.HR",
                    "layers": [{"regulationName": "ACME.Base"}]
                }],
                "payrunJobInvocations": [{
                    "name": "ACME.Jan",
                    "payrunName": "ACME.Monthly",
                    "employeeIdentifiers": ["ACME.mario"]
                }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_rewrite_names_and_references() {
        let mut doc = document();
        rewrite_namespace(&mut doc, "Globex").unwrap();

        let tenant = &doc.tenants[0];
        assert_eq!(tenant.identifier, "Globex");
        assert_eq!(tenant.users[0].identifier, "Globex.peter");
        assert_eq!(tenant.users[1].identifier, "lucy@example.com");
        assert_eq!(tenant.employees[0].divisions, vec!["Globex.HR"]);

        let regulation = &tenant.regulations[0];
        assert_eq!(regulation.name, "Globex.Base");
        assert_eq!(regulation.base_regulations, vec!["Core"]);
        assert_eq!(regulation.cases[0].related_cases[0].name, "Globex.Bonus");
        assert_eq!(
            regulation.cases[0].fields[0].lookup_settings.as_ref().unwrap().lookup_name,
            "Globex.Tax"
        );
        // Field names are not namespace qualified.
        assert_eq!(regulation.cases[0].fields[0].name, "ACME.Wage");
        assert_eq!(regulation.case_relations[0].target_case_name, "Globex.Bonus");
        assert_eq!(regulation.collectors[0].collector_groups, vec!["Globex.Income"]);
        assert_eq!(regulation.lookups[0].name, "Globex.Tax");
        assert_eq!(regulation.lookups[0].values[0].key, "ACME.A");

        assert_eq!(tenant.payrolls[0].layers[0].regulation_name, "Globex.Base");
        let invocation = &tenant.payrun_job_invocations[0];
        assert_eq!(invocation.payrun_name, "Globex.Monthly");
        assert_eq!(invocation.employee_identifiers, vec!["Globex.mario"]);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut once = document();
        rewrite_namespace(&mut once, "ACME.Test").unwrap();
        let mut twice = once.clone();
        rewrite_namespace(&mut twice, "ACME.Test").unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.tenants[0].regulations[0].name, "ACME.Test.Base");
    }

    #[test]
    fn test_rewrite_to_current_namespace_is_noop() {
        let mut doc = document();
        rewrite_namespace(&mut doc, "ACME").unwrap();
        assert_eq!(doc, document());
    }

    #[test]
    fn test_rewrite_matches_plain_prefix() {
        let mut doc: ExchangeDocument = serde_json::from_value(json!({
            "tenants": [{
                "identifier": "AC",
                "regulations": [{"name": "ACME.Base"}, {"name": "AC.Core"}, {"name": "Shared"}]
            }]
        }))
        .unwrap();
        rewrite_namespace(&mut doc, "Z").unwrap();

        let tenant = &doc.tenants[0];
        assert_eq!(tenant.identifier, "Z");
        assert_eq!(tenant.regulations[0].name, "ZME.Base");
        assert_eq!(tenant.regulations[1].name, "Z.Core");
        assert_eq!(tenant.regulations[2].name, "Shared");
    }

    #[test]
    fn test_rewrite_without_tenants_is_noop() {
        let mut doc = ExchangeDocument::default();
        rewrite_namespace(&mut doc, "Globex").unwrap();
        assert_eq!(doc, ExchangeDocument::default());
    }

    #[test]
    fn test_multiple_tenants_rejected() {
        let mut doc: ExchangeDocument = serde_json::from_value(json!({
            "tenants": [{"identifier": "ACME"}, {"identifier": "Globex"}]
        }))
        .unwrap();
        let err = rewrite_namespace(&mut doc, "ACME").unwrap_err();
        assert!(matches!(err, ExchangeError::MultipleTenants(_)));
    }
}
