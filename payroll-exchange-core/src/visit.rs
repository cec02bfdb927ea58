//! Exchange document traversal
//!
//! [`Visitor`] has one hook per node type. Every default hook descends into
//! the node's children through the matching `walk_*` function, so the walk
//! order below is fixed no matter how a document lists its collections:
//!
//! - document: tenants, regulation permissions, then per tenant the payrun
//!   job invocations and payroll results (second pass)
//! - tenant: users, divisions, tasks, webhooks, regulations, employees,
//!   payrolls, payruns, global/national/company case values
//! - regulation: scripts, cases, case relations, collectors, wage types,
//!   lookups, reports
//!
//! An overriding hook that neither calls its `walk_*` function nor recurses
//! itself prunes the whole subtree.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Division, Employee, ExchangeDocument, RegulationPermission, Task, Tenant, User, Webhook};
use crate::payroll::{
    CaseChangeSetup, CaseSetup, CaseValue, CaseValueSetup, CollectorResult, CustomResult, Payroll,
    PayrollLayer, PayrollResultSet, Payrun, PayrunJobInvocation, PayrunParameter, PayrunResult,
    WageTypeResult,
};
use crate::regulation::{
    Case, CaseField, CaseRelation, Collector, Lookup, LookupValue, Regulation, Report, ReportParameter,
    ReportTemplate, Script, WageType,
};
use crate::resource::{ResourceKind, Scope};

/// An already visited ancestor: its remote id and natural key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parent {
    pub id: i64,
    pub key: String,
}

impl Parent {
    fn new(id: i64, key: &str) -> Self {
        Self {
            id,
            key: key.to_string(),
        }
    }
}

/// Ancestors of the node being visited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ancestry {
    pub tenant: Option<Parent>,
    pub regulation: Option<Parent>,
    pub case: Option<Parent>,
    pub lookup: Option<Parent>,
    pub report: Option<Parent>,
    pub payroll: Option<Parent>,
    /// Regulation names layered into the current payroll.
    pub payroll_regulations: Vec<String>,
    pub payrun: Option<Parent>,
    pub case_change: Option<Parent>,
    pub payroll_result: Option<Parent>,
}

impl Ancestry {
    pub fn with_tenant(&self, tenant: &Tenant) -> Self {
        Self {
            tenant: Some(Parent::new(tenant.id, &tenant.identifier)),
            ..self.clone()
        }
    }

    pub fn with_regulation(&self, regulation: &Regulation) -> Self {
        Self {
            regulation: Some(Parent::new(regulation.id, &regulation.name)),
            ..self.clone()
        }
    }

    pub fn with_case(&self, case: &Case) -> Self {
        Self {
            case: Some(Parent::new(case.id, &case.name)),
            ..self.clone()
        }
    }

    pub fn with_lookup(&self, lookup: &Lookup) -> Self {
        Self {
            lookup: Some(Parent::new(lookup.id, &lookup.name)),
            ..self.clone()
        }
    }

    pub fn with_report(&self, report: &Report) -> Self {
        Self {
            report: Some(Parent::new(report.id, &report.name)),
            ..self.clone()
        }
    }

    pub fn with_payroll(&self, payroll: &Payroll) -> Self {
        Self {
            payroll: Some(Parent::new(payroll.id, &payroll.name)),
            payroll_regulations: payroll
                .layers
                .iter()
                .map(|layer| layer.regulation_name.clone())
                .collect(),
            ..self.clone()
        }
    }

    pub fn with_payrun(&self, payrun: &Payrun) -> Self {
        Self {
            payrun: Some(Parent::new(payrun.id, &payrun.name)),
            ..self.clone()
        }
    }

    pub fn with_case_change(&self, change: &CaseChangeSetup) -> Self {
        Self {
            case_change: Some(Parent::new(change.id, &change.case.case_name)),
            ..self.clone()
        }
    }

    pub fn with_payroll_result(&self, results: &PayrollResultSet) -> Self {
        Self {
            payroll_result: Some(Parent::new(results.id, &results.employee_identifier)),
            ..self.clone()
        }
    }

    /// Identifier of the owning tenant, empty outside a tenant.
    pub fn tenant_identifier(&self) -> &str {
        self.tenant.as_ref().map(|t| t.key.as_str()).unwrap_or_default()
    }

    /// Remote scope of the collection the current node lives in.
    pub fn scope(&self) -> Scope {
        let mut scope = Scope::root();
        let chain = [
            (ResourceKind::Tenant, &self.tenant),
            (ResourceKind::Regulation, &self.regulation),
            (ResourceKind::Case, &self.case),
            (ResourceKind::Lookup, &self.lookup),
            (ResourceKind::Report, &self.report),
            (ResourceKind::Payroll, &self.payroll),
            (ResourceKind::Payrun, &self.payrun),
        ];
        for (kind, parent) in chain {
            if let Some(parent) = parent {
                scope = scope.child(kind, parent.id);
            }
        }
        scope
    }
}

/// Which tenant level case value set a [`CaseValue`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseValueSet {
    Global,
    National,
    Company,
}

impl CaseValueSet {
    pub fn kind(self) -> ResourceKind {
        match self {
            CaseValueSet::Global => ResourceKind::GlobalCaseValue,
            CaseValueSet::National => ResourceKind::NationalCaseValue,
            CaseValueSet::Company => ResourceKind::CompanyCaseValue,
        }
    }
}

/// Per node type hooks of a document traversal.
#[async_trait]
pub trait Visitor: Send {
    async fn visit_tenant(&mut self, ctx: &Ancestry, tenant: &mut Tenant) -> Result<()> {
        walk_tenant(self, ctx, tenant).await
    }

    async fn visit_regulation_permission(
        &mut self,
        _ctx: &Ancestry,
        _permission: &mut RegulationPermission,
    ) -> Result<()> {
        Ok(())
    }

    async fn visit_user(&mut self, _ctx: &Ancestry, _user: &mut User) -> Result<()> {
        Ok(())
    }

    async fn visit_division(&mut self, _ctx: &Ancestry, _division: &mut Division) -> Result<()> {
        Ok(())
    }

    async fn visit_task(&mut self, _ctx: &Ancestry, _task: &mut Task) -> Result<()> {
        Ok(())
    }

    async fn visit_webhook(&mut self, _ctx: &Ancestry, _webhook: &mut Webhook) -> Result<()> {
        Ok(())
    }

    async fn visit_regulation(&mut self, ctx: &Ancestry, regulation: &mut Regulation) -> Result<()> {
        walk_regulation(self, ctx, regulation).await
    }

    async fn visit_script(&mut self, _ctx: &Ancestry, _script: &mut Script) -> Result<()> {
        Ok(())
    }

    async fn visit_case(&mut self, ctx: &Ancestry, case: &mut Case) -> Result<()> {
        walk_case(self, ctx, case).await
    }

    async fn visit_case_field(&mut self, _ctx: &Ancestry, _field: &mut CaseField) -> Result<()> {
        Ok(())
    }

    async fn visit_case_relation(&mut self, _ctx: &Ancestry, _relation: &mut CaseRelation) -> Result<()> {
        Ok(())
    }

    async fn visit_collector(&mut self, _ctx: &Ancestry, _collector: &mut Collector) -> Result<()> {
        Ok(())
    }

    async fn visit_wage_type(&mut self, _ctx: &Ancestry, _wage_type: &mut WageType) -> Result<()> {
        Ok(())
    }

    /// All lookups of a regulation at once.
    async fn visit_lookups(&mut self, ctx: &Ancestry, lookups: &mut Vec<Lookup>) -> Result<()> {
        walk_lookups(self, ctx, lookups).await
    }

    async fn visit_lookup(&mut self, ctx: &Ancestry, lookup: &mut Lookup) -> Result<()> {
        walk_lookup(self, ctx, lookup).await
    }

    async fn visit_lookup_value(&mut self, _ctx: &Ancestry, _value: &mut LookupValue) -> Result<()> {
        Ok(())
    }

    async fn visit_report(&mut self, ctx: &Ancestry, report: &mut Report) -> Result<()> {
        walk_report(self, ctx, report).await
    }

    async fn visit_report_parameter(&mut self, _ctx: &Ancestry, _parameter: &mut ReportParameter) -> Result<()> {
        Ok(())
    }

    async fn visit_report_template(&mut self, _ctx: &Ancestry, _template: &mut ReportTemplate) -> Result<()> {
        Ok(())
    }

    async fn visit_employee(&mut self, _ctx: &Ancestry, _employee: &mut Employee) -> Result<()> {
        Ok(())
    }

    async fn visit_payroll(&mut self, ctx: &Ancestry, payroll: &mut Payroll) -> Result<()> {
        walk_payroll(self, ctx, payroll).await
    }

    async fn visit_payroll_layer(&mut self, _ctx: &Ancestry, _layer: &mut PayrollLayer) -> Result<()> {
        Ok(())
    }

    async fn visit_case_change_setup(&mut self, ctx: &Ancestry, change: &mut CaseChangeSetup) -> Result<()> {
        walk_case_change_setup(self, ctx, change).await
    }

    async fn visit_case_setup(&mut self, ctx: &Ancestry, setup: &mut CaseSetup) -> Result<()> {
        walk_case_setup(self, ctx, setup).await
    }

    async fn visit_case_value_setup(&mut self, _ctx: &Ancestry, _value: &mut CaseValueSetup) -> Result<()> {
        Ok(())
    }

    async fn visit_case_value(
        &mut self,
        _ctx: &Ancestry,
        _set: CaseValueSet,
        _value: &mut CaseValue,
    ) -> Result<()> {
        Ok(())
    }

    async fn visit_payrun(&mut self, ctx: &Ancestry, payrun: &mut Payrun) -> Result<()> {
        walk_payrun(self, ctx, payrun).await
    }

    async fn visit_payrun_parameter(&mut self, _ctx: &Ancestry, _parameter: &mut PayrunParameter) -> Result<()> {
        Ok(())
    }

    async fn visit_payrun_job_invocation(
        &mut self,
        _ctx: &Ancestry,
        _invocation: &mut PayrunJobInvocation,
    ) -> Result<()> {
        Ok(())
    }

    async fn visit_payroll_result(&mut self, ctx: &Ancestry, results: &mut PayrollResultSet) -> Result<()> {
        walk_payroll_result(self, ctx, results).await
    }

    async fn visit_wage_type_result(&mut self, ctx: &Ancestry, result: &mut WageTypeResult) -> Result<()> {
        for custom in &mut result.custom_results {
            self.visit_custom_result(ctx, custom).await?;
        }
        Ok(())
    }

    async fn visit_collector_result(&mut self, ctx: &Ancestry, result: &mut CollectorResult) -> Result<()> {
        for custom in &mut result.custom_results {
            self.visit_custom_result(ctx, custom).await?;
        }
        Ok(())
    }

    async fn visit_custom_result(&mut self, _ctx: &Ancestry, _result: &mut CustomResult) -> Result<()> {
        Ok(())
    }

    async fn visit_payrun_result(&mut self, _ctx: &Ancestry, _result: &mut PayrunResult) -> Result<()> {
        Ok(())
    }
}

/// Drive `visitor` over a whole document.
pub async fn walk_document<V: Visitor + ?Sized>(visitor: &mut V, document: &mut ExchangeDocument) -> Result<()> {
    let root = Ancestry::default();
    for tenant in &mut document.tenants {
        visitor.visit_tenant(&root, tenant).await?;
    }
    for permission in &mut document.regulation_permissions {
        visitor.visit_regulation_permission(&root, permission).await?;
    }

    // Job invocations and results refer to payrolls, payruns and users of
    // the first pass.
    for tenant in &mut document.tenants {
        let ctx = root.with_tenant(tenant);
        for invocation in &mut tenant.payrun_job_invocations {
            visitor.visit_payrun_job_invocation(&ctx, invocation).await?;
        }
        for results in &mut tenant.payroll_results {
            visitor.visit_payroll_result(&ctx, results).await?;
        }
    }
    Ok(())
}

pub async fn walk_tenant<V: Visitor + ?Sized>(visitor: &mut V, ctx: &Ancestry, tenant: &mut Tenant) -> Result<()> {
    let ctx = ctx.with_tenant(tenant);
    for user in &mut tenant.users {
        visitor.visit_user(&ctx, user).await?;
    }
    for division in &mut tenant.divisions {
        visitor.visit_division(&ctx, division).await?;
    }
    for task in &mut tenant.tasks {
        visitor.visit_task(&ctx, task).await?;
    }
    for webhook in &mut tenant.webhooks {
        visitor.visit_webhook(&ctx, webhook).await?;
    }
    for regulation in &mut tenant.regulations {
        visitor.visit_regulation(&ctx, regulation).await?;
    }
    for employee in &mut tenant.employees {
        visitor.visit_employee(&ctx, employee).await?;
    }
    for payroll in &mut tenant.payrolls {
        visitor.visit_payroll(&ctx, payroll).await?;
    }
    for payrun in &mut tenant.payruns {
        visitor.visit_payrun(&ctx, payrun).await?;
    }
    let sets = [
        (CaseValueSet::Global, &mut tenant.global_case_values),
        (CaseValueSet::National, &mut tenant.national_case_values),
        (CaseValueSet::Company, &mut tenant.company_case_values),
    ];
    for (set, values) in sets {
        for value in values.iter_mut() {
            visitor.visit_case_value(&ctx, set, value).await?;
        }
    }
    Ok(())
}

pub async fn walk_regulation<V: Visitor + ?Sized>(
    visitor: &mut V,
    ctx: &Ancestry,
    regulation: &mut Regulation,
) -> Result<()> {
    let ctx = ctx.with_regulation(regulation);
    for script in &mut regulation.scripts {
        visitor.visit_script(&ctx, script).await?;
    }
    for case in &mut regulation.cases {
        visitor.visit_case(&ctx, case).await?;
    }
    for relation in &mut regulation.case_relations {
        visitor.visit_case_relation(&ctx, relation).await?;
    }
    for collector in &mut regulation.collectors {
        visitor.visit_collector(&ctx, collector).await?;
    }
    for wage_type in &mut regulation.wage_types {
        visitor.visit_wage_type(&ctx, wage_type).await?;
    }
    visitor.visit_lookups(&ctx, &mut regulation.lookups).await?;
    for report in &mut regulation.reports {
        visitor.visit_report(&ctx, report).await?;
    }
    Ok(())
}

/// Fields under the case, related cases beside it in the regulation.
pub async fn walk_case<V: Visitor + ?Sized>(visitor: &mut V, ctx: &Ancestry, case: &mut Case) -> Result<()> {
    let case_ctx = ctx.with_case(case);
    for field in &mut case.fields {
        visitor.visit_case_field(&case_ctx, field).await?;
    }
    for related in &mut case.related_cases {
        visitor.visit_case(ctx, related).await?;
    }
    Ok(())
}

pub async fn walk_lookups<V: Visitor + ?Sized>(visitor: &mut V, ctx: &Ancestry, lookups: &mut [Lookup]) -> Result<()> {
    for lookup in lookups {
        visitor.visit_lookup(ctx, lookup).await?;
    }
    Ok(())
}

pub async fn walk_lookup<V: Visitor + ?Sized>(visitor: &mut V, ctx: &Ancestry, lookup: &mut Lookup) -> Result<()> {
    let ctx = ctx.with_lookup(lookup);
    for value in &mut lookup.values {
        visitor.visit_lookup_value(&ctx, value).await?;
    }
    Ok(())
}

pub async fn walk_report<V: Visitor + ?Sized>(visitor: &mut V, ctx: &Ancestry, report: &mut Report) -> Result<()> {
    let ctx = ctx.with_report(report);
    for parameter in &mut report.parameters {
        visitor.visit_report_parameter(&ctx, parameter).await?;
    }
    for template in &mut report.templates {
        visitor.visit_report_template(&ctx, template).await?;
    }
    Ok(())
}

pub async fn walk_payroll<V: Visitor + ?Sized>(visitor: &mut V, ctx: &Ancestry, payroll: &mut Payroll) -> Result<()> {
    let ctx = ctx.with_payroll(payroll);
    for layer in &mut payroll.layers {
        visitor.visit_payroll_layer(&ctx, layer).await?;
    }
    for change in &mut payroll.case_change_setups {
        visitor.visit_case_change_setup(&ctx, change).await?;
    }
    Ok(())
}

pub async fn walk_case_change_setup<V: Visitor + ?Sized>(
    visitor: &mut V,
    ctx: &Ancestry,
    change: &mut CaseChangeSetup,
) -> Result<()> {
    let ctx = ctx.with_case_change(change);
    visitor.visit_case_setup(&ctx, &mut change.case).await
}

pub async fn walk_case_setup<V: Visitor + ?Sized>(visitor: &mut V, ctx: &Ancestry, setup: &mut CaseSetup) -> Result<()> {
    for value in &mut setup.values {
        visitor.visit_case_value_setup(ctx, value).await?;
    }
    for related in &mut setup.related_cases {
        visitor.visit_case_setup(ctx, related).await?;
    }
    Ok(())
}

pub async fn walk_payrun<V: Visitor + ?Sized>(visitor: &mut V, ctx: &Ancestry, payrun: &mut Payrun) -> Result<()> {
    let ctx = ctx.with_payrun(payrun);
    for parameter in &mut payrun.parameters {
        visitor.visit_payrun_parameter(&ctx, parameter).await?;
    }
    Ok(())
}

pub async fn walk_payroll_result<V: Visitor + ?Sized>(
    visitor: &mut V,
    ctx: &Ancestry,
    results: &mut PayrollResultSet,
) -> Result<()> {
    let ctx = ctx.with_payroll_result(results);
    for result in &mut results.wage_type_results {
        visitor.visit_wage_type_result(&ctx, result).await?;
    }
    for result in &mut results.collector_results {
        visitor.visit_collector_result(&ctx, result).await?;
    }
    for result in &mut results.payrun_results {
        visitor.visit_payrun_result(&ctx, result).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Records the natural key of every visited node.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
        prune_regulations: bool,
    }

    #[async_trait]
    impl Visitor for Recorder {
        async fn visit_tenant(&mut self, ctx: &Ancestry, tenant: &mut Tenant) -> Result<()> {
            self.seen.push(format!("tenant:{}", tenant.identifier));
            walk_tenant(self, ctx, tenant).await
        }

        async fn visit_regulation_permission(
            &mut self,
            _ctx: &Ancestry,
            permission: &mut RegulationPermission,
        ) -> Result<()> {
            self.seen.push(format!("permission:{}", permission.regulation_name.clone().unwrap_or_default()));
            Ok(())
        }

        async fn visit_regulation(&mut self, ctx: &Ancestry, regulation: &mut Regulation) -> Result<()> {
            self.seen.push(format!("regulation:{}", regulation.name));
            if self.prune_regulations {
                return Ok(());
            }
            walk_regulation(self, ctx, regulation).await
        }

        async fn visit_script(&mut self, _ctx: &Ancestry, script: &mut Script) -> Result<()> {
            self.seen.push(format!("script:{}", script.name));
            Ok(())
        }

        async fn visit_case(&mut self, ctx: &Ancestry, case: &mut Case) -> Result<()> {
            self.seen.push(format!("case:{}", case.name));
            walk_case(self, ctx, case).await
        }

        async fn visit_case_field(&mut self, ctx: &Ancestry, field: &mut CaseField) -> Result<()> {
            let case = ctx.case.as_ref().map(|c| c.key.clone()).unwrap_or_default();
            self.seen.push(format!("field:{}/{}", case, field.name));
            Ok(())
        }

        async fn visit_case_setup(&mut self, ctx: &Ancestry, setup: &mut CaseSetup) -> Result<()> {
            self.seen.push(format!("setup:{}", setup.case_name));
            walk_case_setup(self, ctx, setup).await
        }

        async fn visit_payrun_job_invocation(
            &mut self,
            ctx: &Ancestry,
            invocation: &mut PayrunJobInvocation,
        ) -> Result<()> {
            self.seen.push(format!("job:{}@{}", invocation.name, ctx.tenant_identifier()));
            Ok(())
        }
    }

    fn document() -> ExchangeDocument {
        serde_json::from_value(json!({
            "tenants": [{
                "identifier": "ACME",
                "payrunJobInvocations": [{"name": "Jan", "payrunName": "Monthly"}],
                "regulations": [{
                    "name": "ACME.Base",
                    "cases": [{
                        "name": "Salary",
                        "fields": [{"name": "Wage"}],
                        "relatedCases": [{"name": "Bonus", "relatedCases": [{"name": "Extra"}]}]
                    }],
                    "scripts": [{"name": "Rules"}]
                }],
                "payrolls": [{
                    "name": "Main",
                    "caseChangeSetups": [{
                        "case": {"caseName": "Salary", "relatedCases": [{"caseName": "Bonus"}]}
                    }]
                }]
            }],
            "regulationPermissions": [{"regulationName": "ACME.Base"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_walk_order() {
        let mut recorder = Recorder::default();
        let mut doc = document();
        walk_document(&mut recorder, &mut doc).await.unwrap();
        assert_eq!(
            recorder.seen,
            vec![
                "tenant:ACME",
                "regulation:ACME.Base",
                "script:Rules",
                "case:Salary",
                "field:Salary/Wage",
                "case:Bonus",
                "case:Extra",
                "setup:Salary",
                "setup:Bonus",
                "permission:ACME.Base",
                "job:Jan@ACME",
            ]
        );
    }

    #[tokio::test]
    async fn test_override_without_walk_prunes_subtree() {
        let mut recorder = Recorder {
            prune_regulations: true,
            ..Default::default()
        };
        let mut doc = document();
        walk_document(&mut recorder, &mut doc).await.unwrap();
        assert!(recorder.seen.contains(&"regulation:ACME.Base".to_string()));
        assert!(!recorder.seen.iter().any(|s| s.starts_with("script:") || s.starts_with("case:")));
        assert!(recorder.seen.contains(&"setup:Salary".to_string()));
    }

    #[test]
    fn test_ancestry_scope() {
        let tenant = Tenant {
            id: 1,
            identifier: "ACME".into(),
            ..Default::default()
        };
        let regulation = Regulation {
            id: 4,
            name: "ACME.Base".into(),
            ..Default::default()
        };
        let lookup = Lookup {
            id: 9,
            name: "Tax".into(),
            ..Default::default()
        };
        let ctx = Ancestry::default()
            .with_tenant(&tenant)
            .with_regulation(&regulation)
            .with_lookup(&lookup);
        assert_eq!(ctx.scope().path(), "tenants/1/regulations/4/lookups/9");
        assert_eq!(ctx.tenant_identifier(), "ACME");
    }
}
