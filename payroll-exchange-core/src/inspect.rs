//! Read-only document inspection through optional callbacks.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use crate::error::Result;
use crate::model::{Division, Employee, ExchangeDocument, RegulationPermission, Tenant, User};
use crate::payroll::{CaseChangeSetup, Payroll, PayrollResultSet, Payrun, PayrunJobInvocation};
use crate::regulation::{
    Case, CaseField, CaseRelation, Collector, Lookup, LookupValue, Regulation, Report, Script, WageType,
};
use crate::resource::ResourceKind;
use crate::visit::{self, Ancestry, Visitor};

type Callback<'f, T> = Box<dyn FnMut(&Ancestry, &T) + Send + 'f>;

macro_rules! inspector {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// Callbacks run on each node before its children are visited.
        #[derive(Default)]
        pub struct Inspector<'f> {
            $($field: Option<Callback<'f, $ty>>,)*
        }

        impl<'f> Inspector<'f> {
            pub fn new() -> Self {
                Self::default()
            }

            $(
                pub fn $field(mut self, callback: impl FnMut(&Ancestry, &$ty) + Send + 'f) -> Self {
                    self.$field = Some(Box::new(callback));
                    self
                }
            )*
        }
    };
}

inspector! {
    on_tenant: Tenant,
    on_permission: RegulationPermission,
    on_user: User,
    on_division: Division,
    on_employee: Employee,
    on_regulation: Regulation,
    on_script: Script,
    on_case: Case,
    on_case_field: CaseField,
    on_case_relation: CaseRelation,
    on_collector: Collector,
    on_wage_type: WageType,
    on_lookup: Lookup,
    on_lookup_value: LookupValue,
    on_report: Report,
    on_payroll: Payroll,
    on_case_change: CaseChangeSetup,
    on_payrun: Payrun,
    on_job_invocation: PayrunJobInvocation,
    on_payroll_result: PayrollResultSet,
}

fn call<T>(callback: &mut Option<Callback<'_, T>>, ctx: &Ancestry, node: &T) {
    if let Some(callback) = callback {
        callback(ctx, node);
    }
}

impl Inspector<'_> {
    /// Run the callbacks over `document` in traversal order.
    ///
    /// The walk needs a mutable tree, so it runs over a copy; callers keep
    /// their document borrowed immutably.
    pub fn inspect(&mut self, document: &ExchangeDocument) -> Result<()> {
        let mut document = document.clone();
        futures::executor::block_on(visit::walk_document(self, &mut document))
    }
}

#[async_trait]
impl<'f> Visitor for Inspector<'f> {
    async fn visit_tenant(&mut self, ctx: &Ancestry, tenant: &mut Tenant) -> Result<()> {
        call(&mut self.on_tenant, ctx, tenant);
        visit::walk_tenant(self, ctx, tenant).await
    }

    async fn visit_regulation_permission(
        &mut self,
        ctx: &Ancestry,
        permission: &mut RegulationPermission,
    ) -> Result<()> {
        call(&mut self.on_permission, ctx, permission);
        Ok(())
    }

    async fn visit_user(&mut self, ctx: &Ancestry, user: &mut User) -> Result<()> {
        call(&mut self.on_user, ctx, user);
        Ok(())
    }

    async fn visit_division(&mut self, ctx: &Ancestry, division: &mut Division) -> Result<()> {
        call(&mut self.on_division, ctx, division);
        Ok(())
    }

    async fn visit_employee(&mut self, ctx: &Ancestry, employee: &mut Employee) -> Result<()> {
        call(&mut self.on_employee, ctx, employee);
        Ok(())
    }

    async fn visit_regulation(&mut self, ctx: &Ancestry, regulation: &mut Regulation) -> Result<()> {
        call(&mut self.on_regulation, ctx, regulation);
        visit::walk_regulation(self, ctx, regulation).await
    }

    async fn visit_script(&mut self, ctx: &Ancestry, script: &mut Script) -> Result<()> {
        call(&mut self.on_script, ctx, script);
        Ok(())
    }

    async fn visit_case(&mut self, ctx: &Ancestry, case: &mut Case) -> Result<()> {
        call(&mut self.on_case, ctx, case);
        visit::walk_case(self, ctx, case).await
    }

    async fn visit_case_field(&mut self, ctx: &Ancestry, field: &mut CaseField) -> Result<()> {
        call(&mut self.on_case_field, ctx, field);
        Ok(())
    }

    async fn visit_case_relation(&mut self, ctx: &Ancestry, relation: &mut CaseRelation) -> Result<()> {
        call(&mut self.on_case_relation, ctx, relation);
        Ok(())
    }

    async fn visit_collector(&mut self, ctx: &Ancestry, collector: &mut Collector) -> Result<()> {
        call(&mut self.on_collector, ctx, collector);
        Ok(())
    }

    async fn visit_wage_type(&mut self, ctx: &Ancestry, wage_type: &mut WageType) -> Result<()> {
        call(&mut self.on_wage_type, ctx, wage_type);
        Ok(())
    }

    async fn visit_lookup(&mut self, ctx: &Ancestry, lookup: &mut Lookup) -> Result<()> {
        call(&mut self.on_lookup, ctx, lookup);
        visit::walk_lookup(self, ctx, lookup).await
    }

    async fn visit_lookup_value(&mut self, ctx: &Ancestry, value: &mut LookupValue) -> Result<()> {
        call(&mut self.on_lookup_value, ctx, value);
        Ok(())
    }

    async fn visit_report(&mut self, ctx: &Ancestry, report: &mut Report) -> Result<()> {
        call(&mut self.on_report, ctx, report);
        visit::walk_report(self, ctx, report).await
    }

    async fn visit_payroll(&mut self, ctx: &Ancestry, payroll: &mut Payroll) -> Result<()> {
        call(&mut self.on_payroll, ctx, payroll);
        visit::walk_payroll(self, ctx, payroll).await
    }

    async fn visit_case_change_setup(&mut self, ctx: &Ancestry, change: &mut CaseChangeSetup) -> Result<()> {
        call(&mut self.on_case_change, ctx, change);
        visit::walk_case_change_setup(self, ctx, change).await
    }

    async fn visit_payrun(&mut self, ctx: &Ancestry, payrun: &mut Payrun) -> Result<()> {
        call(&mut self.on_payrun, ctx, payrun);
        visit::walk_payrun(self, ctx, payrun).await
    }

    async fn visit_payrun_job_invocation(
        &mut self,
        ctx: &Ancestry,
        invocation: &mut PayrunJobInvocation,
    ) -> Result<()> {
        call(&mut self.on_job_invocation, ctx, invocation);
        Ok(())
    }

    async fn visit_payroll_result(&mut self, ctx: &Ancestry, results: &mut PayrollResultSet) -> Result<()> {
        call(&mut self.on_payroll_result, ctx, results);
        visit::walk_payroll_result(self, ctx, results).await
    }
}

/// Node counts of a document by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSummary {
    counts: BTreeMap<ResourceKind, usize>,
}

impl DocumentSummary {
    pub fn get(&self, kind: ResourceKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for DocumentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, count) in &self.counts {
            writeln!(f, "{:<22} {:>6}", kind.to_string(), count)?;
        }
        write!(f, "{:<22} {:>6}", "Total", self.total())
    }
}

fn bump(counts: &Mutex<BTreeMap<ResourceKind, usize>>, kind: ResourceKind) {
    if let Ok(mut counts) = counts.lock() {
        *counts.entry(kind).or_default() += 1;
    }
}

/// Count the nodes of `document`.
pub fn summarize(document: &ExchangeDocument) -> Result<DocumentSummary> {
    // Callbacks must be Send and all share the counters; the walk itself
    // runs on this thread only, so the lock is never contended.
    let counts = Mutex::new(BTreeMap::new());
    let c = &counts;
    Inspector::new()
        .on_tenant(move |_, _| bump(c, ResourceKind::Tenant))
        .on_permission(move |_, _| bump(c, ResourceKind::RegulationPermission))
        .on_user(move |_, _| bump(c, ResourceKind::User))
        .on_division(move |_, _| bump(c, ResourceKind::Division))
        .on_employee(move |_, _| bump(c, ResourceKind::Employee))
        .on_regulation(move |_, _| bump(c, ResourceKind::Regulation))
        .on_script(move |_, _| bump(c, ResourceKind::Script))
        .on_case(move |_, _| bump(c, ResourceKind::Case))
        .on_case_field(move |_, _| bump(c, ResourceKind::CaseField))
        .on_case_relation(move |_, _| bump(c, ResourceKind::CaseRelation))
        .on_collector(move |_, _| bump(c, ResourceKind::Collector))
        .on_wage_type(move |_, _| bump(c, ResourceKind::WageType))
        .on_lookup(move |_, _| bump(c, ResourceKind::Lookup))
        .on_lookup_value(move |_, _| bump(c, ResourceKind::LookupValue))
        .on_report(move |_, _| bump(c, ResourceKind::Report))
        .on_payroll(move |_, _| bump(c, ResourceKind::Payroll))
        .on_case_change(move |_, _| bump(c, ResourceKind::CaseChange))
        .on_payrun(move |_, _| bump(c, ResourceKind::Payrun))
        .on_job_invocation(move |_, _| bump(c, ResourceKind::PayrunJob))
        .on_payroll_result(move |_, _| bump(c, ResourceKind::PayrollResult))
        .inspect(document)?;
    let counts = counts.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    Ok(DocumentSummary { counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> ExchangeDocument {
        serde_json::from_value(json!({
            "tenants": [{
                "identifier": "ACME",
                "regulations": [{
                    "name": "ACME.Base",
                    "cases": [{"name": "Salary", "relatedCases": [{"name": "Bonus"}]}],
                    "lookups": [{"name": "Tax", "values": [{"key": "A"}, {"key": "B"}]}]
                }],
                "payrunJobInvocations": [{"name": "Jan", "payrunName": "Monthly"}]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_summarize_counts_nested_nodes() {
        let summary = summarize(&document()).unwrap();
        assert_eq!(summary.get(ResourceKind::Tenant), 1);
        assert_eq!(summary.get(ResourceKind::Case), 2);
        assert_eq!(summary.get(ResourceKind::LookupValue), 2);
        assert_eq!(summary.get(ResourceKind::PayrunJob), 1);
        assert_eq!(summary.get(ResourceKind::Employee), 0);
        assert_eq!(summary.total(), 8);
    }

    #[test]
    fn test_callbacks_see_ancestry() {
        let mut seen = Vec::new();
        Inspector::new()
            .on_case(|ctx, case| {
                let regulation = ctx.regulation.as_ref().map(|r| r.key.clone()).unwrap_or_default();
                seen.push(format!("{}/{}", regulation, case.name));
            })
            .inspect(&document())
            .unwrap();
        assert_eq!(seen, vec!["ACME.Base/Salary", "ACME.Base/Bonus"]);
    }

    #[test]
    fn test_inspect_leaves_document_untouched() {
        let doc = document();
        let mut inspector = Inspector::new().on_lookup(|_, _| {});
        inspector.inspect(&doc).unwrap();
        inspector.inspect(&doc).unwrap();
        assert_eq!(doc, document());
        assert_eq!(summarize(&doc).unwrap(), summarize(&document()).unwrap());
    }
}
