//! Document import
//!
//! [`Importer`] is the visitor that persists an exchange document. For each
//! node it resolves outward references, fetches the existing counterpart
//! by natural key, applies node specific defaults, stamps the creation date
//! and then creates, updates or skips the node.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::bulk_lookup;
use crate::config::{DataImportMode, ImportOptions, UpdateMode};
use crate::error::{ExchangeError, Result};
use crate::files::{FileProvider, ScriptTransform, TextResolver};
use crate::inline;
use crate::model::{Division, Employee, ExchangeDocument, RegulationPermission, Task, Tenant, User, Webhook};
use crate::payroll::{
    CaseChangeSetup, CaseValue, Payroll, PayrollLayer, PayrollResultSet, Payrun, PayrunJob, PayrunJobInvocation,
    PayrunJobStatus, PayrunParameter,
};
use crate::regulation::{
    Case, CaseField, CaseRelation, Collector, Lookup, LookupValue, Regulation, Report, ReportParameter,
    ReportTemplate, Script, WageType,
};
use crate::resolver::ReferenceResolver;
use crate::resource::{Filter, Resource, ResourceKind, Scope};
use crate::store::{object_id, RemoteStore, StoreExt};
use crate::visit::{self, Ancestry, CaseValueSet, Visitor};

/// Created, updated and skipped nodes of one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    counts: BTreeMap<ResourceKind, KindCounts>,
    /// Payrun jobs moved past draft by a status change.
    pub jobs_started: usize,
}

impl ImportReport {
    pub fn counts(&self, kind: ResourceKind) -> KindCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    pub fn created(&self, kind: ResourceKind) -> usize {
        self.counts(kind).created
    }

    pub fn updated(&self, kind: ResourceKind) -> usize {
        self.counts(kind).updated
    }

    pub fn skipped(&self, kind: ResourceKind) -> usize {
        self.counts(kind).skipped
    }

    pub fn total_created(&self) -> usize {
        self.counts.values().map(|c| c.created).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, KindCounts)> + '_ {
        self.counts.iter().map(|(kind, counts)| (*kind, *counts))
    }

    pub(crate) fn record_created(&mut self, kind: ResourceKind) {
        self.counts.entry(kind).or_default().created += 1;
    }

    pub(crate) fn record_updated(&mut self, kind: ResourceKind) {
        self.counts.entry(kind).or_default().updated += 1;
    }

    pub(crate) fn record_skipped(&mut self, kind: ResourceKind) {
        self.counts.entry(kind).or_default().skipped += 1;
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, counts) in self.iter() {
            writeln!(
                f,
                "{:<22} created {:>5}  updated {:>5}  skipped {:>5}",
                kind.to_string(),
                counts.created,
                counts.updated,
                counts.skipped
            )?;
        }
        write!(f, "Payrun jobs started: {}", self.jobs_started)
    }
}

/// Persists an exchange document into a remote store.
pub struct Importer<'a> {
    pub(crate) store: &'a dyn RemoteStore,
    pub(crate) resolver: ReferenceResolver<'a>,
    pub(crate) texts: TextResolver,
    pub(crate) options: ImportOptions,
    pub(crate) created_date: Option<DateTime<Utc>>,
    pub(crate) report: ImportReport,
}

impl<'a> Importer<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        files: Arc<dyn FileProvider>,
        transform: Arc<dyn ScriptTransform>,
        options: ImportOptions,
    ) -> Self {
        Self {
            store,
            resolver: ReferenceResolver::new(store, options.cache_references),
            texts: TextResolver::new(files, transform, options.clear_file_references),
            created_date: options.created_object_date,
            options,
            report: ImportReport::default(),
        }
    }

    pub fn report(&self) -> &ImportReport {
        &self.report
    }

    pub fn into_report(self) -> ImportReport {
        self.report
    }

    /// Import a whole document.
    pub async fn import(&mut self, document: &mut ExchangeDocument) -> Result<()> {
        if self.created_date.is_none() {
            self.created_date = document.created_object_date;
        }
        visit::walk_document(self, document).await
    }

    pub(crate) fn stamp(&self, created: &mut Option<DateTime<Utc>>) {
        if created.is_none() {
            *created = self.created_date;
        }
    }

    async fn upsert<T: Resource>(&mut self, scope: &Scope, node: &mut T) -> Result<()> {
        self.upsert_as(scope, T::KIND, node, |_| {}).await
    }

    /// Find the target, run `setup`, stamp and persist `node`.
    async fn upsert_as<T: Resource>(
        &mut self,
        scope: &Scope,
        kind: ResourceKind,
        node: &mut T,
        setup: impl FnOnce(&mut T) + Send,
    ) -> Result<()> {
        let target = if self.options.load_targets {
            self.store.find_target(scope, kind, &*node).await?
        } else {
            None
        };

        setup(node);
        if node.created().is_none() {
            if let Some(created) = self.created_date {
                node.set_created(created);
            }
        }

        match target {
            None => {
                let stored = self.store.create(scope, kind, node.payload()?).await?;
                node.set_id(object_id(&stored)?);
                tracing::debug!("Created {} {} ({}) in {}", kind, node.natural_key(), node.id(), scope);
                self.report.record_created(kind);
            }
            Some(existing) => {
                node.set_id(existing.id());
                match self.options.update_mode {
                    UpdateMode::Ignore => {
                        tracing::debug!("Skipped existing {} {} ({})", kind, node.natural_key(), node.id());
                        self.report.record_skipped(kind);
                    }
                    UpdateMode::Update => {
                        self.store.update(scope, kind, node.id(), node.payload()?).await?;
                        tracing::debug!("Updated {} {} ({}) in {}", kind, node.natural_key(), node.id(), scope);
                        self.report.record_updated(kind);
                    }
                }
            }
        }
        Ok(())
    }

    fn tenant_scope(ctx: &Ancestry) -> Scope {
        Scope::tenant(ctx.tenant.as_ref().map(|t| t.id).unwrap_or_default())
    }

    /// `id` unless zero, else the id of the required `name`.
    async fn required_id(
        &mut self,
        scope: &Scope,
        kind: ResourceKind,
        id: i64,
        name: Option<&str>,
    ) -> Result<i64> {
        if id != 0 {
            return Ok(id);
        }
        self.resolver.require(scope, kind, name.unwrap_or_default()).await
    }

    async fn start_job(&mut self, ctx: &Ancestry, invocation: &mut PayrunJobInvocation) -> Result<()> {
        let scope = Self::tenant_scope(ctx);
        invocation.payrun_id = self
            .required_id(&scope, ResourceKind::Payrun, invocation.payrun_id, Some(&invocation.payrun_name))
            .await?;
        if invocation.payroll_id == 0 {
            invocation.payroll_id = match invocation.payroll_name.as_deref() {
                Some(name) => self.resolver.require(&scope, ResourceKind::Payroll, name).await?,
                None => {
                    let payrun: Option<Payrun> = self
                        .resolver
                        .fetch(&scope, ResourceKind::Payrun, &invocation.payrun_name)
                        .await?;
                    payrun.map(|p| p.payroll_id).unwrap_or_default()
                }
            };
        }
        invocation.user_id = self
            .required_id(
                &scope,
                ResourceKind::User,
                invocation.user_id,
                invocation.user_identifier.as_deref(),
            )
            .await?;

        if !invocation.name.is_empty() {
            let filter = Filter::new().eq("name", invocation.name.as_str());
            let existing: Vec<PayrunJob> = self.store.query_as(&scope, ResourceKind::PayrunJob, &filter).await?;
            if let Some(job) = existing.first() {
                invocation.payrun_job_id = job.id;
                tracing::debug!("Payrun job {} exists ({}), not restarted", invocation.name, job.id);
                self.report.record_skipped(ResourceKind::PayrunJob);
                return Ok(());
            }
        }

        self.stamp(&mut invocation.created);
        let job: PayrunJob = self
            .store
            .create_as(&scope, ResourceKind::PayrunJob, &*invocation)
            .await?;
        invocation.payrun_job_id = job.id;
        self.report.record_created(ResourceKind::PayrunJob);
        tracing::info!("Created payrun job {} ({})", invocation.name, job.id);

        if invocation.job_status != PayrunJobStatus::Draft && job.job_status != PayrunJobStatus::Abort {
            self.store
                .change_job_status(
                    &scope,
                    job.id,
                    invocation.job_status,
                    invocation.user_id,
                    invocation.reason.as_deref(),
                )
                .await?;
            self.report.jobs_started += 1;
            tracing::info!("Payrun job {} moved to {:?}", job.id, invocation.job_status);
        }
        Ok(())
    }
}

#[async_trait]
impl<'a> Visitor for Importer<'a> {
    async fn visit_tenant(&mut self, ctx: &Ancestry, tenant: &mut Tenant) -> Result<()> {
        tracing::info!("Importing tenant {}", tenant.identifier);
        self.upsert_as(&Scope::root(), ResourceKind::Tenant, tenant, |tenant| {
            if tenant.country == 0 {
                if let Some(country) = tenant.country_name {
                    tenant.country = country.iso_code();
                }
            }
        })
        .await?;
        visit::walk_tenant(self, ctx, tenant).await
    }

    async fn visit_regulation_permission(
        &mut self,
        _ctx: &Ancestry,
        permission: &mut RegulationPermission,
    ) -> Result<()> {
        let root = Scope::root();
        permission.tenant_id = self
            .required_id(
                &root,
                ResourceKind::Tenant,
                permission.tenant_id,
                permission.tenant_identifier.as_deref(),
            )
            .await?;
        let owner = Scope::tenant(permission.tenant_id);
        permission.regulation_id = self
            .required_id(
                &owner,
                ResourceKind::Regulation,
                permission.regulation_id,
                permission.regulation_name.as_deref(),
            )
            .await?;
        permission.permission_tenant_id = self
            .required_id(
                &root,
                ResourceKind::Tenant,
                permission.permission_tenant_id,
                permission.permission_tenant_identifier.as_deref(),
            )
            .await?;
        if permission.permission_division_id == 0 {
            if let Some(name) = permission.permission_division_name.as_deref() {
                let scope = Scope::tenant(permission.permission_tenant_id);
                permission.permission_division_id =
                    self.resolver.require(&scope, ResourceKind::Division, name).await?;
            }
        }
        self.upsert(&owner, permission).await
    }

    async fn visit_user(&mut self, ctx: &Ancestry, user: &mut User) -> Result<()> {
        self.upsert(&ctx.scope(), user).await
    }

    async fn visit_division(&mut self, ctx: &Ancestry, division: &mut Division) -> Result<()> {
        self.upsert(&ctx.scope(), division).await
    }

    async fn visit_task(&mut self, ctx: &Ancestry, task: &mut Task) -> Result<()> {
        let scope = ctx.scope();
        task.scheduled_user_id = self
            .required_id(
                &scope,
                ResourceKind::User,
                task.scheduled_user_id,
                task.scheduled_user_identifier.as_deref(),
            )
            .await?;
        if task.completed_user_id.is_none() {
            if let Some(identifier) = task.completed_user_identifier.as_deref() {
                task.completed_user_id = Some(self.resolver.require(&scope, ResourceKind::User, identifier).await?);
            }
        }
        self.upsert(&scope, task).await
    }

    async fn visit_webhook(&mut self, ctx: &Ancestry, webhook: &mut Webhook) -> Result<()> {
        self.upsert(&ctx.scope(), webhook).await
    }

    async fn visit_regulation(&mut self, ctx: &Ancestry, regulation: &mut Regulation) -> Result<()> {
        tracing::info!("Importing regulation {} of {}", regulation.name, ctx.tenant_identifier());
        self.upsert(&ctx.scope(), regulation).await?;
        visit::walk_regulation(self, ctx, regulation).await
    }

    async fn visit_script(&mut self, ctx: &Ancestry, script: &mut Script) -> Result<()> {
        inline::load_script(&mut self.texts, script)?;
        self.upsert(&ctx.scope(), script).await
    }

    async fn visit_case(&mut self, ctx: &Ancestry, case: &mut Case) -> Result<()> {
        inline::load_case(&mut self.texts, ctx.tenant_identifier(), case)?;
        self.upsert(&ctx.scope(), case).await?;
        visit::walk_case(self, ctx, case).await
    }

    async fn visit_case_field(&mut self, ctx: &Ancestry, field: &mut CaseField) -> Result<()> {
        self.upsert(&ctx.scope(), field).await
    }

    async fn visit_case_relation(&mut self, ctx: &Ancestry, relation: &mut CaseRelation) -> Result<()> {
        inline::load_case_relation(&mut self.texts, ctx.tenant_identifier(), relation)?;
        self.upsert(&ctx.scope(), relation).await
    }

    async fn visit_collector(&mut self, ctx: &Ancestry, collector: &mut Collector) -> Result<()> {
        inline::load_collector(&mut self.texts, ctx.tenant_identifier(), collector)?;
        self.upsert(&ctx.scope(), collector).await
    }

    async fn visit_wage_type(&mut self, ctx: &Ancestry, wage_type: &mut WageType) -> Result<()> {
        inline::load_wage_type(&mut self.texts, ctx.tenant_identifier(), wage_type)?;
        self.upsert(&ctx.scope(), wage_type).await
    }

    async fn visit_lookups(&mut self, ctx: &Ancestry, lookups: &mut Vec<Lookup>) -> Result<()> {
        match self.options.data_import_mode {
            DataImportMode::Bulk => {
                bulk_lookup::import_lookups(self.store, &ctx.scope(), lookups, self.created_date, &mut self.report)
                    .await
            }
            DataImportMode::Single => visit::walk_lookups(self, ctx, lookups).await,
        }
    }

    async fn visit_lookup(&mut self, ctx: &Ancestry, lookup: &mut Lookup) -> Result<()> {
        bulk_lookup::check_duplicates(lookup)?;
        self.upsert(&ctx.scope(), lookup).await?;
        visit::walk_lookup(self, ctx, lookup).await
    }

    async fn visit_lookup_value(&mut self, ctx: &Ancestry, value: &mut LookupValue) -> Result<()> {
        self.upsert(&ctx.scope(), value).await
    }

    async fn visit_report(&mut self, ctx: &Ancestry, report: &mut Report) -> Result<()> {
        inline::load_report(&mut self.texts, ctx.tenant_identifier(), report)?;
        self.upsert(&ctx.scope(), report).await?;
        visit::walk_report(self, ctx, report).await
    }

    async fn visit_report_parameter(&mut self, ctx: &Ancestry, parameter: &mut ReportParameter) -> Result<()> {
        self.upsert(&ctx.scope(), parameter).await
    }

    async fn visit_report_template(&mut self, ctx: &Ancestry, template: &mut ReportTemplate) -> Result<()> {
        inline::load_report_template(&mut self.texts, template)?;
        self.upsert(&ctx.scope(), template).await
    }

    async fn visit_employee(&mut self, ctx: &Ancestry, employee: &mut Employee) -> Result<()> {
        self.upsert(&ctx.scope(), employee).await
    }

    async fn visit_payroll(&mut self, ctx: &Ancestry, payroll: &mut Payroll) -> Result<()> {
        let scope = ctx.scope();
        payroll.division_id = self
            .required_id(
                &scope,
                ResourceKind::Division,
                payroll.division_id,
                payroll.division_name.as_deref(),
            )
            .await?;
        self.upsert(&scope, payroll).await?;
        visit::walk_payroll(self, ctx, payroll).await
    }

    async fn visit_payroll_layer(&mut self, ctx: &Ancestry, layer: &mut PayrollLayer) -> Result<()> {
        self.upsert(&ctx.scope(), layer).await
    }

    async fn visit_case_change_setup(&mut self, ctx: &Ancestry, change: &mut CaseChangeSetup) -> Result<()> {
        self.submit_case_change(ctx, change).await
    }

    async fn visit_case_value(&mut self, ctx: &Ancestry, set: CaseValueSet, value: &mut CaseValue) -> Result<()> {
        let scope = ctx.scope();
        if value.division_id == 0 {
            if let Some(name) = value.division_name.as_deref() {
                if let Some(id) = self.resolver.optional(&scope, ResourceKind::Division, name).await? {
                    value.division_id = id;
                }
            }
        }
        self.upsert_as(&scope, set.kind(), value, |_| {}).await
    }

    async fn visit_payrun(&mut self, ctx: &Ancestry, payrun: &mut Payrun) -> Result<()> {
        let scope = ctx.scope();
        payrun.payroll_id = self
            .required_id(
                &scope,
                ResourceKind::Payroll,
                payrun.payroll_id,
                payrun.payroll_name.as_deref(),
            )
            .await?;
        inline::load_payrun(&mut self.texts, ctx.tenant_identifier(), payrun)?;
        self.upsert(&scope, payrun).await?;
        visit::walk_payrun(self, ctx, payrun).await
    }

    async fn visit_payrun_parameter(&mut self, ctx: &Ancestry, parameter: &mut PayrunParameter) -> Result<()> {
        self.upsert(&ctx.scope(), parameter).await
    }

    async fn visit_payrun_job_invocation(
        &mut self,
        ctx: &Ancestry,
        invocation: &mut PayrunJobInvocation,
    ) -> Result<()> {
        self.start_job(ctx, invocation).await
    }

    async fn visit_payroll_result(&mut self, ctx: &Ancestry, results: &mut PayrollResultSet) -> Result<()> {
        let scope = ctx.scope();
        results.payroll_id = self
            .required_id(&scope, ResourceKind::Payroll, results.payroll_id, Some(&results.payroll_name))
            .await?;
        results.payrun_id = self
            .required_id(&scope, ResourceKind::Payrun, results.payrun_id, Some(&results.payrun_name))
            .await?;
        if results.payrun_job_id == 0 {
            let filter = Filter::new().eq("name", results.payrun_job_name.as_str());
            let jobs: Vec<PayrunJob> = self.store.query_as(&scope, ResourceKind::PayrunJob, &filter).await?;
            let job = jobs.first().ok_or_else(|| {
                ExchangeError::missing(ResourceKind::PayrunJob, results.payrun_job_name.as_str())
            })?;
            results.payrun_job_id = job.id;
        }
        results.employee_id = self
            .required_id(
                &scope,
                ResourceKind::Employee,
                results.employee_id,
                Some(&results.employee_identifier),
            )
            .await?;
        if results.division_id == 0 {
            if let Some(name) = results.division_name.as_deref() {
                if let Some(id) = self.resolver.optional(&scope, ResourceKind::Division, name).await? {
                    results.division_id = id;
                }
            }
        }
        self.upsert(&scope, results).await?;
        visit::walk_payroll_result(self, ctx, results).await
    }
}

/// Import `document` into `store`.
///
/// File references are read through `files`, expressions built through
/// `transform`. The first failure aborts the import; everything persisted
/// up to that point stays in the store.
pub async fn import_document(
    document: &mut ExchangeDocument,
    store: &dyn RemoteStore,
    files: Arc<dyn FileProvider>,
    transform: Arc<dyn ScriptTransform>,
    options: &ImportOptions,
) -> Result<ImportReport> {
    let mut importer = Importer::new(store, files, transform, options.clone());
    importer.import(document).await?;
    let report = importer.into_report();
    tracing::info!(
        "Import finished: {} objects created, {} payrun jobs started",
        report.total_created(),
        report.jobs_started
    );
    Ok(report)
}
