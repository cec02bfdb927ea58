//! File reference loading and document inlining
//!
//! The `load_*` helpers resolve every file-backed field of one node; the
//! importer calls them right before upserting the node. [`inline_files`]
//! runs them over a whole document without touching any remote store.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::files::{FileProvider, ScriptKind, ScriptTransform, TextResolver};
use crate::model::ExchangeDocument;
use crate::payroll::{CaseSetup, CaseValueSetup, Payrun};
use crate::regulation::{Case, CaseRelation, Collector, Report, ReportTemplate, Script, WageType};
use crate::visit::{self, Ancestry, Visitor};

pub(crate) fn load_script(texts: &mut TextResolver, script: &mut Script) -> Result<()> {
    let owner = format!("script {}", script.name);
    texts.resolve_text(&owner, &mut script.value, &mut script.value_file)
}

pub(crate) fn load_case(texts: &mut TextResolver, tenant: &str, case: &mut Case) -> Result<()> {
    let owner = format!("case {}", case.name);
    let keys = [case.name.as_str()];
    let kind = ScriptKind::Case;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut case.available_expression,
        &mut case.available_expression_file,
    )?;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut case.build_expression,
        &mut case.build_expression_file,
    )?;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut case.validate_expression,
        &mut case.validate_expression_file,
    )
}

pub(crate) fn load_case_relation(texts: &mut TextResolver, tenant: &str, relation: &mut CaseRelation) -> Result<()> {
    let owner = format!(
        "case relation {} -> {}",
        relation.source_case_name, relation.target_case_name
    );
    let keys = [
        relation.source_case_name.as_str(),
        relation.target_case_name.as_str(),
    ];
    let kind = ScriptKind::CaseRelation;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut relation.build_expression,
        &mut relation.build_expression_file,
    )?;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut relation.validate_expression,
        &mut relation.validate_expression_file,
    )
}

pub(crate) fn load_collector(texts: &mut TextResolver, tenant: &str, collector: &mut Collector) -> Result<()> {
    let owner = format!("collector {}", collector.name);
    let keys = [collector.name.as_str()];
    let kind = ScriptKind::Collector;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut collector.start_expression,
        &mut collector.start_expression_file,
    )?;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut collector.apply_expression,
        &mut collector.apply_expression_file,
    )?;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut collector.end_expression,
        &mut collector.end_expression_file,
    )
}

pub(crate) fn load_wage_type(texts: &mut TextResolver, tenant: &str, wage_type: &mut WageType) -> Result<()> {
    let number = wage_type.wage_type_number.to_string();
    let owner = format!("wage type {}", number);
    let keys = [number.as_str()];
    let kind = ScriptKind::WageType;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut wage_type.value_expression,
        &mut wage_type.value_expression_file,
    )?;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut wage_type.result_expression,
        &mut wage_type.result_expression_file,
    )
}

pub(crate) fn load_report(texts: &mut TextResolver, tenant: &str, report: &mut Report) -> Result<()> {
    let owner = format!("report {}", report.name);
    let keys = [report.name.as_str()];
    let kind = ScriptKind::Report;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut report.build_expression,
        &mut report.build_expression_file,
    )?;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut report.start_expression,
        &mut report.start_expression_file,
    )?;
    texts.resolve_expression(
        &owner,
        kind,
        tenant,
        &keys,
        &mut report.end_expression,
        &mut report.end_expression_file,
    )
}

pub(crate) fn load_report_template(texts: &mut TextResolver, template: &mut ReportTemplate) -> Result<()> {
    let owner = format!("report template {}", template.name);
    texts.resolve_text(&owner, &mut template.content, &mut template.content_file)?;
    texts.resolve_text(&owner, &mut template.schema, &mut template.schema_file)
}

pub(crate) fn load_payrun(texts: &mut TextResolver, tenant: &str, payrun: &mut Payrun) -> Result<()> {
    let owner = format!("payrun {}", payrun.name);
    let keys = [payrun.name.as_str()];
    let kind = ScriptKind::Payrun;
    let pairs = [
        (&mut payrun.start_expression, &mut payrun.start_expression_file),
        (
            &mut payrun.employee_available_expression,
            &mut payrun.employee_available_expression_file,
        ),
        (
            &mut payrun.employee_start_expression,
            &mut payrun.employee_start_expression_file,
        ),
        (&mut payrun.employee_end_expression, &mut payrun.employee_end_expression_file),
        (
            &mut payrun.wage_type_available_expression,
            &mut payrun.wage_type_available_expression_file,
        ),
        (&mut payrun.end_expression, &mut payrun.end_expression_file),
    ];
    for (value, file) in pairs {
        texts.resolve_expression(&owner, kind, tenant, &keys, value, file)?;
    }
    Ok(())
}

pub(crate) fn load_documents(texts: &mut TextResolver, value: &mut CaseValueSetup) -> Result<()> {
    for document in &mut value.documents {
        let owner = format!("case document {}", document.name);
        texts.resolve_binary(&owner, &mut document.content, &mut document.content_file)?;
    }
    Ok(())
}

/// Documents of a case setup and all its related cases.
pub(crate) fn load_case_documents(texts: &mut TextResolver, setup: &mut CaseSetup) -> Result<()> {
    for value in &mut setup.values {
        load_documents(texts, value)?;
    }
    for related in &mut setup.related_cases {
        load_case_documents(texts, related)?;
    }
    Ok(())
}

struct Inliner {
    texts: TextResolver,
}

#[async_trait]
impl Visitor for Inliner {
    async fn visit_script(&mut self, _ctx: &Ancestry, script: &mut Script) -> Result<()> {
        load_script(&mut self.texts, script)
    }

    async fn visit_case(&mut self, ctx: &Ancestry, case: &mut Case) -> Result<()> {
        load_case(&mut self.texts, ctx.tenant_identifier(), case)?;
        visit::walk_case(self, ctx, case).await
    }

    async fn visit_case_relation(&mut self, ctx: &Ancestry, relation: &mut CaseRelation) -> Result<()> {
        load_case_relation(&mut self.texts, ctx.tenant_identifier(), relation)
    }

    async fn visit_collector(&mut self, ctx: &Ancestry, collector: &mut Collector) -> Result<()> {
        load_collector(&mut self.texts, ctx.tenant_identifier(), collector)
    }

    async fn visit_wage_type(&mut self, ctx: &Ancestry, wage_type: &mut WageType) -> Result<()> {
        load_wage_type(&mut self.texts, ctx.tenant_identifier(), wage_type)
    }

    async fn visit_report(&mut self, ctx: &Ancestry, report: &mut Report) -> Result<()> {
        load_report(&mut self.texts, ctx.tenant_identifier(), report)?;
        visit::walk_report(self, ctx, report).await
    }

    async fn visit_report_template(&mut self, _ctx: &Ancestry, template: &mut ReportTemplate) -> Result<()> {
        load_report_template(&mut self.texts, template)
    }

    async fn visit_payrun(&mut self, ctx: &Ancestry, payrun: &mut Payrun) -> Result<()> {
        load_payrun(&mut self.texts, ctx.tenant_identifier(), payrun)?;
        visit::walk_payrun(self, ctx, payrun).await
    }

    async fn visit_case_value_setup(&mut self, _ctx: &Ancestry, value: &mut CaseValueSetup) -> Result<()> {
        load_documents(&mut self.texts, value)
    }
}

/// Replace every file reference in `document` by the file's content.
///
/// Expressions go through `transform`; the file references are cleared so
/// the result no longer depends on the files next to it.
pub fn inline_files(
    document: &mut ExchangeDocument,
    files: Arc<dyn FileProvider>,
    transform: Arc<dyn ScriptTransform>,
) -> Result<()> {
    let mut inliner = Inliner {
        texts: TextResolver::new(files, transform, true),
    };
    futures::executor::block_on(visit::walk_document(&mut inliner, document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExchangeError;
    use crate::files::{FsFileProvider, IdentityTransform};
    use serde_json::json;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, ExchangeDocument) {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("scripts")).unwrap();
        std::fs::write(tmp.path().join("scripts/wage.cs"), "return 100;").unwrap();
        std::fs::write(tmp.path().join("scripts/shared.cs"), "static class Shared {}").unwrap();
        std::fs::write(tmp.path().join("template.xml"), "<report/>").unwrap();
        std::fs::write(tmp.path().join("contract.pdf"), [1u8, 2, 3]).unwrap();

        let doc = serde_json::from_value(json!({
            "tenants": [{
                "identifier": "ACME",
                "regulations": [{
                    "name": "ACME.Base",
                    "scripts": [{"name": "Shared", "valueFile": "scripts/shared.cs"}],
                    "wageTypes": [{
                        "wageTypeNumber": 100,
                        "name": "Salary",
                        "valueExpression": "inline",
                        "valueExpressionFile": "scripts/missing.cs",
                        "resultExpressionFile": "scripts/wage.cs"
                    }],
                    "reports": [{
                        "name": "Payslip",
                        "templates": [{"name": "Default", "contentFile": "template.xml"}]
                    }]
                }],
                "payrolls": [{
                    "name": "Main",
                    "caseChangeSetups": [{
                        "case": {
                            "caseName": "Contract",
                            "relatedCases": [{
                                "caseName": "Documents",
                                "values": [{
                                    "caseFieldName": "Scan",
                                    "documents": [{"name": "contract.pdf", "contentFile": "contract.pdf"}]
                                }]
                            }]
                        }
                    }]
                }]
            }]
        }))
        .unwrap();
        (tmp, doc)
    }

    #[test]
    fn test_inline_files() {
        let (tmp, mut doc) = fixture();
        inline_files(
            &mut doc,
            Arc::new(FsFileProvider::new(tmp.path())),
            Arc::new(IdentityTransform),
        )
        .unwrap();

        let regulation = &doc.tenants[0].regulations[0];
        assert_eq!(regulation.scripts[0].value.as_deref(), Some("static class Shared {}"));
        assert!(regulation.scripts[0].value_file.is_none());

        // Inline value wins; the reference to a missing file is never read.
        let wage_type = &regulation.wage_types[0];
        assert_eq!(wage_type.value_expression.as_deref(), Some("inline"));
        assert_eq!(wage_type.value_expression_file.as_deref(), Some("scripts/missing.cs"));
        assert_eq!(wage_type.result_expression.as_deref(), Some("return 100;"));

        let template = &regulation.reports[0].templates[0];
        assert_eq!(template.content.as_deref(), Some("<report/>"));

        let setup = &doc.tenants[0].payrolls[0].case_change_setups[0].case;
        let document = &setup.related_cases[0].values[0].documents[0];
        assert_eq!(document.content.as_deref(), Some("AQID"));
        assert!(document.content_file.is_none());
    }

    #[test]
    fn test_inline_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let mut doc: ExchangeDocument = serde_json::from_value(json!({
            "tenants": [{
                "identifier": "ACME",
                "regulations": [{"name": "R", "scripts": [{"name": "S", "valueFile": "nope.cs"}]}]
            }]
        }))
        .unwrap();
        let result = inline_files(
            &mut doc,
            Arc::new(FsFileProvider::new(tmp.path())),
            Arc::new(IdentityTransform),
        );
        assert!(matches!(result, Err(ExchangeError::File { .. })));
    }
}
