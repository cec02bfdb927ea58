//! Regulation subtree: scripts, cases, relations, collectors, wage types,
//! lookups and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{is_zero, Attributes};
use crate::resource::{impl_resource, Filter, NaturalKey, ResourceKind};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Regulation {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub version: i32,
    #[serde(skip_serializing_if = "is_false")]
    pub shared_regulation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Names of regulations this one derives from.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub base_regulations: Vec<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<Script>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cases: Vec<Case>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub case_relations: Vec<CaseRelation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collectors: Vec<Collector>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wage_types: Vec<WageType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lookups: Vec<Lookup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<Report>,
}

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

impl_resource!(
    Regulation,
    ResourceKind::Regulation,
    children: ["scripts", "cases", "caseRelations", "collectors", "wageTypes", "lookups", "reports"],
    key: |regulation| if regulation.version == 0 {
        NaturalKey::single(&regulation.name)
    } else {
        NaturalKey::Compound(
            Filter::new()
                .eq("name", regulation.name.as_str())
                .eq("version", regulation.version),
        )
    }
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Script {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub function_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(Script, ResourceKind::Script, children: [], key: |script| NaturalKey::single(&script.name));

/// Category of a case; decides where its values are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseType {
    #[default]
    Global,
    National,
    Company,
    Employee,
}

impl CaseType {
    /// Remote collection holding the case changes of this category.
    pub fn change_kind(self) -> ResourceKind {
        match self {
            CaseType::Global => ResourceKind::GlobalCaseChange,
            CaseType::National => ResourceKind::NationalCaseChange,
            CaseType::Company => ResourceKind::CompanyCaseChange,
            CaseType::Employee => ResourceKind::EmployeeCaseChange,
        }
    }
}

/// Data entry form definition. Related cases nest without depth limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Case {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    pub case_type: CaseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_case: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<CaseField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_cases: Vec<Case>,
}

impl_resource!(
    Case,
    ResourceKind::Case,
    children: ["fields", "relatedCases"],
    key: |case| NaturalKey::single(&case.name)
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupSettings {
    pub lookup_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_field_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseField {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_settings: Option<LookupSettings>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(CaseField, ResourceKind::CaseField, children: [], key: |field| NaturalKey::single(&field.name));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseRelation {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub source_case_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_case_slot: Option<String>,
    pub target_case_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_case_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(
    CaseRelation,
    ResourceKind::CaseRelation,
    children: [],
    key: |relation| NaturalKey::Compound(
        Filter::new()
            .eq("sourceCaseName", relation.source_case_name.as_str())
            .eq("sourceCaseSlot", relation.source_case_slot.clone())
            .eq("targetCaseName", relation.target_case_name.as_str())
            .eq("targetCaseSlot", relation.target_case_slot.clone())
    )
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collector {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collect_mode: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub negated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collector_groups: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(Collector, ResourceKind::Collector, children: [], key: |collector| NaturalKey::single(&collector.name));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WageType {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub wage_type_number: f64,
    pub name: String,
    /// Names of the collectors fed by this wage type.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collectors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collector_groups: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

// Numbers are matched as JSON values; a rendered key would lose the
// fraction formatting.
impl_resource!(
    WageType,
    ResourceKind::WageType,
    children: [],
    key: |wage_type| NaturalKey::Compound(Filter::new().eq("wageTypeNumber", wage_type.wage_type_number))
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lookup {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<LookupValue>,
}

impl_resource!(Lookup, ResourceKind::Lookup, children: ["values"], key: |lookup| NaturalKey::single(&lookup.name));

/// Lookup entry; `(key, range_value)` is unique within its lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupValue {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl LookupValue {
    /// Display form of the compound key.
    pub fn range_label(&self) -> String {
        self.range_value
            .map(|range| range.to_string())
            .unwrap_or_else(|| "null".to_string())
    }
}

impl_resource!(
    LookupValue,
    ResourceKind::LookupValue,
    children: [],
    key: |value| NaturalKey::Compound(
        Filter::new()
            .eq("key", value.key.as_str())
            .eq("rangeValue", value.range_value)
    )
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Report {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub queries: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ReportParameter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<ReportTemplate>,
}

impl_resource!(
    Report,
    ResourceKind::Report,
    children: ["parameters", "templates"],
    key: |report| NaturalKey::single(&report.name)
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportParameter {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub mandatory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(
    ReportParameter,
    ResourceKind::ReportParameter,
    children: [],
    key: |parameter| NaturalKey::single(&parameter.name)
);

/// Report layout; `content`/`schema` win over their file references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportTemplate {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(
    ReportTemplate,
    ResourceKind::ReportTemplate,
    children: [],
    key: |template| NaturalKey::Compound(
        Filter::new()
            .eq("name", template.name.as_str())
            .eq("culture", template.culture.clone())
    )
);
