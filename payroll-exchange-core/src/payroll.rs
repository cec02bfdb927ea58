//! Payroll subtree: layers, case changes, case values, payruns, payrun job
//! invocations and payroll results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{is_zero, non_zero, Attributes};
use crate::resource::{impl_resource, Filter, NaturalKey, ResourceKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Payroll {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    /// Derived from `division_name` when unset.
    #[serde(skip_serializing_if = "is_zero")]
    pub division_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<PayrollLayer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub case_change_setups: Vec<CaseChangeSetup>,
}

impl_resource!(
    Payroll,
    ResourceKind::Payroll,
    children: ["layers", "caseChangeSetups"],
    key: |payroll| NaturalKey::single(&payroll.name)
);

/// Binds a regulation to a payroll; one layer per regulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrollLayer {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub level: i32,
    pub priority: i32,
    pub regulation_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(
    PayrollLayer,
    ResourceKind::PayrollLayer,
    children: [],
    key: |layer| NaturalKey::Compound(Filter::new().eq("regulationName", layer.regulation_name.as_str()))
);

/// A case change submitted through a payroll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseChangeSetup {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_identifier: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub employee_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_identifier: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub division_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,
    /// Case change to cancel, given by id ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_id: Option<i64>,
    /// ... or by the exact creation date of that change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    pub case: CaseSetup,
}

impl_resource!(CaseChangeSetup, ResourceKind::CaseChange, children: [], key: |_change| NaturalKey::None);

/// Filled-in case form; related cases nest like their case definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseSetup {
    pub case_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_slot: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<CaseValueSetup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_cases: Vec<CaseSetup>,
}

impl CaseSetup {
    /// Visit this setup's values and those of all related cases.
    pub fn for_each_value_mut(&mut self, f: &mut impl FnMut(&mut CaseValueSetup)) {
        for value in &mut self.values {
            f(value);
        }
        for related in &mut self.related_cases {
            related.for_each_value_mut(f);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseValueSetup {
    pub case_field_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "is_zero")]
    pub division_id: i64,
    /// Optional; left unresolved when the division does not exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<CaseDocument>,
}

/// Attachment of a case value; binary content travels base64 encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseDocument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Remote answer to a case change submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseChangeResult {
    pub id: i64,
    pub issues: Vec<CaseValidationIssue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseValidationIssue {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_field_name: Option<String>,
}

/// Case change already stored remotely, as needed for cancellation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseChangeEntry {
    pub id: i64,
    pub created: Option<DateTime<Utc>>,
}

/// Tenant level case value (global, national or company set).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseValue {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_name: Option<String>,
    pub case_field_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "is_zero")]
    pub division_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division_name: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(
    CaseValue,
    ResourceKind::GlobalCaseValue,
    children: [],
    key: |value| NaturalKey::Compound(
        Filter::new()
            .eq("caseFieldName", value.case_field_name.as_str())
            .eq("caseSlot", value.case_slot.clone())
            .eq("start", serde_json::to_value(value.start).unwrap_or_default())
    )
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Payrun {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub payroll_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payroll_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_available_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_available_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_start_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_start_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_end_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_end_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wage_type_available_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wage_type_available_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_expression_file: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<PayrunParameter>,
}

impl_resource!(Payrun, ResourceKind::Payrun, children: ["parameters"], key: |payrun| NaturalKey::single(&payrun.name));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrunParameter {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    pub mandatory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(
    PayrunParameter,
    ResourceKind::PayrunParameter,
    children: [],
    key: |parameter| NaturalKey::single(&parameter.name)
);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayrunJobStatus {
    #[default]
    Draft,
    Release,
    Process,
    Complete,
    Forecast,
    Abort,
    Cancel,
}

/// Request to start a payrun job; becomes a [`PayrunJob`] remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrunJobInvocation {
    pub name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub payrun_id: i64,
    pub payrun_name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub payroll_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payroll_name: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_identifier: Option<String>,
    pub job_status: PayrunJobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,
    /// Restricts the job to these employees; empty means all.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub employee_identifiers: Vec<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Id of the job created for this invocation.
    #[serde(skip_serializing_if = "is_zero")]
    pub payrun_job_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrunJob {
    pub id: i64,
    pub name: String,
    pub payrun_id: i64,
    pub payroll_id: i64,
    pub job_status: PayrunJobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Results of one payrun job for one employee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrollResultSet {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub payroll_id: i64,
    pub payroll_name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub payrun_id: i64,
    pub payrun_name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub payrun_job_id: i64,
    pub payrun_job_name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub employee_id: i64,
    pub employee_identifier: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub division_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wage_type_results: Vec<WageTypeResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collector_results: Vec<CollectorResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payrun_results: Vec<PayrunResult>,
}

impl_resource!(
    PayrollResultSet,
    ResourceKind::PayrollResult,
    children: [],
    key: |results| NaturalKey::Compound(
        Filter::new()
            .eq("payrunJobId", non_zero(results.payrun_job_id))
            .eq("employeeId", non_zero(results.employee_id))
    )
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WageTypeResult {
    pub wage_type_number: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wage_type_name: Option<String>,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_results: Vec<CustomResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectorResult {
    pub collector_name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_results: Vec<CustomResult>,
}

/// Partial result attributed to a source inside a wage type or collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomResult {
    pub source: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrunResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}
