//! Exchange document model
//!
//! The exchange document is a forest rooted at tenants. Nodes carry both a
//! remote id (0 while unresolved) and the natural keys used to find or
//! reference them. Regulation and payroll subtrees live in
//! [`crate::regulation`] and [`crate::payroll`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::payroll::{CaseValue, Payroll, PayrollResultSet, Payrun, PayrunJobInvocation};
use crate::regulation::Regulation;
use crate::resource::{impl_resource, Filter, NaturalKey, ResourceKind};

/// Free-form attributes carried through to the remote store.
pub type Attributes = BTreeMap<String, serde_json::Value>;

pub(crate) fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Root of an exchange file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExchangeDocument {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tenants: Vec<Tenant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regulation_permissions: Vec<RegulationPermission>,
    /// Creation date stamped on every imported node without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_object_date: Option<DateTime<Utc>>,
}

/// Countries with a known ISO 3166 numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Country {
    Austria,
    France,
    Germany,
    Italy,
    Liechtenstein,
    Switzerland,
    UnitedKingdom,
    UnitedStates,
}

impl Country {
    pub fn iso_code(self) -> u16 {
        match self {
            Country::Austria => 40,
            Country::France => 250,
            Country::Germany => 276,
            Country::Italy => 380,
            Country::Liechtenstein => 438,
            Country::Switzerland => 756,
            Country::UnitedKingdom => 826,
            Country::UnitedStates => 840,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tenant {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<String>,
    /// ISO numeric country code; derived from `country_name` when unset.
    #[serde(skip_serializing_if = "is_zero_u16")]
    pub country: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<Country>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<User>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub divisions: Vec<Division>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub webhooks: Vec<Webhook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regulations: Vec<Regulation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub employees: Vec<Employee>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payrolls: Vec<Payroll>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payruns: Vec<Payrun>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payrun_job_invocations: Vec<PayrunJobInvocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payroll_results: Vec<PayrollResultSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub global_case_values: Vec<CaseValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub national_case_values: Vec<CaseValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub company_case_values: Vec<CaseValue>,
}

fn is_zero_u16(value: &u16) -> bool {
    *value == 0
}

impl_resource!(
    Tenant,
    ResourceKind::Tenant,
    children: [
        "users", "divisions", "tasks", "webhooks", "regulations", "employees",
        "payrolls", "payruns", "payrunJobInvocations", "payrollResults",
        "globalCaseValues", "nationalCaseValues", "companyCaseValues", "countryName"
    ],
    key: |tenant| NaturalKey::single(&tenant.identifier)
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(User, ResourceKind::User, children: [], key: |user| NaturalKey::single(&user.identifier));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Division {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(Division, ResourceKind::Division, children: [], key: |division| NaturalKey::single(&division.name));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "is_zero")]
    pub scheduled_user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_user_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_user_identifier: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(Task, ResourceKind::Task, children: [], key: |task| NaturalKey::single(&task.name));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Webhook {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(Webhook, ResourceKind::Webhook, children: [], key: |webhook| NaturalKey::single(&webhook.name));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Employee {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    /// Names of the divisions the employee works in.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub divisions: Vec<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(Employee, ResourceKind::Employee, children: [], key: |employee| NaturalKey::single(&employee.identifier));

/// Grants a tenant (optionally one of its divisions) access to a shared
/// regulation. Each party may be given by id or by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegulationPermission {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub tenant_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_identifier: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub regulation_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regulation_name: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub permission_tenant_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_tenant_identifier: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub permission_division_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_division_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl_resource!(
    RegulationPermission,
    ResourceKind::RegulationPermission,
    children: [],
    key: |permission| NaturalKey::Compound(
        Filter::new()
            .eq("tenantId", permission.tenant_id)
            .eq("regulationId", permission.regulation_id)
            .eq("permissionTenantId", permission.permission_tenant_id)
            .eq("permissionDivisionId", non_zero(permission.permission_division_id))
    )
);

/// Zero ids are omitted from payloads, so they compare as `null`.
pub(crate) fn non_zero(id: i64) -> serde_json::Value {
    if id == 0 {
        serde_json::Value::Null
    } else {
        id.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use serde_json::json;

    #[test]
    fn test_tenant_payload_strips_children() {
        let tenant = Tenant {
            identifier: "ACME".into(),
            country_name: Some(Country::Switzerland),
            users: vec![User {
                identifier: "ACME.peter".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let payload = tenant.payload().unwrap();
        assert_eq!(payload, json!({"identifier": "ACME"}));
    }

    #[test]
    fn test_document_parse_camel_case() {
        let doc: ExchangeDocument = serde_json::from_value(json!({
            "createdObjectDate": "2024-01-01T00:00:00Z",
            "tenants": [{
                "identifier": "ACME",
                "payrunJobInvocations": [{"name": "Job1", "payrunName": "Run"}]
            }]
        }))
        .unwrap();
        assert_eq!(doc.tenants.len(), 1);
        assert_eq!(doc.tenants[0].payrun_job_invocations[0].payrun_name, "Run");
        assert!(doc.created_object_date.is_some());
    }

    #[test]
    fn test_permission_key_treats_missing_division_as_null() {
        let permission = RegulationPermission {
            tenant_id: 1,
            regulation_id: 2,
            permission_tenant_id: 3,
            ..Default::default()
        };
        let NaturalKey::Compound(filter) = permission.natural_key() else {
            panic!("expected compound key");
        };
        assert!(filter.matches(&permission.payload().unwrap()));
    }

    #[test]
    fn test_country_codes() {
        assert_eq!(Country::Switzerland.iso_code(), 756);
        assert_eq!(Country::Germany.iso_code(), 276);
    }
}
