//! Remote resource descriptors
//!
//! Every node the importer persists is a [`Resource`]: it knows its kind, its
//! remote id, its creation date and the natural key used to find an existing
//! counterpart in the remote store. A [`Scope`] names the parent path a kind
//! lives under (`tenants/1/regulations/4/cases`).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::Result;

/// Kinds of objects held by the remote system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Tenant,
    User,
    Division,
    Task,
    Webhook,
    Regulation,
    RegulationPermission,
    Script,
    Case,
    CaseField,
    CaseRelation,
    Collector,
    WageType,
    Lookup,
    LookupValue,
    Report,
    ReportParameter,
    ReportTemplate,
    Employee,
    Payroll,
    PayrollLayer,
    CaseChange,
    GlobalCaseChange,
    NationalCaseChange,
    CompanyCaseChange,
    EmployeeCaseChange,
    GlobalCaseValue,
    NationalCaseValue,
    CompanyCaseValue,
    Payrun,
    PayrunParameter,
    PayrunJob,
    PayrollResult,
}

impl ResourceKind {
    /// URL path segment of the collection holding this kind.
    pub fn segment(self) -> &'static str {
        match self {
            ResourceKind::Tenant => "tenants",
            ResourceKind::User => "users",
            ResourceKind::Division => "divisions",
            ResourceKind::Task => "tasks",
            ResourceKind::Webhook => "webhooks",
            ResourceKind::Regulation => "regulations",
            ResourceKind::RegulationPermission => "regulationpermissions",
            ResourceKind::Script => "scripts",
            ResourceKind::Case => "cases",
            ResourceKind::CaseField => "fields",
            ResourceKind::CaseRelation => "caserelations",
            ResourceKind::Collector => "collectors",
            ResourceKind::WageType => "wagetypes",
            ResourceKind::Lookup => "lookups",
            ResourceKind::LookupValue => "values",
            ResourceKind::Report => "reports",
            ResourceKind::ReportParameter => "parameters",
            ResourceKind::ReportTemplate => "templates",
            ResourceKind::Employee => "employees",
            ResourceKind::Payroll => "payrolls",
            ResourceKind::PayrollLayer => "layers",
            ResourceKind::CaseChange => "cases",
            ResourceKind::GlobalCaseChange => "globalcases/changes",
            ResourceKind::NationalCaseChange => "nationalcases/changes",
            ResourceKind::CompanyCaseChange => "companycases/changes",
            ResourceKind::EmployeeCaseChange => "cases/changes",
            ResourceKind::GlobalCaseValue => "globalcases/values",
            ResourceKind::NationalCaseValue => "nationalcases/values",
            ResourceKind::CompanyCaseValue => "companycases/values",
            ResourceKind::Payrun => "payruns",
            ResourceKind::PayrunParameter => "parameters",
            ResourceKind::PayrunJob => "payruns/jobs",
            ResourceKind::PayrollResult => "payrollresults",
        }
    }

    /// Field holding the single-valued natural key of this kind.
    pub fn key_field(self) -> &'static str {
        match self {
            ResourceKind::Tenant | ResourceKind::User | ResourceKind::Employee => "identifier",
            ResourceKind::WageType => "wageTypeNumber",
            ResourceKind::LookupValue => "key",
            ResourceKind::CaseChange
            | ResourceKind::GlobalCaseChange
            | ResourceKind::NationalCaseChange
            | ResourceKind::CompanyCaseChange
            | ResourceKind::EmployeeCaseChange
            | ResourceKind::RegulationPermission
            | ResourceKind::PayrollResult => "id",
            _ => "name",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Parent path of a remote collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope {
    segments: Vec<(ResourceKind, i64)>,
}

impl Scope {
    /// The unscoped root (tenants, permissions).
    pub fn root() -> Self {
        Self::default()
    }

    pub fn tenant(tenant_id: i64) -> Self {
        Self::root().child(ResourceKind::Tenant, tenant_id)
    }

    /// Extend this scope by one `(kind, id)` segment.
    pub fn child(&self, kind: ResourceKind, id: i64) -> Self {
        let mut segments = self.segments.clone();
        segments.push((kind, id));
        Self { segments }
    }

    pub fn segments(&self) -> &[(ResourceKind, i64)] {
        &self.segments
    }

    /// Id of the innermost segment of the given kind.
    pub fn id_of(&self, kind: ResourceKind) -> Option<i64> {
        self.segments
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
    }

    /// Relative URL path, e.g. `tenants/1/payrolls/7`.
    pub fn path(&self) -> String {
        self.segments
            .iter()
            .map(|(kind, id)| format!("{}/{}", kind.segment(), id))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.path())
        }
    }
}

/// Conjunction of field equality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// A missing field compares equal to `null`.
    pub fn matches(&self, object: &Value) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            let actual = object.get(field).unwrap_or(&Value::Null);
            actual == expected
        })
    }
}

/// How an existing remote counterpart of a node is located.
#[derive(Debug, Clone, PartialEq)]
pub enum NaturalKey {
    /// Matched on [`ResourceKind::key_field`].
    Single(String),
    /// Matched on several fields at once.
    Compound(Filter),
    /// Never matched; the node is always created.
    None,
}

impl NaturalKey {
    pub fn single(key: impl Into<String>) -> Self {
        NaturalKey::Single(key.into())
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::Single(key) => write!(f, "{}", key),
            NaturalKey::Compound(filter) => {
                let parts: Vec<String> = filter
                    .conditions()
                    .iter()
                    .map(|(field, value)| format!("{}={}", field, value))
                    .collect();
                write!(f, "{}", parts.join(","))
            }
            NaturalKey::None => write!(f, "<none>"),
        }
    }
}

/// A document node with a remote counterpart.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync {
    const KIND: ResourceKind;

    /// Child collections stripped from the remote payload.
    const CHILD_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn created(&self) -> Option<DateTime<Utc>>;
    fn set_created(&mut self, created: DateTime<Utc>);
    fn natural_key(&self) -> NaturalKey;

    /// The node as sent to the remote store, without its children.
    fn payload(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            for field in Self::CHILD_FIELDS {
                map.remove(*field);
            }
        }
        Ok(value)
    }
}

/// Implements [`Resource`] for a model type with `id` and `created` fields.
macro_rules! impl_resource {
    ($ty:ty, $kind:expr, children: [$($child:literal),*], key: |$node:ident| $key:expr) => {
        impl $crate::resource::Resource for $ty {
            const KIND: $crate::resource::ResourceKind = $kind;
            const CHILD_FIELDS: &'static [&'static str] = &[$($child),*];

            fn id(&self) -> i64 {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = id;
            }

            fn created(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.created
            }

            fn set_created(&mut self, created: chrono::DateTime<chrono::Utc>) {
                self.created = Some(created);
            }

            fn natural_key(&self) -> $crate::resource::NaturalKey {
                let $node = self;
                $key
            }
        }
    };
}

pub(crate) use impl_resource;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_path() {
        let scope = Scope::tenant(3).child(ResourceKind::Regulation, 9);
        assert_eq!(scope.path(), "tenants/3/regulations/9");
        assert_eq!(scope.to_string(), "/tenants/3/regulations/9");
        assert_eq!(scope.id_of(ResourceKind::Tenant), Some(3));
        assert_eq!(scope.id_of(ResourceKind::Payroll), None);
        assert_eq!(Scope::root().to_string(), "/");
    }

    #[test]
    fn test_filter_matches_missing_as_null() {
        let filter = Filter::new().eq("key", "A").eq("rangeValue", Value::Null);
        assert!(filter.matches(&json!({"key": "A"})));
        assert!(filter.matches(&json!({"key": "A", "rangeValue": null})));
        assert!(!filter.matches(&json!({"key": "A", "rangeValue": 10.0})));
        assert!(!filter.matches(&json!({"key": "B"})));
    }

    #[test]
    fn test_natural_key_display() {
        let key = NaturalKey::Compound(Filter::new().eq("sourceCaseName", "X"));
        assert_eq!(key.to_string(), "sourceCaseName=\"X\"");
        assert_eq!(NaturalKey::single("ACME").to_string(), "ACME");
    }
}
