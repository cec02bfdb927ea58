//! Payroll Exchange Core Library
//!
//! Moves payroll exchange documents into a remote system of record:
//! - Exchange document model (tenants, regulations, payrolls, results)
//! - Fixed order document traversal with overridable per node hooks
//! - Natural key resolution and idempotent upsert against a remote store
//! - Bulk lookup import
//! - Namespace rewrite, file inlining and inspection without remote calls
//! - JSON/YAML document codec and archive merging
//! - In-memory remote store

pub mod error;
pub mod resource;
pub mod model;
pub mod regulation;
pub mod payroll;
pub mod store;
pub mod memory_store;
pub mod files;
pub mod config;
pub mod visit;
pub mod resolver;
pub mod import;
pub mod case_change;
pub mod bulk_lookup;
pub mod namespace;
pub mod inline;
pub mod inspect;
pub mod codec;

pub use error::{ExchangeError, Result};
pub use resource::{Filter, NaturalKey, Resource, ResourceKind, Scope};
pub use model::{Country, Division, Employee, ExchangeDocument, RegulationPermission, Task, Tenant, User, Webhook};
pub use regulation::{
    Case, CaseField, CaseRelation, CaseType, Collector, Lookup, LookupSettings, LookupValue, Regulation, Report,
    ReportParameter, ReportTemplate, Script, WageType,
};
pub use payroll::{
    CaseChangeSetup, CaseDocument, CaseSetup, CaseValue, CaseValueSetup, Payroll, PayrollLayer, PayrollResultSet,
    Payrun, PayrunJob, PayrunJobInvocation, PayrunJobStatus, PayrunParameter,
};
pub use store::{RemoteStore, StoreExt};
pub use memory_store::{MemoryStore, StoreCall, StoreOp};
pub use files::{FileProvider, FsFileProvider, IdentityTransform, ScriptKind, ScriptTransform, TextResolver};
pub use config::{DataImportMode, ExchangeConfig, ImportOptions, UpdateMode};
pub use visit::{walk_document, Ancestry, CaseValueSet, Parent, Visitor};
pub use resolver::ReferenceResolver;
pub use import::{import_document, ImportReport, Importer, KindCounts};
pub use namespace::{current_namespace, rewrite_namespace};
pub use inline::inline_files;
pub use inspect::{summarize, DocumentSummary, Inspector};
pub use codec::{
    merge_entries, parse_document, read_document, serialize_document, write_document, DocumentEntry,
    DocumentFormat,
};
