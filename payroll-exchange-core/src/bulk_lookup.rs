//! Bulk lookup import
//!
//! Replaces whole lookups: an existing lookup of the same name is deleted
//! with all its values, then every lookup of the regulation is created in a
//! single batch call. Values are not resolved or matched one by one.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::{ExchangeError, Result};
use crate::import::ImportReport;
use crate::regulation::Lookup;
use crate::resource::{ResourceKind, Scope};
use crate::store::{object_id, RemoteStore};

/// Fail on the first `(key, range value)` pair seen twice in `lookup`.
pub fn check_duplicates(lookup: &Lookup) -> Result<()> {
    let mut seen = HashSet::new();
    for value in &lookup.values {
        let range = value.range_value.map(f64::to_bits);
        if !seen.insert((value.key.as_str(), range)) {
            return Err(ExchangeError::DuplicateLookupValue {
                lookup: lookup.name.clone(),
                key: value.key.clone(),
                range: value.range_label(),
            });
        }
    }
    Ok(())
}

/// Delete and recreate `lookups` under the regulation `scope`.
pub async fn import_lookups(
    store: &dyn RemoteStore,
    scope: &Scope,
    lookups: &mut [Lookup],
    created: Option<DateTime<Utc>>,
    report: &mut ImportReport,
) -> Result<()> {
    if lookups.is_empty() {
        return Ok(());
    }
    for lookup in lookups.iter() {
        check_duplicates(lookup)?;
    }

    let mut batch = Vec::with_capacity(lookups.len());
    for lookup in lookups.iter_mut() {
        if let Some(existing) = store.get(scope, ResourceKind::Lookup, &lookup.name).await? {
            let id = object_id(&existing)?;
            tracing::debug!("Replacing lookup {} ({}) in {}", lookup.name, id, scope);
            store.delete(scope, ResourceKind::Lookup, id).await?;
        }
        if let Some(created) = created {
            lookup.created.get_or_insert(created);
            for value in &mut lookup.values {
                value.created.get_or_insert(created);
            }
        }
        batch.push(serde_json::to_value(&*lookup)?);
    }

    let stored = store.create_batch(scope, ResourceKind::Lookup, batch).await?;
    if stored.len() != lookups.len() {
        return Err(ExchangeError::remote(format!(
            "Bulk lookup import in {} returned {} of {} lookups",
            scope,
            stored.len(),
            lookups.len()
        )));
    }
    for (lookup, object) in lookups.iter_mut().zip(&stored) {
        lookup.id = object_id(object)?;
        report.record_created(ResourceKind::Lookup);
        for _ in &lookup.values {
            report.record_created(ResourceKind::LookupValue);
        }
    }
    tracing::info!("Bulk imported {} lookups into {}", lookups.len(), scope);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regulation::LookupValue;

    fn value(key: &str, range: Option<f64>) -> LookupValue {
        LookupValue {
            key: key.into(),
            range_value: range,
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_key_without_range() {
        let lookup = Lookup {
            name: "Tax".into(),
            values: vec![value("A", None), value("B", None), value("A", None)],
            ..Default::default()
        };
        let err = check_duplicates(&lookup).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::DuplicateLookupValue { ref key, ref range, .. } if key == "A" && range == "null"
        ));
    }

    #[test]
    fn test_same_key_different_ranges() {
        let lookup = Lookup {
            name: "Tax".into(),
            values: vec![value("A", Some(1000.0)), value("A", Some(2000.0)), value("A", None)],
            ..Default::default()
        };
        assert!(check_duplicates(&lookup).is_ok());
    }
}
