//! Namespace rewrite properties over generated documents

use payroll_exchange_core::{current_namespace, rewrite_namespace, summarize, ExchangeDocument};
use proptest::prelude::*;
use serde_json::json;

fn document(namespace: &str, names: &[String], foreign: &[String]) -> ExchangeDocument {
    let qualified: Vec<String> = names.iter().map(|name| format!("{}.{}", namespace, name)).collect();
    let users: Vec<_> = qualified
        .iter()
        .chain(foreign)
        .map(|identifier| json!({"identifier": identifier}))
        .collect();
    let cases: Vec<_> = qualified.iter().map(|name| json!({"name": name})).collect();
    let regulation = format!("{}.Base", namespace);
    serde_json::from_value(json!({
        "tenants": [{
            "identifier": namespace,
            "users": users,
            "divisions": [{"name": format!("{}.HR", namespace)}],
            "regulations": [{"name": regulation, "cases": cases}],
            "payrolls": [{
                "name": format!("{}.Payroll", namespace),
                "divisionName": format!("{}.HR", namespace),
                "layers": [{"level": 1, "regulationName": regulation}]
            }]
        }],
        "regulationPermissions": [{"tenantIdentifier": namespace, "regulationName": regulation}]
    }))
    .unwrap()
}

fn namespace() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,5}"
}

proptest! {
    #[test]
    fn rewrite_moves_every_qualified_name(
        current in namespace(),
        target in namespace(),
        names in prop::collection::vec("[a-z]{1,8}", 0..6),
        foreign in prop::collection::vec("[a-z]{1,8}@example\\.com", 0..3),
    ) {
        prop_assume!(current != target);
        let mut doc = document(&current, &names, &foreign);
        rewrite_namespace(&mut doc, &target).unwrap();
        prop_assert_eq!(doc, document(&target, &names, &foreign));
    }

    #[test]
    fn rewrite_twice_equals_once(
        current in namespace(),
        target in namespace(),
        names in prop::collection::vec("[a-z]{1,8}", 0..6),
    ) {
        let mut once = document(&current, &names, &[]);
        rewrite_namespace(&mut once, &target).unwrap();
        let mut twice = once.clone();
        rewrite_namespace(&mut twice, &target).unwrap();
        prop_assert_eq!(current_namespace(&once).unwrap(), Some(target));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn rewrite_round_trip_restores_document(
        current in namespace(),
        target in namespace(),
        names in prop::collection::vec("[a-z]{1,8}", 0..6),
    ) {
        let original = document(&current, &names, &[]);
        let mut doc = original.clone();
        rewrite_namespace(&mut doc, &target).unwrap();
        rewrite_namespace(&mut doc, &current).unwrap();
        prop_assert_eq!(doc, original);
    }

    #[test]
    fn rewrite_keeps_document_shape(
        current in namespace(),
        target in namespace(),
        names in prop::collection::vec("[a-z]{1,8}", 0..6),
    ) {
        let original = document(&current, &names, &[]);
        let mut doc = original.clone();
        rewrite_namespace(&mut doc, &target).unwrap();
        prop_assert_eq!(summarize(&doc).unwrap(), summarize(&original).unwrap());
    }
}
