//! Component table merge and signed-link resolution.

use crate::diff::RootDiff;
use crate::error::MergeError;
use crate::tree::{ComponentId, Rendered};
use serde_json::json;

fn merge_value(base: &Rendered, payload: serde_json::Value) -> Rendered {
    let diff = RootDiff::from_value(&payload).unwrap();
    base.merge(&diff).unwrap()
}

fn statics_of(rendered: &Rendered, id: i32) -> Vec<String> {
    rendered
        .components
        .get(ComponentId(id))
        .unwrap_or_else(|| panic!("component {} missing", id))
        .statics
        .clone()
}

#[test]
fn test_signed_link_resolution() {
    // Base table: component 1 with statics ["old"].
    let base = merge_value(&Rendered::default(), json!({
        "s": ["", ""],
        "0": 1,
        "c": { "1": { "s": ["old"] } },
    }));
    assert_eq!(statics_of(&base, 1), vec!["old".to_string()]);

    // Diff: 1 gets new statics; 2 links to the *persisted* 1 (negative);
    // 3 links to the *current-diff* 1 (positive).
    let merged = merge_value(&base, json!({
        "c": {
            "1": { "s": ["new"] },
            "2": { "s": -1 },
            "3": { "s": 1 },
        },
    }));

    assert_eq!(statics_of(&merged, 1), vec!["new".to_string()]);
    assert_eq!(statics_of(&merged, 2), vec!["old".to_string()]);
    assert_eq!(statics_of(&merged, 3), vec!["new".to_string()]);
}

#[test]
fn test_chained_positive_links() {
    let base = merge_value(&Rendered::default(), json!({
        "s": [""],
        "c": { "1": { "s": ["tpl"] } },
    }));

    // 3 -> 2 -> 1: both resolve to the current diff's 1.
    let merged = merge_value(&base, json!({
        "c": {
            "1": { "s": ["fresh"] },
            "2": { "s": 1 },
            "3": { "s": 2 },
        },
    }));
    assert_eq!(statics_of(&merged, 2), vec!["fresh".to_string()]);
    assert_eq!(statics_of(&merged, 3), vec!["fresh".to_string()]);
}

#[test]
fn test_link_carries_its_own_dynamics() {
    let base = merge_value(&Rendered::default(), json!({
        "s": ["", ""],
        "0": 1,
        "c": { "1": { "s": ["<b>", "</b>"], "0": "one" } },
    }));
    assert_eq!(base.to_markup().unwrap(), "<b>one</b>");

    // Component 2 reuses 1's template but fills its own slot value.
    let merged = merge_value(&base, json!({
        "0": 2,
        "c": { "2": { "s": -1, "0": "two" } },
    }));
    assert_eq!(merged.to_markup().unwrap(), "<b>two</b>");
    // The linked-from component is untouched.
    assert_eq!(statics_of(&merged, 1), vec!["<b>".to_string(), "</b>".to_string()]);
}

#[test]
fn test_partial_component_update_merges_in_place() {
    let base = merge_value(&Rendered::default(), json!({
        "s": ["", ""],
        "0": 1,
        "c": { "1": { "s": ["<b>", "</b>"], "0": "one" } },
    }));

    let merged = merge_value(&base, json!({
        "c": { "1": { "0": "uno" } },
    }));
    assert_eq!(merged.to_markup().unwrap(), "<b>uno</b>");
}

#[test]
fn test_dangling_negative_link() {
    let base = Rendered::default();
    let diff = RootDiff::from_value(&json!({
        "s": [""],
        "c": { "2": { "s": -7 } },
    }))
    .unwrap();
    let err = base.merge(&diff).unwrap_err();
    assert!(matches!(err, MergeError::DanglingLink { id: -7, .. }));
}

#[test]
fn test_positive_link_to_absent_component() {
    let base = Rendered::default();
    let diff = RootDiff::from_value(&json!({
        "s": [""],
        "c": { "2": { "s": 9 } },
    }))
    .unwrap();
    let err = base.merge(&diff).unwrap_err();
    assert!(matches!(err, MergeError::UnknownComponent { id: 9, .. }));
}

#[test]
fn test_self_link_rejected() {
    let base = Rendered::default();
    let diff = RootDiff::from_value(&json!({
        "s": [""],
        "c": { "4": { "s": 4 } },
    }))
    .unwrap();
    assert_eq!(base.merge(&diff).unwrap_err(), MergeError::SelfLink { id: 4 });
}

#[test]
fn test_link_cycle_rejected() {
    let base = Rendered::default();
    let diff = RootDiff::from_value(&json!({
        "s": [""],
        "c": {
            "2": { "s": 3 },
            "3": { "s": 2 },
        },
    }))
    .unwrap();
    assert!(matches!(
        base.merge(&diff),
        Err(MergeError::MalformedPayload { .. })
    ));
}

#[test]
fn test_partial_update_to_unknown_component() {
    let base = Rendered::default();
    let diff = RootDiff::from_value(&json!({
        "c": { "5": { "0": "value" } },
    }))
    .unwrap();
    let err = base.merge(&diff).unwrap_err();
    assert!(matches!(err, MergeError::UnknownComponent { id: 5, .. }));
}

#[test]
fn test_component_tables_persist_across_updates() {
    let base = merge_value(&Rendered::default(), json!({
        "s": ["", ""],
        "0": 1,
        "c": { "1": { "s": ["<i>", "</i>"], "0": "x" } },
    }));

    // A diff that does not mention the table leaves it intact.
    let merged = merge_value(&base, json!({ "0": 1 }));
    assert_eq!(merged.components.len(), 1);
    assert_eq!(merged.to_markup().unwrap(), "<i>x</i>");
}
