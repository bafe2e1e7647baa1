//! Merge behavior across sequential diffs.

use crate::diff::RootDiff;
use crate::error::MergeError;
use crate::tree::{RenderNode, Rendered, Slot, TreeNode};
use serde_json::json;

fn merge_value(base: &Rendered, payload: serde_json::Value) -> Rendered {
    let diff = RootDiff::from_value(&payload).unwrap();
    base.merge(&diff).unwrap()
}

fn join(payload: serde_json::Value) -> Rendered {
    merge_value(&Rendered::default(), payload)
}

#[test]
fn test_join_then_slot_update() {
    let joined = join(json!({
        "s": ["<p>", "</p>"],
        "0": "first",
    }));
    assert_eq!(joined.to_markup().unwrap(), "<p>first</p>");

    let updated = merge_value(&joined, json!({ "0": "second" }));
    assert_eq!(updated.to_markup().unwrap(), "<p>second</p>");
    // The original state is untouched.
    assert_eq!(joined.to_markup().unwrap(), "<p>first</p>");
}

#[test]
fn test_sequential_application_matches_single_equivalent_diff() {
    let base = join(json!({
        "s": ["<div>", " ", "</div>"],
        "0": "a",
        "1": "b",
    }));

    let stepwise = merge_value(&merge_value(&base, json!({ "0": "x" })), json!({ "1": "y" }));
    let at_once = merge_value(&base, json!({ "0": "x", "1": "y" }));
    assert_eq!(stepwise, at_once);
    assert_eq!(at_once.to_markup().unwrap(), "<div>x y</div>");
}

#[test]
fn test_statics_replacement_drops_prior_dynamics() {
    let base = join(json!({
        "s": ["<p>", " ", " ", "</p>"],
        "0": "a",
        "1": "b",
        "2": "c",
    }));

    // New statics imply a single slot; the three old values must not leak.
    let replaced = merge_value(&base, json!({
        "s": ["<span>", "</span>"],
        "0": "only",
    }));
    assert_eq!(replaced.to_markup().unwrap(), "<span>only</span>");
    assert_eq!(replaced.tree.dynamics.len(), 1);
}

#[test]
fn test_statics_replacement_without_all_slots_fails_to_render() {
    let base = join(json!({ "s": ["<p>", "</p>"], "0": "a" }));
    let replaced = merge_value(&base, json!({ "s": ["<p>", " ", "</p>"], "0": "a" }));
    let err = replaced.to_markup().unwrap_err();
    assert!(matches!(err, MergeError::MissingSlot { index: 1, .. }));
}

#[test]
fn test_nested_tree_merges_recursively() {
    let base = join(json!({
        "s": ["<div>", "</div>"],
        "0": { "s": ["<b>", "</b>"], "0": "deep" },
    }));
    assert_eq!(base.to_markup().unwrap(), "<div><b>deep</b></div>");

    let updated = merge_value(&base, json!({ "0": { "0": "deeper" } }));
    assert_eq!(updated.to_markup().unwrap(), "<div><b>deeper</b></div>");
}

#[test]
fn test_leaf_replaces_tree_outright() {
    let base = join(json!({
        "s": ["<div>", "</div>"],
        "0": { "s": ["<b>", "</b>"], "0": "deep" },
    }));
    let updated = merge_value(&base, json!({ "0": "flat" }));
    assert_eq!(updated.to_markup().unwrap(), "<div>flat</div>");
    assert_eq!(
        updated.tree.dynamics.get(&0),
        Some(&Slot::Node(RenderNode::Leaf("flat".into())))
    );
}

#[test]
fn test_tree_with_statics_replaces_leaf() {
    let base = join(json!({ "s": ["<div>", "</div>"], "0": "flat" }));
    let updated = merge_value(&base, json!({
        "0": { "s": ["<b>", "</b>"], "0": "deep" },
    }));
    assert_eq!(updated.to_markup().unwrap(), "<div><b>deep</b></div>");
}

#[test]
fn test_partial_tree_over_leaf_is_a_type_mismatch() {
    let base = join(json!({ "s": ["<div>", "</div>"], "0": "flat" }));
    let diff = RootDiff::from_value(&json!({ "0": { "0": "deep" } })).unwrap();
    let err = base.merge(&diff).unwrap_err();
    assert!(matches!(err, MergeError::SlotTypeMismatch { .. }));
    // Failed merges leave the receiver intact.
    assert_eq!(base.to_markup().unwrap(), "<div>flat</div>");
}

#[test]
fn test_partial_tree_over_missing_slot_is_a_type_mismatch() {
    let base = join(json!({ "s": ["<div>", "</div>"] }));
    let diff = RootDiff::from_value(&json!({ "0": { "1": "x" } })).unwrap();
    assert!(matches!(
        base.merge(&diff),
        Err(MergeError::SlotTypeMismatch { .. })
    ));
}

#[test]
fn test_error_paths_name_the_offending_slot() {
    let base = join(json!({
        "s": ["<div>", "</div>"],
        "0": { "s": ["<b>", "</b>"], "0": "deep" },
    }));
    let diff = RootDiff::from_value(&json!({ "0": { "0": { "1": "x" } } })).unwrap();
    match base.merge(&diff) {
        Err(MergeError::SlotTypeMismatch { path }) => {
            assert_eq!(path.to_string(), "0.0");
        }
        other => panic!("expected SlotTypeMismatch, got {:?}", other),
    }
}

#[test]
fn test_markup_round_trip_for_literal_tree() {
    let rendered = join(json!({
        "s": ["<ul>", "", "</ul>"],
        "0": { "s": ["<li>", "</li>"], "0": "one" },
        "1": { "s": ["<li>", "</li>"], "0": "two" },
    }));
    let markup = rendered.to_markup().unwrap();
    assert_eq!(markup, "<ul><li>one</li><li>two</li></ul>");

    // Serializing twice is stable.
    assert_eq!(rendered.to_markup().unwrap(), markup);
}

#[test]
fn test_fingerprint_stable_across_dynamic_updates() {
    let base = join(json!({ "s": ["<p>", "</p>"], "0": "a" }));
    let updated = merge_value(&base, json!({ "0": "b" }));
    assert_eq!(base.fingerprint(), updated.fingerprint());

    let replaced = merge_value(&base, json!({ "s": ["<q>", "</q>"], "0": "a" }));
    assert_ne!(base.fingerprint(), replaced.fingerprint());
}

#[test]
fn test_empty_diff_is_identity() {
    let base = join(json!({ "s": ["<p>", "</p>"], "0": "a" }));
    let updated = merge_value(&base, json!({}));
    assert_eq!(base, updated);
}

#[test]
fn test_builder_tree_matches_decoded_tree() {
    let decoded = join(json!({ "s": ["<p>", "</p>"], "0": "hi" }));
    let built = Rendered::new(TreeNode::new(vec!["<p>".into(), "</p>".into()]).with_leaf(0, "hi"));
    assert_eq!(decoded, built);
}
