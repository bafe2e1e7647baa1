//! Container update strategies: replace, append, prepend, ignore.

use crate::config::DomConfig;
use crate::document::{Document, NodeId};
use crate::reconciler::{patch, AttrFilter, NoopObserver, PatchContext, PatchReport};
use std::collections::HashSet;

struct Harness {
    doc: Document,
    root: NodeId,
    config: DomConfig,
    locks: HashSet<NodeId>,
    ignore: AttrFilter,
}

impl Harness {
    fn new(initial: &str) -> Self {
        let mut doc = Document::new();
        let body = doc.root();
        let root = doc.create_element("div");
        doc.append_child(body, root);
        let mut harness = Self {
            doc,
            root,
            config: DomConfig::default(),
            locks: HashSet::new(),
            ignore: AttrFilter::new(),
        };
        harness.patch(initial);
        harness
    }

    fn patch(&mut self, markup: &str) -> PatchReport {
        let mut ctx = PatchContext {
            config: &self.config,
            locked: &self.locks,
            ignore: &self.ignore,
            observer: &mut NoopObserver,
        };
        patch(&mut self.doc, self.root, markup, &mut ctx).unwrap()
    }

    fn list(&self) -> NodeId {
        self.doc.children(self.root)[0]
    }

    fn keys(&self) -> Vec<String> {
        self.doc
            .children(self.list())
            .iter()
            .filter_map(|child| self.doc.attr(*child, "data-key"))
            .map(str::to_string)
            .collect()
    }
}

fn entry(key: u32) -> String {
    format!("<li data-key=\"{}\">{}</li>", key, key)
}

#[test]
fn test_append_places_new_keys_after_existing() {
    let mut h = Harness::new(&format!("<ul id=\"l\" data-update=\"append\">{}</ul>", entry(1)));
    assert_eq!(h.keys(), vec!["1"]);

    h.patch(&format!(
        "<ul id=\"l\" data-update=\"append\">{}{}</ul>",
        entry(2),
        entry(3)
    ));
    assert_eq!(h.keys(), vec!["1", "2", "3"]);
}

#[test]
fn test_prepend_places_new_keys_before_existing() {
    let mut h = Harness::new(&format!("<ul id=\"l\" data-update=\"prepend\">{}</ul>", entry(1)));

    h.patch(&format!(
        "<ul id=\"l\" data-update=\"prepend\">{}{}</ul>",
        entry(2),
        entry(3)
    ));
    assert_eq!(h.keys(), vec!["2", "3", "1"]);
}

#[test]
fn test_ignore_leaves_children_after_first_mount() {
    let mut h = Harness::new(&format!("<ul id=\"l\" data-update=\"ignore\">{}</ul>", entry(1)));
    assert_eq!(h.keys(), vec!["1"]);

    h.patch(&format!(
        "<ul id=\"l\" data-update=\"ignore\">{}{}</ul>",
        entry(2),
        entry(3)
    ));
    assert_eq!(h.keys(), vec!["1"]);
}

#[test]
fn test_append_updates_existing_keys_in_place() {
    let mut h = Harness::new("<ul id=\"l\" data-update=\"append\"><li data-key=\"1\">one</li></ul>");
    let first = h.doc.children(h.list())[0];

    h.patch("<ul id=\"l\" data-update=\"append\"><li data-key=\"1\">uno</li><li data-key=\"2\">two</li></ul>");

    // Existing entry updated without being moved or recreated.
    assert_eq!(h.doc.children(h.list())[0], first);
    assert_eq!(h.doc.to_markup(first), "<li data-key=\"1\">uno</li>");
    assert_eq!(h.keys(), vec!["1", "2"]);
}

#[test]
fn test_append_never_removes_missing_keys() {
    let mut h = Harness::new(&format!(
        "<ul id=\"l\" data-update=\"append\">{}{}</ul>",
        entry(1),
        entry(2)
    ));

    // The update mentions only key 3; 1 and 2 stay.
    h.patch(&format!("<ul id=\"l\" data-update=\"append\">{}</ul>", entry(3)));
    assert_eq!(h.keys(), vec!["1", "2", "3"]);
}

#[test]
fn test_replace_reorders_by_key_reusing_nodes() {
    let mut h = Harness::new(&format!("<ul id=\"l\">{}{}{}</ul>", entry(1), entry(2), entry(3)));
    let children: Vec<NodeId> = h.doc.children(h.list()).to_vec();

    h.patch(&format!("<ul id=\"l\">{}{}{}</ul>", entry(3), entry(1), entry(2)));
    assert_eq!(h.keys(), vec!["3", "1", "2"]);
    // Reordering moved the same nodes: scroll/animation/input state lives on.
    assert_eq!(
        h.doc.children(h.list()),
        &[children[2], children[0], children[1]]
    );
}

#[test]
fn test_replace_removes_missing_keys() {
    let mut h = Harness::new(&format!("<ul id=\"l\">{}{}</ul>", entry(1), entry(2)));
    h.patch(&format!("<ul id=\"l\">{}</ul>", entry(2)));
    assert_eq!(h.keys(), vec!["2"]);
}

#[test]
fn test_strategy_marker_takes_effect_with_the_patch_that_sets_it() {
    let mut h = Harness::new(&format!("<ul id=\"l\">{}</ul>", entry(1)));

    // Attributes apply before children reconcile, so the marker arriving
    // with this patch already governs its child pass.
    h.patch(&format!("<ul id=\"l\" data-update=\"append\">{}</ul>", entry(2)));
    assert_eq!(h.keys(), vec!["1", "2"]);

    h.patch(&format!("<ul id=\"l\" data-update=\"append\">{}</ul>", entry(3)));
    assert_eq!(h.keys(), vec!["1", "2", "3"]);
}
