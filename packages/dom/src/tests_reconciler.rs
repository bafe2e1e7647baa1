//! Reconciler behavior: matching, locks, ignore rules, focus, hooks and
//! child-view boundaries.

use crate::config::DomConfig;
use crate::document::{Document, NodeId};
use crate::error::PatchError;
use crate::reconciler::{patch, patch_node, AttrFilter, NoopObserver, PatchContext, PatchObserver, PatchReport};
use std::collections::HashSet;

/// Small fixture: a document with one container element that patches are
/// applied into, mirroring a view root.
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
        if !initial.is_empty() {
            harness.patch(initial);
        }
        harness
    }

    fn patch(&mut self, markup: &str) -> PatchReport {
        self.patch_with(markup, &mut NoopObserver)
    }

    fn patch_with(&mut self, markup: &str, observer: &mut dyn PatchObserver) -> PatchReport {
        let mut ctx = PatchContext {
            config: &self.config,
            locked: &self.locks,
            ignore: &self.ignore,
            observer,
        };
        patch(&mut self.doc, self.root, markup, &mut ctx).unwrap()
    }

    fn inner_markup(&self) -> String {
        self.doc
            .children(self.root)
            .iter()
            .map(|child| self.doc.to_markup(*child))
            .collect()
    }

    fn child(&self, index: usize) -> NodeId {
        self.doc.children(self.root)[index]
    }
}

#[test]
fn test_text_updates_in_place() {
    let mut h = Harness::new("<p>old</p>");
    let text = h.doc.children(h.child(0))[0];

    h.patch("<p>new</p>");
    assert_eq!(h.inner_markup(), "<p>new</p>");
    // The text node itself was reused.
    assert_eq!(h.doc.children(h.child(0))[0], text);
}

#[test]
fn test_attribute_add_change_remove() {
    let mut h = Harness::new("<p class=\"a\" title=\"t\">x</p>");
    h.patch("<p class=\"b\" data-n=\"1\">x</p>");

    let p = h.child(0);
    assert_eq!(h.doc.attr(p, "class"), Some("b"));
    assert_eq!(h.doc.attr(p, "data-n"), Some("1"));
    assert_eq!(h.doc.attr(p, "title"), None);
}

#[test]
fn test_id_match_beats_position() {
    let mut h = Harness::new("<p id=\"a\">a</p><p id=\"b\">b</p>");
    let (a, b) = (h.child(0), h.child(1));

    // Swapped order: both elements move, neither is recreated.
    h.patch("<p id=\"b\">b</p><p id=\"a\">a</p>");
    assert_eq!(h.child(0), b);
    assert_eq!(h.child(1), a);
}

#[test]
fn test_tag_change_replaces_node() {
    let mut h = Harness::new("<span>x</span>");
    let old = h.child(0);

    h.patch("<b>x</b>");
    assert_ne!(h.child(0), old);
    assert!(!h.doc.contains(old));
    assert_eq!(h.inner_markup(), "<b>x</b>");
}

#[test]
fn test_extra_old_children_removed() {
    let mut h = Harness::new("<p>1</p><p>2</p><p>3</p>");
    h.patch("<p>1</p>");
    assert_eq!(h.inner_markup(), "<p>1</p>");
}

#[test]
fn test_locked_element_subtree_is_skipped() {
    let mut h = Harness::new("<form id=\"f\"><input value=\"draft\"></form><p>side</p>");
    let form = h.child(0);
    h.locks.insert(form);

    let report = h.patch("<form id=\"f\"><input value=\"server\"></form><p>updated</p>");

    // The locked form kept its live state; the sibling still patched.
    assert_eq!(
        h.doc.attr(h.doc.children(form)[0], "value"),
        Some("draft")
    );
    assert_eq!(h.doc.to_markup(h.child(1)), "<p>updated</p>");

    // The withheld markup is reported for buffered replay.
    assert_eq!(report.deferred.len(), 1);
    assert_eq!(report.deferred[0].0, form);
    assert!(report.deferred[0].1.contains("server"));
}

#[test]
fn test_unlock_replay_applies_buffered_markup_once() {
    let mut h = Harness::new("<form id=\"f\"><input value=\"draft\"></form>");
    let form = h.child(0);
    h.locks.insert(form);

    let report = h.patch("<form id=\"f\" class=\"done\"><input value=\"server\"></form>");
    let (node, buffered) = report.deferred[0].clone();

    h.locks.clear();
    let mut ctx = PatchContext {
        config: &h.config,
        locked: &h.locks,
        ignore: &h.ignore,
        observer: &mut NoopObserver,
    };
    patch_node(&mut h.doc, node, &buffered, &mut ctx).unwrap();

    assert_eq!(h.doc.attr(form, "class"), Some("done"));
    assert_eq!(h.doc.attr(h.doc.children(form)[0], "value"), Some("server"));
}

#[test]
fn test_ignored_attributes_keep_live_values() {
    let mut h = Harness::new("<details data-ignore-attrs=\"open, aria-*\" open=\"\">x</details>");
    let details = h.child(0);
    h.doc.set_attr(details, "aria-expanded", "true");

    // The incoming markup says closed; the live disclosure state survives.
    h.patch("<details data-ignore-attrs=\"open, aria-*\">x</details>");
    assert_eq!(h.doc.attr(details, "open"), Some(""));
    assert_eq!(h.doc.attr(details, "aria-expanded"), Some("true"));
}

#[test]
fn test_runtime_wide_ignore_filter() {
    let mut h = Harness::new("<p data-scroll=\"120\">x</p>");
    h.ignore = AttrFilter::parse_list("data-scroll");

    h.patch("<p data-scroll=\"0\">x</p>");
    assert_eq!(h.doc.attr(h.child(0), "data-scroll"), Some("120"));
}

#[test]
fn test_focused_element_keeps_value_and_selection() {
    let mut h = Harness::new("<input id=\"q\" value=\"typed\">");
    let input = h.child(0);
    h.doc.set_focus(Some(input));
    h.doc.set_selection(Some((2, 5)));

    h.patch("<input id=\"q\" value=\"server\" class=\"touched\">");

    // Attributes update, but the in-flight value and caret survive.
    assert_eq!(h.doc.attr(input, "value"), Some("typed"));
    assert_eq!(h.doc.attr(input, "class"), Some("touched"));
    assert_eq!(h.doc.focused(), Some(input));
    assert_eq!(h.doc.selection(), Some((2, 5)));
}

#[test]
fn test_focused_element_never_destroyed_by_type_change() {
    let mut h = Harness::new("<input id=\"q\" value=\"typed\">");
    let input = h.child(0);
    h.doc.set_focus(Some(input));

    // The markup wants a textarea; the focused input is updated in place
    // rather than destroyed and recreated.
    h.patch("<textarea id=\"q\"></textarea>");
    assert_eq!(h.child(0), input);
    assert_eq!(h.doc.tag(input), Some("input"));
    assert_eq!(h.doc.focused(), Some(input));
}

#[derive(Default)]
struct RecordingObserver {
    calls: Vec<(String, NodeId)>,
}

impl PatchObserver for RecordingObserver {
    fn before_update(&mut self, _doc: &Document, node: NodeId) {
        self.calls.push(("before_update".into(), node));
    }

    fn discarded(&mut self, doc: &Document, node: NodeId) {
        // The node must still be alive when discarded fires.
        assert!(doc.contains(node));
        self.calls.push(("discarded".into(), node));
    }
}

#[test]
fn test_hook_lifecycle_reporting() {
    let mut h = Harness::new("");
    let report = h.patch("<div data-hook=\"Chart\" id=\"c\">x</div>");
    assert_eq!(report.created_hooks.len(), 1);
    let chart = report.created_hooks[0];

    // Mutation reports the hook as updated, with before_update observed.
    let mut observer = RecordingObserver::default();
    let report = h.patch_with("<div data-hook=\"Chart\" id=\"c\">y</div>", &mut observer);
    assert_eq!(report.updated_hooks, vec![chart]);
    assert_eq!(observer.calls, vec![("before_update".into(), chart)]);

    // Removal reports discarded before the node leaves the document.
    let mut observer = RecordingObserver::default();
    let report = h.patch_with("<p>replaced</p>", &mut observer);
    assert_eq!(report.removed_hooks, vec![chart]);
    assert_eq!(observer.calls, vec![("discarded".into(), chart)]);
    assert!(!h.doc.contains(chart));
}

#[test]
fn test_unchanged_hook_is_not_reported_updated() {
    let mut h = Harness::new("<div data-hook=\"Chart\" id=\"c\">x</div>");
    let report = h.patch("<div data-hook=\"Chart\" id=\"c\">x</div>");
    assert!(report.updated_hooks.is_empty());
}

#[test]
fn test_new_child_view_is_mounted_shallow() {
    let mut h = Harness::new("");
    let report = h.patch("<div data-view=\"child-1\" id=\"v\"><p>placeholder</p></div>");

    assert_eq!(report.mounted_views.len(), 1);
    let boundary = report.mounted_views[0];
    assert_eq!(h.doc.attr(boundary, "data-view"), Some("child-1"));
    // Content arrives through the child's own join, not this patch.
    assert!(h.doc.children(boundary).is_empty());
}

#[test]
fn test_child_view_interior_is_never_patched() {
    let mut h = Harness::new("");
    h.patch("<div data-view=\"child-1\" id=\"v\"></div>");
    let boundary = h.child(0);

    // Simulate the child view having rendered its own content.
    let owned = h.doc.create_element("p");
    h.doc.append_child(boundary, owned);

    h.patch("<div data-view=\"child-1\" id=\"v\"><span>from parent</span></div>");
    assert_eq!(h.doc.children(boundary), &[owned]);
}

#[test]
fn test_removed_child_view_reported_for_teardown() {
    let mut h = Harness::new("");
    h.patch("<div data-view=\"child-1\" id=\"v\"></div>");

    let report = h.patch("<p>gone</p>");
    assert_eq!(report.removed_views, vec!["child-1".to_string()]);
}

#[test]
fn test_unparsable_markup_fails_without_mutation() {
    let mut h = Harness::new("<p>stable</p>");
    let mut ctx = PatchContext {
        config: &h.config,
        locked: &h.locks,
        ignore: &h.ignore,
        observer: &mut NoopObserver,
    };
    let err = patch(&mut h.doc, h.root, "<p>broken", &mut ctx).unwrap_err();
    assert!(matches!(err, PatchError::Parse(_)));
    assert_eq!(h.inner_markup(), "<p>stable</p>");
}

#[test]
fn test_patch_against_removed_root_fails() {
    let mut h = Harness::new("");
    let root = h.root;
    h.doc.remove_subtree(root);
    let mut ctx = PatchContext {
        config: &h.config,
        locked: &h.locks,
        ignore: &h.ignore,
        observer: &mut NoopObserver,
    };
    let err = patch(&mut h.doc, root, "<p>x</p>", &mut ctx).unwrap_err();
    assert_eq!(err, PatchError::DetachedNode { node: root });
}
