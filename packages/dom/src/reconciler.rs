//! DOM reconciliation.
//!
//! [`patch`] walks new markup and the live document in lockstep and applies
//! the minimal set of mutations. Elements are matched by identity attribute
//! first (an explicit id, or the stable key inside keyed containers),
//! falling back to tag + position. Matched elements update in place;
//! everything else is created or removed.
//!
//! The walk respects:
//! - **locks**: a locked element's subtree is skipped entirely and the
//!   incoming markup is handed back for buffered replay, siblings continue,
//! - **ignore-attribute rules**: matching attributes keep their live value,
//! - **focus**: the focused element is never destroyed or replaced, and its
//!   in-flight value and selection survive the patch,
//! - **container strategies**: `append`/`prepend` only place newly
//!   introduced keys, `ignore` leaves children alone after first mount,
//! - **child-view boundaries**: never patched into; new and discarded
//!   boundaries are reported for asynchronous mount and teardown.

use crate::config::{DomConfig, UpdateStrategy};
use crate::document::{Document, Node, NodeId};
use crate::error::{PatchError, PatchResult};
use crate::parser::{parse_fragment, ParsedNode};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Attribute-name predicate: exact names plus suffix-wildcard patterns
/// (`data-x*` matches any attribute starting with `data-x`).
#[derive(Debug, Clone, Default)]
pub struct AttrFilter {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl AttrFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for pattern in patterns {
            filter.add(pattern.as_ref());
        }
        filter
    }

    /// Parse a comma-separated marker value.
    pub fn parse_list(list: &str) -> Self {
        Self::from_patterns(list.split(',').map(str::trim).filter(|p| !p.is_empty()))
    }

    pub fn add(&mut self, pattern: &str) {
        match pattern.strip_suffix('*') {
            Some(prefix) => self.prefixes.push(prefix.to_string()),
            None => self.exact.push(pattern.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.exact.iter().any(|exact| exact == name)
            || self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// Callbacks invoked while the patch is in flight. `before_update` runs for
/// a behavior-tagged element before any of its mutations; `discarded` runs
/// for a behavior-tagged element before it is removed from the document.
pub trait PatchObserver {
    fn before_update(&mut self, _doc: &Document, _node: NodeId) {}
    fn discarded(&mut self, _doc: &Document, _node: NodeId) {}
}

/// Observer that does nothing; useful for tests and hook-free views.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl PatchObserver for NoopObserver {}

/// Everything a patch needs beyond the document itself.
pub struct PatchContext<'a> {
    pub config: &'a DomConfig,
    /// Elements with an outstanding ref; skipped entirely.
    pub locked: &'a HashSet<NodeId>,
    /// Runtime-wide ignore-attribute rules, combined with each element's
    /// own marker.
    pub ignore: &'a AttrFilter,
    pub observer: &'a mut dyn PatchObserver,
}

/// What happened during a patch, for the runtime to act on afterwards.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Newly created behavior-tagged elements, in document order.
    pub created_hooks: Vec<NodeId>,
    /// Behavior-tagged elements that were mutated.
    pub updated_hooks: Vec<NodeId>,
    /// Behavior-tagged elements removed from the document (already gone).
    pub removed_hooks: Vec<NodeId>,
    /// New child-view boundary elements to mount asynchronously.
    pub mounted_views: Vec<NodeId>,
    /// Ids of child views whose boundary elements were discarded.
    pub removed_views: Vec<String>,
    /// Locked elements whose incoming markup was withheld, with the markup
    /// to replay on unlock.
    pub deferred: Vec<(NodeId, String)>,
    /// Every node removed from the document, leaves first (so owners can
    /// cancel timers and drop stale handles).
    pub removed_nodes: Vec<NodeId>,
}

/// Patch `root`'s content to match `markup`.
pub fn patch(
    doc: &mut Document,
    root: NodeId,
    markup: &str,
    ctx: &mut PatchContext<'_>,
) -> PatchResult<PatchReport> {
    if !doc.contains(root) {
        return Err(PatchError::DetachedNode { node: root });
    }
    if !doc.is_element(root) {
        return Err(PatchError::NotAnElement { node: root });
    }

    let parsed = parse_fragment(markup)?;
    let mut report = PatchReport::default();
    update_children(doc, root, &parsed, ctx, &mut report);
    debug!(
        created = report.created_hooks.len(),
        removed = report.removed_hooks.len(),
        deferred = report.deferred.len(),
        "patch applied"
    );
    Ok(report)
}

/// Re-apply markup buffered for one element while it was locked. The markup
/// is the element's outer markup as it arrived; the element updates in
/// place.
pub fn patch_node(
    doc: &mut Document,
    node: NodeId,
    markup: &str,
    ctx: &mut PatchContext<'_>,
) -> PatchResult<PatchReport> {
    if !doc.contains(node) {
        return Err(PatchError::DetachedNode { node });
    }
    let parsed = parse_fragment(markup)?;
    let mut report = PatchReport::default();
    for new_node in &parsed {
        if new_node.is_element() {
            update_element(doc, node, new_node, ctx, &mut report);
            return Ok(report);
        }
    }
    Ok(report)
}

fn update_children(
    doc: &mut Document,
    parent: NodeId,
    new_children: &[ParsedNode],
    ctx: &mut PatchContext<'_>,
    report: &mut PatchReport,
) -> bool {
    let strategy = doc
        .attr(parent, &ctx.config.update_attr)
        .and_then(UpdateStrategy::from_marker)
        .unwrap_or_default();

    match strategy {
        UpdateStrategy::Ignore => {
            // The subtree mounted once and is client-owned from then on.
            trace!(?parent, "skipping ignored container");
            false
        }
        UpdateStrategy::Append => update_edge_container(doc, parent, new_children, ctx, report, false),
        UpdateStrategy::Prepend => update_edge_container(doc, parent, new_children, ctx, report, true),
        UpdateStrategy::Replace => update_children_replace(doc, parent, new_children, ctx, report),
    }
}

/// Full reconciliation (the `replace` strategy).
fn update_children_replace(
    doc: &mut Document,
    parent: NodeId,
    new_children: &[ParsedNode],
    ctx: &mut PatchContext<'_>,
    report: &mut PatchReport,
) -> bool {
    let old: Vec<NodeId> = doc.children(parent).to_vec();
    let mut by_ident: HashMap<String, NodeId> = HashMap::new();
    for child in &old {
        if let Some(ident) = element_identity(doc, *child, ctx.config) {
            by_ident.entry(ident).or_insert(*child);
        }
    }

    let mut claimed: HashSet<NodeId> = HashSet::new();
    let mut result: Vec<NodeId> = Vec::with_capacity(new_children.len());
    let mut cursor = 0usize;
    let mut changed = false;

    for new_node in new_children {
        // Positional fallback candidate: the next unclaimed old node.
        let positional = old[cursor..]
            .iter()
            .copied()
            .find(|child| !claimed.contains(child));

        match new_node {
            ParsedNode::Text(text) => match positional {
                Some(candidate) if matches!(doc.node(candidate), Some(Node::Text(_))) => {
                    if doc.text(candidate) != Some(text.as_str()) {
                        doc.set_text(candidate, text.clone());
                        changed = true;
                    }
                    claimed.insert(candidate);
                    advance_cursor(&old, &claimed, &mut cursor);
                    result.push(candidate);
                }
                _ => {
                    result.push(doc.create_text(text.clone()));
                    changed = true;
                }
            },
            ParsedNode::Element { .. } => {
                let ident = parsed_identity(new_node, ctx.config);
                let mut candidate = ident
                    .as_ref()
                    .and_then(|ident| by_ident.get(ident))
                    .copied()
                    .filter(|candidate| !claimed.contains(candidate))
                    // Same identity but a different tag is a replacement,
                    // unless the element holds focus (never destroyed).
                    .filter(|candidate| {
                        doc.focused() == Some(*candidate) || doc.tag(*candidate) == new_node.tag()
                    });

                if candidate.is_none() {
                    candidate = positional.filter(|node| compatible(doc, *node, new_node, ctx.config));
                }

                match candidate {
                    Some(existing) => {
                        claimed.insert(existing);
                        advance_cursor(&old, &claimed, &mut cursor);
                        changed |= update_element(doc, existing, new_node, ctx, report);
                        result.push(existing);
                    }
                    None => {
                        result.push(create_from_parsed(doc, new_node, ctx, report));
                        changed = true;
                    }
                }
            }
        }
    }

    for child in &old {
        if !claimed.contains(child) {
            remove_with_report(doc, *child, ctx, report);
            changed = true;
        }
    }

    if doc.children(parent) != result.as_slice() {
        changed = true;
    }
    doc.set_children(parent, result);
    changed
}

/// `append`/`prepend`: existing keyed children update in place and are
/// never removed or reordered; only newly introduced keys are placed, after
/// (or before) the existing ones, keeping their markup order.
fn update_edge_container(
    doc: &mut Document,
    parent: NodeId,
    new_children: &[ParsedNode],
    ctx: &mut PatchContext<'_>,
    report: &mut PatchReport,
    prepend: bool,
) -> bool {
    let old: Vec<NodeId> = doc.children(parent).to_vec();
    let mut by_key: HashMap<String, NodeId> = HashMap::new();
    for child in &old {
        if let Some(key) = doc.attr(*child, &ctx.config.key_attr) {
            by_key.entry(key.to_string()).or_insert(*child);
        }
    }

    let mut fresh: Vec<NodeId> = Vec::new();
    let mut changed = false;

    for new_node in new_children {
        let Some(key) = new_node.attr(&ctx.config.key_attr) else {
            continue;
        };
        match by_key.get(key) {
            Some(existing) => {
                changed |= update_element(doc, *existing, new_node, ctx, report);
            }
            None => {
                fresh.push(create_from_parsed(doc, new_node, ctx, report));
                changed = true;
            }
        }
    }

    if !fresh.is_empty() {
        let mut next = Vec::with_capacity(old.len() + fresh.len());
        if prepend {
            next.extend(fresh);
            next.extend(old);
        } else {
            next.extend(old);
            next.extend(fresh);
        }
        doc.set_children(parent, next);
    }
    changed
}

/// Update one matched element pair in place.
fn update_element(
    doc: &mut Document,
    existing: NodeId,
    new_node: &ParsedNode,
    ctx: &mut PatchContext<'_>,
    report: &mut PatchReport,
) -> bool {
    // Child-view boundaries belong to their own view's patcher.
    if new_node.attr(&ctx.config.view_attr).is_some()
        || doc.attr(existing, &ctx.config.view_attr).is_some()
    {
        trace!(?existing, "leaving child-view boundary untouched");
        return false;
    }

    // Locked: withhold the whole incoming subtree for replay on unlock.
    if ctx.locked.contains(&existing) {
        report.deferred.push((existing, new_node.to_markup()));
        return false;
    }

    let hooked = doc.attr(existing, &ctx.config.hook_attr).is_some();
    if hooked {
        ctx.observer.before_update(&*doc, existing);
    }

    let mut changed = update_attributes(doc, existing, new_node, ctx);
    changed |= update_children(doc, existing, new_node.children(), ctx, report);

    if hooked && changed {
        report.updated_hooks.push(existing);
    }
    changed
}

fn update_attributes(
    doc: &mut Document,
    existing: NodeId,
    new_node: &ParsedNode,
    ctx: &PatchContext<'_>,
) -> bool {
    let ParsedNode::Element { attrs: new_attrs, .. } = new_node else {
        return false;
    };

    // Per-element ignore rules come from either side's marker; an element
    // that just gained the marker keeps its client state from this patch
    // on.
    let mut element_filter = AttrFilter::new();
    for source in [
        doc.attr(existing, &ctx.config.ignore_attrs_attr),
        new_node.attr(&ctx.config.ignore_attrs_attr),
    ]
    .into_iter()
    .flatten()
    {
        for pattern in source.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            element_filter.add(pattern);
        }
    }
    let ignored = |name: &str| ctx.ignore.matches(name) || element_filter.matches(name);

    // The focused element keeps its in-flight form state.
    let focused = doc.focused() == Some(existing);
    let preserved = |name: &str| focused && (name == "value" || name == "checked");

    let mut changed = false;
    for (name, value) in new_attrs {
        if ignored(name) || preserved(name) {
            continue;
        }
        if doc.attr(existing, name) != Some(value.as_str()) {
            doc.set_attr(existing, name.clone(), value.clone());
            changed = true;
        }
    }

    let stale: Vec<String> = doc
        .element(existing)
        .map(|element| {
            element
                .attrs()
                .iter()
                .map(|(name, _)| name.clone())
                .filter(|name| {
                    !ignored(name)
                        && !preserved(name)
                        && !new_attrs.iter().any(|(new_name, _)| new_name == name)
                })
                .collect()
        })
        .unwrap_or_default();
    for name in stale {
        doc.remove_attr(existing, &name);
        changed = true;
    }
    changed
}

/// Build a new subtree from parsed markup. Child-view boundaries are
/// created shallow — their content arrives through the child's own join.
fn create_from_parsed(
    doc: &mut Document,
    new_node: &ParsedNode,
    ctx: &mut PatchContext<'_>,
    report: &mut PatchReport,
) -> NodeId {
    match new_node {
        ParsedNode::Text(text) => doc.create_text(text.clone()),
        ParsedNode::Element { tag, attrs, children } => {
            let node = doc.create_element(tag.clone());
            for (name, value) in attrs {
                doc.set_attr(node, name.clone(), value.clone());
            }
            if new_node.attr(&ctx.config.view_attr).is_some() {
                report.mounted_views.push(node);
                return node;
            }
            if new_node.attr(&ctx.config.hook_attr).is_some() {
                report.created_hooks.push(node);
            }
            for child in children {
                let built = create_from_parsed(doc, child, ctx, report);
                doc.append_child(node, built);
            }
            node
        }
    }
}

/// Remove an old subtree, reporting discarded hooks and child views first.
fn remove_with_report(
    doc: &mut Document,
    node: NodeId,
    ctx: &mut PatchContext<'_>,
    report: &mut PatchReport,
) {
    let mut hooked = Vec::new();
    collect_markers(doc, node, ctx.config, &mut hooked, &mut report.removed_views);
    for hook in &hooked {
        ctx.observer.discarded(&*doc, *hook);
    }
    report.removed_hooks.extend(hooked);
    report.removed_nodes.extend(doc.remove_subtree(node));
}

fn collect_markers(
    doc: &Document,
    node: NodeId,
    config: &DomConfig,
    hooked: &mut Vec<NodeId>,
    views: &mut Vec<String>,
) {
    if let Some(view) = doc.attr(node, &config.view_attr) {
        views.push(view.to_string());
    }
    if doc.attr(node, &config.hook_attr).is_some() {
        hooked.push(node);
    }
    for child in doc.children(node).to_vec() {
        collect_markers(doc, child, config, hooked, views);
    }
}

fn element_identity(doc: &Document, node: NodeId, config: &DomConfig) -> Option<String> {
    if let Some(id) = doc.attr(node, &config.id_attr) {
        return Some(format!("#{}", id));
    }
    doc.attr(node, &config.key_attr).map(|key| format!("@{}", key))
}

fn parsed_identity(node: &ParsedNode, config: &DomConfig) -> Option<String> {
    if let Some(id) = node.attr(&config.id_attr) {
        return Some(format!("#{}", id));
    }
    node.attr(&config.key_attr).map(|key| format!("@{}", key))
}

/// Can `existing` be updated in place into `new_node`? Tag and identity
/// must agree — except for the focused element, which is never destroyed:
/// it always pairs with the incoming node at its position.
fn compatible(doc: &Document, existing: NodeId, new_node: &ParsedNode, config: &DomConfig) -> bool {
    if doc.focused() == Some(existing) {
        return true;
    }
    let Some(old_tag) = doc.tag(existing) else {
        return false;
    };
    if Some(old_tag) != new_node.tag() {
        return false;
    }
    match (element_identity(doc, existing, config), parsed_identity(new_node, config)) {
        (Some(old_ident), Some(new_ident)) => old_ident == new_ident,
        (Some(_), None) | (None, Some(_)) => false,
        (None, None) => true,
    }
}

fn advance_cursor(old: &[NodeId], claimed: &HashSet<NodeId>, cursor: &mut usize) {
    while *cursor < old.len() && claimed.contains(&old[*cursor]) {
        *cursor += 1;
    }
}
