//! Merging partial diffs into a canonical render tree.
//!
//! Merge rules:
//! - a diff carrying replacement statics rebuilds that subtree wholesale;
//!   prior dynamics at the node are discarded, never blended,
//! - without replacement statics, slots merge recursively; a leaf/tree type
//!   change without replacement statics is a structural error,
//! - keyed entries merge by key (additive); removal and reordering happen
//!   only through the diff's explicit retain list,
//! - component links resolve in a second pass after all literal statics
//!   have been merged, positive ids against the current diff, negative ids
//!   against the previously persisted table.

use crate::diff::{EntryStatics, KeyedDiff, KeyedEntryDiff, RootDiff, SlotDiff, StaticsDiff, TreeDiff};
use crate::error::{DiffPath, MergeError, MergeResult, PathSegment};
use crate::tree::{ComponentId, ComponentTable, KeyedList, RenderNode, Rendered, Slot, TreeNode};
use indexmap::IndexMap;
use tracing::{debug, warn};

impl Rendered {
    /// Merge a decoded diff into this render state, returning the new state.
    ///
    /// Pure with respect to `self`: the receiver is never observably
    /// mutated, even when the merge fails partway.
    pub fn merge(&self, diff: &RootDiff) -> MergeResult<Rendered> {
        let components = merge_component_table(&self.components, &diff.components)?;
        let mut path = DiffPath::root();
        let tree = merge_tree(&self.tree, &diff.tree, &mut path)?;
        debug!(components = components.len(), "merged diff");
        Ok(Rendered { tree, components })
    }
}

fn merge_tree(existing: &TreeNode, diff: &TreeDiff, path: &mut DiffPath) -> MergeResult<TreeNode> {
    match &diff.statics {
        Some(StaticsDiff::Literal(statics)) => rebuild_tree(statics, diff, path),
        Some(StaticsDiff::Link(id)) => {
            // Links are rejected at decode time outside the component table;
            // reaching one here means the table pass failed to strip it.
            Err(MergeError::DanglingLink {
                id: *id,
                path: path.capture(),
            })
        }
        None => {
            let mut next = existing.clone();
            if let Some(kdiff) = &diff.keyed {
                next.keyed = Some(merge_keyed(existing.keyed.as_ref(), kdiff, path)?);
            }
            for (index, slot_diff) in &diff.dynamics {
                path.push(PathSegment::Slot(*index));
                let merged = merge_slot(next.dynamics.get(index), slot_diff, path)?;
                path.pop();
                next.dynamics.insert(*index, merged);
            }
            Ok(next)
        }
    }
}

/// Wholesale replacement: the new statics invalidate every prior dynamic
/// value at this node, so only the diff's own slots populate the result.
fn rebuild_tree(statics: &[String], diff: &TreeDiff, path: &mut DiffPath) -> MergeResult<TreeNode> {
    let mut next = TreeNode::new(statics.to_vec());
    if let Some(kdiff) = &diff.keyed {
        next.keyed = Some(merge_keyed(None, kdiff, path)?);
    }
    for (index, slot_diff) in &diff.dynamics {
        path.push(PathSegment::Slot(*index));
        let merged = merge_slot(None, slot_diff, path)?;
        path.pop();
        next.dynamics.insert(*index, merged);
    }
    Ok(next)
}

fn merge_slot(existing: Option<&Slot>, diff: &SlotDiff, path: &mut DiffPath) -> MergeResult<Slot> {
    match diff {
        SlotDiff::Leaf(text) => Ok(Slot::Node(RenderNode::Leaf(text.clone()))),
        SlotDiff::Component(id) => Ok(Slot::Component(*id)),
        SlotDiff::Tree(tree_diff) => {
            if tree_diff.statics.is_some() {
                return Ok(Slot::Node(RenderNode::Tree(merge_tree(
                    &TreeNode::default(),
                    tree_diff,
                    path,
                )?)));
            }
            match existing {
                Some(Slot::Node(RenderNode::Tree(tree))) => Ok(Slot::Node(RenderNode::Tree(
                    merge_tree(tree, tree_diff, path)?,
                ))),
                _ => Err(MergeError::SlotTypeMismatch {
                    path: path.capture(),
                }),
            }
        }
    }
}

fn merge_keyed(
    existing: Option<&KeyedList>,
    diff: &KeyedDiff,
    path: &mut DiffPath,
) -> MergeResult<KeyedList> {
    let mut next = existing.cloned().unwrap_or_default();

    for (key, entry_diff) in &diff.entries {
        path.push(PathSegment::Key(key.clone()));
        let merged = match next.entries.get(key) {
            None => adopt_entry(entry_diff, diff, path)?,
            Some(entry) => {
                if entry_diff.statics.is_some() {
                    adopt_entry(entry_diff, diff, path)?
                } else {
                    merge_entry_dynamics(entry, entry_diff, path)?
                }
            }
        };
        path.pop();
        next.entries.insert(key.clone(), merged);
    }

    if let Some(retain) = &diff.retain {
        let mut reordered = IndexMap::with_capacity(retain.len());
        for key in retain {
            let entry = next.entries.get(key).cloned().ok_or_else(|| {
                MergeError::malformed(path, format!("retain references unknown key {:?}", key))
            })?;
            reordered.insert(key.clone(), entry);
        }
        next.entries = reordered;
    }

    if let Some(count) = diff.count {
        if count != next.entries.len() {
            warn!(
                expected = count,
                actual = next.entries.len(),
                "keyed entry count does not match merged list"
            );
        }
    }
    Ok(next)
}

/// Build an entry from the diff alone. Template references materialize
/// eagerly: the stored entry always carries literal statics, so later diffs
/// and reconnect replays never depend on template indices.
fn adopt_entry(
    entry_diff: &KeyedEntryDiff,
    keyed: &KeyedDiff,
    path: &mut DiffPath,
) -> MergeResult<TreeNode> {
    let statics = match &entry_diff.statics {
        Some(EntryStatics::Literal(statics)) => statics.clone(),
        Some(EntryStatics::Template(tid)) => keyed
            .templates
            .get(tid)
            .cloned()
            .ok_or_else(|| MergeError::malformed(path, format!("unknown template {}", tid)))?,
        None => {
            return Err(MergeError::malformed(
                path,
                "new keyed entry carries no statics",
            ));
        }
    };

    let mut node = TreeNode::new(statics);
    for (index, slot_diff) in &entry_diff.dynamics {
        path.push(PathSegment::Slot(*index));
        let merged = merge_slot(None, slot_diff, path)?;
        path.pop();
        node.dynamics.insert(*index, merged);
    }
    Ok(node)
}

fn merge_entry_dynamics(
    entry: &TreeNode,
    entry_diff: &KeyedEntryDiff,
    path: &mut DiffPath,
) -> MergeResult<TreeNode> {
    let mut next = entry.clone();
    for (index, slot_diff) in &entry_diff.dynamics {
        path.push(PathSegment::Slot(*index));
        let merged = merge_slot(next.dynamics.get(index), slot_diff, path)?;
        path.pop();
        next.dynamics.insert(*index, merged);
    }
    Ok(next)
}

/// Merge a diff's component table into `base`.
///
/// Two passes: literal-statics components merge first, then link-carrying
/// components resolve by signed integer lookup — positive against the
/// current diff's (already merged) components, negative against the
/// previously persisted table. The result never contains an unresolved
/// link.
pub fn merge_component_table(
    base: &ComponentTable,
    diffs: &IndexMap<i32, TreeDiff>,
) -> MergeResult<ComponentTable> {
    let mut next = base.clone();
    let mut path = DiffPath::root();

    // Pass 1: literal statics (and partial updates to known components).
    for (id, cdiff) in diffs {
        if matches!(cdiff.statics, Some(StaticsDiff::Link(_))) {
            continue;
        }
        path.push(PathSegment::Component(*id));
        let merged = match base.get(ComponentId(*id)) {
            Some(existing) => merge_tree(existing, cdiff, &mut path)?,
            None => {
                if cdiff.statics.is_none() {
                    return Err(MergeError::UnknownComponent {
                        id: *id,
                        path: path.capture(),
                    });
                }
                merge_tree(&TreeNode::default(), cdiff, &mut path)?
            }
        };
        path.pop();
        next.insert(ComponentId(*id), merged);
    }

    // Pass 2: resolve links.
    for (id, cdiff) in diffs {
        if matches!(cdiff.statics, Some(StaticsDiff::Link(_))) {
            let mut stack = Vec::new();
            resolve_link(&mut next, base, diffs, *id, &mut stack, &mut path)?;
        }
    }
    Ok(next)
}

/// Resolve the link chain for component `id`, inserting the fully resolved
/// node into `next`. `stack` holds the ids currently being resolved so a
/// cycle inside one diff is reported rather than recursed into.
fn resolve_link(
    next: &mut ComponentTable,
    base: &ComponentTable,
    diffs: &IndexMap<i32, TreeDiff>,
    id: i32,
    stack: &mut Vec<i32>,
    path: &mut DiffPath,
) -> MergeResult<TreeNode> {
    let cdiff = diffs.get(&id).ok_or(MergeError::UnknownComponent {
        id,
        path: path.capture(),
    })?;
    let target = match cdiff.statics {
        Some(StaticsDiff::Link(target)) => target,
        // Already handled in pass 1; its resolved node is in `next`.
        _ => {
            return next.get(ComponentId(id)).cloned().ok_or(MergeError::DanglingLink {
                id,
                path: path.capture(),
            });
        }
    };

    if target == id {
        return Err(MergeError::SelfLink { id });
    }
    if stack.contains(&id) {
        return Err(MergeError::malformed(
            path,
            format!("component link cycle through {}", id),
        ));
    }
    stack.push(id);

    path.push(PathSegment::Component(id));
    let source = if target < 0 {
        // Negative: the previously persisted table.
        base.get(ComponentId(-target)).cloned().ok_or(MergeError::DanglingLink {
            id: target,
            path: path.capture(),
        })?
    } else if let Some(resolved) = next.get(ComponentId(target)) {
        resolved.clone()
    } else {
        // Positive link to a component that is itself still a link.
        resolve_link(next, base, diffs, target, stack, path)?
    };

    // The source provides the template; the link's own dynamics overlay it.
    let overlay = TreeDiff {
        statics: None,
        dynamics: cdiff.dynamics.clone(),
        keyed: cdiff.keyed.clone(),
    };
    let resolved = merge_tree(&source, &overlay, path)?;
    path.pop();
    stack.pop();

    next.insert(ComponentId(id), resolved.clone());
    Ok(resolved)
}
