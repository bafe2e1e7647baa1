//! Canonical render tree types.
//!
//! A [`TreeNode`] interleaves static markup fragments with dynamic slot
//! values: a node with `n + 1` statics has `n` slots, rendered as
//! `statics[0] slot0 statics[1] slot1 ... statics[n]`. Keyed lists replace
//! positional slots for list-like containers; their two statics wrap the
//! concatenated entries.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identifier of a component in the component table. Always positive once
/// stored; signed values only appear transiently in diff links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub i32);

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value occupying one dynamic slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slot {
    /// Fully rendered node (leaf string or nested tree).
    Node(RenderNode),
    /// Reference into the component table.
    Component(ComponentId),
}

/// A node of the render tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderNode {
    /// Plain rendered string.
    Leaf(String),
    /// Static/dynamic tree.
    Tree(TreeNode),
}

impl RenderNode {
    pub fn leaf(value: impl Into<String>) -> Self {
        RenderNode::Leaf(value.into())
    }

    pub fn as_tree(&self) -> Option<&TreeNode> {
        match self {
            RenderNode::Tree(tree) => Some(tree),
            RenderNode::Leaf(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub statics: Vec<String>,
    pub dynamics: IndexMap<usize, Slot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyed: Option<KeyedList>,
}

impl TreeNode {
    pub fn new(statics: Vec<String>) -> Self {
        Self {
            statics,
            dynamics: IndexMap::new(),
            keyed: None,
        }
    }

    pub fn with_slot(mut self, index: usize, slot: Slot) -> Self {
        self.dynamics.insert(index, slot);
        self
    }

    pub fn with_leaf(self, index: usize, value: impl Into<String>) -> Self {
        self.with_slot(index, Slot::Node(RenderNode::Leaf(value.into())))
    }

    pub fn with_nested(self, index: usize, nested: TreeNode) -> Self {
        self.with_slot(index, Slot::Node(RenderNode::Tree(nested)))
    }

    pub fn with_keyed(mut self, keyed: KeyedList) -> Self {
        self.keyed = Some(keyed);
        self
    }

    /// Number of dynamic slots this node's statics imply.
    pub fn slot_count(&self) -> usize {
        self.statics.len().saturating_sub(1)
    }
}

/// Ordered keyed entries of a list-like container. Iteration order is the
/// logical list order; callers that reorder must rebuild the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyedList {
    pub entries: IndexMap<String, TreeNode>,
}

impl KeyedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: impl Into<String>, entry: TreeNode) -> Self {
        self.entries.insert(key.into(), entry);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Component arena, indexed by positive integer id.
///
/// After a merge completes, every component holds a literal statics array:
/// link resolution never leaves an unresolved reference behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentTable {
    components: IndexMap<i32, TreeNode>,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ComponentId) -> Option<&TreeNode> {
        self.components.get(&id.0)
    }

    pub fn insert(&mut self, id: ComponentId, node: TreeNode) {
        self.components.insert(id.0, node);
    }

    pub fn remove(&mut self, id: ComponentId) -> Option<TreeNode> {
        self.components.shift_remove(&id.0)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id.0)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &TreeNode)> {
        self.components.iter().map(|(id, node)| (ComponentId(*id), node))
    }
}

/// The full merged render state of one view: its tree plus the component
/// table the tree's slots reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendered {
    pub tree: TreeNode,
    pub components: ComponentTable,
}

impl Rendered {
    pub fn new(tree: TreeNode) -> Self {
        Self {
            tree,
            components: ComponentTable::new(),
        }
    }
}
