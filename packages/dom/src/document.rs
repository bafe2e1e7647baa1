//! Headless document arena.
//!
//! Nodes live in slot storage addressed by [`NodeId`]; ids are never reused,
//! so a stale handle to a removed node simply resolves to nothing instead of
//! aliasing a newer node. The document also owns the interaction state the
//! reconciler must preserve: which element holds focus and the current
//! selection range.

use std::fmt::Write as _;

/// Handle to a node in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementData {
    pub tag: String,
    attrs: Vec<(String, String)>,
    pub children: Vec<NodeId>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }
}

#[derive(Debug)]
struct Slot {
    node: Node,
    parent: Option<NodeId>,
}

/// The document: an arena of nodes plus focus/selection state.
#[derive(Debug)]
pub struct Document {
    slots: Vec<Option<Slot>>,
    root: NodeId,
    focus: Option<NodeId>,
    selection: Option<(u32, u32)>,
}

impl Document {
    /// Create a document with an empty `body` root element.
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            root: NodeId(0),
            focus: None,
            selection: None,
        };
        doc.root = doc.create_element("body");
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(Slot { node, parent: None }));
        id
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(Node::Element(ElementData {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(Node::Text(text.into()))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.get(id.index()).is_some_and(Option::is_some)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index())?.as_ref().map(|slot| &slot.node)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.node(id)? {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.slots.get_mut(id.index())?.as_mut()? {
            Slot {
                node: Node::Element(element),
                ..
            } => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id), Some(Node::Element(_)))
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        if let Some(element) = self.element_mut(id) {
            match element.attrs.iter_mut().find(|(attr, _)| *attr == name) {
                Some(entry) => entry.1 = value,
                None => element.attrs.push((name, value)),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.attrs.retain(|(attr, _)| attr != name);
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.node(id)? {
            Node::Text(text) => Some(text.as_str()),
            Node::Element(_) => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(Slot {
            node: Node::Text(current),
            ..
        }) = self.slots.get_mut(id.index()).and_then(Option::as_mut)
        {
            *current = text.into();
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.index())?.as_ref()?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(|element| element.children.as_slice()).unwrap_or(&[])
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let Some(element) = self.element_mut(parent) else {
            return;
        };
        element.children.push(child);
        if let Some(slot) = self.slots.get_mut(child.index()).and_then(Option::as_mut) {
            slot.parent = Some(parent);
        }
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let Some(element) = self.element_mut(parent) else {
            return;
        };
        let index = index.min(element.children.len());
        element.children.insert(index, child);
        if let Some(slot) = self.slots.get_mut(child.index()).and_then(Option::as_mut) {
            slot.parent = Some(parent);
        }
    }

    /// Replace a parent's child list wholesale. Every id must already be a
    /// child of `parent` or detached; used by the reconciler to reorder
    /// while reusing nodes.
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        for child in &children {
            if let Some(slot) = self.slots.get_mut(child.index()).and_then(Option::as_mut) {
                slot.parent = Some(parent);
            }
        }
        if let Some(element) = self.element_mut(parent) {
            element.children = children;
        }
    }

    /// Unlink a node from its parent without freeing it.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(element) = self.element_mut(parent) {
            element.children.retain(|child| *child != id);
        }
        if let Some(slot) = self.slots.get_mut(id.index()).and_then(Option::as_mut) {
            slot.parent = None;
        }
    }

    /// Remove a node and its whole subtree from the arena. Returns every
    /// removed id, leaves first, so callers can run teardown hooks in
    /// child-before-parent order. Focus inside the removed subtree is
    /// dropped.
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        self.detach(id);
        let mut removed = Vec::new();
        self.collect_subtree(id, &mut removed);
        for node in &removed {
            if self.focus == Some(*node) {
                self.focus = None;
                self.selection = None;
            }
            if let Some(slot) = self.slots.get_mut(node.index()) {
                *slot = None;
            }
        }
        removed
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(id).to_vec() {
            self.collect_subtree(child, out);
        }
        out.push(id);
    }

    /// All element descendants of `id` in document order, not including
    /// `id` itself.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                out.push(node);
                stack.extend(self.children(node).iter().rev().copied());
            }
        }
        out
    }

    /// Depth-first search for an element with the given attribute value.
    pub fn find_by_attr(&self, from: NodeId, name: &str, value: &str) -> Option<NodeId> {
        if self.attr(from, name) == Some(value) {
            return Some(from);
        }
        for child in self.children(from) {
            if let Some(found) = self.find_by_attr(*child, name, value) {
                return Some(found);
            }
        }
        None
    }

    // Focus and selection.

    pub fn set_focus(&mut self, id: Option<NodeId>) {
        self.focus = id.filter(|id| self.contains(*id));
        if self.focus.is_none() {
            self.selection = None;
        }
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focus
    }

    pub fn set_selection(&mut self, range: Option<(u32, u32)>) {
        self.selection = range;
    }

    pub fn selection(&self) -> Option<(u32, u32)> {
        self.selection
    }

    // Class-list helpers over the `class` attribute.

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let classes = match self.attr(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", classes);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(existing) = self.attr(id, "class") else {
            return;
        };
        let classes: Vec<&str> = existing
            .split_whitespace()
            .filter(|c| *c != class)
            .collect();
        if classes.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", classes.join(" "));
        }
    }

    /// Serialize a subtree to markup.
    pub fn to_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.node(id) {
            Some(Node::Text(text)) => out.push_str(&escape_text(text)),
            Some(Node::Element(element)) => {
                let _ = write!(out, "<{}", element.tag);
                for (name, value) in &element.attrs {
                    let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
                }
                out.push('>');
                if is_void_element(&element.tag) {
                    return;
                }
                for child in &element.children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{}>", element.tag);
            }
            None => {}
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Elements that never carry children or a closing tag.
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
