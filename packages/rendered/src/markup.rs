//! Serializing a render tree to flat markup.
//!
//! Depth-first concatenation: statics interleaved with recursively
//! stringified slot values. Keyed entries render in stored insertion order
//! between the container's outer statics. Component slots render the
//! component's resolved tree from the table, with a visit stack guarding
//! against reference cycles.

use crate::error::{DiffPath, MergeError, MergeResult, PathSegment};
use crate::tree::{ComponentId, ComponentTable, RenderNode, Rendered, Slot, TreeNode};

impl Rendered {
    /// Serialize the whole render state to markup.
    pub fn to_markup(&self) -> MergeResult<String> {
        let mut out = String::new();
        self.write_markup(&mut out)?;
        Ok(out)
    }

    /// Serialize into an existing buffer.
    pub fn write_markup(&self, out: &mut String) -> MergeResult<()> {
        let mut path = DiffPath::root();
        let mut visiting = Vec::new();
        write_tree(&self.tree, &self.components, out, &mut path, &mut visiting)
    }

    /// Stable digest of the static structure of the tree, sent with
    /// re-join requests so the server can skip resending unchanged
    /// statics.
    pub fn fingerprint(&self) -> String {
        let mut hash = Fnv::new();
        hash_tree(&self.tree, &mut hash);
        for (id, component) in self.components.iter() {
            hash.write_u64(id.0 as u64);
            hash_tree(component, &mut hash);
        }
        format!("{:016x}", hash.finish())
    }
}

fn write_tree(
    node: &TreeNode,
    components: &ComponentTable,
    out: &mut String,
    path: &mut DiffPath,
    visiting: &mut Vec<ComponentId>,
) -> MergeResult<()> {
    if let Some(keyed) = &node.keyed {
        let mut statics = node.statics.iter();
        if let Some(prefix) = statics.next() {
            out.push_str(prefix);
        }
        for (key, entry) in &keyed.entries {
            path.push(PathSegment::Key(key.clone()));
            write_tree(entry, components, out, path, visiting)?;
            path.pop();
        }
        for suffix in statics {
            out.push_str(suffix);
        }
        return Ok(());
    }

    let slots = node.slot_count();
    for (index, fragment) in node.statics.iter().enumerate() {
        out.push_str(fragment);
        if index < slots {
            let slot = node.dynamics.get(&index).ok_or(MergeError::MissingSlot {
                path: path.capture(),
                index,
            })?;
            path.push(PathSegment::Slot(index));
            write_slot(slot, components, out, path, visiting)?;
            path.pop();
        }
    }
    Ok(())
}

fn write_slot(
    slot: &Slot,
    components: &ComponentTable,
    out: &mut String,
    path: &mut DiffPath,
    visiting: &mut Vec<ComponentId>,
) -> MergeResult<()> {
    match slot {
        Slot::Node(RenderNode::Leaf(text)) => {
            out.push_str(text);
            Ok(())
        }
        Slot::Node(RenderNode::Tree(tree)) => write_tree(tree, components, out, path, visiting),
        Slot::Component(id) => {
            if visiting.contains(id) {
                return Err(MergeError::ComponentCycle { id: id.0 });
            }
            let component = components.get(*id).ok_or(MergeError::UnknownComponent {
                id: id.0,
                path: path.capture(),
            })?;
            visiting.push(*id);
            path.push(PathSegment::Component(id.0));
            let result = write_tree(component, components, out, path, visiting);
            path.pop();
            visiting.pop();
            result
        }
    }
}

fn hash_tree(node: &TreeNode, hash: &mut Fnv) {
    hash.write_u64(node.statics.len() as u64);
    for fragment in &node.statics {
        hash.write_bytes(fragment.as_bytes());
    }
    if let Some(keyed) = &node.keyed {
        hash.write_u64(keyed.entries.len() as u64);
        for entry in keyed.entries.values() {
            hash_tree(entry, hash);
        }
    }
    for (index, slot) in &node.dynamics {
        if let Slot::Node(RenderNode::Tree(tree)) = slot {
            hash.write_u64(*index as u64);
            hash_tree(tree, hash);
        }
    }
}

/// FNV-1a, enough for a structural fingerprint; not a content hash.
struct Fnv(u64);

impl Fnv {
    fn new() -> Self {
        Fnv(0xcbf2_9ce4_8422_2325)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    fn finish(&self) -> u64 {
        self.0
    }
}
