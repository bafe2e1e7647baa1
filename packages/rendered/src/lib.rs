//! # Veneer Rendered
//!
//! The rendered-tree diff/merge model: reconstructs a full render tree from
//! partial diffs sent by the remote rendering process.
//!
//! A render tree separates *static* markup fragments from *dynamic* slot
//! values. Diffs only carry the slots that changed, plus optional
//! wholesale-replacement statics, a component table with structural-sharing
//! links, and keyed list entries addressed by stable key rather than
//! position.
//!
//! ## Purity contract
//!
//! `Rendered::merge` never mutates its receiver observably: it returns a new
//! `Rendered`. Malformed diffs produce a structured [`MergeError`] naming the
//! offending path; merging never silently coerces mismatched slot types.

pub mod diff;
pub mod error;
pub mod markup;
pub mod merge;
pub mod tree;

#[cfg(test)]
mod tests_components;


#[cfg(test)]
mod tests_merge;

pub use diff::{EntryStatics, KeyedDiff, KeyedEntryDiff, RootDiff, SlotDiff, StaticsDiff, TreeDiff};
pub use error::{DiffPath, MergeError, MergeResult, PathSegment};
pub use merge::merge_component_table;
pub use tree::{ComponentId, ComponentTable, KeyedList, RenderNode, Rendered, Slot, TreeNode};
