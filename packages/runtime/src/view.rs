//! Per-view state.

use crate::hooks::BoundHook;
use crate::protocol::ViewId;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use veneer_dom::NodeId;
use veneer_rendered::Rendered;

/// Connection lifecycle of one view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewState {
    #[default]
    Disconnected,
    Joining,
    Joined,
    /// A malformed diff or failed patch; recoverable by re-joining.
    Errored,
}

/// One logical view: a render state, a DOM subtree and the hooks bound
/// inside it. Owned exclusively by the runtime's state machine.
pub struct View {
    pub id: ViewId,
    pub parent: Option<ViewId>,
    pub children: IndexSet<ViewId>,
    pub root: NodeId,
    pub rendered: Rendered,
    pub state: ViewState,
    /// Incremented on every successful (re)join; scopes one-shot recovery
    /// work so it runs once per reconnect, not once per render.
    pub join_count: u64,
    pub(crate) hooks: HashMap<NodeId, BoundHook>,
    /// Hooks that observed `disconnected` and still await the symmetric
    /// `reconnected`.
    pub(crate) disconnected_hooks: HashSet<NodeId>,
    /// Focused element remembered across a disconnect for a restoration
    /// attempt on reconnect.
    pub(crate) saved_focus: Option<NodeId>,
    pub(crate) saved_selection: Option<(u32, u32)>,
    /// The join_count for which form recovery already ran.
    pub(crate) recovered_at_join: u64,
}

impl View {
    pub fn new(id: ViewId, root: NodeId, parent: Option<ViewId>) -> Self {
        Self {
            id,
            parent,
            children: IndexSet::new(),
            root,
            rendered: Rendered::default(),
            state: ViewState::Disconnected,
            join_count: 0,
            hooks: HashMap::new(),
            disconnected_hooks: HashSet::new(),
            saved_focus: None,
            saved_selection: None,
            recovered_at_join: 0,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.state == ViewState::Joined
    }

    /// Fingerprint to send with a re-join; absent before the first join.
    pub fn join_fingerprint(&self) -> Option<String> {
        if self.join_count == 0 {
            None
        } else {
            Some(self.rendered.fingerprint())
        }
    }
}
