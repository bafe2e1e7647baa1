//! Reference ids, pending acknowledgements and element locks.

use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

/// Monotonically increasing id correlating a client event with its server
/// acknowledgement. Unique per scheduler (socket) instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventRef(pub u64);

impl std::fmt::Display for EventRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source interaction kind of a pushed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Form,
    KeyUp,
    KeyDown,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Form => "form",
            EventKind::KeyUp => "keyup",
            EventKind::KeyDown => "keydown",
        }
    }
}

/// An event pushed to the server and not yet acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRef<E> {
    pub ref_id: EventRef,
    pub element: E,
    pub kind: EventKind,
    pub created_at_ms: u64,
}

/// Outcome of resolving an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome<E> {
    /// The ref was the element's most recent one.
    Acked {
        element: E,
        /// Markup buffered while the element was locked, to replay once.
        buffered: Option<String>,
    },
    /// The ref is stale (superseded or unknown); ignore it.
    Stale,
}

impl<E> AckOutcome<E> {
    pub fn is_stale(&self) -> bool {
        matches!(self, AckOutcome::Stale)
    }
}

/// Counter plus pending-ref bookkeeping.
#[derive(Debug)]
pub struct RefTable<E> {
    counter: u64,
    pending: HashMap<u64, PendingRef<E>>,
    /// Latest ref issued per element; only this one can be acked.
    latest: HashMap<E, EventRef>,
}

impl<E: Copy + Eq + Hash> RefTable<E> {
    pub fn new() -> Self {
        Self {
            counter: 0,
            pending: HashMap::new(),
            latest: HashMap::new(),
        }
    }

    pub fn next_ref(&mut self) -> EventRef {
        self.counter += 1;
        EventRef(self.counter)
    }

    pub fn track(&mut self, ref_id: EventRef, element: E, kind: EventKind, now_ms: u64) {
        self.latest.insert(element, ref_id);
        self.pending.insert(
            ref_id.0,
            PendingRef {
                ref_id,
                element,
                kind,
                created_at_ms: now_ms,
            },
        );
    }

    /// Resolve an ack: `Some(element)` when the ref is the element's most
    /// recent pending one, `None` when stale or unknown. Stale entries are
    /// discarded so superseded refs cannot accumulate.
    pub fn ack(&mut self, ref_id: EventRef) -> Option<E> {
        let entry = self.pending.remove(&ref_id.0)?;
        match self.latest.get(&entry.element) {
            Some(latest) if *latest == ref_id => {
                self.latest.remove(&entry.element);
                Some(entry.element)
            }
            _ => {
                debug!(%ref_id, "ignoring stale acknowledgement");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<E: Copy + Eq + Hash> Default for RefTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct LockState {
    ref_id: EventRef,
    buffered: Option<String>,
}

/// A released lock: the buffered markup, if any patch arrived while locked.
#[derive(Debug, PartialEq, Eq)]
pub struct Unlocked<E> {
    pub element: E,
    pub buffered: Option<String>,
}

/// Element locks keyed both ways: by element for patch-skip checks, by ref
/// for acknowledgement-driven release.
#[derive(Debug)]
pub struct LockTable<E> {
    locks: HashMap<E, LockState>,
}

impl<E: Copy + Eq + Hash> LockTable<E> {
    pub fn new() -> Self {
        Self {
            locks: HashMap::new(),
        }
    }

    /// Lock `element` until `ref_id` is acknowledged. Re-locking an element
    /// with a newer ref supersedes the old ref but keeps any buffered
    /// markup: the patch that arrived while locked is still the latest.
    pub fn lock(&mut self, element: E, ref_id: EventRef) {
        let buffered = self
            .locks
            .remove(&element)
            .and_then(|state| state.buffered);
        self.locks.insert(element, LockState { ref_id, buffered });
    }

    pub fn is_locked(&self, element: E) -> bool {
        self.locks.contains_key(&element)
    }

    pub fn buffer_patch(&mut self, element: E, markup: String) {
        if let Some(state) = self.locks.get_mut(&element) {
            state.buffered = Some(markup);
        }
    }

    pub fn unlock_ref(&mut self, ref_id: EventRef) -> Option<Unlocked<E>> {
        let element = *self
            .locks
            .iter()
            .find(|(_, state)| state.ref_id == ref_id)
            .map(|(element, _)| element)?;
        self.unlock_element(element)
    }

    pub fn unlock_element(&mut self, element: E) -> Option<Unlocked<E>> {
        self.locks.remove(&element).map(|state| Unlocked {
            element,
            buffered: state.buffered,
        })
    }

    pub fn locked_elements(&self) -> impl Iterator<Item = E> + '_ {
        self.locks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<E: Copy + Eq + Hash> Default for LockTable<E> {
    fn default() -> Self {
        Self::new()
    }
}
