//! # Veneer Scheduler
//!
//! Event-correlation bookkeeping for the client runtime:
//!
//! - a monotonic reference counter correlating client-originated events with
//!   their eventual server acknowledgement,
//! - element locks that keep patches away from elements with an outstanding
//!   reference, buffering the markup that arrives while locked,
//! - debounce/throttle timers for input coalescing.
//!
//! The scheduler is generic over the element handle `E` and the timer
//! payload `P`, and it never reads a clock: every operation takes the
//! current time in milliseconds, so tests (and embedders with their own
//! event loop) drive time explicitly.

pub mod refs;
pub mod timers;

#[cfg(test)]
mod tests_timing;

pub use refs::{AckOutcome, EventKind, EventRef, LockTable, PendingRef, RefTable, Unlocked};
pub use timers::{ScheduleDecision, TimerFire, TimerKey, TimerSpec, TimerTable, DEFAULT_INTERVAL_MS};

use std::hash::Hash;

/// One scheduler instance per socket connection: issues refs, tracks
/// pending acknowledgements, owns element locks and input timers.
#[derive(Debug)]
pub struct Scheduler<E, P> {
    refs: RefTable<E>,
    locks: LockTable<E>,
    timers: TimerTable<E, P>,
}

impl<E: Copy + Eq + Hash, P> Scheduler<E, P> {
    pub fn new() -> Self {
        Self {
            refs: RefTable::new(),
            locks: LockTable::new(),
            timers: TimerTable::new(),
        }
    }

    /// Issue the next reference id. Monotonic for the lifetime of this
    /// scheduler instance.
    pub fn next_ref(&mut self) -> EventRef {
        self.refs.next_ref()
    }

    /// Record an outstanding client event awaiting acknowledgement.
    pub fn track(&mut self, ref_id: EventRef, element: E, kind: EventKind, now_ms: u64) {
        self.refs.track(ref_id, element, kind, now_ms);
    }

    /// Resolve an acknowledgement. A stale ref (the element has since
    /// issued a newer one) is reported as [`AckOutcome::Stale`] and must be
    /// ignored by the caller; the matching lock is released and any markup
    /// buffered while locked is handed back for replay.
    pub fn ack(&mut self, ref_id: EventRef) -> AckOutcome<E> {
        match self.refs.ack(ref_id) {
            Some(element) => {
                let buffered = self.locks.unlock_element(element).and_then(|u| u.buffered);
                AckOutcome::Acked { element, buffered }
            }
            None => AckOutcome::Stale,
        }
    }

    /// Mark an element non-patchable until the given ref is acknowledged.
    pub fn lock(&mut self, element: E, ref_id: EventRef) {
        self.locks.lock(element, ref_id);
    }

    pub fn is_locked(&self, element: E) -> bool {
        self.locks.is_locked(element)
    }

    /// Store (or overwrite) markup that arrived while `element` was locked;
    /// the latest buffered patch replays exactly once on unlock.
    pub fn buffer_patch(&mut self, element: E, markup: String) {
        self.locks.buffer_patch(element, markup);
    }

    /// Release a lock by ref id, returning the element and buffered markup.
    pub fn unlock_ref(&mut self, ref_id: EventRef) -> Option<Unlocked<E>> {
        self.locks.unlock_ref(ref_id)
    }

    /// Release a lock by element.
    pub fn unlock_element(&mut self, element: E) -> Option<Unlocked<E>> {
        self.locks.unlock_element(element)
    }

    /// Currently locked elements, for the reconciler's skip set.
    pub fn locked_elements(&self) -> impl Iterator<Item = E> + '_ {
        self.locks.locked_elements()
    }

    /// Debounce/throttle gate for a qualifying event. See [`TimerTable::schedule`].
    pub fn schedule(
        &mut self,
        key: TimerKey<E>,
        spec: TimerSpec,
        is_blocked: bool,
        payload: P,
        now_ms: u64,
    ) -> ScheduleDecision {
        self.timers.schedule(key, spec, is_blocked, payload, now_ms)
    }

    /// Blur/submit path: cancel the element's timers and return the fires
    /// that carry uncommitted work.
    pub fn flush(&mut self, element: E, now_ms: u64) -> Vec<TimerFire<E, P>> {
        self.timers.flush(element, now_ms)
    }

    /// The element left the DOM: drop its timers without firing.
    pub fn cancel_element(&mut self, element: E) {
        self.timers.cancel_element(element);
        self.locks.unlock_element(element);
    }

    /// Drain timers that are due at `now_ms`, in deadline order.
    pub fn advance(&mut self, now_ms: u64) -> Vec<TimerFire<E, P>> {
        self.timers.advance(now_ms)
    }

    pub fn pending_refs(&self) -> usize {
        self.refs.len()
    }
}

impl<E: Copy + Eq + Hash, P> Default for Scheduler<E, P> {
    fn default() -> Self {
        Self::new()
    }
}
