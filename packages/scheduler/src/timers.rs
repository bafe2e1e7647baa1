//! Debounce and throttle timers.
//!
//! Timers never read a clock: qualifying events pass the current time into
//! [`TimerTable::schedule`], and the embedder drains due timers with
//! [`TimerTable::advance`]. Per-keystroke throttling is keyed by the
//! specific key value, so each key coalesces independently.

use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

/// Fallback interval for a zero or unset debounce/throttle attribute value.
pub const DEFAULT_INTERVAL_MS: u64 = 300;

/// Debounce/throttle configuration for one element+event pair, as read
/// from the element's markers. `Some(0)` means "marker present without an
/// interval" and falls back to [`DEFAULT_INTERVAL_MS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerSpec {
    pub debounce_ms: Option<u64>,
    pub throttle_ms: Option<u64>,
}

impl TimerSpec {
    pub fn debounce(ms: u64) -> Self {
        Self {
            debounce_ms: Some(ms),
            ..Self::default()
        }
    }

    pub fn throttle(ms: u64) -> Self {
        Self {
            throttle_ms: Some(ms),
            ..Self::default()
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.debounce_ms.is_none() && self.throttle_ms.is_none()
    }

    fn effective(ms: u64) -> u64 {
        if ms == 0 {
            DEFAULT_INTERVAL_MS
        } else {
            ms
        }
    }
}

/// Identity of one timer: element, event name, and (for per-keystroke
/// throttling) the specific key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey<E> {
    pub element: E,
    pub event: String,
    pub key: Option<String>,
}

impl<E> TimerKey<E> {
    pub fn new(element: E, event: impl Into<String>) -> Self {
        Self {
            element,
            event: event.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// What the caller should do with the event it just observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Push the event now.
    FireNow,
    /// The event is held until the deadline (debounce).
    Deferred { deadline_ms: u64 },
    /// Coalesced into an already-running throttle window.
    Coalesced,
    /// The element is blocked (outstanding ref); drop the event.
    Blocked,
}

/// A timer that came due, carrying the payload of the latest coalesced
/// event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFire<E, P> {
    pub element: E,
    pub event: String,
    pub payload: P,
    pub due_ms: u64,
}

#[derive(Debug)]
enum TimerState {
    Debounce { deadline_ms: u64 },
    Throttle { window_end_ms: u64, trailing: bool },
}

#[derive(Debug)]
struct TimerEntry<P> {
    state: TimerState,
    payload: P,
}

#[derive(Debug)]
pub struct TimerTable<E, P> {
    timers: HashMap<TimerKey<E>, TimerEntry<P>>,
}

impl<E: Copy + Eq + Hash, P> TimerTable<E, P> {
    pub fn new() -> Self {
        Self {
            timers: HashMap::new(),
        }
    }

    /// Gate a qualifying event.
    ///
    /// Debounce: every call resets the timer; the payload of the latest
    /// call wins. Throttle: the first event in a window fires immediately;
    /// events inside the window coalesce into at most one trailing fire at
    /// window end. A window with no coalesced events lapses silently.
    pub fn schedule(
        &mut self,
        key: TimerKey<E>,
        spec: TimerSpec,
        is_blocked: bool,
        payload: P,
        now_ms: u64,
    ) -> ScheduleDecision {
        if is_blocked {
            return ScheduleDecision::Blocked;
        }

        if let Some(debounce) = spec.debounce_ms {
            let deadline_ms = now_ms + TimerSpec::effective(debounce);
            self.timers.insert(
                key,
                TimerEntry {
                    state: TimerState::Debounce { deadline_ms },
                    payload,
                },
            );
            return ScheduleDecision::Deferred { deadline_ms };
        }

        if let Some(throttle) = spec.throttle_ms {
            let interval = TimerSpec::effective(throttle);
            match self.timers.get_mut(&key) {
                Some(entry) => match &mut entry.state {
                    TimerState::Throttle { window_end_ms, trailing } if *window_end_ms > now_ms => {
                        *trailing = true;
                        entry.payload = payload;
                        return ScheduleDecision::Coalesced;
                    }
                    _ => {
                        // Window lapsed (or the key switched semantics):
                        // start fresh with a leading fire.
                        entry.state = TimerState::Throttle {
                            window_end_ms: now_ms + interval,
                            trailing: false,
                        };
                        entry.payload = payload;
                        return ScheduleDecision::FireNow;
                    }
                },
                None => {
                    self.timers.insert(
                        key,
                        TimerEntry {
                            state: TimerState::Throttle {
                                window_end_ms: now_ms + interval,
                                trailing: false,
                            },
                            payload,
                        },
                    );
                    return ScheduleDecision::FireNow;
                }
            }
        }

        ScheduleDecision::FireNow
    }

    /// Blur/submit path: cancel every timer owned by `element`, returning
    /// fires for timers that held uncommitted work (a pending debounce, or
    /// a throttle window with coalesced events).
    pub fn flush(&mut self, element: E, now_ms: u64) -> Vec<TimerFire<E, P>> {
        let keys: Vec<TimerKey<E>> = self
            .timers
            .keys()
            .filter(|key| key.element == element)
            .cloned()
            .collect();

        let mut fires = Vec::new();
        for key in keys {
            let Some(entry) = self.timers.remove(&key) else {
                continue;
            };
            let uncommitted = match entry.state {
                TimerState::Debounce { .. } => true,
                TimerState::Throttle { trailing, .. } => trailing,
            };
            if uncommitted {
                fires.push(TimerFire {
                    element: key.element,
                    event: key.event,
                    payload: entry.payload,
                    due_ms: now_ms,
                });
            }
        }
        fires
    }

    /// Drop every timer owned by `element` without firing (the element was
    /// removed from the document).
    pub fn cancel_element(&mut self, element: E) {
        self.timers.retain(|key, _| key.element != element);
    }

    /// Drain timers due at `now_ms` in deadline order. Quiet throttle
    /// windows that reached their end lapse without a fire.
    pub fn advance(&mut self, now_ms: u64) -> Vec<TimerFire<E, P>> {
        let due: Vec<TimerKey<E>> = self
            .timers
            .iter()
            .filter(|(_, entry)| match entry.state {
                TimerState::Debounce { deadline_ms } => deadline_ms <= now_ms,
                TimerState::Throttle { window_end_ms, .. } => window_end_ms <= now_ms,
            })
            .map(|(key, _)| key.clone())
            .collect();

        let mut fires = Vec::new();
        for key in due {
            let Some(entry) = self.timers.remove(&key) else {
                continue;
            };
            match entry.state {
                TimerState::Debounce { deadline_ms } => {
                    fires.push(TimerFire {
                        element: key.element,
                        event: key.event,
                        payload: entry.payload,
                        due_ms: deadline_ms,
                    });
                }
                TimerState::Throttle { window_end_ms, trailing } => {
                    if trailing {
                        fires.push(TimerFire {
                            element: key.element,
                            event: key.event,
                            payload: entry.payload,
                            due_ms: window_end_ms,
                        });
                    } else {
                        trace!("throttle window lapsed with no trailing fire");
                    }
                }
            }
        }
        fires.sort_by_key(|fire| fire.due_ms);
        fires
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl<E: Copy + Eq + Hash, P> Default for TimerTable<E, P> {
    fn default() -> Self {
        Self::new()
    }
}
