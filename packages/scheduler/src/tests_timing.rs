//! Timing behavior of the debounce/throttle primitives, driven by a manual
//! clock.

use crate::timers::{ScheduleDecision, TimerKey, TimerSpec, TimerTable, DEFAULT_INTERVAL_MS};
use crate::Scheduler;
use crate::refs::{EventKind, AckOutcome};

type Table = TimerTable<u32, &'static str>;

fn key(element: u32) -> TimerKey<u32> {
    TimerKey::new(element, "input")
}

#[test]
fn test_debounce_coalesces_rapid_input() {
    let mut timers = Table::new();
    let spec = TimerSpec::debounce(100);

    // Three inputs 50ms apart: each resets the timer.
    assert_eq!(
        timers.schedule(key(1), spec, false, "a", 0),
        ScheduleDecision::Deferred { deadline_ms: 100 }
    );
    assert_eq!(
        timers.schedule(key(1), spec, false, "ab", 50),
        ScheduleDecision::Deferred { deadline_ms: 150 }
    );
    assert_eq!(
        timers.schedule(key(1), spec, false, "abc", 100),
        ScheduleDecision::Deferred { deadline_ms: 200 }
    );

    // Nothing fires before 100ms of silence.
    assert!(timers.advance(199).is_empty());

    let fires = timers.advance(200);
    assert_eq!(fires.len(), 1);
    assert_eq!(fires[0].payload, "abc");
    assert_eq!(fires[0].due_ms, 200);

    // One fire only.
    assert!(timers.advance(1000).is_empty());
}

#[test]
fn test_throttle_leading_fire_with_quiet_window() {
    let mut timers = Table::new();
    let spec = TimerSpec::throttle(200);

    // Three immediate clicks: one leading fire, the rest coalesce.
    assert_eq!(timers.schedule(key(1), spec, false, "c1", 0), ScheduleDecision::FireNow);
    assert_eq!(timers.schedule(key(1), spec, false, "c2", 1), ScheduleDecision::Coalesced);
    assert_eq!(timers.schedule(key(1), spec, false, "c3", 2), ScheduleDecision::Coalesced);

    // Coalesced events produce exactly one trailing fire at window end.
    let fires = timers.advance(200);
    assert_eq!(fires.len(), 1);
    assert_eq!(fires[0].payload, "c3");
    assert_eq!(fires[0].due_ms, 200);
}

#[test]
fn test_throttle_window_with_no_events_lapses() {
    let mut timers = Table::new();
    let spec = TimerSpec::throttle(200);

    assert_eq!(timers.schedule(key(1), spec, false, "c1", 0), ScheduleDecision::FireNow);
    // No events during the window: it lapses with no trailing fire.
    assert!(timers.advance(200).is_empty());

    // The next click starts a fresh window and fires immediately.
    assert_eq!(timers.schedule(key(1), spec, false, "c2", 300), ScheduleDecision::FireNow);
}

#[test]
fn test_throttle_late_window_click_fires_trailing_once() {
    let mut timers = Table::new();
    let spec = TimerSpec::throttle(200);

    assert_eq!(timers.schedule(key(1), spec, false, "lead", 0), ScheduleDecision::FireNow);
    // Click near the end of the window.
    assert_eq!(timers.schedule(key(1), spec, false, "late", 190), ScheduleDecision::Coalesced);

    let fires = timers.advance(200);
    assert_eq!(fires.len(), 1);
    assert_eq!(fires[0].payload, "late");
    assert!(timers.advance(1000).is_empty());
}

#[test]
fn test_per_key_throttle_windows_are_independent() {
    let mut timers = Table::new();
    let spec = TimerSpec::throttle(200);
    let key_a = TimerKey::new(1u32, "keydown").with_key("a");
    let key_b = TimerKey::new(1u32, "keydown").with_key("b");

    assert_eq!(timers.schedule(key_a.clone(), spec, false, "a1", 0), ScheduleDecision::FireNow);
    assert_eq!(timers.schedule(key_a.clone(), spec, false, "a2", 10), ScheduleDecision::Coalesced);

    // Switching to a different key opens that key's own window.
    assert_eq!(timers.schedule(key_b, spec, false, "b1", 20), ScheduleDecision::FireNow);

    // Key "a" still owes its trailing fire.
    let fires = timers.advance(250);
    assert_eq!(fires.len(), 1);
    assert_eq!(fires[0].payload, "a2");
}

#[test]
fn test_zero_interval_falls_back_to_default() {
    let mut timers = Table::new();

    match timers.schedule(key(1), TimerSpec::debounce(0), false, "x", 0) {
        ScheduleDecision::Deferred { deadline_ms } => assert_eq!(deadline_ms, DEFAULT_INTERVAL_MS),
        other => panic!("expected Deferred, got {:?}", other),
    }
}

#[test]
fn test_blocked_element_drops_event() {
    let mut timers = Table::new();
    assert_eq!(
        timers.schedule(key(1), TimerSpec::debounce(100), true, "x", 0),
        ScheduleDecision::Blocked
    );
    assert!(timers.is_empty());
}

#[test]
fn test_flush_fires_pending_debounce_immediately() {
    let mut timers = Table::new();
    timers.schedule(key(1), TimerSpec::debounce(100), false, "draft", 0);

    // Blur at 30ms: the uncommitted value fires now, the timer dies.
    let fires = timers.flush(1, 30);
    assert_eq!(fires.len(), 1);
    assert_eq!(fires[0].payload, "draft");
    assert_eq!(fires[0].due_ms, 30);
    assert!(timers.advance(1000).is_empty());
}

#[test]
fn test_flush_skips_quiet_throttle_window() {
    let mut timers = Table::new();
    timers.schedule(key(1), TimerSpec::throttle(200), false, "lead", 0);

    // The leading fire already happened; a quiet window has nothing to flush.
    assert!(timers.flush(1, 50).is_empty());
}

#[test]
fn test_flush_only_touches_one_element() {
    let mut timers = Table::new();
    timers.schedule(key(1), TimerSpec::debounce(100), false, "one", 0);
    timers.schedule(key(2), TimerSpec::debounce(100), false, "two", 0);

    let fires = timers.flush(1, 10);
    assert_eq!(fires.len(), 1);
    assert_eq!(fires[0].element, 1);

    // Element 2's debounce still runs to its deadline.
    let fires = timers.advance(100);
    assert_eq!(fires.len(), 1);
    assert_eq!(fires[0].element, 2);
}

#[test]
fn test_cancel_element_drops_timers_silently() {
    let mut timers = Table::new();
    timers.schedule(key(1), TimerSpec::debounce(100), false, "gone", 0);
    timers.cancel_element(1);
    assert!(timers.advance(1000).is_empty());
}

#[test]
fn test_fires_drain_in_deadline_order() {
    let mut timers = Table::new();
    timers.schedule(TimerKey::new(2u32, "input"), TimerSpec::debounce(300), false, "late", 0);
    timers.schedule(TimerKey::new(1u32, "input"), TimerSpec::debounce(100), false, "early", 0);

    let fires = timers.advance(1000);
    assert_eq!(fires.len(), 2);
    assert_eq!(fires[0].payload, "early");
    assert_eq!(fires[1].payload, "late");
}

#[test]
fn test_scheduler_lock_and_ack_round_trip() {
    let mut sched: Scheduler<u32, ()> = Scheduler::new();

    let r = sched.next_ref();
    sched.track(r, 9, EventKind::Click, 0);
    sched.lock(9, r);
    assert!(sched.is_locked(9));

    // A patch arrives while locked; the reconciler buffers it.
    sched.buffer_patch(9, "<span>later</span>".into());

    match sched.ack(r) {
        AckOutcome::Acked { element, buffered } => {
            assert_eq!(element, 9);
            assert_eq!(buffered.as_deref(), Some("<span>later</span>"));
        }
        AckOutcome::Stale => panic!("ack should resolve"),
    }
    assert!(!sched.is_locked(9));
}

#[test]
fn test_scheduler_stale_ack_leaves_lock_alone() {
    let mut sched: Scheduler<u32, ()> = Scheduler::new();

    let old = sched.next_ref();
    sched.track(old, 9, EventKind::KeyUp, 0);
    sched.lock(9, old);

    let newer = sched.next_ref();
    sched.track(newer, 9, EventKind::KeyUp, 10);
    sched.lock(9, newer);

    assert!(sched.ack(old).is_stale());
    assert!(sched.is_locked(9));

    assert!(!sched.ack(newer).is_stale());
    assert!(!sched.is_locked(9));
}
