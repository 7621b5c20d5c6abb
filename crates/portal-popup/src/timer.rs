//! Timer policy and the scheduling capability the coordinator runs on.
//!
//! The coordinator never sleeps or spawns. It asks a [`Scheduler`] for
//! timers and is told about expiry through `PopupCoordinator::on_timer`.
//! [`ManualClock`] drives that loop in virtual time; the tokio-backed
//! scheduler lives in `service`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use portal_common::TimerId;

/// Debounce before opening on an ordinary request.
pub const REQUEST_DEBOUNCE: Duration = Duration::from_millis(850);
/// Debounce for lazy-load and extension requests: defer one scheduling turn.
pub const IMMEDIATE_DEBOUNCE: Duration = Duration::from_millis(1);
/// Interval of the liveness poll that detects user-initiated closes.
pub const LIVENESS_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// How long the popup may take to bootstrap before a retry is offered.
pub const OPEN_TIMEOUT: Duration = Duration::from_millis(2000);

/// Which coordinator slot a timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Request,
    Open,
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Once,
    Repeat,
}

pub trait Scheduler {
    /// Arm a timer. Expiry is reported by passing the returned id to the
    /// coordinator; repeating timers keep firing until cancelled.
    fn schedule(&mut self, kind: TimerKind, delay: Duration, mode: TimerMode) -> TimerId;

    /// Disarm a timer. Unknown or already-fired ids are ignored.
    fn cancel(&mut self, id: TimerId);
}

// =============================================================================
// MANUAL CLOCK
// =============================================================================

#[derive(Debug)]
struct ManualTimer {
    id: TimerId,
    kind: TimerKind,
    deadline: Duration,
    period: Option<Duration>,
}

#[derive(Debug, Default)]
struct ClockState {
    now: Duration,
    next_id: u64,
    timers: Vec<ManualTimer>,
}

/// Deterministic virtual-time scheduler. Clones share one clock, so a test
/// can keep a copy while the coordinator owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Rc<RefCell<ClockState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Number of armed timers.
    pub fn armed(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.state.borrow().timers.iter().any(|t| t.kind == kind)
    }

    /// Time left until the next expiry of a timer of `kind`.
    pub fn remaining(&self, kind: TimerKind) -> Option<Duration> {
        let state = self.state.borrow();
        state
            .timers
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.deadline.saturating_sub(state.now))
            .min()
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its deadline. Repeating timers are re-armed one period later.
    pub fn fire_next(&self, until: Duration) -> Option<(TimerId, TimerKind)> {
        let mut state = self.state.borrow_mut();
        let index = state
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= until)
            .min_by_key(|(_, t)| (t.deadline, t.id))
            .map(|(i, _)| i)?;

        let deadline = state.timers[index].deadline;
        if deadline > state.now {
            state.now = deadline;
        }

        let fired = (state.timers[index].id, state.timers[index].kind);
        match state.timers[index].period {
            Some(period) => state.timers[index].deadline += period,
            None => {
                state.timers.remove(index);
            }
        }
        Some(fired)
    }

    /// Advance virtual time by `by`, invoking `on_fire` for each expiry in
    /// deadline order. The clock is not borrowed while `on_fire` runs, so
    /// the callback may schedule or cancel timers.
    pub fn advance(&self, by: Duration, mut on_fire: impl FnMut(TimerId)) {
        let until = self.now() + by;
        while let Some((id, _)) = self.fire_next(until) {
            on_fire(id);
        }
        self.state.borrow_mut().now = until;
    }
}

impl Scheduler for ManualClock {
    fn schedule(&mut self, kind: TimerKind, delay: Duration, mode: TimerMode) -> TimerId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let period = match mode {
            TimerMode::Once => None,
            TimerMode::Repeat => Some(delay.max(Duration::from_millis(1))),
        };
        let deadline = state.now + delay;
        state.timers.push(ManualTimer {
            id,
            kind,
            deadline,
            period,
        });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.state.borrow_mut().timers.retain(|t| t.id != id);
    }
}
