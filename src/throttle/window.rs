//! Window bookkeeping shared by every operation of one factory.

use tokio::time::Instant;

use super::{deadline_after, ThrottlePolicy};

/// Per-window state machine.
///
/// ```text
/// Empty --first admission--> Counting --count == limit--> Saturated
///   ^                                                         |
///   +------------------------- reset after delay -------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowPhase {
    /// No call admitted in the current window (also the initial phase).
    Empty,
    /// Some calls admitted, still below the limit.
    Counting,
    /// The limit is reached; further calls wait for a reset.
    Saturated,
}

/// A read-only copy of a factory's window state.
///
/// Obtained by [`ThrottleFactory::snapshot()`](crate::ThrottleFactory::snapshot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThrottleSnapshot {
    /// When the current window began. `None` until the first call.
    pub window_start: Option<Instant>,
    /// Calls admitted within the current window.
    pub call_count: u32,
    /// Whether a reset delay is in flight.
    pub resetting: bool,
    /// Callers waiting for the in-flight reset.
    pub parked: usize,
}

impl ThrottleSnapshot {
    /// Phase of the current window as seen under `policy`.
    pub fn phase(&self, policy: &ThrottlePolicy) -> WindowPhase {
        match self.call_count {
            0 => WindowPhase::Empty,
            n if n < policy.limit() => WindowPhase::Counting,
            _ => WindowPhase::Saturated,
        }
    }
}

/// What to do with one admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Run now. The caller must [`record_admission()`](ThrottleState::record_admission)
    /// once the grant is delivered.
    Admit,
    /// Wait for the reset already in flight.
    Park,
    /// Wait for a reset which this request just scheduled at the given deadline.
    ScheduleReset(Instant),
}

#[derive(Debug, Default)]
pub(crate) struct ThrottleState {
    window_start: Option<Instant>,
    call_count: u32,
    /// `Some` while a reset delay is in flight.
    reset_at: Option<Instant>,
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one request against the current window.
    ///
    /// `now` should be read by the caller right before this call.
    pub fn decide(&mut self, policy: &ThrottlePolicy, now: Instant) -> Decision {
        let window_start = *self.window_start.get_or_insert(now);

        if self.call_count < policy.limit()
            && now.saturating_duration_since(window_start) < policy.interval()
        {
            return Decision::Admit;
        }

        if self.reset_at.is_some() {
            return Decision::Park;
        }

        let deadline = deadline_after(now, policy.delay_before_reset(window_start, now));
        self.reset_at = Some(deadline);

        Decision::ScheduleReset(deadline)
    }

    pub fn record_admission(&mut self, policy: &ThrottlePolicy) {
        debug_assert!(self.window_start.is_some(), "admission without a window");
        debug_assert!(
            self.call_count < policy.limit(),
            "admitting call {} over limit {}",
            self.call_count + 1,
            policy.limit()
        );

        self.call_count += 1;
    }

    /// Start a new window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.call_count = 0;
        self.window_start = Some(now);
        self.reset_at = None;
    }

    pub fn reset_at(&self) -> Option<Instant> {
        self.reset_at
    }

    pub fn call_count(&self) -> u32 {
        self.call_count
    }

    pub fn snapshot(&self, parked: usize) -> ThrottleSnapshot {
        ThrottleSnapshot {
            window_start: self.window_start,
            call_count: self.call_count,
            resetting: self.reset_at.is_some(),
            parked,
        }
    }
}
