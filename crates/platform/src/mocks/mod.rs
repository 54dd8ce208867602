//! Mock implementations for testing
//!
//! [`VirtualClock`] stands in for a hardware alarm pool and a blocking delay
//! at the same time. Both share one virtual timeline, so a driver that arms
//! a 120 ms settle timer and then blocks in `delay_ms(120)` sees the
//! timer fire during the delay, deterministically and without sleeping.

#![cfg(any(test, feature = "std"))]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::timer::{OneShotScheduler, TimerSink};

const US_PER_MS: u64 = 1_000;

struct Armed<T> {
    deadline_us: u64,
    seq: u64,
    token: T,
}

struct ClockState<T> {
    now_us: u64,
    next_seq: u64,
    armed: Vec<Armed<T>>,
    scheduled: Vec<(u32, T)>,
}

/// Shared virtual timeline
pub struct VirtualClock<T> {
    state: Arc<Mutex<ClockState<T>>>,
}

impl<T> Clone for VirtualClock<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Copy> Default for VirtualClock<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> VirtualClock<T> {
    /// Create a clock at t = 0 with nothing armed.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                now_us: 0,
                next_seq: 0,
                armed: Vec::new(),
                scheduled: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClockState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scheduler handle that arms timers on this timeline.
    pub fn scheduler(&self) -> VirtualScheduler<T> {
        VirtualScheduler { clock: self.clone() }
    }

    /// Blocking delay that advances this timeline and fires expired timers
    /// into `sink`.
    pub fn delay<'s, S: TimerSink<T>>(&self, sink: &'s S) -> VirtualDelay<'s, T, S> {
        VirtualDelay {
            clock: self.clone(),
            sink,
        }
    }

    /// Elapsed virtual time in whole milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.lock().now_us / US_PER_MS
    }

    /// Elapsed virtual time in microseconds.
    pub fn now_us(&self) -> u64 {
        self.lock().now_us
    }

    /// Number of timers armed but not yet delivered.
    pub fn armed(&self) -> usize {
        self.lock().armed.len()
    }

    /// Every `(delay_ms, token)` pair ever scheduled, in call order.
    pub fn scheduled(&self) -> Vec<(u32, T)> {
        self.lock().scheduled.clone()
    }

    fn arm(&self, delay_ms: u32, token: T) {
        let mut state = self.lock();
        let deadline_us = state
            .now_us
            .saturating_add(u64::from(delay_ms).saturating_mul(US_PER_MS));
        let seq = state.next_seq;
        state.next_seq = seq.wrapping_add(1);
        state.armed.push(Armed {
            deadline_us,
            seq,
            token,
        });
        state.scheduled.push((delay_ms, token));
    }

    /// Advance by `ms` milliseconds, delivering expired tokens to `sink`.
    ///
    /// Returns the number of tokens delivered.
    pub fn advance_ms<S: TimerSink<T>>(&self, ms: u64, sink: &S) -> usize {
        self.advance_us(ms.saturating_mul(US_PER_MS), sink)
    }

    /// Advance by `us` microseconds, delivering expired tokens to `sink`.
    ///
    /// Tokens are delivered in deadline order, ties in arming order. The
    /// internal lock is released before the sink runs.
    pub fn advance_us<S: TimerSink<T>>(&self, us: u64, sink: &S) -> usize {
        let mut expired = {
            let mut state = self.lock();
            state.now_us = state.now_us.saturating_add(us);
            let now = state.now_us;
            let (due, rest): (Vec<_>, Vec<_>) =
                state.armed.drain(..).partition(|a| a.deadline_us <= now);
            state.armed = rest;
            due
        };
        expired.sort_by_key(|a| (a.deadline_us, a.seq));
        let delivered = expired.len();
        for armed in expired {
            sink.on_timer(armed.token);
        }
        delivered
    }
}

/// [`OneShotScheduler`] backed by a [`VirtualClock`]
pub struct VirtualScheduler<T> {
    clock: VirtualClock<T>,
}

impl<T: Copy> OneShotScheduler<T> for VirtualScheduler<T> {
    fn schedule_once(&mut self, delay_ms: u32, token: T) {
        self.clock.arm(delay_ms, token);
    }
}

/// [`DelayNs`] backed by a [`VirtualClock`]
pub struct VirtualDelay<'s, T, S> {
    clock: VirtualClock<T>,
    sink: &'s S,
}

impl<T: Copy, S: TimerSink<T>> DelayNs for VirtualDelay<'_, T, S> {
    fn delay_ns(&mut self, ns: u32) {
        let us = u64::from(ns).div_ceil(1_000);
        self.clock.advance_us(us, self.sink);
    }
}
