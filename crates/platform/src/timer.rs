//! One-shot timer abstraction
//!
//! Drivers with hardware settle windows arm a deferred callback instead of
//! blocking. The driver hands the platform an opaque `token`; when the delay
//! elapses the platform delivers the token back to a [`TimerSink`], usually
//! from a timer interrupt or an executor task.
//!
//! ```text
//! driver ── schedule_once(5, token) ──▶ platform alarm
//!                                           │ 5 ms
//! driver ◀──────── on_timer(token) ─────────┘
//! ```
//!
//! On Embassy targets a scheduler can forward `(deadline, token)` pairs
//! through an `embassy_sync::channel::Channel` to a task that awaits
//! `embassy_time::Timer::at(deadline)` and then calls `on_timer`.

/// Arms one-shot callbacks.
pub trait OneShotScheduler<T> {
    /// Deliver `token` to the sink after `delay_ms` milliseconds.
    ///
    /// Each call must produce exactly one delivery.
    fn schedule_once(&mut self, delay_ms: u32, token: T);
}

/// Receives elapsed timer tokens. Called from interrupt context.
pub trait TimerSink<T> {
    /// The delay armed for `token` has elapsed.
    fn on_timer(&self, token: T);
}
