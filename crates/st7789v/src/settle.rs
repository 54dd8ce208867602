//! Timed lock manager.
//!
//! Mode-changing commands open two settle windows at once: a short one
//! specific to the command and the shared 120 ms mode-switch window. Each
//! window is a [`TimedLock`] armed synchronously and released exactly once
//! by a one-shot timer delivered through [`TimerSink`].
//!
//! ```text
//! SWRESET  ─┬─ reset-settle  ──── 5 ms ───▶ release
//!           └─ mode-switch   ──── 120 ms ─▶ release
//! SLPIN/OUT ┬─ sleep-settle  ──── 5 ms ───▶ release
//!           └─ mode-switch   ──── 120 ms ─▶ release
//! ```
//!
//! Releases are unconditional. Re-arming a lock before it fired would leave
//! two timers racing for one lock; the busy check at operation entry rules
//! that out.

use core::sync::atomic::{AtomicU8, Ordering};

use st7789v_platform::OneShotScheduler;

use crate::command::Command;
use crate::Config;

/// Which settle window a timer token refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettleLock {
    /// Short window after SWRESET
    ResetSettle,
    /// Short window after SLPIN / SLPOUT
    SleepSettle,
    /// Long controller mode-switch window
    ModeSwitch,
}

/// Operation that armed a lock.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockOwner {
    /// SWRESET
    SoftwareReset = 1,
    /// SLPIN
    SleepIn = 2,
    /// SLPOUT
    SleepOut = 3,
}

impl LockOwner {
    const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::SoftwareReset),
            2 => Some(Self::SleepIn),
            3 => Some(Self::SleepOut),
            _ => None,
        }
    }
}

const UNOWNED: u8 = 0;

/// Lock that is held while an owner marker is set.
pub struct TimedLock {
    owner: AtomicU8,
}

impl TimedLock {
    /// An unowned lock.
    pub const fn new() -> Self {
        Self {
            owner: AtomicU8::new(UNOWNED),
        }
    }

    /// Mark the lock as held by `owner`.
    pub fn arm(&self, owner: LockOwner) {
        self.owner.store(owner as u8, Ordering::Release);
    }

    /// Clear the owner. Only the timer callback calls this.
    pub fn release(&self) {
        self.owner.store(UNOWNED, Ordering::Release);
    }

    /// Current owner, if held.
    pub fn owner(&self) -> Option<LockOwner> {
        LockOwner::from_raw(self.owner.load(Ordering::Acquire))
    }

    /// Whether the lock is held.
    pub fn is_locked(&self) -> bool {
        self.owner.load(Ordering::Acquire) != UNOWNED
    }
}

impl Default for TimedLock {
    fn default() -> Self {
        Self::new()
    }
}

/// The three settle windows of one controller.
#[derive(Default)]
pub struct SettleLocks {
    reset: TimedLock,
    sleep: TimedLock,
    mode_switch: TimedLock,
}

impl SettleLocks {
    /// All windows closed.
    pub const fn new() -> Self {
        Self {
            reset: TimedLock::new(),
            sleep: TimedLock::new(),
            mode_switch: TimedLock::new(),
        }
    }

    /// Lock addressed by a timer token.
    pub fn get(&self, which: SettleLock) -> &TimedLock {
        match which {
            SettleLock::ResetSettle => &self.reset,
            SettleLock::SleepSettle => &self.sleep,
            SettleLock::ModeSwitch => &self.mode_switch,
        }
    }

    /// Reset settle window open.
    pub fn is_reset_busy(&self) -> bool {
        self.reset.is_locked()
    }

    /// Sleep settle or mode-switch window open.
    pub fn is_sleep_busy(&self) -> bool {
        self.sleep.is_locked() || self.mode_switch.is_locked()
    }

    /// Arm the reset-settle and mode-switch windows and schedule their release.
    pub fn arm_reset<S>(&self, scheduler: &mut S, config: &Config)
    where
        S: OneShotScheduler<SettleLock>,
    {
        self.reset.arm(LockOwner::SoftwareReset);
        self.mode_switch.arm(LockOwner::SoftwareReset);
        scheduler.schedule_once(config.reset_settle_ms, SettleLock::ResetSettle);
        scheduler.schedule_once(config.mode_switch_settle_ms, SettleLock::ModeSwitch);
    }

    /// Arm the sleep-settle and mode-switch windows and schedule their release.
    pub fn arm_sleep_transition<S>(&self, owner: LockOwner, scheduler: &mut S, config: &Config)
    where
        S: OneShotScheduler<SettleLock>,
    {
        self.sleep.arm(owner);
        self.mode_switch.arm(owner);
        scheduler.schedule_once(config.sleep_settle_ms, SettleLock::SleepSettle);
        scheduler.schedule_once(config.mode_switch_settle_ms, SettleLock::ModeSwitch);
    }

    /// Arm the windows `command` opens, if it is a mode change.
    ///
    /// Returns whether anything was armed.
    pub fn arm_for<S>(&self, command: Command, scheduler: &mut S, config: &Config) -> bool
    where
        S: OneShotScheduler<SettleLock>,
    {
        if !command.is_mode_change() {
            return false;
        }
        match command {
            Command::SoftwareReset => self.arm_reset(scheduler, config),
            Command::SleepIn => self.arm_sleep_transition(LockOwner::SleepIn, scheduler, config),
            _ => self.arm_sleep_transition(LockOwner::SleepOut, scheduler, config),
        }
        true
    }

    /// Timer callback body.
    pub fn on_elapsed(&self, which: SettleLock) {
        self.get(which).release();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use st7789v_platform::mocks::VirtualClock;
    use st7789v_platform::TimerSink;

    struct Sink<'a>(&'a SettleLocks);

    impl TimerSink<SettleLock> for Sink<'_> {
        fn on_timer(&self, token: SettleLock) {
            self.0.on_elapsed(token);
        }
    }

    #[test]
    fn owner_marker_tracks_lock() {
        let lock = TimedLock::new();
        assert_eq!(lock.owner(), None);
        lock.arm(LockOwner::SleepOut);
        assert!(lock.is_locked());
        assert_eq!(lock.owner(), Some(LockOwner::SleepOut));
        lock.release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn reset_windows_release_at_5_and_120_ms() {
        let locks = SettleLocks::new();
        let sink = Sink(&locks);
        let clock = VirtualClock::new();
        let mut sched = clock.scheduler();

        locks.arm_reset(&mut sched, &Config::default());
        assert!(locks.is_reset_busy());
        assert!(locks.is_sleep_busy(), "mode-switch guard shares the sleep flag");
        assert_eq!(locks.get(SettleLock::ModeSwitch).owner(), Some(LockOwner::SoftwareReset));

        clock.advance_ms(4, &sink);
        assert!(locks.is_reset_busy(), "reset settle must hold for 5 ms");
        clock.advance_ms(1, &sink);
        assert!(!locks.is_reset_busy());
        assert!(locks.is_sleep_busy());

        clock.advance_ms(114, &sink);
        assert!(locks.is_sleep_busy(), "mode switch must hold for 120 ms");
        clock.advance_ms(1, &sink);
        assert!(!locks.is_sleep_busy());

        assert_eq!(
            clock.scheduled(),
            vec![(5, SettleLock::ResetSettle), (120, SettleLock::ModeSwitch)],
            "each lock released by exactly one timer"
        );
        assert_eq!(clock.armed(), 0);
    }

    #[test]
    fn sleep_transition_arms_short_and_shared_long_lock() {
        let locks = SettleLocks::new();
        let sink = Sink(&locks);
        let clock = VirtualClock::new();
        let mut sched = clock.scheduler();

        locks.arm_sleep_transition(LockOwner::SleepIn, &mut sched, &Config::default());
        assert!(!locks.is_reset_busy());
        assert_eq!(locks.get(SettleLock::SleepSettle).owner(), Some(LockOwner::SleepIn));

        clock.advance_ms(5, &sink);
        assert!(!locks.get(SettleLock::SleepSettle).is_locked());
        assert!(locks.is_sleep_busy(), "long lock still held");
        clock.advance_ms(115, &sink);
        assert!(!locks.is_sleep_busy());
    }

    #[test]
    fn arm_for_follows_mode_change_commands() {
        let locks = SettleLocks::new();
        let clock = VirtualClock::new();
        let mut sched = clock.scheduler();
        let config = Config::default();

        assert!(!locks.arm_for(Command::DisplayOn, &mut sched, &config));
        assert_eq!(clock.armed(), 0, "plain commands schedule nothing");

        assert!(locks.arm_for(Command::SleepIn, &mut sched, &config));
        assert_eq!(locks.get(SettleLock::SleepSettle).owner(), Some(LockOwner::SleepIn));
        assert!(!locks.is_reset_busy());

        assert!(locks.arm_for(Command::SoftwareReset, &mut sched, &config));
        assert_eq!(locks.get(SettleLock::ResetSettle).owner(), Some(LockOwner::SoftwareReset));
        assert_eq!(locks.get(SettleLock::ModeSwitch).owner(), Some(LockOwner::SoftwareReset));
    }
}
