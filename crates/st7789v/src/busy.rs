//! Busy-state registry.
//!
//! Three independent reasons the controller may refuse a new operation:
//!
//! | Flag            | Set by                              | Cleared by                    |
//! |-----------------|-------------------------------------|-------------------------------|
//! | transfer busy   | sync write/read, DMA trigger        | transfer end / DMA interrupt  |
//! | reset busy      | SWRESET                             | reset-settle timer (5 ms)     |
//! | sleep busy      | SWRESET, SLPIN, SLPOUT              | sleep-settle and mode-switch timers (5 / 120 ms) |
//!
//! The TransferGate and the CommunicationSession are [`Gate`]s: binary
//! tokens that may be released from a different context than the one that
//! took them (the DMA interrupt releases a gate taken by the thread).

use core::sync::atomic::{AtomicBool, Ordering};

/// Exclusive binary token.
///
/// Not a guard type: release is explicit because the releasing context is
/// often not the acquiring one.
pub struct Gate {
    held: AtomicBool,
}

impl Gate {
    /// A free gate.
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Take the gate if it is free.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Spin until the gate is taken.
    ///
    /// On a single core this only makes progress if the holder is an
    /// interrupt that will preempt the spinning thread.
    pub fn acquire_blocking(&self) {
        while self
            .held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
    }

    /// Hand the gate back.
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Whether someone holds the gate.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the three busy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusyState {
    /// A synchronous or DMA transfer holds the TransferGate.
    pub transfer: bool,
    /// The reset settle window is open.
    pub reset: bool,
    /// A sleep or mode-switch settle window is open.
    pub sleep: bool,
}

impl BusyState {
    /// Whether any flag is set.
    pub const fn any(self) -> bool {
        self.transfer || self.reset || self.sleep
    }
}

/// Per-session driver state.
///
/// ```text
/// Detached ──init──▶ Idle ◀──────────────┐
///                     │ dispatch          │ flags clear
///                     ▼                   │
///       Resetting / SleepTransitioning / Transferring
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayState {
    /// Controller not identified.
    Detached,
    /// Attached and accepting operations.
    Idle,
    /// Reset settle window open.
    Resetting,
    /// Sleep or mode-switch settle window open.
    SleepTransitioning,
    /// Transfer in flight.
    Transferring,
}

impl DisplayState {
    /// Derive the state from the attached flag and busy flags.
    ///
    /// A transfer wins over settle windows, and reset over sleep.
    pub const fn from_flags(attached: bool, busy: BusyState) -> Self {
        if !attached {
            Self::Detached
        } else if busy.transfer {
            Self::Transferring
        } else if busy.reset {
            Self::Resetting
        } else if busy.sleep {
            Self::SleepTransitioning
        } else {
            Self::Idle
        }
    }

    /// Whether new operations would be accepted.
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}
