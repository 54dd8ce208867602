//! Interrupt-visible driver state.
//!
//! [`DriverContext`] holds everything the DMA interrupt and the settle
//! timers touch: the chip-select line, the DMA channel, the receive drain,
//! both gates, the timed locks and the pending completion slot. It is
//! `Sync` and shared by reference; on target it lives in a `static`
//! (typically through `static_cell::StaticCell`).
//!
//! ```text
//!   thread (St7789v) ──&──┐
//!                          ├──▶ DriverContext ◀──&── DMA IRQ: on_dma_interrupt()
//!   timer alarm  ─────&──-┘                   ◀──&── timer:   on_timer(lock)
//! ```
//!
//! Resources touched from both sides sit in
//! `embassy_sync::blocking_mutex::Mutex<CriticalSectionRawMutex, _>`; every
//! lock is held only for a register-level operation.

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::digital::OutputPin;
use st7789v_platform::{
    CompletionSignal, DmaChannel, DmaTarget, DmaTransferConfig, RxDrain, TimerSink,
};

use crate::busy::{BusyState, DisplayState, Gate};
use crate::settle::{LockOwner, SettleLock, SettleLocks};
use crate::Error;

/// Completion bookkeeping for the one DMA transfer that may be in flight.
///
/// Written when the transfer is triggered, consumed exactly once by
/// [`DriverContext::on_dma_interrupt`].
#[derive(Clone, Copy)]
pub struct PendingDmaCompletion {
    /// Signalled once the transfer and its cleanup are done.
    pub target: Option<&'static CompletionSignal>,
    /// End the open communication session on completion.
    pub close_comm: bool,
}

/// Shared-resource half of the driver.
pub struct DriverContext<CS, DMA, DRAIN> {
    cs: Mutex<CriticalSectionRawMutex, RefCell<CS>>,
    dma: Mutex<CriticalSectionRawMutex, RefCell<Option<DMA>>>,
    drain: DRAIN,
    transfer_gate: Gate,
    session: Gate,
    locks: SettleLocks,
    attached: AtomicBool,
    pending: Mutex<CriticalSectionRawMutex, Cell<Option<PendingDmaCompletion>>>,
    foreign_irqs: AtomicU32,
}

impl<CS, DMA, DRAIN> DriverContext<CS, DMA, DRAIN> {
    /// Create a detached context around the chip-select line and the bus
    /// receive drain (`SerialBus::rx_drain`).
    pub const fn new(cs: CS, drain: DRAIN) -> Self {
        Self {
            cs: Mutex::new(RefCell::new(cs)),
            dma: Mutex::new(RefCell::new(None)),
            drain,
            transfer_gate: Gate::new(),
            session: Gate::new(),
            locks: SettleLocks::new(),
            attached: AtomicBool::new(false),
            pending: Mutex::new(Cell::new(None)),
            foreign_irqs: AtomicU32::new(0),
        }
    }

    /// Whether the controller has been identified.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// A synchronous or DMA transfer holds the TransferGate.
    pub fn is_transfer_busy(&self) -> bool {
        self.transfer_gate.is_held()
    }

    /// The reset settle window is open.
    pub fn is_reset_busy(&self) -> bool {
        self.locks.is_reset_busy()
    }

    /// A sleep or mode-switch settle window is open.
    pub fn is_sleep_busy(&self) -> bool {
        self.locks.is_sleep_busy()
    }

    /// All three busy flags.
    pub fn busy_state(&self) -> BusyState {
        BusyState {
            transfer: self.is_transfer_busy(),
            reset: self.is_reset_busy(),
            sleep: self.is_sleep_busy(),
        }
    }

    /// Current session state.
    pub fn state(&self) -> DisplayState {
        DisplayState::from_flags(self.is_attached(), self.busy_state())
    }

    /// Who armed a settle window, if it is still open.
    pub fn settle_owner(&self, which: SettleLock) -> Option<LockOwner> {
        self.locks.get(which).owner()
    }

    /// Whether a communication session (chip-select window) is open.
    pub fn is_session_open(&self) -> bool {
        self.session.is_held()
    }

    /// Whether a DMA completion is still waiting for its interrupt.
    pub fn has_pending_completion(&self) -> bool {
        self.pending.lock(|p| p.get().is_some())
    }

    /// DMA interrupts ignored because they belonged to another channel.
    pub fn foreign_interrupts(&self) -> u32 {
        self.foreign_irqs.load(Ordering::Relaxed)
    }

    pub(crate) fn locks(&self) -> &SettleLocks {
        &self.locks
    }

    pub(crate) fn transfer_gate(&self) -> &Gate {
        &self.transfer_gate
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }

    pub(crate) fn ensure_attached(&self) -> Result<(), Error> {
        if self.is_attached() {
            Ok(())
        } else {
            Err(Error::NotAttached)
        }
    }

    pub(crate) fn ensure_not_busy(&self) -> Result<(), Error> {
        if self.busy_state().any() {
            Err(Error::Busy)
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Communication session
// ---------------------------------------------------------------------------

impl<CS: OutputPin, DMA, DRAIN> DriverContext<CS, DMA, DRAIN> {
    fn drive_cs(&self, high: bool) -> Result<(), Error> {
        self.cs.lock(|cs| {
            let mut cs = cs.borrow_mut();
            let result = if high { cs.set_high() } else { cs.set_low() };
            result.map_err(|_| Error::Gpio)
        })
    }

    /// Deassert chip-select without touching the session gate.
    pub(crate) fn deselect(&self) -> Result<(), Error> {
        self.drive_cs(true)
    }

    /// Atomically check every busy flag and open the session.
    ///
    /// The check and the session acquisition happen inside one critical
    /// section, so neither the DMA interrupt nor a settle timer can change
    /// the outcome in between.
    pub(crate) fn try_begin_operation(&self) -> Result<(), Error> {
        critical_section::with(|_| {
            self.ensure_attached()?;
            self.ensure_not_busy()?;
            if self.session.try_acquire() {
                Ok(())
            } else {
                Err(Error::Busy)
            }
        })?;
        self.select_or_release()
    }

    /// Open the session, waiting for a DMA-deferred close if necessary.
    pub(crate) fn open_session(&self) -> Result<(), Error> {
        self.session.acquire_blocking();
        self.select_or_release()
    }

    fn select_or_release(&self) -> Result<(), Error> {
        let result = self.drive_cs(false);
        if result.is_err() {
            self.session.release();
        }
        result
    }

    /// Deassert chip-select and release the session.
    pub(crate) fn end_session(&self) -> Result<(), Error> {
        let result = self.drive_cs(true);
        self.session.release();
        result
    }
}

// ---------------------------------------------------------------------------
// DMA engine
// ---------------------------------------------------------------------------

impl<CS, DMA: DmaChannel, DRAIN> DriverContext<CS, DMA, DRAIN> {
    pub(crate) fn install_channel(&self, channel: DMA) {
        self.dma.lock(|dma| {
            dma.borrow_mut().replace(channel);
        });
    }

    pub(crate) fn take_channel(&self) -> Option<DMA> {
        self.dma.lock(|dma| dma.borrow_mut().take())
    }

    fn with_channel<R>(&self, f: impl FnOnce(&mut DMA) -> R) -> Option<R> {
        self.dma.lock(|dma| dma.borrow_mut().as_mut().map(f))
    }

    /// Claim the TransferGate for a DMA transfer and record its completion.
    ///
    /// Transfer busy is covered by the gate acquisition itself; the settle
    /// flags are checked in the same critical section.
    pub(crate) fn try_begin_dma(&self, completion: PendingDmaCompletion) -> Result<(), Error> {
        critical_section::with(|_| {
            self.ensure_attached()?;
            if self.is_reset_busy() || self.is_sleep_busy() {
                return Err(Error::Busy);
            }
            if !self.transfer_gate.try_acquire() {
                return Err(Error::Busy);
            }
            self.pending.lock(|p| p.set(Some(completion)));
            Ok(())
        })
    }

    pub(crate) fn trigger_dma(
        &self,
        source: &'static [u8],
        target: DmaTarget,
        config: DmaTransferConfig,
    ) -> Result<(), Error> {
        self.with_channel(|ch| ch.configure_and_trigger(source, target, config))
            .ok_or(Error::NotAttached)?
            .map_err(|_| Error::Communication)
    }

    /// Undo [`Self::try_begin_dma`] for a transfer that never started.
    pub(crate) fn abandon_dma(&self) {
        self.pending.lock(Cell::take);
        self.transfer_gate.release();
    }

    /// Spin until the channel reports the in-flight transfer finished.
    ///
    /// Each poll takes the channel lock for a single register read, so the
    /// DMA interrupt and the settle timers keep running during the wait.
    pub(crate) fn wait_dma_finished(&self) {
        if !self.transfer_gate.is_held() {
            return;
        }
        while self.with_channel(|ch| ch.is_busy()).unwrap_or(false) {
            core::hint::spin_loop();
        }
    }
}

impl<CS: OutputPin, DMA: DmaChannel, DRAIN: RxDrain> DriverContext<CS, DMA, DRAIN> {
    /// DMA completion interrupt handler.
    ///
    /// Call from the shared DMA IRQ. Steps, in order:
    ///
    /// 1. ignore (and count) IRQs raised by other channels
    /// 2. acknowledge the channel IRQ
    /// 3. drain the stale byte from the bus receive register
    /// 4. close the communication session, if the transfer asked for it
    /// 5. signal the completion target
    /// 6. release the TransferGate
    ///
    /// The gate goes last so that anyone who re-acquires it observes the
    /// session closed and the target signalled.
    pub fn on_dma_interrupt(&self) {
        let ours = self
            .with_channel(|ch| {
                if ch.irq_pending() {
                    ch.acknowledge_irq();
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if !ours {
            self.foreign_irqs.fetch_add(1, Ordering::Relaxed);
            warn!("ignoring DMA irq from unknown channel");
            return;
        }

        self.drain.drain_rx();

        if let Some(completion) = self.pending.lock(Cell::take) {
            if completion.close_comm && self.end_session().is_err() {
                warn!("failed to deassert chip-select after DMA transfer");
            }
            if let Some(target) = completion.target {
                target.signal(());
            }
        }

        self.transfer_gate.release();
    }
}

// ---------------------------------------------------------------------------
// Settle timers
// ---------------------------------------------------------------------------

impl<CS, DMA, DRAIN> TimerSink<SettleLock> for DriverContext<CS, DMA, DRAIN> {
    fn on_timer(&self, token: SettleLock) {
        self.locks.on_elapsed(token);
        trace!("settle window elapsed: {}", token as u8);
    }
}
