//! DMA abstraction layer
//!
//! One-shot memory-to-peripheral block transfers with interrupt-driven
//! completion. The channel is claimed from a [`DmaPool`] at driver
//! initialisation and handed back on teardown.
//!
//! Completion is reported twice: the channel raises its IRQ (the driver's
//! interrupt handler acknowledges it), and the handler may then signal a
//! [`CompletionSignal`] that a task is waiting on.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::bus::DmaTarget;

/// Notification handle signalled from interrupt context when a transfer ends.
///
/// Lives in a `static`; `Signal::new()` is `const`.
pub type CompletionSignal = Signal<CriticalSectionRawMutex, ()>;

/// Width of one DMA element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferSize {
    /// 8-bit elements
    Byte,
    /// 16-bit elements
    HalfWord,
    /// 32-bit elements
    Word,
}

impl TransferSize {
    /// Element width in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::HalfWord => 2,
            Self::Word => 4,
        }
    }
}

/// Channel configuration for one block transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaTransferConfig {
    /// Element width
    pub size: TransferSize,
    /// Number of elements (not bytes)
    pub count: usize,
    /// Advance the read address after each element
    pub increment_read: bool,
    /// Advance the write address after each element
    pub increment_write: bool,
}

impl DmaTransferConfig {
    /// Memory-to-peripheral: walking source, fixed destination register.
    pub const fn to_peripheral(size: TransferSize, count: usize) -> Self {
        Self {
            size,
            count,
            increment_read: true,
            increment_write: false,
        }
    }
}

/// DMA channel abstraction
pub trait DmaChannel {
    /// Error type
    type Error: core::fmt::Debug;

    /// Channel number, for logging.
    fn id(&self) -> u8;

    /// Configure the channel and start the transfer immediately.
    ///
    /// `source` must stay valid until completion, hence `'static`.
    fn configure_and_trigger(
        &mut self,
        source: &'static [u8],
        target: DmaTarget,
        config: DmaTransferConfig,
    ) -> Result<(), Self::Error>;

    /// `true` while the channel is still moving data.
    fn is_busy(&self) -> bool;

    /// Spin until the hardware reports the transfer finished.
    fn wait_for_finish_blocking(&mut self) {
        while self.is_busy() {
            core::hint::spin_loop();
        }
    }

    /// `true` if this channel has raised its completion IRQ.
    fn irq_pending(&self) -> bool;

    /// Clear this channel's completion IRQ.
    fn acknowledge_irq(&mut self);

    /// Route (or stop routing) this channel's completion IRQ to the CPU.
    fn set_irq_enabled(&mut self, enabled: bool);
}

/// Source of free DMA channels
pub trait DmaPool {
    /// Channel type handed out by this pool
    type Channel: DmaChannel;

    /// Claim any unused channel, or `None` if all are taken.
    fn claim_unused(&mut self) -> Option<Self::Channel>;

    /// Return a previously claimed channel.
    fn unclaim(&mut self, channel: Self::Channel);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_size_widths() {
        assert_eq!(TransferSize::Byte.bytes(), 1);
        assert_eq!(TransferSize::HalfWord.bytes(), 2);
        assert_eq!(TransferSize::Word.bytes(), 4);
    }

    #[test]
    fn to_peripheral_walks_source_only() {
        let cfg = DmaTransferConfig::to_peripheral(TransferSize::HalfWord, 16);
        assert!(cfg.increment_read, "source address must advance");
        assert!(!cfg.increment_write, "data register address must stay fixed");
        assert_eq!(cfg.count, 16);
    }

    #[test]
    fn completion_signal_latches_until_taken() {
        static DONE: CompletionSignal = CompletionSignal::new();
        assert!(!DONE.signaled());

        DONE.signal(());
        DONE.signal(());
        assert!(DONE.signaled(), "signal stays set until a waiter takes it");
        assert_eq!(DONE.try_take(), Some(()));
        assert!(!DONE.signaled(), "repeated signals collapse into one");
        assert_eq!(DONE.try_take(), None);
    }
}
