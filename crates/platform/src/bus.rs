//! Serial bus abstraction
//!
//! Blocking, half-duplex byte transport used by display controllers that
//! speak a 4-wire serial protocol (SCK, MOSI/MISO, CS, DC). Chip-select and
//! the data/command line are plain [`embedded_hal::digital::OutputPin`]s and
//! are not part of this trait.
//!
//! # Dummy cycles
//!
//! Some controllers need a single clock edge between the command byte and the
//! reply so their internal state machine can turn the bus around. SPI
//! peripherals only clock in whole frames, so [`SerialBus::pulse_clock`] is
//! usually implemented by briefly re-muxing SCK to a GPIO and toggling it.

/// Where a DMA engine must point its write address to feed this bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaTarget {
    /// Address of the bus transmit data register.
    pub register: usize,
    /// DMA request line (DREQ) that paces transfers into the register.
    pub dreq: u8,
}

/// Interrupt-safe access to a bus receive data register.
///
/// Held by interrupt handlers that must not take ownership of the bus
/// itself. On hardware this is a volatile read of the data register and
/// needs no exclusive access.
pub trait RxDrain {
    /// Read and discard the receive data register.
    ///
    /// Needed after DMA-fed writes, which leave a stale byte in the receive
    /// FIFO that would otherwise be returned by the next read.
    fn drain_rx(&self);
}

/// Blocking serial transport
pub trait SerialBus {
    /// Error type
    type Error: core::fmt::Debug;

    /// Handle to this bus's receive register for interrupt context.
    type Drain: RxDrain + Send + Sync;

    /// Reconfigure the bus clock. Returns the rate actually achieved.
    fn set_baud_rate(&mut self, hz: u32) -> Result<u32, Self::Error>;

    /// Write all bytes, returning once they left the transmit FIFO.
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Clock `buffer.len()` bytes in while repeatedly sending `fill`.
    fn read_blocking(&mut self, fill: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// `true` while a frame is still being shifted out or in.
    fn is_busy(&self) -> bool;

    /// Issue exactly one clock pulse with no data movement.
    fn pulse_clock(&mut self) -> Result<(), Self::Error>;

    /// Transmit register and request line for DMA-fed writes.
    fn dma_target(&self) -> DmaTarget;

    /// Create a [`RxDrain`] handle for this bus.
    fn rx_drain(&self) -> Self::Drain;
}
