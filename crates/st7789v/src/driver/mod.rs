//! ST7789V driver: thread half.
//!
//! [`St7789v`] owns the bus, the DC line, the settle scheduler and the
//! blocking delay, and borrows the interrupt-visible [`DriverContext`].
//!
//! # Wiring (4-line serial interface I)
//!
//! | Signal | Driver side                    | Direction      |
//! |--------|--------------------------------|----------------|
//! | SCL    | `SerialBus` (SCK)              | Host → Display |
//! | SDA    | `SerialBus` (MOSI / MISO)      | Bidirectional  |
//! | CSX    | `DriverContext` (`OutputPin`)  | Host → Display |
//! | WRX/DC | `St7789v` (`OutputPin`)        | Host → Display |
//!
//! # Frames
//!
//! ```text
//! CS  ‾‾\_______________________________________/‾‾
//! DC  ____/‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾
//!     [opcode][param 0][param 1] ...
//! ```
//!
//! Reads that need a dummy cycle issue one bare clock pulse between the
//! opcode and the reply without releasing chip-select.

mod ops;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use st7789v_platform::{
    CompletionSignal, DmaChannel, DmaPool, DmaTransferConfig, OneShotScheduler, SerialBus,
    TransferSize,
};

use crate::command::{Command, Frame};
use crate::context::{DriverContext, PendingDmaCompletion};
use crate::registers::{DisplayStatus, MemoryAccessControl};
use crate::settle::SettleLock;
use crate::{Config, DisplayState, Error};

/// Context type matching a given bus.
pub type ContextFor<BUS, CS, DMA> = DriverContext<CS, DMA, <BUS as SerialBus>::Drain>;

/// ST7789V display driver.
///
/// Generic over:
/// - `BUS`: a [`SerialBus`] carrying SCK and data.
/// - `CS`: chip-select [`OutputPin`], held by the context.
/// - `DC`: data/command [`OutputPin`].
/// - `DMA`: the [`DmaChannel`] type handed out by the platform's [`DmaPool`].
/// - `SCHED`: a [`OneShotScheduler`] that releases settle windows.
/// - `DELAY`: [`DelayNs`] for the optional inline waits.
pub struct St7789v<'c, BUS: SerialBus, CS, DC, DMA, SCHED, DELAY> {
    ctx: &'c ContextFor<BUS, CS, DMA>,
    bus: BUS,
    dc: DC,
    scheduler: SCHED,
    delay: DELAY,
    config: Config,
    /// Last MADCTL written or read back; decides window bounds.
    madctl: MemoryAccessControl,
}

impl<'c, BUS, CS, DC, DMA, SCHED, DELAY> St7789v<'c, BUS, CS, DC, DMA, SCHED, DELAY>
where
    BUS: SerialBus,
    CS: OutputPin,
    DC: OutputPin,
    DMA: DmaChannel,
    SCHED: OneShotScheduler<SettleLock>,
    DELAY: DelayNs,
{
    /// Create a detached driver. Call [`Self::init`] before anything else.
    pub fn new(
        ctx: &'c ContextFor<BUS, CS, DMA>,
        bus: BUS,
        dc: DC,
        scheduler: SCHED,
        delay: DELAY,
        config: Config,
    ) -> Self {
        Self {
            ctx,
            bus,
            dc,
            scheduler,
            delay,
            config,
            madctl: MemoryAccessControl::default(),
        }
    }

    /// Release the owned resources.
    pub fn release(self) -> (BUS, DC, SCHED, DELAY) {
        (self.bus, self.dc, self.scheduler, self.delay)
    }

    /// Shared context.
    pub fn context(&self) -> &'c ContextFor<BUS, CS, DMA> {
        self.ctx
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current session state.
    pub fn state(&self) -> DisplayState {
        self.ctx.state()
    }

    /// Cached MADCTL used for window bounds.
    pub fn memory_access_control(&self) -> MemoryAccessControl {
        self.madctl
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Claim a DMA channel, reset the controller and verify its identity.
    ///
    /// On success the driver is attached; the reset's mode-switch window is
    /// still open, so use [`Self::wait_idle`] before the first command. On
    /// failure the channel is returned to `pool` and the driver stays
    /// detached.
    pub fn init<P>(&mut self, pool: &mut P) -> Result<(), Error>
    where
        P: DmaPool<Channel = DMA>,
    {
        if self.ctx.is_attached() {
            self.deinit(pool)?;
        }

        let Some(mut channel) = pool.claim_unused() else {
            error!("no DMA channel available");
            return Err(Error::ResourceUnavailable);
        };
        info!("using DMA channel {}", channel.id());
        channel.set_irq_enabled(true);
        self.ctx.install_channel(channel);

        if let Err(e) = self.identify() {
            self.return_channel(pool);
            return Err(e);
        }
        Ok(())
    }

    fn identify(&mut self) -> Result<(), Error> {
        self.ctx.deselect()?;
        self.dc.set_high().map_err(|_| Error::Gpio)?;
        self.bus
            .set_baud_rate(self.config.write_baud_rate)
            .map_err(|_| Error::Communication)?;

        // Busy checks are bypassed: the reset's own settle windows are open.
        self.unchecked(|d| {
            d.dispatch(&Frame::new(Command::SoftwareReset))?;
            d.after_mode_change(Command::SoftwareReset);
            Ok(())
        })?;
        self.delay.delay_ms(self.config.reset_settle_ms);

        let id = self.unchecked(|d| d.query::<3>(Command::ReadDisplayId).map(|r| be_u32(&r)))?;
        if id != self.config.expected_id {
            warn!("invalid display id received: {:#x}", id);
            return Err(Error::NotAttached);
        }

        let status =
            self.unchecked(|d| d.query::<4>(Command::ReadDisplayStatus).map(|r| be_u32(&r)))?;
        self.madctl = DisplayStatus::from_raw(status).memory_access_control();
        self.ctx.set_attached(true);
        info!("found ST7789V display, id {:#x}", id);
        Ok(())
    }

    /// Detach and return the DMA channel to `pool`.
    ///
    /// Refused with [`Error::Busy`] while a transfer is in flight, since
    /// transfers cannot be cancelled.
    pub fn deinit<P>(&mut self, pool: &mut P) -> Result<(), Error>
    where
        P: DmaPool<Channel = DMA>,
    {
        if self.ctx.is_transfer_busy() {
            return Err(Error::Busy);
        }
        self.ctx.set_attached(false);
        self.return_channel(pool);
        info!("display detached");
        Ok(())
    }

    fn return_channel<P>(&mut self, pool: &mut P)
    where
        P: DmaPool<Channel = DMA>,
    {
        if let Some(mut channel) = self.ctx.take_channel() {
            channel.set_irq_enabled(false);
            pool.unclaim(channel);
        }
    }

    /// Poll until every busy flag clears.
    ///
    /// Polls every `idle_poll_ms`; after `max_idle_polls` attempts returns
    /// `Err(Error::Busy)`.
    pub fn wait_idle(&mut self) -> Result<(), Error> {
        self.ctx.ensure_attached()?;
        for _ in 0..self.config.max_idle_polls {
            if !self.ctx.busy_state().any() {
                return Ok(());
            }
            self.delay.delay_ms(self.config.idle_poll_ms);
        }
        self.ctx.ensure_not_busy()
    }

    // -----------------------------------------------------------------------
    // Synchronous transfer engine
    // -----------------------------------------------------------------------

    fn write_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        let gate = self.ctx.transfer_gate();
        gate.acquire_blocking();
        let result = self
            .bus
            .set_baud_rate(self.config.write_baud_rate)
            .and_then(|_| self.bus.write_blocking(data))
            .map_err(|_| Error::Communication);
        gate.release();
        result
    }

    fn read_raw(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        let gate = self.ctx.transfer_gate();
        gate.acquire_blocking();
        let result = self
            .bus
            .set_baud_rate(self.config.read_baud_rate)
            .and_then(|_| self.bus.read_blocking(self.config.read_fill_byte, buffer))
            .map_err(|_| Error::Communication);
        gate.release();
        result
    }

    fn pulse_raw(&mut self) -> Result<(), Error> {
        let gate = self.ctx.transfer_gate();
        gate.acquire_blocking();
        while self.bus.is_busy() {
            core::hint::spin_loop();
        }
        let result = self.bus.pulse_clock().map_err(|_| Error::Communication);
        gate.release();
        result
    }

    /// Write bytes at the write baud rate.
    ///
    /// Fails with `NotAttached` before `init`, and with `Busy` while a
    /// transfer or settle window is open.
    pub fn write_sync(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ctx.ensure_attached()?;
        self.ctx.ensure_not_busy()?;
        self.write_raw(data)
    }

    /// Fill `buffer` at the read baud rate.
    ///
    /// Same preconditions as [`Self::write_sync`].
    pub fn read_sync(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        self.ctx.ensure_attached()?;
        self.ctx.ensure_not_busy()?;
        self.read_raw(buffer)
    }

    /// One bare clock pulse, for hand-built reads.
    pub fn dummy_cycle(&mut self) -> Result<(), Error> {
        self.ctx.ensure_attached()?;
        self.ctx.ensure_not_busy()?;
        self.pulse_raw()
    }

    // -----------------------------------------------------------------------
    // DMA engine
    // -----------------------------------------------------------------------

    /// Start a DMA write of `buffer` and return immediately.
    ///
    /// The TransferGate stays held until the DMA interrupt runs. When
    /// `close_comm` is set the interrupt also ends the open communication
    /// session; `target` is signalled last.
    ///
    /// `buffer` must be a non-empty whole number of `size` elements.
    pub fn dma_write(
        &mut self,
        buffer: &'static [u8],
        size: TransferSize,
        target: Option<&'static CompletionSignal>,
        close_comm: bool,
    ) -> Result<(), Error> {
        self.ctx.ensure_attached()?;
        let unit = size.bytes();
        let count = match (buffer.len().checked_div(unit), buffer.len().checked_rem(unit)) {
            (Some(n), Some(0)) if n > 0 => n,
            _ => return Err(Error::OutOfRange),
        };

        self.ctx.try_begin_dma(PendingDmaCompletion { target, close_comm })?;
        let result = self
            .bus
            .set_baud_rate(self.config.write_baud_rate)
            .map_err(|_| Error::Communication)
            .and_then(|_| {
                let dst = self.bus.dma_target();
                self.ctx
                    .trigger_dma(buffer, dst, DmaTransferConfig::to_peripheral(size, count))
            });
        if result.is_err() {
            self.ctx.abandon_dma();
        }
        result
    }

    /// Block until any in-flight DMA transfer has fully completed.
    ///
    /// Waits for the hardware, then for the bus to drain, then takes and
    /// returns the TransferGate. Because the interrupt handler releases the
    /// gate last, returning implies its cleanup has run.
    pub fn sync_dma_operation(&mut self) -> Result<(), Error> {
        self.ctx.ensure_attached()?;
        let gate = self.ctx.transfer_gate();
        if !gate.is_held() {
            return Ok(());
        }
        self.ctx.wait_dma_finished();
        while self.bus.is_busy() {
            core::hint::spin_loop();
        }
        gate.acquire_blocking();
        gate.release();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Command framing
    // -----------------------------------------------------------------------

    /// Assert chip-select and open a communication session.
    ///
    /// Blocks while a DMA transfer still owns the session.
    pub fn begin_comm(&mut self) -> Result<(), Error> {
        self.ctx.ensure_attached()?;
        self.ctx.open_session()
    }

    /// Deassert chip-select and close the communication session.
    pub fn end_comm(&mut self) -> Result<(), Error> {
        self.ctx.end_session()
    }

    /// DC low: following bytes are an opcode.
    pub fn begin_command(&mut self) -> Result<(), Error> {
        self.dc.set_low().map_err(|_| Error::Gpio)
    }

    /// DC high: following bytes are parameters or pixel data.
    pub fn end_command(&mut self) -> Result<(), Error> {
        self.dc.set_high().map_err(|_| Error::Gpio)
    }

    /// Send `command` followed by `params` inside an already open session.
    ///
    /// SWRESET, SLPIN and SLPOUT open their settle windows here as well.
    pub fn send_command_sync(&mut self, command: Command, params: &[u8]) -> Result<(), Error> {
        self.ctx.ensure_attached()?;
        self.ctx.ensure_not_busy()?;
        self.begin_command()?;
        self.write_raw(&[command.opcode()])?;
        self.end_command()?;
        if !params.is_empty() {
            self.write_raw(params)?;
        }
        self.after_mode_change(command);
        Ok(())
    }

    /// Open the settle windows of a mode change just sent. SWRESET also
    /// restores the default MADCTL.
    fn after_mode_change(&mut self, command: Command) {
        let armed = self
            .ctx
            .locks()
            .arm_for(command, &mut self.scheduler, &self.config);
        if armed && command == Command::SoftwareReset {
            self.madctl = MemoryAccessControl::default();
        }
    }

    fn dispatch(&mut self, frame: &Frame) -> Result<(), Error> {
        self.begin_command()?;
        self.write_raw(&[frame.command().opcode()])?;
        self.end_command()?;
        if frame.params().is_empty() {
            return Ok(());
        }
        self.write_raw(frame.params())
    }

    /// Send `command` and read its `N`-byte reply.
    fn query<const N: usize>(&mut self, command: Command) -> Result<[u8; N], Error> {
        self.dispatch(&Frame::new(command))?;
        if command.needs_dummy_cycle() {
            self.pulse_raw()?;
        }
        let mut reply = [0u8; N];
        self.read_raw(&mut reply)?;
        Ok(reply)
    }

    /// Run `f` inside a session opened after an atomic busy check.
    ///
    /// The session is closed whether or not `f` succeeds.
    fn transaction<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R, Error>) -> Result<R, Error> {
        self.ctx.try_begin_operation()?;
        let result = f(self);
        let closed = self.ctx.end_session();
        let value = result?;
        closed.map(|()| value)
    }

    /// Like [`Self::transaction`] but skips every check.
    fn unchecked<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R, Error>) -> Result<R, Error> {
        self.ctx.open_session()?;
        let result = f(self);
        let closed = self.ctx.end_session();
        let value = result?;
        closed.map(|()| value)
    }
}

/// Assemble up to four reply bytes MSB first.
pub(crate) fn be_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    let skip = word.len().saturating_sub(bytes.len());
    for (dst, src) in word.iter_mut().skip(skip).zip(bytes) {
        *dst = *src;
    }
    u32::from_be_bytes(word)
}
