//! High-level controller operations.
//!
//! Every operation checks the busy flags and opens the communication
//! session in one step, dispatches its frames, closes the session and
//! decodes the reply. Nothing is retried.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use st7789v_platform::{CompletionSignal, DmaChannel, OneShotScheduler, SerialBus, TransferSize};

use super::{be_u32, St7789v};
use crate::command::{Command, Frame};
use crate::registers::{
    AdaptiveBrightness, ContentAdaptiveMode, DisplayControl, DisplayStatus, GammaCurve,
    ImageMode, InterfacePixelFormat, MemoryAccessControl, PowerMode, SelfDiagnostic, SignalMode,
    TearingEffectMode,
};
use crate::settle::SettleLock;
use crate::Error;

/// `0 <= start < end <= boundary`
fn check_window(start: u16, end: u16, boundary: u16) -> Result<(), Error> {
    if start < end && end <= boundary {
        Ok(())
    } else {
        Err(Error::OutOfRange)
    }
}

impl<BUS, CS, DC, DMA, SCHED, DELAY> St7789v<'_, BUS, CS, DC, DMA, SCHED, DELAY>
where
    BUS: SerialBus,
    CS: OutputPin,
    DC: OutputPin,
    DMA: DmaChannel,
    SCHED: OneShotScheduler<SettleLock>,
    DELAY: DelayNs,
{
    fn command(&mut self, frame: &Frame) -> Result<(), Error> {
        self.transaction(|d| d.dispatch(frame))
    }

    fn simple(&mut self, command: Command) -> Result<(), Error> {
        self.command(&Frame::new(command))
    }

    fn read_byte(&mut self, command: Command) -> Result<u8, Error> {
        self.transaction(|d| d.query::<1>(command)).map(|[b]| b)
    }

    /// Last addressable column with the current MADCTL.
    fn column_boundary(&self) -> u16 {
        let extent = if self.madctl.row_column_exchange {
            self.config.panel_height
        } else {
            self.config.panel_width
        };
        extent.saturating_sub(1)
    }

    /// Last addressable row with the current MADCTL.
    fn row_boundary(&self) -> u16 {
        let extent = if self.madctl.row_column_exchange {
            self.config.panel_width
        } else {
            self.config.panel_height
        };
        extent.saturating_sub(1)
    }

    /// Attached and idle. Range checks come after this so a settle window
    /// reports `Busy` before any argument error.
    fn ensure_ready(&self) -> Result<(), Error> {
        self.ctx.ensure_attached()?;
        self.ctx.ensure_not_busy()
    }

    fn last_line(&self) -> u16 {
        self.config.panel_height.saturating_sub(1)
    }

    // -----------------------------------------------------------------------
    // Identification and status
    // -----------------------------------------------------------------------

    /// RDDID: 24-bit display identifier.
    pub fn read_id(&mut self) -> Result<u32, Error> {
        self.transaction(|d| d.query::<3>(Command::ReadDisplayId))
            .map(|reply| be_u32(&reply))
    }

    /// RDDST: 32-bit status word. Refreshes the cached MADCTL.
    pub fn read_status(&mut self) -> Result<DisplayStatus, Error> {
        let raw = self
            .transaction(|d| d.query::<4>(Command::ReadDisplayStatus))
            .map(|reply| be_u32(&reply))?;
        let status = DisplayStatus::from_raw(raw);
        self.madctl = status.memory_access_control();
        Ok(status)
    }

    /// RDDPM
    pub fn read_power_mode(&mut self) -> Result<PowerMode, Error> {
        self.read_byte(Command::ReadPowerMode).map(PowerMode::from_raw)
    }

    /// RDDMADCTL. Refreshes the cached MADCTL.
    pub fn read_memory_access_control(&mut self) -> Result<MemoryAccessControl, Error> {
        let madctl = self
            .read_byte(Command::ReadMemoryAccessControl)
            .map(MemoryAccessControl::from_raw)?;
        self.madctl = madctl;
        Ok(madctl)
    }

    /// RDDCOLMOD
    pub fn read_pixel_format(&mut self) -> Result<InterfacePixelFormat, Error> {
        self.read_byte(Command::ReadPixelFormat)
            .map(InterfacePixelFormat::from_raw)
    }

    /// RDDIM
    pub fn read_image_mode(&mut self) -> Result<ImageMode, Error> {
        self.read_byte(Command::ReadImageMode).map(ImageMode::from_raw)
    }

    /// RDDSM
    pub fn read_signal_mode(&mut self) -> Result<SignalMode, Error> {
        self.read_byte(Command::ReadSignalMode).map(SignalMode::from_raw)
    }

    /// RDDSDR
    pub fn read_self_diagnostic(&mut self) -> Result<SelfDiagnostic, Error> {
        self.read_byte(Command::ReadSelfDiagnostic)
            .map(SelfDiagnostic::from_raw)
    }

    /// RDABCSDR
    pub fn read_adaptive_self_diagnostic(&mut self) -> Result<SelfDiagnostic, Error> {
        self.read_byte(Command::ReadAdaptiveSelfDiagnostic)
            .map(SelfDiagnostic::from_raw)
    }

    /// RDID1: manufacturer id.
    pub fn read_id1(&mut self) -> Result<u8, Error> {
        self.read_byte(Command::ReadId1)
    }

    /// RDID2: module / driver version.
    pub fn read_id2(&mut self) -> Result<u8, Error> {
        self.read_byte(Command::ReadId2)
    }

    /// RDID3: module / driver id.
    pub fn read_id3(&mut self) -> Result<u8, Error> {
        self.read_byte(Command::ReadId3)
    }

    // -----------------------------------------------------------------------
    // Reset and sleep
    // -----------------------------------------------------------------------

    /// SWRESET. Opens the reset and mode-switch settle windows.
    ///
    /// With `wait` the call also blocks for the reset settle time; the
    /// mode-switch window keeps running in the background either way.
    pub fn software_reset(&mut self, wait: bool) -> Result<(), Error> {
        self.transaction(|d| {
            d.dispatch(&Frame::new(Command::SoftwareReset))?;
            d.after_mode_change(Command::SoftwareReset);
            Ok(())
        })?;
        if wait {
            self.delay.delay_ms(self.config.reset_settle_ms);
        }
        Ok(())
    }

    /// SLPIN. Opens the sleep and mode-switch settle windows.
    ///
    /// With `wait` the call blocks until the mode switch has settled.
    pub fn sleep_in(&mut self, wait: bool) -> Result<(), Error> {
        self.sleep_transition(Command::SleepIn, wait)
    }

    /// SLPOUT. Same settle behaviour as [`Self::sleep_in`].
    pub fn sleep_out(&mut self, wait: bool) -> Result<(), Error> {
        self.sleep_transition(Command::SleepOut, wait)
    }

    fn sleep_transition(&mut self, command: Command, wait: bool) -> Result<(), Error> {
        self.transaction(|d| {
            d.dispatch(&Frame::new(command))?;
            d.after_mode_change(command);
            Ok(())
        })?;
        if wait {
            self.delay.delay_ms(self.config.mode_switch_settle_ms);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Display modes
    // -----------------------------------------------------------------------

    /// NOP
    pub fn no_operation(&mut self) -> Result<(), Error> {
        self.simple(Command::Nop)
    }

    /// NORON: leave partial mode.
    pub fn set_normal_mode(&mut self) -> Result<(), Error> {
        self.simple(Command::NormalModeOn)
    }

    /// PTLON: show only the partial area.
    pub fn set_partial_mode(&mut self) -> Result<(), Error> {
        self.simple(Command::PartialModeOn)
    }

    /// INVON / INVOFF
    pub fn set_inversion(&mut self, on: bool) -> Result<(), Error> {
        self.simple(if on {
            Command::InversionOn
        } else {
            Command::InversionOff
        })
    }

    /// GAMSET
    pub fn set_gamma_curve(&mut self, curve: GammaCurve) -> Result<(), Error> {
        self.command(&Frame::with_params(Command::GammaSet, &[curve.param()])?)
    }

    /// DISPON / DISPOFF
    pub fn set_display_on(&mut self, on: bool) -> Result<(), Error> {
        self.simple(if on {
            Command::DisplayOn
        } else {
            Command::DisplayOff
        })
    }

    /// IDMON / IDMOFF
    pub fn set_idle_mode(&mut self, on: bool) -> Result<(), Error> {
        self.simple(if on {
            Command::IdleModeOn
        } else {
            Command::IdleModeOff
        })
    }

    /// MADCTL. Updates the cached copy used for window bounds.
    pub fn set_memory_access_control(&mut self, madctl: MemoryAccessControl) -> Result<(), Error> {
        self.command(&Frame::with_params(
            Command::MemoryAccessControl,
            &[madctl.raw()],
        )?)?;
        self.madctl = madctl;
        Ok(())
    }

    /// COLMOD
    pub fn set_pixel_format(&mut self, format: InterfacePixelFormat) -> Result<(), Error> {
        self.command(&Frame::with_params(Command::PixelFormat, &[format.raw()])?)
    }

    // -----------------------------------------------------------------------
    // Address windows and scrolling
    // -----------------------------------------------------------------------

    /// CASET. `start < end <= 239`, or `<= 319` with row/column exchange.
    ///
    /// Bounds follow the datasheet's MV mapping; the inclusive `<= 320`
    /// limit with MV swapped that some driver headers document is not used.
    pub fn set_column_window(&mut self, start: u16, end: u16) -> Result<(), Error> {
        self.ensure_ready()?;
        check_window(start, end, self.column_boundary())?;
        self.command(&Frame::with_words(Command::ColumnAddressSet, &[start, end])?)
    }

    /// RASET. `start < end <= 319`, or `<= 239` with row/column exchange.
    pub fn set_row_window(&mut self, start: u16, end: u16) -> Result<(), Error> {
        self.ensure_ready()?;
        check_window(start, end, self.row_boundary())?;
        self.command(&Frame::with_words(Command::RowAddressSet, &[start, end])?)
    }

    /// PTLAR. Both rows must lie on the panel; `start > end` wraps.
    pub fn set_partial_area(&mut self, start_row: u16, end_row: u16) -> Result<(), Error> {
        self.ensure_ready()?;
        let last = self.last_line();
        if start_row > last || end_row > last {
            return Err(Error::OutOfRange);
        }
        self.command(&Frame::with_words(Command::PartialArea, &[start_row, end_row])?)
    }

    /// VSCRDEF. The three areas must cover the panel's scan lines exactly.
    ///
    /// Vertical scrolling is undefined with row/column exchange active, so
    /// that configuration returns [`Error::Unavailable`].
    pub fn set_vertical_scroll_definition(
        &mut self,
        top_fixed: u16,
        scroll: u16,
        bottom_fixed: u16,
    ) -> Result<(), Error> {
        self.ensure_ready()?;
        if self.madctl.row_column_exchange {
            return Err(Error::Unavailable);
        }
        let total = u32::from(top_fixed)
            .saturating_add(u32::from(scroll))
            .saturating_add(u32::from(bottom_fixed));
        if total != u32::from(self.config.panel_height) {
            return Err(Error::OutOfRange);
        }
        self.command(&Frame::with_words(
            Command::VerticalScrollDefinition,
            &[top_fixed, scroll, bottom_fixed],
        )?)
    }

    /// VSCSAD: first line of the scroll area shown at the top.
    pub fn set_vertical_scroll_start(&mut self, line: u16) -> Result<(), Error> {
        self.ensure_ready()?;
        if self.madctl.row_column_exchange {
            return Err(Error::Unavailable);
        }
        if line > self.last_line() {
            return Err(Error::OutOfRange);
        }
        self.command(&Frame::with_words(Command::VerticalScrollStart, &[line])?)
    }

    // -----------------------------------------------------------------------
    // Frame memory
    // -----------------------------------------------------------------------

    /// RAMWR (or RAMWRC with `continue_`) followed by `data`.
    pub fn memory_write(&mut self, data: &[u8], continue_: bool) -> Result<(), Error> {
        let command = if continue_ {
            Command::MemoryWriteContinue
        } else {
            Command::MemoryWrite
        };
        self.transaction(|d| {
            d.dispatch(&Frame::new(command))?;
            if data.is_empty() {
                return Ok(());
            }
            d.write_raw(data)
        })
    }

    /// RAMWRC: resume writing where the last memory write stopped.
    pub fn memory_write_continue(&mut self, data: &[u8]) -> Result<(), Error> {
        self.memory_write(data, true)
    }

    /// RAMRD (or RAMRDC with `continue_`) into `buffer`.
    pub fn memory_read(&mut self, buffer: &mut [u8], continue_: bool) -> Result<(), Error> {
        let command = if continue_ {
            Command::MemoryReadContinue
        } else {
            Command::MemoryRead
        };
        self.transaction(|d| {
            d.dispatch(&Frame::new(command))?;
            d.pulse_raw()?;
            d.read_raw(buffer)
        })
    }

    /// RAMRDC: resume reading where the last memory read stopped.
    pub fn memory_read_continue(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        self.memory_read(buffer, true)
    }

    /// RAMWR (or RAMWRC with `continue_`) followed by a DMA write of
    /// `buffer`.
    ///
    /// Returns once the transfer is started. The session stays open until
    /// the DMA interrupt closes it and signals `target`. A frame larger than
    /// one DMA block is sent as a first chunk followed by continued chunks.
    pub fn memory_write_async(
        &mut self,
        buffer: &'static [u8],
        target: Option<&'static CompletionSignal>,
        continue_: bool,
    ) -> Result<(), Error> {
        let command = if continue_ {
            Command::MemoryWriteContinue
        } else {
            Command::MemoryWrite
        };
        self.ctx.try_begin_operation()?;
        let result = self
            .dispatch(&Frame::new(command))
            .and_then(|()| self.dma_write(buffer, TransferSize::Byte, target, true));
        if let Err(e) = result {
            // The interrupt will not run, so close the session here.
            if self.ctx.end_session().is_err() {
                warn!("failed to deassert chip-select after aborted DMA write");
            }
            return Err(e);
        }
        Ok(())
    }

    /// RAMWRC through DMA: resume where the previous chunk stopped.
    pub fn memory_write_async_continue(
        &mut self,
        buffer: &'static [u8],
        target: Option<&'static CompletionSignal>,
    ) -> Result<(), Error> {
        self.memory_write_async(buffer, target, true)
    }

    // -----------------------------------------------------------------------
    // Tearing effect
    // -----------------------------------------------------------------------

    /// TEON with `mode`, or TEOFF for `None`.
    pub fn set_tearing_effect(&mut self, mode: Option<TearingEffectMode>) -> Result<(), Error> {
        match mode {
            Some(mode) => self.command(&Frame::with_params(
                Command::TearingEffectOn,
                &[mode as u8],
            )?),
            None => self.simple(Command::TearingEffectOff),
        }
    }

    /// TESCAN: scanline at which the TE output fires.
    pub fn set_tearing_scanline(&mut self, line: u16) -> Result<(), Error> {
        self.ensure_ready()?;
        if line > self.last_line() {
            return Err(Error::OutOfRange);
        }
        self.command(&Frame::with_words(Command::SetTearScanline, &[line])?)
    }

    /// RDTESCAN: scanline currently being refreshed.
    pub fn read_scanline(&mut self) -> Result<u16, Error> {
        self.transaction(|d| d.query::<2>(Command::GetScanline))
            .map(u16::from_be_bytes)
    }

    // -----------------------------------------------------------------------
    // Brightness and CABC
    // -----------------------------------------------------------------------

    /// WRDISBV
    pub fn set_brightness(&mut self, level: u8) -> Result<(), Error> {
        self.command(&Frame::with_params(Command::WriteBrightness, &[level])?)
    }

    /// RDDISBV
    pub fn read_brightness(&mut self) -> Result<u8, Error> {
        self.read_byte(Command::ReadBrightness)
    }

    /// WRCTRLD
    pub fn set_display_control(&mut self, control: DisplayControl) -> Result<(), Error> {
        self.command(&Frame::with_params(
            Command::WriteCtrlDisplay,
            &[control.raw()],
        )?)
    }

    /// RDCTRLD
    pub fn read_display_control(&mut self) -> Result<DisplayControl, Error> {
        self.read_byte(Command::ReadCtrlDisplay)
            .map(DisplayControl::from_raw)
    }

    /// WRCACE
    pub fn set_adaptive_brightness(&mut self, setting: AdaptiveBrightness) -> Result<(), Error> {
        self.command(&Frame::with_params(
            Command::WriteAdaptiveBrightness,
            &[setting.raw()],
        )?)
    }

    /// RDCABC: only the content type is reported back.
    pub fn read_adaptive_brightness(&mut self) -> Result<ContentAdaptiveMode, Error> {
        self.read_byte(Command::ReadAdaptiveBrightness)
            .map(ContentAdaptiveMode::from_bits)
    }

    /// WRCABCMB
    pub fn set_cabc_min_brightness(&mut self, level: u8) -> Result<(), Error> {
        self.command(&Frame::with_params(
            Command::WriteCabcMinBrightness,
            &[level],
        )?)
    }

    /// RDCABCMB
    pub fn read_cabc_min_brightness(&mut self) -> Result<u8, Error> {
        self.read_byte(Command::ReadCabcMinBrightness)
    }
}

#[cfg(test)]
mod tests {
    use super::check_window;
    use crate::Error;
    use proptest::prelude::*;

    #[test]
    fn window_bounds_are_inclusive_at_boundary() {
        assert_eq!(check_window(0, 239, 239), Ok(()));
        assert_eq!(check_window(0, 240, 239), Err(Error::OutOfRange));
        assert_eq!(check_window(10, 10, 239), Err(Error::OutOfRange), "start must be below end");
        assert_eq!(check_window(11, 10, 239), Err(Error::OutOfRange));
    }

    proptest! {
        #[test]
        fn window_accepted_iff_ordered_and_in_bounds(start in 0u16..400, end in 0u16..400) {
            let ok = check_window(start, end, 319).is_ok();
            prop_assert_eq!(ok, start < end && end <= 319);
        }
    }
}
