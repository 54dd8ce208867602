//! ST7789V command catalogue and frame builder.
//!
//! A frame is one opcode byte sent with DC low, followed by zero or more
//! parameter bytes sent with DC high, all inside one chip-select window.
//! Multi-byte numeric parameters go out big-endian.

use heapless::Vec;

use crate::Error;

/// Largest parameter block any write command takes (VSCRDEF: 6 bytes).
pub const MAX_PARAMS: usize = 8;

/// ST7789V command codes (System Function Command Table 1).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// No operation.
    Nop = 0x00,
    /// Software reset: 0 data bytes; wait 5 ms, and 120 ms before SLPOUT.
    SoftwareReset = 0x01,
    /// Read display ID: dummy cycle, 3 reply bytes.
    ReadDisplayId = 0x04,
    /// Read display status: dummy cycle, 4 reply bytes.
    ReadDisplayStatus = 0x09,
    /// Read display power mode: 1 reply byte.
    ReadPowerMode = 0x0A,
    /// Read MADCTL: 1 reply byte.
    ReadMemoryAccessControl = 0x0B,
    /// Read interface pixel format: 1 reply byte.
    ReadPixelFormat = 0x0C,
    /// Read display image mode: 1 reply byte.
    ReadImageMode = 0x0D,
    /// Read display signal mode: 1 reply byte.
    ReadSignalMode = 0x0E,
    /// Read display self-diagnostic result: 1 reply byte.
    ReadSelfDiagnostic = 0x0F,
    /// Enter sleep: 0 data bytes; wait 5 ms, 120 ms before SLPOUT.
    SleepIn = 0x10,
    /// Exit sleep: 0 data bytes; wait 5 ms, 120 ms before SLPIN.
    SleepOut = 0x11,
    /// Partial display mode on.
    PartialModeOn = 0x12,
    /// Normal display mode on.
    NormalModeOn = 0x13,
    /// Display inversion off.
    InversionOff = 0x20,
    /// Display inversion on.
    InversionOn = 0x21,
    /// Gamma curve select: 1 data byte.
    GammaSet = 0x26,
    /// Display off.
    DisplayOff = 0x28,
    /// Display on.
    DisplayOn = 0x29,
    /// Column address set: 4 data bytes (XS, XE).
    ColumnAddressSet = 0x2A,
    /// Row address set: 4 data bytes (YS, YE).
    RowAddressSet = 0x2B,
    /// Memory write: pixel data.
    MemoryWrite = 0x2C,
    /// Memory read: dummy cycle, then pixel data.
    MemoryRead = 0x2E,
    /// Partial area: 4 data bytes (PSL, PEL).
    PartialArea = 0x30,
    /// Vertical scrolling definition: 6 data bytes (TFA, VSA, BFA).
    VerticalScrollDefinition = 0x33,
    /// Tearing effect line off.
    TearingEffectOff = 0x34,
    /// Tearing effect line on: 1 data byte (TE mode).
    TearingEffectOn = 0x35,
    /// Memory data access control (MADCTL): 1 data byte.
    MemoryAccessControl = 0x36,
    /// Vertical scroll start address: 2 data bytes.
    VerticalScrollStart = 0x37,
    /// Idle mode off.
    IdleModeOff = 0x38,
    /// Idle mode on.
    IdleModeOn = 0x39,
    /// Interface pixel format (COLMOD): 1 data byte.
    PixelFormat = 0x3A,
    /// Memory write continue: pixel data.
    MemoryWriteContinue = 0x3C,
    /// Memory read continue: dummy cycle, then pixel data.
    MemoryReadContinue = 0x3E,
    /// Set tear scanline: 2 data bytes.
    SetTearScanline = 0x44,
    /// Get scanline: dummy cycle, 2 reply bytes.
    GetScanline = 0x45,
    /// Write display brightness: 1 data byte.
    WriteBrightness = 0x51,
    /// Read display brightness: 1 reply byte.
    ReadBrightness = 0x52,
    /// Write CTRL display: 1 data byte.
    WriteCtrlDisplay = 0x53,
    /// Read CTRL display: 1 reply byte.
    ReadCtrlDisplay = 0x54,
    /// Write content adaptive brightness control and colour enhancement: 1 data byte.
    WriteAdaptiveBrightness = 0x55,
    /// Read content adaptive brightness control: 1 reply byte.
    ReadAdaptiveBrightness = 0x56,
    /// Write CABC minimum brightness: 1 data byte.
    WriteCabcMinBrightness = 0x5E,
    /// Read CABC minimum brightness: 1 reply byte.
    ReadCabcMinBrightness = 0x5F,
    /// Read automatic brightness control self-diagnostic result: 1 reply byte.
    ReadAdaptiveSelfDiagnostic = 0x68,
    /// Read ID1 (manufacturer): 1 reply byte.
    ReadId1 = 0xDA,
    /// Read ID2 (module/driver version): 1 reply byte.
    ReadId2 = 0xDB,
    /// Read ID3 (module/driver): 1 reply byte.
    ReadId3 = 0xDC,
}

impl Command {
    /// Wire opcode.
    pub const fn opcode(self) -> u8 {
        self as u8
    }

    /// Whether the reply must be preceded by one dummy clock cycle.
    ///
    /// Multi-byte register reads and memory reads need the extra clock for
    /// the controller to turn the bus around. Single-byte register reads
    /// return data on the next byte boundary.
    pub const fn needs_dummy_cycle(self) -> bool {
        matches!(
            self,
            Self::ReadDisplayId
                | Self::ReadDisplayStatus
                | Self::MemoryRead
                | Self::MemoryReadContinue
                | Self::GetScanline
        )
    }

    /// Whether the controller treats this as a mode change that opens a
    /// settle window.
    pub const fn is_mode_change(self) -> bool {
        matches!(self, Self::SoftwareReset | Self::SleepIn | Self::SleepOut)
    }
}

/// One command ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    params: Vec<u8, MAX_PARAMS>,
}

impl Frame {
    /// Frame without parameters.
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            params: Vec::new(),
        }
    }

    /// Frame with raw parameter bytes.
    ///
    /// Fails with [`Error::OutOfRange`] if more than [`MAX_PARAMS`] bytes are
    /// given.
    pub fn with_params(command: Command, params: &[u8]) -> Result<Self, Error> {
        let params = Vec::from_slice(params).map_err(|_| Error::OutOfRange)?;
        Ok(Self { command, params })
    }

    /// Frame whose parameters are 16-bit words sent MSB first.
    pub fn with_words(command: Command, words: &[u16]) -> Result<Self, Error> {
        let mut params = Vec::new();
        for word in words {
            params
                .extend_from_slice(&word.to_be_bytes())
                .map_err(|_| Error::OutOfRange)?;
        }
        Ok(Self { command, params })
    }

    /// Opcode of this frame.
    pub const fn command(&self) -> Command {
        self.command
    }

    /// Parameter bytes, in wire order.
    pub fn params(&self) -> &[u8] {
        &self.params
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_match_datasheet() {
        assert_eq!(Command::Nop.opcode(), 0x00);
        assert_eq!(Command::SoftwareReset.opcode(), 0x01);
        assert_eq!(Command::ReadDisplayId.opcode(), 0x04);
        assert_eq!(Command::ReadDisplayStatus.opcode(), 0x09);
        assert_eq!(Command::SleepIn.opcode(), 0x10);
        assert_eq!(Command::SleepOut.opcode(), 0x11);
        assert_eq!(Command::ColumnAddressSet.opcode(), 0x2A);
        assert_eq!(Command::RowAddressSet.opcode(), 0x2B);
        assert_eq!(Command::MemoryWrite.opcode(), 0x2C);
        assert_eq!(Command::MemoryRead.opcode(), 0x2E);
        assert_eq!(Command::VerticalScrollDefinition.opcode(), 0x33);
        assert_eq!(Command::MemoryAccessControl.opcode(), 0x36);
        assert_eq!(Command::MemoryWriteContinue.opcode(), 0x3C);
        assert_eq!(Command::MemoryReadContinue.opcode(), 0x3E);
        assert_eq!(Command::ReadAdaptiveSelfDiagnostic.opcode(), 0x68);
        assert_eq!(Command::ReadId3.opcode(), 0xDC);
    }

    #[test]
    fn dummy_cycle_only_for_multi_byte_and_memory_reads() {
        assert!(Command::ReadDisplayId.needs_dummy_cycle());
        assert!(Command::ReadDisplayStatus.needs_dummy_cycle());
        assert!(Command::MemoryRead.needs_dummy_cycle());
        assert!(Command::MemoryReadContinue.needs_dummy_cycle());
        assert!(!Command::ReadPowerMode.needs_dummy_cycle());
        assert!(!Command::ReadBrightness.needs_dummy_cycle());
        assert!(!Command::ReadId1.needs_dummy_cycle());
        assert!(!Command::MemoryWrite.needs_dummy_cycle());
    }

    #[test]
    fn words_are_big_endian() {
        let frame = Frame::with_words(Command::ColumnAddressSet, &[0x0012, 0x01EF]).unwrap();
        assert_eq!(frame.command(), Command::ColumnAddressSet);
        assert_eq!(frame.params(), &[0x00, 0x12, 0x01, 0xEF]);
    }

    #[test]
    fn too_many_params_rejected() {
        assert_eq!(
            Frame::with_params(Command::GammaSet, &[0; MAX_PARAMS + 1]),
            Err(Error::OutOfRange)
        );
        assert_eq!(
            Frame::with_words(Command::VerticalScrollDefinition, &[1, 2, 3, 4, 5]),
            Err(Error::OutOfRange)
        );
        assert!(Frame::with_params(Command::GammaSet, &[0; MAX_PARAMS]).is_ok());
    }

    #[test]
    fn mode_changes() {
        assert!(Command::SoftwareReset.is_mode_change());
        assert!(Command::SleepIn.is_mode_change());
        assert!(Command::SleepOut.is_mode_change());
        assert!(!Command::DisplayOn.is_mode_change());
    }
}
