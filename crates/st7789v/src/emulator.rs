//! Simulated ST7789V panel
//!
//! [`SimPanel`] models the controller end of the 4-line serial interface:
//! chip-select and DC levels, the opcode/parameter state machine, the
//! dummy-cycle turnaround, the readable registers and a 240×320 RGB565
//! frame memory. Every transport trait the driver consumes has a handle type
//! here, all sharing one panel:
//!
//! | Handle        | Implements                     |
//! |---------------|--------------------------------|
//! | [`SimBus`]    | `SerialBus`                    |
//! | [`SimDrain`]  | `RxDrain`                      |
//! | [`SimPin`]    | `OutputPin` (CS or DC)         |
//! | [`SimDma`]    | `DmaChannel`                   |
//! | [`SimDmaPool`]| `DmaPool`                      |
//!
//! A DMA transfer reports busy for one `is_busy` poll and completes on the
//! next, or stays in flight until [`SimPanel::complete_dma`] while
//! [`SimPanel::hold_dma`] is set. The completion IRQ is then pending until
//! the test runs the driver's interrupt handler.
//!
//! Everything the panel sees is appended to a wire log of [`WireEvent`]s.

// Desktop-only model: cursor and bit arithmetic is bounded by the panel size.
#![allow(clippy::arithmetic_side_effects)]

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, OutputPin};
use st7789v_platform::{
    DmaChannel, DmaPool, DmaTarget, DmaTransferConfig, RxDrain, SerialBus,
};

use crate::command::Command;
use crate::config::{DISPLAY_ID, PANEL_HEIGHT, PANEL_WIDTH};
use crate::registers::GammaCurve;

/// Data register address reported by [`SimBus::dma_target`].
pub const SIM_DATA_REGISTER: usize = 0x4003_c008;
/// DMA request line reported by [`SimBus::dma_target`].
pub const SIM_DREQ: u8 = 16;

const BYTES_PER_PIXEL: usize = 2;
const GRAM_SIZE: usize = PANEL_WIDTH as usize * PANEL_HEIGHT as usize * BYTES_PER_PIXEL;

/// One observable event on the simulated wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// CSX driven low
    Select,
    /// CSX driven high
    Deselect,
    /// Byte clocked in with DC low
    Command(u8),
    /// Bytes clocked in with DC high, one entry per write
    Data(Vec<u8>),
    /// Bytes clocked out to the host
    Read(Vec<u8>),
    /// Bare dummy clock
    Pulse,
    /// Bus clock changed
    Baud(u32),
    /// DMA transfer of this many bytes triggered
    DmaStart(usize),
    /// DMA transfer finished in hardware
    DmaDone,
}

/// Injected transport fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Cs,
    Dc,
}

/// Pixel cursor within the current address window.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    col: u16,
    row: u16,
    byte: usize,
}

struct Transfer {
    source: &'static [u8],
    target: DmaTarget,
}

struct PanelState {
    // Lines
    cs_low: bool,
    dc_high: bool,
    baud: u32,

    // Command state machine
    current: Option<u8>,
    params: Vec<u8>,
    pulsed: bool,
    reply: Vec<u8>,
    reply_pos: usize,

    // Controller registers
    id: u32,
    written: BTreeMap<u8, Vec<u8>>,
    madctl: u8,
    colmod: u8,
    sleep_out: bool,
    display_on: bool,
    partial: bool,
    inversion: bool,
    idle: bool,
    tearing: Option<u8>,
    gamma: u8,
    brightness: u8,
    ctrl: u8,
    cabc: u8,
    cabc_min: u8,
    scanline: u16,

    // Frame memory
    gram: Vec<u8>,
    columns: (u16, u16),
    rows: (u16, u16),
    write_cursor: Cursor,
    read_cursor: Cursor,

    // DMA
    channels_free: Vec<u8>,
    in_flight: Option<Transfer>,
    busy_polls: u32,
    hold_dma: bool,
    polls_seen: u32,
    irq_pending: bool,
    irq_enabled: bool,
    dma_fault: bool,

    drains: u32,
    wire: Vec<WireEvent>,
}

impl PanelState {
    fn new(id: u32, channels: u8) -> Self {
        Self {
            cs_low: false,
            dc_high: false,
            baud: 0,
            current: None,
            params: Vec::new(),
            pulsed: false,
            reply: Vec::new(),
            reply_pos: 0,
            id,
            written: BTreeMap::new(),
            madctl: 0,
            colmod: 0x66,
            sleep_out: false,
            display_on: false,
            partial: false,
            inversion: false,
            idle: false,
            tearing: None,
            gamma: GammaCurve::Gamma2_2.param(),
            brightness: 0,
            ctrl: 0,
            cabc: 0,
            cabc_min: 0,
            scanline: 0,
            gram: vec![0; GRAM_SIZE],
            columns: (0, PANEL_WIDTH - 1),
            rows: (0, PANEL_HEIGHT - 1),
            write_cursor: Cursor::default(),
            read_cursor: Cursor::default(),
            channels_free: (0..channels).rev().collect(),
            in_flight: None,
            busy_polls: 0,
            hold_dma: false,
            polls_seen: 0,
            irq_pending: false,
            irq_enabled: false,
            dma_fault: false,
            drains: 0,
            wire: Vec::new(),
        }
    }

    /// Register defaults after SWRESET; frame memory is left untouched.
    fn reset_registers(&mut self) {
        self.madctl = 0;
        self.colmod = 0x66;
        self.sleep_out = false;
        self.display_on = false;
        self.partial = false;
        self.inversion = false;
        self.idle = false;
        self.tearing = None;
        self.gamma = GammaCurve::Gamma2_2.param();
        self.brightness = 0;
        self.ctrl = 0;
        self.cabc = 0;
        self.cabc_min = 0;
        self.columns = (0, PANEL_WIDTH - 1);
        self.rows = (0, PANEL_HEIGHT - 1);
    }

    fn set_line(&mut self, line: Line, high: bool) {
        match line {
            Line::Cs => {
                let low = !high;
                if low != self.cs_low {
                    self.wire
                        .push(if low { WireEvent::Select } else { WireEvent::Deselect });
                }
                self.cs_low = low;
                if high {
                    self.current = None;
                }
            }
            Line::Dc => self.dc_high = high,
        }
    }

    fn write(&mut self, data: &[u8]) {
        if !self.cs_low {
            return;
        }
        if self.dc_high {
            self.wire.push(WireEvent::Data(data.to_vec()));
            for &b in data {
                self.on_param(b);
            }
        } else {
            for &b in data {
                self.wire.push(WireEvent::Command(b));
                self.on_command(b);
            }
        }
    }

    fn read(&mut self, fill: u8, buffer: &mut [u8]) {
        for slot in buffer.iter_mut() {
            *slot = self.next_reply_byte(fill);
        }
        self.wire.push(WireEvent::Read(buffer.to_vec()));
    }

    fn next_reply_byte(&mut self, fill: u8) -> u8 {
        let Some(op) = self.current.filter(|_| self.cs_low) else {
            return fill;
        };
        if needs_dummy(op) && !self.pulsed {
            // Without the turnaround clock the reply is misaligned.
            return 0xFF;
        }
        match op {
            0x2E | 0x3E => self.gram_read(),
            _ => {
                let byte = self.reply.get(self.reply_pos).copied().unwrap_or(0);
                self.reply_pos = self.reply_pos.saturating_add(1);
                byte
            }
        }
    }

    fn on_command(&mut self, op: u8) {
        self.current = Some(op);
        self.params.clear();
        self.pulsed = false;
        self.reply_pos = 0;
        self.reply = self.reply_for(op);

        match op {
            0x01 => self.reset_registers(),
            0x10 => self.sleep_out = false,
            0x11 => self.sleep_out = true,
            0x12 => self.partial = true,
            0x13 => self.partial = false,
            0x20 => self.inversion = false,
            0x21 => self.inversion = true,
            0x28 => self.display_on = false,
            0x29 => self.display_on = true,
            0x2C => self.write_cursor = self.window_origin(),
            0x2E => self.read_cursor = self.window_origin(),
            0x34 => self.tearing = None,
            0x38 => self.idle = false,
            0x39 => self.idle = true,
            _ => {}
        }
    }

    fn on_param(&mut self, byte: u8) {
        let Some(op) = self.current else {
            return;
        };
        if matches!(op, 0x2C | 0x3C) {
            self.gram_write(byte);
            return;
        }
        self.params.push(byte);
        self.written.insert(op, self.params.clone());

        let p = &self.params;
        match (op, p.as_slice()) {
            (0x26, [g]) => self.gamma = *g,
            (0x2A, [a, b, c, d]) => {
                self.columns = (u16::from_be_bytes([*a, *b]), u16::from_be_bytes([*c, *d]));
            }
            (0x2B, [a, b, c, d]) => {
                self.rows = (u16::from_be_bytes([*a, *b]), u16::from_be_bytes([*c, *d]));
            }
            (0x35, [mode]) => self.tearing = Some(*mode),
            (0x36, [m]) => self.madctl = *m,
            (0x3A, [f]) => self.colmod = *f,
            (0x51, [v]) => self.brightness = *v,
            (0x53, [v]) => self.ctrl = *v,
            (0x55, [v]) => self.cabc = *v,
            (0x5E, [v]) => self.cabc_min = *v,
            _ => {}
        }
    }

    fn reply_for(&self, op: u8) -> Vec<u8> {
        let [_, id1, id2, id3] = self.id.to_be_bytes();
        match op {
            0x04 => vec![id1, id2, id3],
            0x09 => self.status_word().to_be_bytes().to_vec(),
            0x0A => vec![self.power_mode()],
            0x0B => vec![self.madctl],
            0x0C => vec![self.colmod],
            0x0D => vec![(u8::from(self.inversion) << 5) | self.gamma_select()],
            0x0E => vec![match self.tearing {
                Some(mode) => 0x80 | ((mode & 1) << 6),
                None => 0,
            }],
            0x0F | 0x68 => vec![if self.sleep_out { 0xC0 } else { 0 }],
            0x45 => self.scanline.to_be_bytes().to_vec(),
            0x52 => vec![self.brightness],
            0x54 => vec![self.ctrl],
            0x56 => vec![self.cabc & 0x03],
            0x5F => vec![self.cabc_min],
            0xDA => vec![id1],
            0xDB => vec![id2],
            0xDC => vec![id3],
            _ => Vec::new(),
        }
    }

    fn gamma_select(&self) -> u8 {
        GammaCurve::from_param(self.gamma).map_or(0, GammaCurve::select)
    }

    fn power_mode(&self) -> u8 {
        (u8::from(self.sleep_out) << 7)
            | (u8::from(self.idle) << 6)
            | (u8::from(self.partial) << 5)
            | (u8::from(self.sleep_out) << 4)
            | (u8::from(!self.partial) << 3)
            | (u8::from(self.display_on) << 2)
    }

    fn status_word(&self) -> u32 {
        (u32::from(self.sleep_out) << 31)
            | (u32::from(self.madctl & 0xFC) << 23)
            | (u32::from(self.colmod & 0x07) << 20)
            | (u32::from(self.idle) << 19)
            | (u32::from(self.partial) << 18)
            | (u32::from(self.sleep_out) << 17)
            | (u32::from(!self.partial) << 16)
            | (u32::from(self.inversion) << 13)
            | (u32::from(self.display_on) << 10)
            | (u32::from(self.tearing.is_some()) << 9)
            | (u32::from(self.gamma_select()) << 6)
            | (u32::from(self.tearing.unwrap_or(0) & 1) << 5)
    }

    fn window_origin(&self) -> Cursor {
        Cursor {
            col: self.columns.0,
            row: self.rows.0,
            byte: 0,
        }
    }

    fn gram_offset(cursor: Cursor) -> usize {
        (usize::from(cursor.row) * usize::from(PANEL_WIDTH) + usize::from(cursor.col))
            * BYTES_PER_PIXEL
            + cursor.byte
    }

    fn advance(&self, mut cursor: Cursor) -> Cursor {
        cursor.byte += 1;
        if cursor.byte < BYTES_PER_PIXEL {
            return cursor;
        }
        cursor.byte = 0;
        cursor.col += 1;
        if cursor.col > self.columns.1 {
            cursor.col = self.columns.0;
            cursor.row += 1;
            if cursor.row > self.rows.1 {
                cursor.row = self.rows.0;
            }
        }
        cursor
    }

    fn gram_write(&mut self, byte: u8) {
        let cursor = self.write_cursor;
        if let Some(slot) = self.gram.get_mut(Self::gram_offset(cursor)) {
            *slot = byte;
        }
        self.write_cursor = self.advance(cursor);
    }

    fn gram_read(&mut self) -> u8 {
        let cursor = self.read_cursor;
        let byte = self.gram.get(Self::gram_offset(cursor)).copied().unwrap_or(0);
        self.read_cursor = self.advance(cursor);
        byte
    }

    /// One `is_busy` poll of the channel.
    fn poll_dma(&mut self) -> bool {
        if self.in_flight.is_none() {
            return false;
        }
        self.polls_seen = self.polls_seen.saturating_add(1);
        if self.hold_dma || self.busy_polls > 0 {
            self.busy_polls = self.busy_polls.saturating_sub(1);
            return true;
        }
        self.finish_dma();
        false
    }

    fn finish_dma(&mut self) -> bool {
        let Some(transfer) = self.in_flight.take() else {
            return false;
        };
        if transfer.target.register == SIM_DATA_REGISTER {
            self.write(transfer.source);
        }
        self.wire.push(WireEvent::DmaDone);
        if self.irq_enabled {
            self.irq_pending = true;
        }
        true
    }
}

fn needs_dummy(op: u8) -> bool {
    [
        Command::ReadDisplayId,
        Command::ReadDisplayStatus,
        Command::MemoryRead,
        Command::MemoryReadContinue,
        Command::GetScanline,
    ]
    .iter()
    .any(|c| c.opcode() == op)
}

type Shared = Arc<Mutex<PanelState>>;

fn lock(state: &Shared) -> MutexGuard<'_, PanelState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated controller and its transport.
#[derive(Clone)]
pub struct SimPanel {
    state: Shared,
}

impl Default for SimPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPanel {
    /// A genuine ST7789V with one free DMA channel.
    pub fn new() -> Self {
        Self::with_id(DISPLAY_ID)
    }

    /// A controller reporting `id` from RDDID.
    pub fn with_id(id: u32) -> Self {
        Self::with_id_and_channels(id, 1)
    }

    /// A controller reporting `id`, with `channels` free DMA channels.
    pub fn with_id_and_channels(id: u32, channels: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(PanelState::new(id, channels))),
        }
    }

    /// Bus handle.
    pub fn bus(&self) -> SimBus {
        SimBus {
            state: Arc::clone(&self.state),
        }
    }

    /// Chip-select line.
    pub fn cs(&self) -> SimPin {
        SimPin {
            state: Arc::clone(&self.state),
            line: Line::Cs,
        }
    }

    /// Data/command line.
    pub fn dc(&self) -> SimPin {
        SimPin {
            state: Arc::clone(&self.state),
            line: Line::Dc,
        }
    }

    /// Pool handing out this panel's DMA channels.
    pub fn dma_pool(&self) -> SimDmaPool {
        SimDmaPool {
            state: Arc::clone(&self.state),
        }
    }

    /// Everything seen on the wire so far.
    pub fn wire(&self) -> Vec<WireEvent> {
        lock(&self.state).wire.clone()
    }

    /// Forget the wire log.
    pub fn clear_wire(&self) {
        lock(&self.state).wire.clear();
    }

    /// Opcodes received, in order.
    pub fn commands(&self) -> Vec<u8> {
        lock(&self.state)
            .wire
            .iter()
            .filter_map(|e| match e {
                WireEvent::Command(op) => Some(*op),
                _ => None,
            })
            .collect()
    }

    /// Last parameter bytes written for `opcode`.
    pub fn written(&self, opcode: u8) -> Option<Vec<u8>> {
        lock(&self.state).written.get(&opcode).cloned()
    }

    /// Raw MADCTL byte.
    pub fn madctl(&self) -> u8 {
        lock(&self.state).madctl
    }

    /// Whether the panel is out of sleep.
    pub fn is_awake(&self) -> bool {
        lock(&self.state).sleep_out
    }

    /// Whether chip-select is asserted.
    pub fn is_selected(&self) -> bool {
        lock(&self.state).cs_low
    }

    /// Current bus clock.
    pub fn baud_rate(&self) -> u32 {
        lock(&self.state).baud
    }

    /// Scanline reported by RDTESCAN.
    pub fn set_scanline(&self, line: u16) {
        lock(&self.state).scanline = line;
    }

    /// Frame memory bytes for the pixel at (`col`, `row`).
    pub fn pixel(&self, col: u16, row: u16) -> [u8; 2] {
        let state = lock(&self.state);
        let at = PanelState::gram_offset(Cursor { col, row, byte: 0 });
        let hi = state.gram.get(at).copied().unwrap_or(0);
        let lo = state.gram.get(at.saturating_add(1)).copied().unwrap_or(0);
        [hi, lo]
    }

    /// Receive-register drains performed by the interrupt handler.
    pub fn drains(&self) -> u32 {
        lock(&self.state).drains
    }

    /// Whether a DMA transfer is still moving data.
    pub fn dma_in_flight(&self) -> bool {
        lock(&self.state).in_flight.is_some()
    }

    /// Whether the DMA completion IRQ is pending.
    pub fn irq_pending(&self) -> bool {
        lock(&self.state).irq_pending
    }

    /// Make the next DMA trigger fail.
    pub fn inject_dma_fault(&self) {
        lock(&self.state).dma_fault = true;
    }

    /// `is_busy` polls answered while a transfer was in flight.
    pub fn dma_polls(&self) -> u32 {
        lock(&self.state).polls_seen
    }

    /// Keep DMA transfers in flight until [`Self::complete_dma`].
    pub fn hold_dma(&self, hold: bool) {
        lock(&self.state).hold_dma = hold;
    }

    /// Finish the in-flight DMA transfer. Returns `false` if none was running.
    pub fn complete_dma(&self) -> bool {
        lock(&self.state).finish_dma()
    }
}

/// [`SerialBus`] end of a [`SimPanel`].
pub struct SimBus {
    state: Shared,
}

impl SerialBus for SimBus {
    type Error = Infallible;
    type Drain = SimDrain;

    fn set_baud_rate(&mut self, hz: u32) -> Result<u32, Self::Error> {
        let mut state = lock(&self.state);
        if state.baud != hz {
            state.baud = hz;
            state.wire.push(WireEvent::Baud(hz));
        }
        Ok(hz)
    }

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        lock(&self.state).write(data);
        Ok(())
    }

    fn read_blocking(&mut self, fill: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        lock(&self.state).read(fill, buffer);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn pulse_clock(&mut self) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        state.wire.push(WireEvent::Pulse);
        if state.cs_low {
            state.pulsed = true;
        }
        Ok(())
    }

    fn dma_target(&self) -> DmaTarget {
        DmaTarget {
            register: SIM_DATA_REGISTER,
            dreq: SIM_DREQ,
        }
    }

    fn rx_drain(&self) -> SimDrain {
        SimDrain {
            state: Arc::clone(&self.state),
        }
    }
}

/// [`RxDrain`] end of a [`SimPanel`].
pub struct SimDrain {
    state: Shared,
}

impl RxDrain for SimDrain {
    fn drain_rx(&self) {
        let mut state = lock(&self.state);
        state.drains = state.drains.saturating_add(1);
    }
}

/// Chip-select or DC line of a [`SimPanel`].
pub struct SimPin {
    state: Shared,
    line: Line,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        lock(&self.state).set_line(self.line, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        lock(&self.state).set_line(self.line, true);
        Ok(())
    }
}

/// DMA channel of a [`SimPanel`].
pub struct SimDma {
    state: Shared,
    id: u8,
}

impl DmaChannel for SimDma {
    type Error = SimFault;

    fn id(&self) -> u8 {
        self.id
    }

    fn configure_and_trigger(
        &mut self,
        source: &'static [u8],
        target: DmaTarget,
        config: DmaTransferConfig,
    ) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        if std::mem::take(&mut state.dma_fault) || state.in_flight.is_some() {
            return Err(SimFault);
        }
        let len = config
            .count
            .saturating_mul(config.size.bytes())
            .min(source.len());
        let source = source.get(..len).unwrap_or(source);
        state.wire.push(WireEvent::DmaStart(len));
        state.in_flight = Some(Transfer { source, target });
        state.busy_polls = 1;
        Ok(())
    }

    fn is_busy(&self) -> bool {
        lock(&self.state).poll_dma()
    }

    fn irq_pending(&self) -> bool {
        lock(&self.state).irq_pending
    }

    fn acknowledge_irq(&mut self) {
        lock(&self.state).irq_pending = false;
    }

    fn set_irq_enabled(&mut self, enabled: bool) {
        lock(&self.state).irq_enabled = enabled;
    }
}

/// DMA channel pool of a [`SimPanel`].
pub struct SimDmaPool {
    state: Shared,
}

impl SimDmaPool {
    /// Channels still free.
    pub fn free(&self) -> usize {
        lock(&self.state).channels_free.len()
    }
}

impl DmaPool for SimDmaPool {
    type Channel = SimDma;

    fn claim_unused(&mut self) -> Option<SimDma> {
        let id = lock(&self.state).channels_free.pop()?;
        Some(SimDma {
            state: Arc::clone(&self.state),
            id,
        })
    }

    fn unclaim(&mut self, channel: SimDma) {
        lock(&self.state).channels_free.push(channel.id);
    }
}
