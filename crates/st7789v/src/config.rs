//! Driver configuration.
//!
//! # Timing
//!
//! | Window           | Armed by                      | Duration |
//! |------------------|-------------------------------|----------|
//! | reset settle     | SWRESET                       | 5 ms     |
//! | sleep settle     | SLPIN / SLPOUT                | 5 ms     |
//! | mode-switch      | SWRESET / SLPIN / SLPOUT      | 120 ms   |
//!
//! The controller accepts no further commands until every window armed by
//! the last mode-changing command has elapsed.
//!
//! # Bus rates
//!
//! Writes run at 62.5 MHz (the controller's 16 ns write cycle). Register
//! reads are limited to a 150 ns read cycle, so the bus drops to 6.67 MHz
//! for the duration of each read.

/// Panel width in pixels (columns with MV clear).
pub const PANEL_WIDTH: u16 = 240;

/// Panel height in pixels (rows / scan lines with MV clear).
pub const PANEL_HEIGHT: u16 = 320;

/// Identifier returned by RDDID for the ST7789V.
pub const DISPLAY_ID: u32 = 0x0085_8552;

/// Bus rate for writes, in Hz.
pub const WRITE_BAUD_RATE: u32 = 62_500_000;

/// Bus rate for register and memory reads, in Hz.
pub const READ_BAUD_RATE: u32 = 6_666_666;

/// Byte clocked out while reading.
pub const READ_FILL_BYTE: u8 = 0xFF;

/// Settle time after SWRESET.
pub const RESET_SETTLE_MS: u32 = 5;

/// Settle time after SLPIN / SLPOUT.
pub const SLEEP_SETTLE_MS: u32 = 5;

/// Controller-internal mode-switch settle after reset and sleep transitions.
pub const MODE_SWITCH_SETTLE_MS: u32 = 120;

/// Driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Bus rate for writes, in Hz.
    pub write_baud_rate: u32,
    /// Bus rate for reads, in Hz.
    pub read_baud_rate: u32,
    /// Byte clocked out while reading.
    pub read_fill_byte: u8,
    /// RDDID value the attached controller must report.
    pub expected_id: u32,
    /// Panel width in pixels.
    pub panel_width: u16,
    /// Panel height in pixels (total scan lines).
    pub panel_height: u16,
    /// Settle window after SWRESET, in ms.
    pub reset_settle_ms: u32,
    /// Settle window after SLPIN / SLPOUT, in ms.
    pub sleep_settle_ms: u32,
    /// Mode-switch settle window, in ms.
    pub mode_switch_settle_ms: u32,
    /// Poll interval used by `wait_idle`, in ms.
    pub idle_poll_ms: u32,
    /// Polls `wait_idle` performs before giving up with `Busy`.
    pub max_idle_polls: u32,
}

impl Config {
    /// ST7789V defaults for a 240×320 panel.
    pub const fn new() -> Self {
        Self {
            write_baud_rate: WRITE_BAUD_RATE,
            read_baud_rate: READ_BAUD_RATE,
            read_fill_byte: READ_FILL_BYTE,
            expected_id: DISPLAY_ID,
            panel_width: PANEL_WIDTH,
            panel_height: PANEL_HEIGHT,
            reset_settle_ms: RESET_SETTLE_MS,
            sleep_settle_ms: SLEEP_SETTLE_MS,
            mode_switch_settle_ms: MODE_SWITCH_SETTLE_MS,
            idle_poll_ms: 1,
            // 200 × 1 ms comfortably covers the 120 ms mode-switch window.
            max_idle_polls: 200,
        }
    }

    /// Override both bus rates.
    #[must_use]
    pub const fn with_baud_rates(mut self, write_hz: u32, read_hz: u32) -> Self {
        self.write_baud_rate = write_hz;
        self.read_baud_rate = read_hz;
        self
    }

    /// Override the identifier checked during `init`.
    #[must_use]
    pub const fn with_expected_id(mut self, id: u32) -> Self {
        self.expected_id = id;
        self
    }

    /// Override the `wait_idle` poll interval and budget.
    #[must_use]
    pub const fn with_idle_polling(mut self, poll_ms: u32, max_polls: u32) -> Self {
        self.idle_poll_ms = poll_ms;
        self.max_idle_polls = max_polls;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_controller() {
        let cfg = Config::default();
        assert_eq!(cfg.expected_id, 0x0085_8552);
        assert_eq!(cfg.write_baud_rate, 62_500_000);
        assert_eq!(cfg.read_baud_rate, 6_666_666);
        assert_eq!(cfg.read_fill_byte, 0xFF);
        assert_eq!((cfg.panel_width, cfg.panel_height), (240, 320));
        assert_eq!(cfg.reset_settle_ms, 5);
        assert_eq!(cfg.sleep_settle_ms, 5);
        assert_eq!(cfg.mode_switch_settle_ms, 120);
    }

    #[test]
    fn idle_budget_covers_mode_switch() {
        let cfg = Config::default();
        assert!(
            cfg.idle_poll_ms.saturating_mul(cfg.max_idle_polls) > cfg.mode_switch_settle_ms,
            "wait_idle must outlast the longest settle window"
        );
    }

    #[test]
    fn builders_override_fields() {
        let cfg = Config::new()
            .with_baud_rates(40_000_000, 5_000_000)
            .with_expected_id(0x12_3456)
            .with_idle_polling(2, 10);
        assert_eq!(cfg.write_baud_rate, 40_000_000);
        assert_eq!(cfg.read_baud_rate, 5_000_000);
        assert_eq!(cfg.expected_id, 0x12_3456);
        assert_eq!((cfg.idle_poll_ms, cfg.max_idle_polls), (2, 10));
    }
}
