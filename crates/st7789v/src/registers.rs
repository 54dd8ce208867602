//! Register codecs.
//!
//! Each register is decoded from / encoded to its raw integer with explicit
//! bit offsets taken from the ST7789V datasheet (bit 0 = LSB). Reserved bits
//! are ignored on decode and written as zero. Encodings the controller does
//! not define decode to `None`.
//!
//! | Register          | Opcode(s)   | Layout                                             |
//! |-------------------|-------------|----------------------------------------------------|
//! | MADCTL            | 0x36 / 0x0B | MY 7, MX 6, MV 5, ML 4, RGB 3, MH 2                |
//! | RDDPM             | 0x0A        | BST 7, IDM 6, PTL 5, SLPOUT 4, NOR 3, DISP 2       |
//! | COLMOD            | 0x3A / 0x0C | RGB format 6:4, control format 2:0                 |
//! | RDDIM             | 0x0D        | VSCR 7, INV 5, GCS 2:0                             |
//! | RDDSM             | 0x0E        | TE on 7, TE mode 6                                 |
//! | RDDSDR / RDABCSDR | 0x0F / 0x68 | register loading 7, functionality 6                |
//! | WRCTRLD           | 0x53 / 0x54 | BCTRL 5, DD 3, BL 2                                |
//! | WRCACE            | 0x55 / 0x56 | CE on 7, CE level 5:4, content 1:0                 |
//! | RDDST             | 0x09        | see [`DisplayStatus`]                              |

// Every shift below uses a constant bit position smaller than the register
// width, so none of them can overflow.
#![allow(clippy::arithmetic_side_effects)]

const fn bit8(raw: u8, n: u8) -> bool {
    raw & (1 << n) != 0
}

const fn set8(flag: bool, n: u8) -> u8 {
    (flag as u8) << n
}

const fn bit32(raw: u32, n: u32) -> bool {
    raw & (1 << n) != 0
}

// ---------------------------------------------------------------------------
// MADCTL
// ---------------------------------------------------------------------------

/// Sub-pixel order on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorOrder {
    /// Red, green, blue
    #[default]
    Rgb,
    /// Blue, green, red
    Bgr,
}

impl ColorOrder {
    const fn from_flag(bgr: bool) -> Self {
        if bgr {
            Self::Bgr
        } else {
            Self::Rgb
        }
    }

    const fn is_bgr(self) -> bool {
        matches!(self, Self::Bgr)
    }
}

/// Memory data access control (MADCTL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryAccessControl {
    /// MY: row address order, bottom to top
    pub row_address_order: bool,
    /// MX: column address order, right to left
    pub column_address_order: bool,
    /// MV: row/column exchange
    pub row_column_exchange: bool,
    /// ML: vertical refresh order, bottom to top
    pub vertical_refresh_order: bool,
    /// RGB/BGR panel order
    pub color_order: ColorOrder,
    /// MH: horizontal refresh order, right to left
    pub horizontal_refresh_order: bool,
}

impl MemoryAccessControl {
    /// Decode a MADCTL byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            row_address_order: bit8(raw, 7),
            column_address_order: bit8(raw, 6),
            row_column_exchange: bit8(raw, 5),
            vertical_refresh_order: bit8(raw, 4),
            color_order: ColorOrder::from_flag(bit8(raw, 3)),
            horizontal_refresh_order: bit8(raw, 2),
        }
    }

    /// Encode as a MADCTL byte.
    pub const fn raw(self) -> u8 {
        set8(self.row_address_order, 7)
            | set8(self.column_address_order, 6)
            | set8(self.row_column_exchange, 5)
            | set8(self.vertical_refresh_order, 4)
            | set8(self.color_order.is_bgr(), 3)
            | set8(self.horizontal_refresh_order, 2)
    }
}

// ---------------------------------------------------------------------------
// RDDPM
// ---------------------------------------------------------------------------

/// Display power mode (RDDPM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerMode {
    /// Booster voltage on
    pub booster_on: bool,
    /// Idle mode on
    pub idle_mode: bool,
    /// Partial mode on
    pub partial_mode: bool,
    /// Out of sleep
    pub sleep_out: bool,
    /// Normal display mode on
    pub normal_mode: bool,
    /// Display on
    pub display_on: bool,
}

impl PowerMode {
    /// Decode an RDDPM byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            booster_on: bit8(raw, 7),
            idle_mode: bit8(raw, 6),
            partial_mode: bit8(raw, 5),
            sleep_out: bit8(raw, 4),
            normal_mode: bit8(raw, 3),
            display_on: bit8(raw, 2),
        }
    }

    /// Raw RDDPM byte.
    pub const fn raw(self) -> u8 {
        set8(self.booster_on, 7)
            | set8(self.idle_mode, 6)
            | set8(self.partial_mode, 5)
            | set8(self.sleep_out, 4)
            | set8(self.normal_mode, 3)
            | set8(self.display_on, 2)
    }
}

// ---------------------------------------------------------------------------
// COLMOD
// ---------------------------------------------------------------------------

/// Control-interface colour format (COLMOD bits 2:0).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlPixelFormat {
    /// 12 bits per pixel
    Bpp12 = 0b011,
    /// 16 bits per pixel (RGB565)
    Bpp16 = 0b101,
    /// 18 bits per pixel (RGB666)
    Bpp18 = 0b110,
    /// 16M colours, truncated to 18 bits
    Bpp24Truncated = 0b111,
}

impl ControlPixelFormat {
    /// Decode a 3-bit format code.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b111 {
            0b011 => Some(Self::Bpp12),
            0b101 => Some(Self::Bpp16),
            0b110 => Some(Self::Bpp18),
            0b111 => Some(Self::Bpp24Truncated),
            _ => None,
        }
    }
}

/// RGB-interface colour format (COLMOD bits 6:4).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RgbInterfaceFormat {
    /// 65K colours
    Colors65K = 0b101,
    /// 262K colours
    Colors262K = 0b110,
}

impl RgbInterfaceFormat {
    /// Decode a 3-bit format code.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b111 {
            0b101 => Some(Self::Colors65K),
            0b110 => Some(Self::Colors262K),
            _ => None,
        }
    }
}

/// Interface pixel format (COLMOD).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfacePixelFormat {
    /// RGB interface format
    pub rgb: Option<RgbInterfaceFormat>,
    /// Control (serial/MCU) interface format
    pub control: Option<ControlPixelFormat>,
}

impl InterfacePixelFormat {
    /// 16 bpp on both interfaces, the usual SPI setup.
    pub const RGB565: Self = Self {
        rgb: Some(RgbInterfaceFormat::Colors65K),
        control: Some(ControlPixelFormat::Bpp16),
    };

    /// Decode a COLMOD byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            rgb: RgbInterfaceFormat::from_bits(raw >> 4),
            control: ControlPixelFormat::from_bits(raw),
        }
    }

    /// Encode as a COLMOD byte.
    pub const fn raw(self) -> u8 {
        let rgb = match self.rgb {
            Some(f) => f as u8,
            None => 0,
        };
        let control = match self.control {
            Some(f) => f as u8,
            None => 0,
        };
        (rgb << 4) | control
    }
}

// ---------------------------------------------------------------------------
// Gamma / RDDIM
// ---------------------------------------------------------------------------

/// Predefined gamma curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GammaCurve {
    /// GC0, gamma 2.2
    Gamma2_2,
    /// GC1, gamma 1.8
    Gamma1_8,
    /// GC2, gamma 2.5
    Gamma2_5,
    /// GC3, gamma 1.0
    Gamma1_0,
}

impl GammaCurve {
    /// GAMSET parameter (one-hot).
    pub const fn param(self) -> u8 {
        match self {
            Self::Gamma2_2 => 0x01,
            Self::Gamma1_8 => 0x02,
            Self::Gamma2_5 => 0x04,
            Self::Gamma1_0 => 0x08,
        }
    }

    /// Decode a GAMSET parameter.
    pub const fn from_param(param: u8) -> Option<Self> {
        match param {
            0x01 => Some(Self::Gamma2_2),
            0x02 => Some(Self::Gamma1_8),
            0x04 => Some(Self::Gamma2_5),
            0x08 => Some(Self::Gamma1_0),
            _ => None,
        }
    }

    /// Decode the 3-bit gamma select field reported by RDDIM / RDDST.
    pub const fn from_select(select: u8) -> Option<Self> {
        match select & 0b111 {
            0 => Some(Self::Gamma2_2),
            1 => Some(Self::Gamma1_8),
            2 => Some(Self::Gamma2_5),
            3 => Some(Self::Gamma1_0),
            _ => None,
        }
    }

    /// Gamma select field value.
    pub const fn select(self) -> u8 {
        match self {
            Self::Gamma2_2 => 0,
            Self::Gamma1_8 => 1,
            Self::Gamma2_5 => 2,
            Self::Gamma1_0 => 3,
        }
    }
}

/// Display image mode (RDDIM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImageMode {
    /// Vertical scrolling on
    pub vertical_scrolling: bool,
    /// Inversion on
    pub inversion: bool,
    /// Selected gamma curve
    pub gamma: Option<GammaCurve>,
}

impl ImageMode {
    /// Decode an RDDIM byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            vertical_scrolling: bit8(raw, 7),
            inversion: bit8(raw, 5),
            gamma: GammaCurve::from_select(raw),
        }
    }
}

// ---------------------------------------------------------------------------
// Tearing effect / RDDSM
// ---------------------------------------------------------------------------

/// What the TE output signals.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TearingEffectMode {
    /// V-blanking only
    VBlank = 0,
    /// V-blanking and H-blanking
    VBlankHBlank = 1,
}

impl TearingEffectMode {
    const fn from_flag(flag: bool) -> Self {
        if flag {
            Self::VBlankHBlank
        } else {
            Self::VBlank
        }
    }
}

/// Display signal mode (RDDSM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalMode {
    /// TE output enabled
    pub tearing_effect_line: bool,
    /// TE output mode
    pub tearing_effect_mode: TearingEffectMode,
}

impl SignalMode {
    /// Decode an RDDSM byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            tearing_effect_line: bit8(raw, 7),
            tearing_effect_mode: TearingEffectMode::from_flag(bit8(raw, 6)),
        }
    }
}

// ---------------------------------------------------------------------------
// Self-diagnostics
// ---------------------------------------------------------------------------

/// Self-diagnostic result (RDDSDR, RDABCSDR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SelfDiagnostic {
    /// Register values loaded from NVM
    pub register_loading: bool,
    /// Functionality detection passed
    pub functionality_detection: bool,
}

impl SelfDiagnostic {
    /// Decode a self-diagnostic byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            register_loading: bit8(raw, 7),
            functionality_detection: bit8(raw, 6),
        }
    }
}

// ---------------------------------------------------------------------------
// WRCTRLD
// ---------------------------------------------------------------------------

/// CTRL display register (WRCTRLD / RDCTRLD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayControl {
    /// BCTRL: brightness control block on
    pub brightness_control: bool,
    /// DD: display dimming on
    pub dimming: bool,
    /// BL: backlight control on
    pub backlight: bool,
}

impl DisplayControl {
    /// Decode a CTRL display byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            brightness_control: bit8(raw, 5),
            dimming: bit8(raw, 3),
            backlight: bit8(raw, 2),
        }
    }

    /// Encode as a CTRL display byte.
    pub const fn raw(self) -> u8 {
        set8(self.brightness_control, 5) | set8(self.dimming, 3) | set8(self.backlight, 2)
    }
}

// ---------------------------------------------------------------------------
// WRCACE
// ---------------------------------------------------------------------------

/// Content adaptive brightness control mode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ContentAdaptiveMode {
    /// CABC off
    #[default]
    Off = 0,
    /// User interface image
    UserInterface = 1,
    /// Still picture
    StillPicture = 2,
    /// Moving image
    MovingImage = 3,
}

impl ContentAdaptiveMode {
    /// Decode the 2-bit content field.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            1 => Self::UserInterface,
            2 => Self::StillPicture,
            3 => Self::MovingImage,
            _ => Self::Off,
        }
    }
}

/// Colour enhancement strength.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorEnhancementLevel {
    /// Low enhancement
    #[default]
    Low = 0,
    /// Medium enhancement
    Medium = 1,
    /// High enhancement
    High = 3,
}

impl ColorEnhancementLevel {
    /// Decode the 2-bit level field.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0 => Some(Self::Low),
            1 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }
}

/// Content adaptive brightness and colour enhancement (WRCACE).
///
/// RDCABC only reports [`AdaptiveBrightness::content`]; the other fields
/// read back as their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdaptiveBrightness {
    /// CECTRL: colour enhancement on
    pub color_enhancement: bool,
    /// Colour enhancement strength; `None` for the undefined code 0b10
    pub enhancement_level: Option<ColorEnhancementLevel>,
    /// CABC content type
    pub content: ContentAdaptiveMode,
}

impl AdaptiveBrightness {
    /// Decode a WRCACE / RDCABC byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            color_enhancement: bit8(raw, 7),
            enhancement_level: ColorEnhancementLevel::from_bits(raw >> 4),
            content: ContentAdaptiveMode::from_bits(raw),
        }
    }

    /// Encode as a WRCACE byte.
    pub const fn raw(self) -> u8 {
        let level = match self.enhancement_level {
            Some(l) => l as u8,
            None => 0,
        };
        set8(self.color_enhancement, 7) | (level << 4) | self.content as u8
    }
}

// ---------------------------------------------------------------------------
// RDDST
// ---------------------------------------------------------------------------

/// 32-bit display status word (RDDST).
///
/// ```text
/// 31   BSTON      27 ML         19 IDMON     13 INVON    8:6 GCS
/// 30   MY         26 RGB/BGR    18 PTLON     10 DISON      5 TEM
/// 29   MX         25 MH         17 SLPOUT     9 TEON
/// 28   MV      22:20 IFPF       16 NORON
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayStatus(u32);

impl DisplayStatus {
    /// Wrap a raw status word.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw status word.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Booster voltage on.
    pub const fn booster_on(self) -> bool {
        bit32(self.0, 31)
    }

    /// Address-order bits, in MADCTL layout.
    pub const fn memory_access_control(self) -> MemoryAccessControl {
        // Bits 30:25 line up with MADCTL bits 7:2.
        MemoryAccessControl::from_raw(((self.0 >> 23) & 0xFC) as u8)
    }

    /// Control-interface pixel format.
    pub const fn pixel_format(self) -> Option<ControlPixelFormat> {
        ControlPixelFormat::from_bits((self.0 >> 20) as u8)
    }

    /// Idle mode on.
    pub const fn idle_mode(self) -> bool {
        bit32(self.0, 19)
    }

    /// Partial mode on.
    pub const fn partial_mode(self) -> bool {
        bit32(self.0, 18)
    }

    /// Out of sleep.
    pub const fn sleep_out(self) -> bool {
        bit32(self.0, 17)
    }

    /// Normal display mode on.
    pub const fn normal_mode(self) -> bool {
        bit32(self.0, 16)
    }

    /// Inversion on.
    pub const fn inversion(self) -> bool {
        bit32(self.0, 13)
    }

    /// Display on.
    pub const fn display_on(self) -> bool {
        bit32(self.0, 10)
    }

    /// TE output enabled.
    pub const fn tearing_effect_line(self) -> bool {
        bit32(self.0, 9)
    }

    /// Selected gamma curve.
    pub const fn gamma(self) -> Option<GammaCurve> {
        GammaCurve::from_select((self.0 >> 6) as u8)
    }

    /// TE output mode.
    pub const fn tearing_effect_mode(self) -> TearingEffectMode {
        TearingEffectMode::from_flag(bit32(self.0, 5))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn madctl_bit_positions() {
        let exchange = MemoryAccessControl {
            row_column_exchange: true,
            ..MemoryAccessControl::default()
        };
        assert_eq!(exchange.raw(), 0x20, "MV is bit 5");

        let bgr = MemoryAccessControl {
            color_order: ColorOrder::Bgr,
            ..MemoryAccessControl::default()
        };
        assert_eq!(bgr.raw(), 0x08, "RGB/BGR is bit 3");

        let decoded = MemoryAccessControl::from_raw(0xC4);
        assert!(decoded.row_address_order);
        assert!(decoded.column_address_order);
        assert!(decoded.horizontal_refresh_order);
        assert!(!decoded.row_column_exchange);
    }

    #[test]
    fn colmod_rgb565_is_0x55() {
        assert_eq!(InterfacePixelFormat::RGB565.raw(), 0x55);
        assert_eq!(
            InterfacePixelFormat::from_raw(0x66),
            InterfacePixelFormat {
                rgb: Some(RgbInterfaceFormat::Colors262K),
                control: Some(ControlPixelFormat::Bpp18),
            }
        );
    }

    #[test]
    fn colmod_unknown_codes_decode_to_none() {
        let f = InterfacePixelFormat::from_raw(0x00);
        assert_eq!(f.rgb, None);
        assert_eq!(f.control, None);
    }

    #[test]
    fn power_mode_after_sleep_out() {
        // Booster on, sleep out, normal mode on, display on.
        let pm = PowerMode::from_raw(0x9C);
        assert!(pm.booster_on);
        assert!(pm.sleep_out);
        assert!(pm.normal_mode);
        assert!(pm.display_on);
        assert!(!pm.idle_mode);
        assert!(!pm.partial_mode);
    }

    #[test]
    fn gamma_param_and_select_differ() {
        assert_eq!(GammaCurve::Gamma2_5.param(), 0x04);
        assert_eq!(GammaCurve::Gamma2_5.select(), 2);
        assert_eq!(GammaCurve::from_param(0x03), None);
        assert_eq!(GammaCurve::from_select(4), None);
    }

    #[test]
    fn image_mode_fields() {
        let im = ImageMode::from_raw(0b1010_0001);
        assert!(im.vertical_scrolling);
        assert!(im.inversion);
        assert_eq!(im.gamma, Some(GammaCurve::Gamma1_8));
    }

    #[test]
    fn signal_and_diagnostic_fields() {
        let sm = SignalMode::from_raw(0xC0);
        assert!(sm.tearing_effect_line);
        assert_eq!(sm.tearing_effect_mode, TearingEffectMode::VBlankHBlank);

        let sd = SelfDiagnostic::from_raw(0x80);
        assert!(sd.register_loading);
        assert!(!sd.functionality_detection);
    }

    #[test]
    fn ctrl_display_layout() {
        let all = DisplayControl {
            brightness_control: true,
            dimming: true,
            backlight: true,
        };
        assert_eq!(all.raw(), 0x2C);
    }

    #[test]
    fn adaptive_brightness_layout() {
        let ab = AdaptiveBrightness {
            color_enhancement: true,
            enhancement_level: Some(ColorEnhancementLevel::High),
            content: ContentAdaptiveMode::MovingImage,
        };
        assert_eq!(ab.raw(), 0xB3);
        assert_eq!(
            AdaptiveBrightness::from_raw(0x20).enhancement_level,
            None,
            "level 0b10 is undefined"
        );
    }

    #[test]
    fn status_word_fields() {
        // MV set, 16 bpp, sleep out, normal, display on, gamma 2.5.
        let raw = (1 << 28) | (0b101 << 20) | (1 << 17) | (1 << 16) | (1 << 10) | (2 << 6);
        let st = DisplayStatus::from_raw(raw);
        assert!(st.memory_access_control().row_column_exchange);
        assert_eq!(st.pixel_format(), Some(ControlPixelFormat::Bpp16));
        assert!(st.sleep_out());
        assert!(st.normal_mode());
        assert!(st.display_on());
        assert_eq!(st.gamma(), Some(GammaCurve::Gamma2_5));
        assert!(!st.booster_on());
        assert!(!st.inversion());
        assert_eq!(st.tearing_effect_mode(), TearingEffectMode::VBlank);
    }

    proptest! {
        #[test]
        fn madctl_roundtrips_defined_bits(raw in any::<u8>()) {
            prop_assert_eq!(MemoryAccessControl::from_raw(raw).raw(), raw & 0xFC);
        }

        #[test]
        fn status_madctl_matches_bits_30_to_25(raw in any::<u32>()) {
            let madctl = DisplayStatus::from_raw(raw).memory_access_control();
            prop_assert_eq!(madctl.row_address_order, raw & (1 << 30) != 0);
            prop_assert_eq!(madctl.row_column_exchange, raw & (1 << 28) != 0);
            prop_assert_eq!(madctl.color_order == ColorOrder::Bgr, raw & (1 << 26) != 0);
            prop_assert_eq!(madctl.horizontal_refresh_order, raw & (1 << 25) != 0);
        }
    }
}
