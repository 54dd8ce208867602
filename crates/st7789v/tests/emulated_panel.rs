//! End-to-end bring-up against the emulated panel, with the context in a
//! `static` the way firmware holds it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use st7789v::emulator::{SimDma, SimDrain, SimPanel, SimPin, WireEvent};
use st7789v::{
    AdaptiveBrightness, Config, ContentAdaptiveMode, DisplayControl, DisplayState,
    DriverContext, Error, GammaCurve, InterfacePixelFormat, MemoryAccessControl, SettleLock,
    St7789v, TearingEffectMode,
};
use st7789v_platform::mocks::VirtualClock;
use st7789v_platform::{CompletionSignal, SerialBus};
use static_cell::StaticCell;

type Ctx = DriverContext<SimPin, SimDma, SimDrain>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

static CTX: StaticCell<Ctx> = StaticCell::new();
static FRAME: StaticCell<[u8; 240 * 2]> = StaticCell::new();
static FRAME_DONE: CompletionSignal = CompletionSignal::new();

#[test]
fn bring_up_and_stream_one_line() {
    init_tracing();
    let panel = SimPanel::new();
    let mut pool = panel.dma_pool();
    let ctx: &'static Ctx = CTX.init(DriverContext::new(panel.cs(), panel.bus().rx_drain()));
    let clock = VirtualClock::<SettleLock>::new();
    let mut display = St7789v::new(
        ctx,
        panel.bus(),
        panel.dc(),
        clock.scheduler(),
        clock.delay(ctx),
        Config::default(),
    );

    // Identify, then the usual SPI panel setup.
    display.init(&mut pool).unwrap();
    display.wait_idle().unwrap();
    display.sleep_out(true).unwrap();
    display.set_pixel_format(InterfacePixelFormat::RGB565).unwrap();
    display
        .set_memory_access_control(MemoryAccessControl {
            column_address_order: true,
            ..MemoryAccessControl::default()
        })
        .unwrap();
    display.set_inversion(true).unwrap();
    display.set_gamma_curve(GammaCurve::Gamma1_8).unwrap();
    display.set_tearing_effect(Some(TearingEffectMode::VBlank)).unwrap();
    display.set_display_on(true).unwrap();

    let status = display.read_status().unwrap();
    assert!(status.sleep_out());
    assert!(status.display_on());
    assert!(status.inversion());
    assert!(status.tearing_effect_line());
    assert_eq!(status.gamma(), Some(GammaCurve::Gamma1_8));
    assert!(status.memory_access_control().column_address_order);

    let power = display.read_power_mode().unwrap();
    assert!(power.sleep_out && power.display_on && power.normal_mode);
    assert_eq!(
        display.read_pixel_format().unwrap(),
        InterfacePixelFormat::RGB565
    );
    let signal = display.read_signal_mode().unwrap();
    assert!(signal.tearing_effect_line);

    // One full-width line through DMA, completed from "interrupt" context.
    let line = FRAME.init([0u8; 240 * 2]);
    for (i, px) in line.chunks_exact_mut(2).enumerate() {
        px.copy_from_slice(&u16::try_from(i).unwrap().to_be_bytes());
    }
    let line: &'static [u8] = line;

    display.set_column_window(0, 239).unwrap();
    display.set_row_window(10, 11).unwrap();
    display.memory_write_async(line, Some(&FRAME_DONE), false).unwrap();
    assert_eq!(display.state(), DisplayState::Transferring);
    assert_eq!(display.set_brightness(0x80), Err(Error::Busy));

    std::thread::scope(|s| {
        s.spawn(|| {
            while !panel.irq_pending() {
                std::thread::yield_now();
            }
            ctx.on_dma_interrupt();
        });
        display.sync_dma_operation().unwrap();
    });
    assert!(FRAME_DONE.signaled());
    assert_eq!(display.state(), DisplayState::Idle);
    assert_eq!(panel.pixel(239, 10), [0x00, 0xEF]);

    let dma_events: Vec<_> = panel
        .wire()
        .into_iter()
        .filter(|e| matches!(e, WireEvent::DmaStart(_) | WireEvent::DmaDone))
        .collect();
    assert_eq!(dma_events, vec![WireEvent::DmaStart(480), WireEvent::DmaDone]);

    // Brightness and CABC registers read back what was written.
    display.set_brightness(0x80).unwrap();
    assert_eq!(display.read_brightness(), Ok(0x80));
    display.set_cabc_min_brightness(0x10).unwrap();
    assert_eq!(display.read_cabc_min_brightness(), Ok(0x10));
    let control = DisplayControl {
        brightness_control: true,
        dimming: true,
        backlight: true,
    };
    display.set_display_control(control).unwrap();
    assert_eq!(display.read_display_control(), Ok(control));
    display
        .set_adaptive_brightness(AdaptiveBrightness {
            content: ContentAdaptiveMode::MovingImage,
            ..AdaptiveBrightness::default()
        })
        .unwrap();
    assert_eq!(
        display.read_adaptive_brightness(),
        Ok(ContentAdaptiveMode::MovingImage)
    );

    panel.set_scanline(0x0123);
    assert_eq!(display.read_scanline(), Ok(0x0123));

    assert_eq!(display.read_id(), Ok(0x0085_8552));
    display.deinit(&mut pool).unwrap();
    assert_eq!(display.state(), DisplayState::Detached);
    assert_eq!(pool.free(), 1);
}
