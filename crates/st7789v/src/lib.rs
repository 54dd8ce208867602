//! Sitronix ST7789V display controller driver core
//!
//! Coordinates every transfer to an ST7789V over its 4-line serial
//! interface: synchronous command/parameter writes and register reads,
//! DMA-fed frame memory writes completed from interrupt context, and the
//! settle windows the controller needs after reset and sleep transitions.
//!
//! # Architecture
//!
//! ```text
//! Application
//!     ↓
//! St7789v (thread half)         ── high-level ops, sync engine, DMA trigger
//!     ↓ &'static
//! DriverContext (shared half)   ◀── DMA IRQ, settle timers
//!     ↓
//! st7789v-platform traits       ── SerialBus, DmaChannel, OneShotScheduler
//! ```
//!
//! # Busy model
//!
//! An operation is refused with [`Error::Busy`] while a transfer is in
//! flight, during the 5 ms after SWRESET, or during the sleep and 120 ms
//! mode-switch windows after SWRESET / SLPIN / SLPOUT. The busy check and the
//! acquisition of the communication session happen in one critical section.
//!
//! # Features
//!
//! - `defmt`: log through `defmt` and derive `defmt::Format`
//! - `tracing`: log through `tracing` (target `st7789v`)
//! - `std`: enable `std` in dependencies and the platform mocks
//! - `emulator`: simulated panel in [`emulator`]
//!
//! # Example
//!
//! ```rust,ignore
//! static CTX: StaticCell<DriverContext<Cs, DmaCh, BusDrain>> = StaticCell::new();
//!
//! let ctx = CTX.init(DriverContext::new(cs, bus.rx_drain()));
//! let mut display = St7789v::new(ctx, bus, dc, scheduler, delay, Config::default());
//! display.init(&mut dma_pool)?;
//! display.wait_idle()?;
//! display.sleep_out(true)?;
//! display.set_display_on(true)?;
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::doc_markdown)] // opcode mnemonics in doc comments
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

#[macro_use]
mod fmt;

pub mod busy;
pub mod command;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod registers;
pub mod settle;

#[cfg(any(test, feature = "emulator"))]
pub mod emulator;

pub use busy::{BusyState, DisplayState, Gate};
pub use command::{Command, Frame, MAX_PARAMS};
pub use config::Config;
pub use context::{DriverContext, PendingDmaCompletion};
pub use driver::{ContextFor, St7789v};
pub use error::Error;
pub use registers::{
    AdaptiveBrightness, ColorEnhancementLevel, ColorOrder, ContentAdaptiveMode,
    ControlPixelFormat, DisplayControl, DisplayStatus, GammaCurve, ImageMode,
    InterfacePixelFormat, MemoryAccessControl, PowerMode, RgbInterfaceFormat, SelfDiagnostic,
    SignalMode, TearingEffectMode,
};
pub use settle::{LockOwner, SettleLock};
