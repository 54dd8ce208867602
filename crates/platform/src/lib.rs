//! Transport primitives for serial display controllers
//!
//! This crate provides the trait seams a display driver core consumes, so the
//! core can run unchanged against real peripherals, an emulated panel, or
//! test mocks.
//!
//! # Architecture Layers
//!
//! ```text
//! Application / UI
//!         ↓
//! Display driver core (st7789v crate)
//!         ↓
//! Transport primitives (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (HAL + PAC, or emulator)
//! ```
//!
//! # Primitives
//!
//! - [`SerialBus`] - blocking byte transport with a single-pulse dummy cycle
//! - [`RxDrain`] - interrupt-side receive register drain
//! - [`DmaChannel`] / [`DmaPool`] - one-shot memory-to-peripheral transfers
//! - [`OneShotScheduler`] / [`TimerSink`] - deferred settle callbacks
//! - [`CompletionSignal`] - interrupt-to-task completion notification
//!
//! Chip-select and data/command lines use [`embedded_hal::digital::OutputPin`];
//! blocking delays use [`embedded_hal::delay::DelayNs`].
//!
//! # Features
//!
//! - `std`: Enable the [`mocks`] module outside of this crate's tests
//! - `defmt`: Enable `defmt::Format` derives

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
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod bus;
pub mod dma;
pub mod mocks;
pub mod timer;

pub use bus::{DmaTarget, RxDrain, SerialBus};
pub use dma::{CompletionSignal, DmaChannel, DmaPool, DmaTransferConfig, TransferSize};
pub use timer::{OneShotScheduler, TimerSink};
