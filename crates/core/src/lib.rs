#![cfg_attr(not(test), no_std)]
// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Calibrates an internal RC oscillator against an external reference clock.
//!
//! The crate is `no_std` and hardware-agnostic: boards implement the traits in
//! [`hal`] and run a [`Calibrator`]. Enable the `tracing` feature on hosts to
//! get search and handshake events.

#[macro_use]
mod fmt;

pub mod hal;
pub mod protocol;
pub mod range;
pub mod search;
pub mod signals;
pub mod stepper;
pub mod timing;
pub mod variant;

#[cfg(test)]
mod testing;

pub use protocol::{Calibrator, CalibratorConfig, Outcome, Parts, State};
pub use range::TrimRange;
pub use search::{refinement_window, Search};
pub use signals::DigitalLevel;
pub use stepper::TrimStepper;
pub use timing::{target_ticks, tolerance_ticks, CalibrationParams, ClockConfig};
pub use variant::{OscVariant, UnknownVariant};
