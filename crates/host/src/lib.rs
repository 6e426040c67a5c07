// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Host side of the calibration handshake.
//!
//! The programmer (an FTDI chip in MPSSE mode) resets the target, waits for
//! the status line to read high, then bit-bangs the reference clock on the
//! data-out pin while sampling the status line. The target answers with a
//! burst of toggles once it has stored a calibrated trim.

pub mod decode;
pub mod error;
pub mod ftdi;
pub mod mpsse;
pub mod session;

pub use decode::{decode_done_signal, SignalVerdict};
pub use error::HostError;
pub use ftdi::PacketReader;
#[cfg(feature = "hardware")]
pub use ftdi::{FtdiOptions, FtdiTransport};
pub use mpsse::{ClockSetup, CommandBuffer, Pins};
pub use session::{Session, SessionConfig, Transport};
