// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Hardware collaborators of the calibration flow.
//!
//! The core never touches registers directly. A board crate (or the host
//! simulator) implements these traits and hands them to the
//! [`Calibrator`](crate::protocol::Calibrator). None of the operations can
//! fail: on the real device they are single register accesses.

use crate::signals::DigitalLevel;

/// The oscillator trim register.
///
/// Only [`TrimStepper`](crate::stepper::TrimStepper) writes to it.
pub trait TrimRegister {
    fn read(&self) -> u8;
    fn write(&mut self, value: u8);
}

/// Counts internal clock cycles over a fixed number of reference cycles,
/// using whatever trim is currently applied.
pub trait TickMeter {
    fn measure(&mut self) -> u32;
}

/// Liveness primitive. Must be called at least once per loop iteration.
pub trait Watchdog {
    fn kick(&mut self);
}

/// The external reference clock input (MOSI on the programming header).
pub trait ReferenceLine {
    fn enable_pull_up(&mut self);
    fn level(&mut self) -> DigitalLevel;
}

/// The status output (MISO on the programming header).
pub trait StatusLine {
    fn set_output(&mut self);
    fn set_level(&mut self, level: DigitalLevel);
    /// Emit the completion toggle sequence the programmer watches for.
    fn signal_done(&mut self);
}

/// Byte-addressed non-volatile storage.
pub trait NvStorage {
    fn read_byte(&self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);

    /// Write only when the stored byte differs, sparing erase cycles.
    fn update_byte(&mut self, address: u16, value: u8) {
        if self.read_byte(address) != value {
            self.write_byte(address, value);
        }
    }
}

impl<T: TrimRegister + ?Sized> TrimRegister for &mut T {
    fn read(&self) -> u8 {
        (**self).read()
    }

    fn write(&mut self, value: u8) {
        (**self).write(value)
    }
}

impl<T: TickMeter + ?Sized> TickMeter for &mut T {
    fn measure(&mut self) -> u32 {
        (**self).measure()
    }
}

impl<T: Watchdog + ?Sized> Watchdog for &mut T {
    fn kick(&mut self) {
        (**self).kick()
    }
}
