// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Tick targets derived from the clock configuration.
//!
//! Everything here is `const` so firmware can pin the numbers at compile time.

/// Clock parameters of one calibration profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    /// Desired effective core frequency in Hz.
    pub f_cpu: u32,
    /// Reference clock frequency driven by the programmer, in Hz.
    pub input_freq: u32,
    /// Reference cycles counted per measurement.
    pub freq_cycles: u32,
}

impl ClockConfig {
    pub const fn new(f_cpu: u32, input_freq: u32, freq_cycles: u32) -> Self {
        Self {
            f_cpu,
            input_freq,
            freq_cycles,
        }
    }

    pub const fn target_ticks(&self) -> u32 {
        target_ticks(self.f_cpu, self.input_freq, self.freq_cycles)
    }
}

/// Expected cycle count of a calibrated oscillator, with normal rounding.
///
/// `input_freq` must be non-zero.
pub const fn target_ticks(f_cpu: u32, input_freq: u32, freq_cycles: u32) -> u32 {
    if input_freq == 0 {
        return u32::MAX;
    }
    let f_cpu = f_cpu as u64;
    let input_freq = input_freq as u64;
    let ticks = (f_cpu * freq_cycles as u64 + input_freq / 2) / input_freq;
    if ticks > u32::MAX as u64 {
        u32::MAX
    } else {
        ticks as u32
    }
}

/// 1% of `target`, rounded up, never below 1.
pub const fn tolerance_ticks(target: u32) -> u32 {
    1 + target.saturating_sub(1) / 100
}

/// Numbers the search works against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationParams {
    pub target_ticks: u32,
    pub tolerance_ticks: u32,
    /// Largest trim change applied in a single register write.
    pub max_step: u8,
}

impl CalibrationParams {
    pub const fn new(target_ticks: u32, max_step: u8) -> Self {
        Self {
            target_ticks,
            tolerance_ticks: tolerance_ticks(target_ticks),
            max_step,
        }
    }

    pub const fn from_clock(clock: ClockConfig, max_step: u8) -> Self {
        Self::new(clock.target_ticks(), max_step)
    }

    pub fn deviation(&self, ticks: u32) -> u32 {
        ticks.abs_diff(self.target_ticks)
    }

    /// Strictly below tolerance counts as calibrated.
    pub fn accepts(&self, deviation: u32) -> bool {
        deviation < self.tolerance_ticks
    }
}
