// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::fmt;

/// Inclusive span of trim values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimRange {
    min: u8,
    max: u8,
}

impl TrimRange {
    pub const FULL: Self = Self::new(0x00, 0xFF);
    pub const LOWER: Self = Self::new(0x00, 0x7F);
    pub const UPPER: Self = Self::new(0x80, 0xFF);

    /// Panics if `min > max`.
    pub const fn new(min: u8, max: u8) -> Self {
        assert!(min <= max, "trim range bounds are inverted");
        Self { min, max }
    }

    pub const fn try_new(min: u8, max: u8) -> Option<Self> {
        if min <= max {
            Some(Self { min, max })
        } else {
            None
        }
    }

    pub const fn min(&self) -> u8 {
        self.min
    }

    pub const fn max(&self) -> u8 {
        self.max
    }

    pub const fn contains(&self, trim: u8) -> bool {
        trim >= self.min && trim <= self.max
    }

    /// Number of trim values covered, 1..=256.
    pub const fn span(&self) -> u16 {
        self.max as u16 - self.min as u16 + 1
    }

    pub fn iter(&self) -> core::ops::RangeInclusive<u8> {
        self.min..=self.max
    }
}

impl fmt::Display for TrimRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#04x}, {:#04x}]", self.min, self.max)
    }
}
