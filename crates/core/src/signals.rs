// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// Represents a digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl DigitalLevel {
    pub fn is_high(self) -> bool {
        self == DigitalLevel::High
    }

    /// The opposite level, as produced by toggling a pin.
    pub fn toggled(self) -> Self {
        match self {
            DigitalLevel::High => DigitalLevel::Low,
            DigitalLevel::Low => DigitalLevel::High,
        }
    }
}

impl From<bool> for DigitalLevel {
    fn from(b: bool) -> Self {
        if b {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

impl From<DigitalLevel> for bool {
    fn from(level: DigitalLevel) -> Self {
        match level {
            DigitalLevel::High => true,
            DigitalLevel::Low => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_conversions() {
        assert_eq!(DigitalLevel::default(), DigitalLevel::Low);
        assert_eq!(DigitalLevel::from(true), DigitalLevel::High);

        let b: bool = DigitalLevel::High.into();
        assert!(b);
    }

    #[test]
    fn test_toggle() {
        assert_eq!(DigitalLevel::Low.toggled(), DigitalLevel::High);
        assert_eq!(DigitalLevel::High.toggled(), DigitalLevel::Low);
    }
}
