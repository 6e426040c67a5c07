// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::fmt;
use core::str::FromStr;

use crate::range::TrimRange;

/// Oscillator revision, selecting how the trim domain is split.
///
/// Revisions 1 to 3 have one monotonic curve over the whole register.
/// Revision 4 is only usable (and monotonic) in the lower half. Revision 5
/// folds at `0x80`: each half is monotonic on its own, so the halves are
/// searched separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OscVariant {
    V1,
    V2,
    V3,
    V4,
    V5,
}

const SINGLE_FULL: [TrimRange; 1] = [TrimRange::FULL];
const SINGLE_LOWER: [TrimRange; 1] = [TrimRange::LOWER];
const SPLIT_HALVES: [TrimRange; 2] = [TrimRange::LOWER, TrimRange::UPPER];

impl OscVariant {
    pub const ALL: [OscVariant; 5] = [
        OscVariant::V1,
        OscVariant::V2,
        OscVariant::V3,
        OscVariant::V4,
        OscVariant::V5,
    ];

    pub const fn from_version(version: u8) -> Option<Self> {
        match version {
            1 => Some(OscVariant::V1),
            2 => Some(OscVariant::V2),
            3 => Some(OscVariant::V3),
            4 => Some(OscVariant::V4),
            5 => Some(OscVariant::V5),
            _ => None,
        }
    }

    pub const fn version(self) -> u8 {
        match self {
            OscVariant::V1 => 1,
            OscVariant::V2 => 2,
            OscVariant::V3 => 3,
            OscVariant::V4 => 4,
            OscVariant::V5 => 5,
        }
    }

    /// Monotonic sub-ranges to search, in order.
    pub const fn ranges(self) -> &'static [TrimRange] {
        match self {
            OscVariant::V1 | OscVariant::V2 | OscVariant::V3 => &SINGLE_FULL,
            OscVariant::V4 => &SINGLE_LOWER,
            OscVariant::V5 => &SPLIT_HALVES,
        }
    }
}

impl fmt::Display for OscVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "osc-v{}", self.version())
    }
}

/// Version number outside the recognized revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownVariant(pub u8);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported oscillator version {}; supported: 1, 2, 3, 4, 5",
            self.0
        )
    }
}

impl TryFrom<u8> for OscVariant {
    type Error = UnknownVariant;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        Self::from_version(version).ok_or(UnknownVariant(version))
    }
}

impl FromStr for OscVariant {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim();
        let digits = v
            .strip_prefix("osc-v")
            .or_else(|| v.strip_prefix('v'))
            .or_else(|| v.strip_prefix('V'))
            .unwrap_or(v);
        let version: u8 = digits.parse().map_err(|_| UnknownVariant(0))?;
        Self::try_from(version)
    }
}
