// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use osccal_config::{ConfigError, LinearSegment, OscillatorConfig};

/// Straight line through `(center, ticks_at_center)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearCurve {
    pub center: u8,
    pub ticks_at_center: u32,
    pub slope: f64,
}

impl LinearCurve {
    pub fn ticks(&self, trim: u8) -> u32 {
        let offset = f64::from(trim) - f64::from(self.center);
        let ticks = f64::from(self.ticks_at_center) + self.slope * offset;
        ticks.round().clamp(0.0, f64::from(u32::MAX)) as u32
    }
}

impl From<&LinearSegment> for LinearCurve {
    fn from(segment: &LinearSegment) -> Self {
        Self {
            center: segment.center,
            ticks_at_center: segment.ticks_at_center,
            slope: segment.slope,
        }
    }
}

/// Ticks counted over one measurement as a function of the trim value.
#[derive(Debug, Clone, PartialEq)]
pub enum OscillatorModel {
    Linear(LinearCurve),
    /// Two curves split at `0x80`, the upper one starting over from a lower
    /// frequency.
    Folded {
        lower: LinearCurve,
        upper: LinearCurve,
    },
    Table(Box<[u32; 256]>),
}

impl OscillatorModel {
    /// A linear part that hits `target` at mid-scale.
    pub fn nominal(target: u32) -> Self {
        OscillatorModel::Linear(LinearCurve {
            center: 0x80,
            ticks_at_center: target,
            slope: f64::from(target) / 200.0,
        })
    }

    pub fn from_config(config: &OscillatorConfig) -> Result<Self, ConfigError> {
        match config {
            OscillatorConfig::Linear(segment) => Ok(OscillatorModel::Linear(segment.into())),
            OscillatorConfig::Folded { lower, upper } => Ok(OscillatorModel::Folded {
                lower: lower.into(),
                upper: upper.into(),
            }),
            OscillatorConfig::Table { ticks } => {
                let table: [u32; 256] = ticks
                    .as_slice()
                    .try_into()
                    .map_err(|_| ConfigError::TableLength(ticks.len()))?;
                Ok(OscillatorModel::Table(Box::new(table)))
            }
        }
    }

    pub fn ticks(&self, trim: u8) -> u32 {
        match self {
            OscillatorModel::Linear(curve) => curve.ticks(trim),
            OscillatorModel::Folded { lower, upper } => {
                if trim < 0x80 {
                    lower.ticks(trim)
                } else {
                    upper.ticks(trim)
                }
            }
            OscillatorModel::Table(table) => table[usize::from(trim)],
        }
    }
}
