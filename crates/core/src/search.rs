// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Trim search: binary search, then an exhaustive scan around the last
//! candidate.
//!
//! The binary phase relies on ticks growing with trim inside the searched
//! range. Parts whose curve folds have to be searched one monotonic half at
//! a time (see [`OscVariant`](crate::variant::OscVariant)).

use crate::hal::{TickMeter, TrimRegister, Watchdog};
use crate::range::TrimRange;
use crate::stepper::TrimStepper;
use crate::timing::CalibrationParams;

/// Scan window around the last binary-search candidate: two below, two
/// above, clipped to `range`.
///
/// A bound only moves inward when the candidate sits more than two values
/// away from it, so narrow ranges keep their original bounds. `candidate` is
/// clamped into `range` first.
pub fn refinement_window(candidate: u8, range: TrimRange) -> TrimRange {
    let candidate = candidate.clamp(range.min(), range.max());
    let mut min = range.min();
    let mut max = range.max();

    if u16::from(candidate) > u16::from(min) + 2 {
        min = candidate - 2;
    }
    if i16::from(candidate) < i16::from(max) - 2 {
        max = candidate + 2;
    }

    TrimRange::new(min, max)
}

/// One search invocation over borrowed hardware.
pub struct Search<'a, R, M, W> {
    stepper: &'a mut TrimStepper<R>,
    meter: &'a mut M,
    watchdog: &'a mut W,
    params: &'a CalibrationParams,
}

impl<'a, R, M, W> Search<'a, R, M, W>
where
    R: TrimRegister,
    M: TickMeter,
    W: Watchdog,
{
    pub fn new(
        stepper: &'a mut TrimStepper<R>,
        meter: &'a mut M,
        watchdog: &'a mut W,
        params: &'a CalibrationParams,
    ) -> Self {
        Self {
            stepper,
            meter,
            watchdog,
            params,
        }
    }

    /// Returns `true` on an exact match or when the closest value found is
    /// within tolerance. Either way the register is left at the best value
    /// measured.
    pub fn calibrate_range(&mut self, range: TrimRange) -> bool {
        let target = self.params.target_ticks;
        // span is at most 256, so the first step fits in a u8
        let mut step = (range.span() / 2) as u8;
        let mut candidate = range.min() + step;

        debug!("searching {} for {} ticks", range, target);
        loop {
            self.watchdog.kick();
            let ticks = self.measure_at(candidate);
            if ticks == target {
                debug!("exact match at {:#04x}", candidate);
                return true;
            }

            step /= 2;
            if step == 0 {
                break;
            }

            if ticks < target {
                candidate += step;
            } else {
                candidate -= step;
            }
        }

        self.refine(range, candidate)
    }

    fn refine(&mut self, range: TrimRange, candidate: u8) -> bool {
        let target = self.params.target_ticks;
        let window = refinement_window(candidate, range);
        let mut best = candidate;
        let mut min_deviation = u32::MAX;

        trace!("refining over {}", window);
        self.watchdog.kick();
        for trim in window.iter() {
            let ticks = self.measure_at(trim);
            if ticks == target {
                debug!("exact match at {:#04x}", trim);
                return true;
            }
            let deviation = self.params.deviation(ticks);
            if deviation <= min_deviation {
                min_deviation = deviation;
                best = trim;
            }
        }

        self.stepper.apply(best);
        let accepted = self.params.accepts(min_deviation);
        debug!(
            "closest {:#04x} off by {} ticks (tolerance {}): {}",
            best,
            min_deviation,
            self.params.tolerance_ticks,
            if accepted { "accepted" } else { "rejected" }
        );
        accepted
    }

    fn measure_at(&mut self, trim: u8) -> u32 {
        self.stepper.apply(trim);
        let ticks = self.meter.measure();
        trace!("trim {:#04x} -> {} ticks", trim, ticks);
        ticks
    }
}
