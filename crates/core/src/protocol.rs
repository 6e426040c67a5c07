// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Handshake, calibration and reporting, run once per reset.
//!
//! ```text
//! Ready -> AwaitingIdle -> AwaitingEdge -> Calibrating -> Reporting -> Halted
//! ```
//!
//! The programmer holds the reference line high (pull-up), pulls it low and
//! then starts clocking. Measuring only begins after the first rising edge so
//! the search never samples a floating or idle line. There are no retries: a
//! failed calibration is reported once and a new attempt needs a reset.

use crate::hal::{NvStorage, ReferenceLine, StatusLine, TickMeter, TrimRegister, Watchdog};
use crate::search::Search;
use crate::signals::DigitalLevel;
use crate::stepper::TrimStepper;
use crate::timing::CalibrationParams;
use crate::variant::OscVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Ready,
    AwaitingIdle,
    AwaitingEdge,
    Calibrating,
    Reporting,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Trim persisted and completion signalled.
    Calibrated { trim: u8 },
    /// Nothing persisted; the register holds the closest value found.
    Failed { trim: u8 },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Calibrated { .. })
    }

    pub fn trim(&self) -> u8 {
        match *self {
            Outcome::Calibrated { trim } | Outcome::Failed { trim } => trim,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibratorConfig {
    pub params: CalibrationParams,
    pub variant: OscVariant,
    /// Storage address of the persisted trim byte.
    pub storage_address: u16,
}

/// Hardware handed to a [`Calibrator`].
#[derive(Debug)]
pub struct Parts<T, M, W, L, S, N> {
    pub trim: T,
    pub meter: M,
    pub watchdog: W,
    pub reference: L,
    pub status: S,
    pub storage: N,
}

#[derive(Debug)]
pub struct Calibrator<T, M, W, L, S, N> {
    stepper: TrimStepper<T>,
    meter: M,
    watchdog: W,
    reference: L,
    status: S,
    storage: N,
    config: CalibratorConfig,
    state: State,
    found: bool,
    outcome: Option<Outcome>,
}

impl<T, M, W, L, S, N> Calibrator<T, M, W, L, S, N>
where
    T: TrimRegister,
    M: TickMeter,
    W: Watchdog,
    L: ReferenceLine,
    S: StatusLine,
    N: NvStorage,
{
    pub fn new(parts: Parts<T, M, W, L, S, N>, config: CalibratorConfig) -> Self {
        Self {
            stepper: TrimStepper::new(parts.trim, config.params.max_step),
            meter: parts.meter,
            watchdog: parts.watchdog,
            reference: parts.reference,
            status: parts.status,
            storage: parts.storage,
            config,
            state: State::Ready,
            found: false,
            outcome: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    /// Set once reporting is done.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Runs the work of the current state and moves to the next one.
    ///
    /// In `Halted` this only serves the watchdog.
    pub fn advance(&mut self) -> State {
        let next = match self.state {
            State::Ready => {
                self.announce_ready();
                State::AwaitingIdle
            }
            State::AwaitingIdle => {
                let polls = self.wait_for(DigitalLevel::Low);
                debug!("reference idle after {} polls", polls);
                State::AwaitingEdge
            }
            State::AwaitingEdge => {
                let polls = self.wait_for(DigitalLevel::High);
                debug!("reference edge after {} polls", polls);
                State::Calibrating
            }
            State::Calibrating => {
                self.found = self.search_variant();
                State::Reporting
            }
            State::Reporting => {
                self.outcome = Some(self.report());
                State::Halted
            }
            State::Halted => {
                self.watchdog.kick();
                State::Halted
            }
        };
        self.state = next;
        next
    }

    /// Drives the sequence up to `Halted` and returns the result.
    pub fn calibrate(&mut self) -> Outcome {
        while self.state != State::Halted {
            self.advance();
        }
        // Reporting always precedes Halted
        self.outcome.unwrap_or(Outcome::Failed {
            trim: self.stepper.current(),
        })
    }

    /// Firmware entry: calibrate, then serve the watchdog forever.
    pub fn run(mut self) -> ! {
        self.calibrate();
        loop {
            self.watchdog.kick();
        }
    }

    pub fn into_parts(self) -> Parts<T, M, W, L, S, N> {
        Parts {
            trim: self.stepper.into_inner(),
            meter: self.meter,
            watchdog: self.watchdog,
            reference: self.reference,
            status: self.status,
            storage: self.storage,
        }
    }

    fn announce_ready(&mut self) {
        self.status.set_output();
        self.reference.enable_pull_up();
        self.status.set_level(DigitalLevel::High);
    }

    fn wait_for(&mut self, level: DigitalLevel) -> u32 {
        let mut polls = 0u32;
        while self.reference.level() != level {
            self.watchdog.kick();
            polls = polls.saturating_add(1);
        }
        polls
    }

    fn search_variant(&mut self) -> bool {
        let variant = self.config.variant;
        info!("calibrating {} against {} ticks", variant, self.config.params.target_ticks);
        variant.ranges().iter().any(|&range| {
            Search::new(
                &mut self.stepper,
                &mut self.meter,
                &mut self.watchdog,
                &self.config.params,
            )
            .calibrate_range(range)
        })
    }

    fn report(&mut self) -> Outcome {
        let trim = self.stepper.current();
        if self.found {
            self.watchdog.kick();
            self.storage.update_byte(self.config.storage_address, trim);
            self.watchdog.kick();
            self.status.signal_done();
            info!("calibrated, trim {:#04x} stored", trim);
            Outcome::Calibrated { trim }
        } else {
            self.status.set_level(DigitalLevel::Low);
            warn!("calibration failed, closest trim {:#04x}", trim);
            Outcome::Failed { trim }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::DigitalLevel::{High, Low};
    use crate::testing::{
        Bench, BenchMeter, BenchReference, BenchStatus, BenchStorage, BenchTrim, BenchWatchdog,
    };

    type BenchCalibrator<'a> = Calibrator<
        BenchTrim<'a>,
        BenchMeter<'a>,
        BenchWatchdog<'a>,
        BenchReference<'a>,
        BenchStatus<'a>,
        BenchStorage<'a>,
    >;

    fn calibrator(bench: &Bench, variant: OscVariant, target: u32) -> BenchCalibrator<'_> {
        Calibrator::new(
            Parts {
                trim: bench.trim(),
                meter: bench.meter(),
                watchdog: bench.watchdog(),
                reference: bench.reference(),
                status: bench.status(),
                storage: bench.storage(),
            },
            CalibratorConfig {
                params: CalibrationParams::new(target, 16),
                variant,
                storage_address: 2,
            },
        )
    }

    #[test]
    fn test_states_follow_the_handshake() {
        let bench = Bench::new(|t| 1000 + u32::from(t) - 128)
            .with_reference(&[High, High, Low, Low, Low]);
        let mut cal = calibrator(&bench, OscVariant::V1, 1000);

        assert_eq!(cal.state(), State::Ready);
        assert_eq!(cal.advance(), State::AwaitingIdle);
        assert!(bench.pull_up());
        assert!(bench.status_is_output());
        assert_eq!(bench.status_levels(), vec![High]);

        assert_eq!(cal.advance(), State::AwaitingEdge);
        assert_eq!(bench.kicks(), 2);
        assert_eq!(cal.advance(), State::Calibrating);
        // two more lows before the line goes high again
        assert_eq!(bench.kicks(), 4);
        assert!(bench.measured().is_empty());

        assert_eq!(cal.advance(), State::Reporting);
        assert_eq!(cal.outcome(), None);
        assert_eq!(cal.advance(), State::Halted);
        assert_eq!(cal.outcome(), Some(Outcome::Calibrated { trim: 128 }));

        let kicks = bench.kicks();
        assert_eq!(cal.advance(), State::Halted);
        assert_eq!(bench.kicks(), kicks + 1);
    }

    #[test]
    fn test_success_persists_and_signals() {
        let bench = Bench::new(|t| 1000 + u32::from(t) - 128).with_reference(&[Low]);
        let outcome = calibrator(&bench, OscVariant::V2, 1000).calibrate();

        assert_eq!(outcome, Outcome::Calibrated { trim: 128 });
        assert_eq!(bench.stored(2), 128);
        assert_eq!(bench.storage_writes(), 1);
        assert_eq!(bench.done_signals(), 1);
        assert_eq!(bench.status_levels(), vec![High]);
    }

    #[test]
    fn test_unchanged_value_is_not_rewritten() {
        let bench = Bench::new(|t| 1000 + u32::from(t) - 0xFF).with_reference(&[Low]);
        let outcome = calibrator(&bench, OscVariant::V3, 1000).calibrate();

        assert_eq!(outcome.trim(), 0xFF);
        assert!(outcome.is_success());
        // erased storage already holds 0xFF
        assert_eq!(bench.storage_writes(), 0);
        assert_eq!(bench.done_signals(), 1);
    }

    #[test]
    fn test_failure_drives_status_low_and_keeps_storage() {
        let bench = Bench::new(|t| (1050 + 100 * (i64::from(t) - 128)).max(0) as u32)
            .with_reference(&[Low]);
        let outcome = calibrator(&bench, OscVariant::V1, 1000).calibrate();

        assert_eq!(outcome, Outcome::Failed { trim: 128 });
        assert!(!outcome.is_success());
        assert_eq!(bench.value(), 128);
        assert_eq!(bench.status_levels(), vec![High, Low]);
        assert_eq!(bench.storage_writes(), 0);
        assert_eq!(bench.done_signals(), 0);
    }

    #[test]
    fn test_split_variant_falls_through_to_upper_half() {
        // lower half far too slow, upper half exact at 200
        let bench = Bench::new(|t| {
            if t < 0x80 {
                500 + u32::from(t)
            } else {
                1000 + u32::from(t) - 200
            }
        })
        .with_reference(&[Low]);
        let outcome = calibrator(&bench, OscVariant::V5, 1000).calibrate();

        assert_eq!(outcome, Outcome::Calibrated { trim: 200 });
        assert_eq!(bench.stored(2), 200);
        assert!(bench.measured().iter().any(|&t| t < 0x80));
    }

    #[test]
    fn test_split_variant_stops_after_lower_success() {
        let bench = Bench::new(|t| 1000 + u32::from(t) - 64).with_reference(&[Low]);
        let outcome = calibrator(&bench, OscVariant::V5, 1000).calibrate();

        assert_eq!(outcome, Outcome::Calibrated { trim: 64 });
        assert!(bench.measured().iter().all(|&t| t < 0x80));
    }

    #[test]
    fn test_lower_only_variant_never_leaves_lower_half() {
        let bench = Bench::new(|t| 1000 + u32::from(t) - 200).with_reference(&[Low]);
        let outcome = calibrator(&bench, OscVariant::V4, 1000).calibrate();

        assert!(!outcome.is_success());
        assert_eq!(outcome.trim(), 0x7F);
        assert!(bench.measured().iter().all(|&t| t < 0x80));
    }

    #[test]
    fn test_into_parts_returns_hardware() {
        let bench = Bench::new(|t| 1000 + u32::from(t) - 128).with_reference(&[Low]);
        let mut cal = calibrator(&bench, OscVariant::V1, 1000);
        cal.calibrate();
        let parts = cal.into_parts();
        assert_eq!(parts.trim.read(), 128);
    }
}
