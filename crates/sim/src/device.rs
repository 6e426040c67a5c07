// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::cell::RefCell;
use std::rc::Rc;

use osccal_config::{CalibrationProfile, ConfigError};
use osccal_core::hal::{NvStorage, ReferenceLine, StatusLine, TickMeter, TrimRegister, Watchdog};
use osccal_core::{Calibrator, CalibratorConfig, DigitalLevel, Parts};

use crate::model::OscillatorModel;

/// EEPROM size; higher address bits are ignored, as on AVR parts.
pub const EEPROM_SIZE: usize = 512;

/// Core ticks spent on one reference-line read.
pub const POLL_COST_TICKS: u64 = 8;

/// Toggles in the completion signal, one per reference edge.
pub const DONE_TOGGLES: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSetup {
    /// Reference cycles per measurement.
    pub freq_cycles: u32,
    pub idle_polls: u32,
    pub edge_polls: u32,
    pub watchdog_timeout: u64,
    /// Trim value out of reset.
    pub initial_trim: u8,
}

impl Default for DeviceSetup {
    fn default() -> Self {
        Self {
            freq_cycles: 8,
            idle_polls: 4,
            edge_polls: 4,
            watchdog_timeout: 1_000_000,
            initial_trim: 0x80,
        }
    }
}

/// Status line change, timestamped in reference cycles since power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub cycle: u64,
    pub level: DigitalLevel,
}

#[derive(Debug)]
struct DeviceState {
    model: OscillatorModel,
    setup: DeviceSetup,
    cycle: u64,

    trim: u8,
    /// `(cycle, value)` per trim write.
    trim_writes: Vec<(u64, u8)>,
    measurements: Vec<(u8, u32)>,

    reference_polls: u32,
    pull_up: bool,

    status_output: bool,
    status_events: Vec<StatusEvent>,
    done_signals: u32,

    eeprom: Vec<u8>,
    eeprom_writes: u32,

    kicks: u32,
    ticks_since_kick: u64,
    longest_unkicked: u64,
    bites: u32,
}

impl DeviceState {
    fn new(model: OscillatorModel, setup: DeviceSetup) -> Self {
        Self {
            model,
            setup,
            cycle: 0,
            trim: setup.initial_trim,
            trim_writes: Vec::new(),
            measurements: Vec::new(),
            reference_polls: 0,
            pull_up: false,
            status_output: false,
            status_events: Vec::new(),
            done_signals: 0,
            eeprom: vec![0xFF; EEPROM_SIZE],
            eeprom_writes: 0,
            kicks: 0,
            ticks_since_kick: 0,
            longest_unkicked: 0,
            bites: 0,
        }
    }

    fn spend(&mut self, ticks: u64) {
        let before = self.ticks_since_kick;
        self.ticks_since_kick = before.saturating_add(ticks);
        self.longest_unkicked = self.longest_unkicked.max(self.ticks_since_kick);
        if before <= self.setup.watchdog_timeout
            && self.ticks_since_kick > self.setup.watchdog_timeout
        {
            self.bites += 1;
            tracing::warn!(
                "Watchdog bite: {} ticks without a kick (timeout {})",
                self.ticks_since_kick,
                self.setup.watchdog_timeout
            );
        }
    }

    fn status_level_at(&self, cycle: u64) -> DigitalLevel {
        self.status_events
            .iter()
            .rev()
            .find(|event| event.cycle <= cycle)
            .map(|event| event.level)
            // undriven line reads high through the programmer's pull-up
            .unwrap_or(DigitalLevel::High)
    }

    fn push_status(&mut self, level: DigitalLevel) {
        self.status_events.push(StatusEvent {
            cycle: self.cycle,
            level,
        });
    }
}

/// Shared handle to one simulated microcontroller.
///
/// Clones refer to the same device; the hal handles it hands out do too.
#[derive(Debug, Clone)]
pub struct SimDevice {
    state: Rc<RefCell<DeviceState>>,
}

pub type SimParts = Parts<SimTrim, SimMeter, SimWatchdog, SimReference, SimStatus, SimStorage>;
pub type SimCalibrator =
    Calibrator<SimTrim, SimMeter, SimWatchdog, SimReference, SimStatus, SimStorage>;

impl SimDevice {
    pub fn new(model: OscillatorModel, setup: DeviceSetup) -> Self {
        Self {
            state: Rc::new(RefCell::new(DeviceState::new(model, setup))),
        }
    }

    pub fn from_profile(profile: &CalibrationProfile) -> Result<Self, ConfigError> {
        profile.validate()?;
        let model = match &profile.oscillator {
            Some(config) => OscillatorModel::from_config(config)?,
            None => OscillatorModel::nominal(profile.params().target_ticks),
        };
        let setup = DeviceSetup {
            freq_cycles: profile.clock.freq_cycles,
            idle_polls: profile.handshake.idle_polls,
            edge_polls: profile.handshake.edge_polls,
            watchdog_timeout: profile.watchdog.timeout_ticks,
            ..DeviceSetup::default()
        };
        Ok(Self::new(model, setup))
    }

    pub fn parts(&self) -> SimParts {
        Parts {
            trim: SimTrim(self.clone()),
            meter: SimMeter(self.clone()),
            watchdog: SimWatchdog(self.clone()),
            reference: SimReference(self.clone()),
            status: SimStatus(self.clone()),
            storage: SimStorage(self.clone()),
        }
    }

    pub fn calibrator(&self, config: CalibratorConfig) -> SimCalibrator {
        Calibrator::new(self.parts(), config)
    }

    /// External reset: volatile state restarts, EEPROM survives.
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        let eeprom = std::mem::take(&mut state.eeprom);
        let eeprom_writes = state.eeprom_writes;
        let model = state.model.clone();
        let setup = state.setup;
        *state = DeviceState::new(model, setup);
        state.eeprom = eeprom;
        state.eeprom_writes = eeprom_writes;
    }

    pub fn setup(&self) -> DeviceSetup {
        self.state.borrow().setup
    }

    /// Reference cycles since power-up.
    pub fn cycle(&self) -> u64 {
        self.state.borrow().cycle
    }

    pub fn trim(&self) -> u8 {
        self.state.borrow().trim
    }

    /// Ticks one measurement would count at the current trim.
    pub fn ticks_now(&self) -> u32 {
        let state = self.state.borrow();
        state.model.ticks(state.trim)
    }

    pub fn trim_writes(&self) -> Vec<u8> {
        self.state
            .borrow()
            .trim_writes
            .iter()
            .map(|&(_, value)| value)
            .collect()
    }

    /// Trim writes with the reference cycle they happened in.
    pub fn trim_trace(&self) -> Vec<(u64, u8)> {
        self.state.borrow().trim_writes.clone()
    }

    /// `(trim, ticks)` for every measurement taken.
    pub fn measurements(&self) -> Vec<(u8, u32)> {
        self.state.borrow().measurements.clone()
    }

    pub fn pull_up_enabled(&self) -> bool {
        self.state.borrow().pull_up
    }

    pub fn status_is_output(&self) -> bool {
        self.state.borrow().status_output
    }

    pub fn status_events(&self) -> Vec<StatusEvent> {
        self.state.borrow().status_events.clone()
    }

    pub fn status_level(&self) -> DigitalLevel {
        let state = self.state.borrow();
        state.status_level_at(state.cycle)
    }

    pub fn done_signals(&self) -> u32 {
        self.state.borrow().done_signals
    }

    pub fn eeprom_byte(&self, address: u16) -> u8 {
        self.state.borrow().eeprom[usize::from(address) % EEPROM_SIZE]
    }

    pub fn eeprom_writes(&self) -> u32 {
        self.state.borrow().eeprom_writes
    }

    pub fn kicks(&self) -> u32 {
        self.state.borrow().kicks
    }

    pub fn watchdog_bites(&self) -> u32 {
        self.state.borrow().bites
    }

    pub fn longest_unkicked(&self) -> u64 {
        self.state.borrow().longest_unkicked
    }

    /// Starts the reference clock without the handshake polls.
    pub fn advance_cycles(&self, cycles: u64) {
        let mut state = self.state.borrow_mut();
        state.cycle = state.cycle.saturating_add(cycles);
    }

    /// Status line sampled twice per reference cycle from `start`, packed
    /// MSB first.
    pub fn capture(&self, start: u64, bytes: usize) -> Vec<u8> {
        let state = self.state.borrow();
        let mut capture = Vec::with_capacity(bytes);
        for index in 0..bytes {
            let mut byte = 0u8;
            for bit in 0..8u64 {
                let sample = index as u64 * 8 + bit;
                if state.status_level_at(start + sample / 2).is_high() {
                    byte |= 0x80 >> bit;
                }
            }
            capture.push(byte);
        }
        capture
    }
}

#[derive(Debug, Clone)]
pub struct SimTrim(SimDevice);

impl TrimRegister for SimTrim {
    fn read(&self) -> u8 {
        self.0.state.borrow().trim
    }

    fn write(&mut self, value: u8) {
        let mut state = self.0.state.borrow_mut();
        let cycle = state.cycle;
        state.trim = value;
        state.trim_writes.push((cycle, value));
        state.spend(1);
    }
}

#[derive(Debug, Clone)]
pub struct SimMeter(SimDevice);

impl TickMeter for SimMeter {
    fn measure(&mut self) -> u32 {
        let mut state = self.0.state.borrow_mut();
        let trim = state.trim;
        let ticks = state.model.ticks(trim);
        state.measurements.push((trim, ticks));
        state.cycle += u64::from(state.setup.freq_cycles);
        state.spend(u64::from(ticks));
        tracing::trace!("trim 0x{:02x} -> {} ticks", trim, ticks);
        ticks
    }
}

#[derive(Debug, Clone)]
pub struct SimWatchdog(SimDevice);

impl Watchdog for SimWatchdog {
    fn kick(&mut self) {
        let mut state = self.0.state.borrow_mut();
        state.kicks += 1;
        state.ticks_since_kick = 0;
    }
}

/// Reads high for `idle_polls`, low for `edge_polls`, then high.
#[derive(Debug, Clone)]
pub struct SimReference(SimDevice);

impl ReferenceLine for SimReference {
    fn enable_pull_up(&mut self) {
        self.0.state.borrow_mut().pull_up = true;
    }

    fn level(&mut self) -> DigitalLevel {
        let mut state = self.0.state.borrow_mut();
        let poll = state.reference_polls;
        state.reference_polls = poll.saturating_add(1);
        state.spend(POLL_COST_TICKS);

        let idle = state.setup.idle_polls;
        let low_until = idle.saturating_add(state.setup.edge_polls);
        if poll >= idle && poll < low_until {
            DigitalLevel::Low
        } else {
            DigitalLevel::High
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimStatus(SimDevice);

impl StatusLine for SimStatus {
    fn set_output(&mut self) {
        self.0.state.borrow_mut().status_output = true;
    }

    fn set_level(&mut self, level: DigitalLevel) {
        self.0.state.borrow_mut().push_status(level);
    }

    fn signal_done(&mut self) {
        let mut state = self.0.state.borrow_mut();
        let mut level = state.status_level_at(state.cycle);
        for _ in 0..DONE_TOGGLES {
            state.cycle += 1;
            level = level.toggled();
            state.push_status(level);
        }
        state.done_signals += 1;
    }
}

#[derive(Debug, Clone)]
pub struct SimStorage(SimDevice);

impl NvStorage for SimStorage {
    fn read_byte(&self, address: u16) -> u8 {
        self.0.eeprom_byte(address)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        let mut state = self.0.state.borrow_mut();
        state.eeprom[usize::from(address) % EEPROM_SIZE] = value;
        state.eeprom_writes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearCurve;

    fn device(setup: DeviceSetup) -> SimDevice {
        SimDevice::new(
            OscillatorModel::Linear(LinearCurve {
                center: 0,
                ticks_at_center: 1000,
                slope: 1.0,
            }),
            setup,
        )
    }

    #[test]
    fn test_reference_script() {
        let dev = device(DeviceSetup {
            idle_polls: 2,
            edge_polls: 1,
            ..DeviceSetup::default()
        });
        let mut reference = dev.parts().reference;
        let levels: Vec<_> = (0..5).map(|_| reference.level()).collect();
        assert_eq!(
            levels,
            vec![
                DigitalLevel::High,
                DigitalLevel::High,
                DigitalLevel::Low,
                DigitalLevel::High,
                DigitalLevel::High
            ]
        );
    }

    #[test]
    fn test_measurement_consumes_reference_cycles() {
        let dev = device(DeviceSetup::default());
        let Parts {
            mut trim,
            mut meter,
            ..
        } = dev.parts();
        trim.write(10);
        assert_eq!(meter.measure(), 1010);
        assert_eq!(dev.cycle(), 8);
        assert_eq!(dev.measurements(), vec![(10, 1010)]);
    }

    #[test]
    fn test_watchdog_bites_once_per_unkicked_span() {
        let dev = device(DeviceSetup {
            watchdog_timeout: 1500,
            initial_trim: 0,
            ..DeviceSetup::default()
        });
        let Parts {
            mut meter,
            mut watchdog,
            ..
        } = dev.parts();
        meter.measure();
        assert_eq!(dev.watchdog_bites(), 0);
        meter.measure();
        meter.measure();
        assert_eq!(dev.watchdog_bites(), 1);
        watchdog.kick();
        meter.measure();
        assert_eq!(dev.watchdog_bites(), 1);
        assert_eq!(dev.longest_unkicked(), 3000);
        assert_eq!(dev.kicks(), 1);
    }

    #[test]
    fn test_done_signal_capture() {
        let dev = device(DeviceSetup::default());
        let mut status = dev.parts().status;
        status.set_output();
        status.set_level(DigitalLevel::High);
        dev.advance_cycles(4);
        status.signal_done();

        assert_eq!(dev.status_events().len(), 9);
        // toggles start on the edge after cycle 4, one level per cycle
        assert_eq!(dev.capture(0, 4), vec![0xFF, 0xCC, 0xCC, 0xFF]);
        assert_eq!(dev.status_level(), DigitalLevel::High);
    }

    #[test]
    fn test_reset_keeps_eeprom() {
        let dev = device(DeviceSetup::default());
        let Parts {
            mut trim,
            mut storage,
            ..
        } = dev.parts();
        trim.write(0x42);
        storage.update_byte(600, 0x42);
        dev.reset();

        assert_eq!(dev.trim(), 0x80);
        assert!(dev.trim_writes().is_empty());
        assert_eq!(dev.eeprom_byte(600 - 512), 0x42);
        assert_eq!(dev.eeprom_writes(), 1);
    }
}
