// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use osccal_config::{CalibrationProfile, ConfigError};
use osccal_core::Outcome;
use osccal_host::{HostError, Session, SessionConfig, SignalVerdict};
use serde::Serialize;

use crate::device::SimDevice;
use crate::link::SimLink;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// What a full programmer session against the simulated target produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub profile: String,
    pub variant: u8,
    pub target_ticks: u32,
    pub tolerance_ticks: u32,
    pub calibrated: bool,
    pub trim: u8,
    pub ticks: u32,
    pub deviation: u32,
    pub measurements: usize,
    pub trim_writes: usize,
    pub largest_trim_step: u8,
    pub watchdog_kicks: u32,
    pub watchdog_bites: u32,
    pub stored_trim: u8,
    pub storage_writes: u32,
    pub reference_cycles: u64,
    pub host_verdict: SignalVerdict,
}

impl SimulationReport {
    /// Target and programmer agree that calibration completed.
    pub fn passed(&self) -> bool {
        self.calibrated && self.host_verdict.is_done()
    }
}

pub fn session_config(profile: &CalibrationProfile) -> SessionConfig {
    SessionConfig {
        reference_hz: profile.clock.input_freq,
        training_bytes: profile.programmer.training_bytes,
        ready_window_bytes: profile.programmer.ready_window_bytes,
        max_ready_polls: profile.programmer.max_ready_polls,
    }
}

/// Runs the host session against a fresh simulated target.
pub fn simulate(profile: &CalibrationProfile) -> Result<SimulationReport, SimError> {
    run_session(profile).map(|(_, report)| report)
}

/// Like [`simulate`], also handing back the device for inspection.
pub fn run_session(
    profile: &CalibrationProfile,
) -> Result<(SimDevice, SimulationReport), SimError> {
    let config = profile.calibrator_config()?;
    let device = SimDevice::from_profile(profile)?;

    tracing::info!(
        "Simulating '{}' ({}, target {} ticks, tolerance {})",
        profile.name,
        config.variant,
        config.params.target_ticks,
        config.params.tolerance_ticks
    );

    let mut session = Session::new(SimLink::new(device.clone(), config), session_config(profile));
    let host_verdict = session.run()?;
    let link = session.into_transport();

    let outcome = link.outcome().unwrap_or(Outcome::Failed {
        trim: device.trim(),
    });
    let ticks = device.ticks_now();
    let writes = device.trim_writes();
    let largest_trim_step = std::iter::once(device.setup().initial_trim)
        .chain(writes.iter().copied())
        .collect::<Vec<_>>()
        .windows(2)
        .map(|pair| pair[0].abs_diff(pair[1]))
        .max()
        .unwrap_or(0);

    let report = SimulationReport {
        profile: profile.name.clone(),
        variant: config.variant.version(),
        target_ticks: config.params.target_ticks,
        tolerance_ticks: config.params.tolerance_ticks,
        calibrated: outcome.is_success(),
        trim: outcome.trim(),
        ticks,
        deviation: config.params.deviation(ticks),
        measurements: device.measurements().len(),
        trim_writes: writes.len(),
        largest_trim_step,
        watchdog_kicks: device.kicks(),
        watchdog_bites: device.watchdog_bites(),
        stored_trim: device.eeprom_byte(config.storage_address),
        storage_writes: device.eeprom_writes(),
        reference_cycles: device.cycle(),
        host_verdict,
    };
    Ok((device, report))
}
