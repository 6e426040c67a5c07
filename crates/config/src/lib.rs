// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Calibration profiles.
//!
//! A profile pins everything the firmware fixes at build time (oscillator
//! revision, clock targets, step limit, storage address) plus the host-side
//! settings of the programmer and the simulator.

use anyhow::{Context, Result};
use osccal_core::{CalibrationParams, CalibratorConfig, ClockConfig, OscVariant, UnknownVariant};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: &str = "1.0";

/// Default schema version for YAML profiles
fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_max_step() -> u8 {
    16
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported schema_version '{0}'; supported versions: '1.0'")]
    UnsupportedSchema(String),
    #[error("{0}")]
    Variant(UnknownVariant),
    #[error("clock field '{0}' must be greater than zero")]
    ZeroClock(&'static str),
    #[error("max_step must be greater than zero")]
    ZeroMaxStep,
    #[error("oscillator table must have 256 entries, found {0}")]
    TableLength(usize),
    #[error("oscillator slope must be a finite number")]
    InvalidSlope,
    #[error("watchdog timeout_ticks must be greater than zero")]
    ZeroWatchdogTimeout,
    #[error("programmer field '{0}' must be between 1 and 65536")]
    TransferLength(&'static str),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClockSection {
    /// Target core frequency in Hz.
    pub f_cpu: u32,
    /// Reference clock driven by the programmer, in Hz.
    pub input_freq: u32,
    /// Reference cycles per measurement.
    pub freq_cycles: u32,
}

/// One monotonic segment of a simulated trim curve.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct LinearSegment {
    /// Trim value producing `ticks_at_center`.
    pub center: u8,
    pub ticks_at_center: u32,
    /// Ticks gained per trim step.
    pub slope: f64,
}

/// Trim-to-ticks behaviour of the simulated oscillator.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OscillatorConfig {
    Linear(LinearSegment),
    /// Separate curves below and above `0x80`.
    Folded {
        lower: LinearSegment,
        upper: LinearSegment,
    },
    /// Explicit tick count per trim value.
    Table { ticks: Vec<u32> },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WatchdogSection {
    /// Core ticks allowed between two kicks.
    pub timeout_ticks: u64,
}

impl Default for WatchdogSection {
    fn default() -> Self {
        Self {
            timeout_ticks: 1_000_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HandshakeSection {
    /// Reference reads that still see the idle-high line.
    #[serde(default = "default_polls")]
    pub idle_polls: u32,
    /// Reference reads that see the line held low before the first edge.
    #[serde(default = "default_polls")]
    pub edge_polls: u32,
}

fn default_polls() -> u32 {
    4
}

impl Default for HandshakeSection {
    fn default() -> Self {
        Self {
            idle_polls: default_polls(),
            edge_polls: default_polls(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProgrammerSection {
    /// Bytes of `0x55` clocked out while calibration runs.
    #[serde(default = "default_window_bytes")]
    pub training_bytes: usize,
    /// Status-line bytes that must all read high before training starts.
    #[serde(default = "default_window_bytes")]
    pub ready_window_bytes: usize,
    /// Ready-window reads before giving up.
    #[serde(default = "default_max_ready_polls")]
    pub max_ready_polls: u32,
}

fn default_window_bytes() -> usize {
    4000
}

fn default_max_ready_polls() -> u32 {
    100
}

impl Default for ProgrammerSection {
    fn default() -> Self {
        Self {
            training_bytes: default_window_bytes(),
            ready_window_bytes: default_window_bytes(),
            max_ready_polls: default_max_ready_polls(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CalibrationProfile {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    /// Oscillator revision, 1 to 5.
    pub variant: u8,
    pub clock: ClockSection,
    #[serde(default = "default_max_step")]
    pub max_step: u8,
    #[serde(default)]
    pub storage_address: u16,
    #[serde(default)]
    pub oscillator: Option<OscillatorConfig>,
    #[serde(default)]
    pub watchdog: WatchdogSection,
    #[serde(default)]
    pub handshake: HandshakeSection,
    #[serde(default)]
    pub programmer: ProgrammerSection,
}

impl CalibrationProfile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open calibration profile at {:?}", path))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let profile: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Calibration Profile YAML")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version.trim() != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema(self.schema_version.clone()));
        }

        self.variant()?;

        if self.clock.f_cpu == 0 {
            return Err(ConfigError::ZeroClock("f_cpu"));
        }
        if self.clock.input_freq == 0 {
            return Err(ConfigError::ZeroClock("input_freq"));
        }
        if self.clock.freq_cycles == 0 {
            return Err(ConfigError::ZeroClock("freq_cycles"));
        }
        if self.max_step == 0 {
            return Err(ConfigError::ZeroMaxStep);
        }
        if self.watchdog.timeout_ticks == 0 {
            return Err(ConfigError::ZeroWatchdogTimeout);
        }

        let transfer_ok = |len: usize| (1..=65536).contains(&len);
        if !transfer_ok(self.programmer.training_bytes) {
            return Err(ConfigError::TransferLength("training_bytes"));
        }
        if !transfer_ok(self.programmer.ready_window_bytes) {
            return Err(ConfigError::TransferLength("ready_window_bytes"));
        }

        match &self.oscillator {
            Some(OscillatorConfig::Table { ticks }) if ticks.len() != 256 => {
                Err(ConfigError::TableLength(ticks.len()))
            }
            Some(OscillatorConfig::Linear(segment)) if !segment.slope.is_finite() => {
                Err(ConfigError::InvalidSlope)
            }
            Some(OscillatorConfig::Folded { lower, upper })
                if !lower.slope.is_finite() || !upper.slope.is_finite() =>
            {
                Err(ConfigError::InvalidSlope)
            }
            _ => Ok(()),
        }
    }

    pub fn variant(&self) -> Result<OscVariant, ConfigError> {
        OscVariant::try_from(self.variant).map_err(ConfigError::Variant)
    }

    pub fn clock(&self) -> ClockConfig {
        ClockConfig::new(
            self.clock.f_cpu,
            self.clock.input_freq,
            self.clock.freq_cycles,
        )
    }

    pub fn params(&self) -> CalibrationParams {
        CalibrationParams::from_clock(self.clock(), self.max_step)
    }

    pub fn calibrator_config(&self) -> Result<CalibratorConfig, ConfigError> {
        Ok(CalibratorConfig {
            params: self.params(),
            variant: self.variant()?,
            storage_address: self.storage_address,
        })
    }
}
