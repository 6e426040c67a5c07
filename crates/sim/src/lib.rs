// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Simulated calibration target.
//!
//! [`SimDevice`] stands in for the microcontroller: an oscillator whose tick
//! count follows a configurable curve, a scripted reference line, a status
//! line with a timestamped history, EEPROM and a watchdog that counts core
//! ticks between kicks. [`SimLink`] puts the device behind the host
//! [`Transport`](osccal_host::Transport) so the programmer session can run
//! against it unchanged.

pub mod device;
pub mod link;
pub mod model;
pub mod run;

pub use device::{DeviceSetup, SimCalibrator, SimDevice, SimParts, StatusEvent};
pub use link::SimLink;
pub use model::{LinearCurve, OscillatorModel};
pub use run::{run_session, session_config, simulate, SimError, SimulationReport};
