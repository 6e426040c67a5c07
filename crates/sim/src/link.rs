// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! MPSSE engine wired to a simulated target.

use std::collections::VecDeque;

use osccal_core::{CalibratorConfig, Outcome};
use osccal_host::error::HostResult;
use osccal_host::mpsse::opcode;
use osccal_host::{HostError, Pins, Transport};

use crate::device::{SimCalibrator, SimDevice};

/// Interprets the command stream a [`Session`](osccal_host::Session) sends
/// and answers reads from the device's status line.
///
/// Releasing reset boots the firmware up to its ready indication. The
/// training transfer runs the whole calibration while the reference clock
/// is being driven; its read data is the status line sampled at two samples
/// per reference cycle, cut off at the end of the transfer.
#[derive(Debug)]
pub struct SimLink {
    device: SimDevice,
    config: CalibratorConfig,
    calibrator: Option<SimCalibrator>,
    in_reset: bool,
    pending: VecDeque<u8>,
    outcome: Option<Outcome>,
}

impl SimLink {
    pub fn new(device: SimDevice, config: CalibratorConfig) -> Self {
        Self {
            device,
            config,
            calibrator: None,
            in_reset: false,
            pending: VecDeque::new(),
            outcome: None,
        }
    }

    pub fn device(&self) -> &SimDevice {
        &self.device
    }

    /// Result of the last calibration the target ran.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    fn set_pins(&mut self, value: u8) {
        if value & Pins::RESET == 0 {
            if !self.in_reset {
                tracing::debug!("Target held in reset");
            }
            self.in_reset = true;
            self.calibrator = None;
            self.outcome = None;
            self.device.reset();
        } else if self.in_reset {
            self.in_reset = false;
            let mut calibrator = self.device.calibrator(self.config);
            calibrator.advance();
            tracing::debug!("Target booted, status line {:?}", self.device.status_level());
            self.calibrator = Some(calibrator);
        }
    }

    fn sample_idle(&mut self, len: usize) {
        let byte = if self.device.status_level().is_high() {
            0xFF
        } else {
            0x00
        };
        self.pending.extend(std::iter::repeat(byte).take(len));
    }

    fn train(&mut self, len: usize) {
        let start = self.device.cycle();
        if let Some(calibrator) = self.calibrator.as_mut() {
            let outcome = calibrator.calibrate();
            tracing::debug!(
                "Target finished after {} reference cycles: {:?}",
                self.device.cycle() - start,
                outcome
            );
            self.outcome = Some(outcome);
        }
        self.pending.extend(self.device.capture(start, len));
        let end = start + len as u64 * 4;
        let now = self.device.cycle();
        if now < end {
            self.device.advance_cycles(end - now);
        }
    }

    fn execute(&mut self, data: &[u8]) -> HostResult<()> {
        let mut cursor = 0;
        while cursor < data.len() {
            let op = data[cursor];
            match op {
                opcode::DIS_DIV_5 | opcode::EN_DIV_5 => cursor += 1,
                opcode::TCK_DIVISOR | opcode::CLK_BYTES => {
                    argument(data, cursor, 2)?;
                    cursor += 3;
                }
                opcode::CLK_BITS => {
                    argument(data, cursor, 1)?;
                    cursor += 2;
                }
                opcode::SET_BITS_LOW => {
                    let args = argument(data, cursor, 2)?;
                    self.set_pins(args[0]);
                    cursor += 3;
                }
                opcode::MPSSE_DO_READ => {
                    let len = transfer_length(argument(data, cursor, 2)?);
                    self.sample_idle(len);
                    cursor += 3;
                }
                op if op == opcode::MPSSE_DO_WRITE | opcode::MPSSE_DO_READ => {
                    let len = transfer_length(argument(data, cursor, 2)?);
                    argument(data, cursor + 2, len)?;
                    self.train(len);
                    cursor += 3 + len;
                }
                other => {
                    return Err(HostError::Transport(format!(
                        "unsupported MPSSE opcode 0x{:02x} at offset {}",
                        other, cursor
                    )))
                }
            }
        }
        Ok(())
    }
}

fn argument(data: &[u8], cursor: usize, len: usize) -> HostResult<&[u8]> {
    data.get(cursor + 1..cursor + 1 + len).ok_or_else(|| {
        HostError::Transport(format!("truncated MPSSE command at offset {}", cursor))
    })
}

fn transfer_length(field: &[u8]) -> usize {
    usize::from(u16::from_le_bytes([field[0], field[1]])) + 1
}

impl Transport for SimLink {
    fn write(&mut self, data: &[u8]) -> HostResult<()> {
        self.execute(data)
    }

    fn read(&mut self, len: usize) -> HostResult<Vec<u8>> {
        let take = len.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }
}
