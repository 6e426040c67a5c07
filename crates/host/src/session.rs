// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::decode::{decode_done_signal, SignalVerdict};
use crate::error::{HostError, HostResult};
use crate::mpsse::{ClockSetup, CommandBuffer, Pins};

/// Byte pipe to an MPSSE engine.
pub trait Transport {
    fn write(&mut self, data: &[u8]) -> HostResult<()>;
    /// Returns up to `len` bytes of pending read data.
    fn read(&mut self, len: usize) -> HostResult<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> HostResult<()> {
        (**self).write(data)
    }

    fn read(&mut self, len: usize) -> HostResult<Vec<u8>> {
        (**self).read(len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reference frequency seen by the target.
    pub reference_hz: u32,
    pub training_bytes: usize,
    pub ready_window_bytes: usize,
    pub max_ready_polls: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reference_hz: 32_768,
            training_bytes: 4000,
            ready_window_bytes: 4000,
            max_ready_polls: 100,
        }
    }
}

impl SessionConfig {
    /// One reference cycle is a high bit followed by a low bit.
    pub fn bit_rate(&self) -> u32 {
        self.reference_hz.saturating_mul(2)
    }

    /// Training pattern clocked out while the status line is sampled.
    pub fn training_pattern(&self) -> Vec<u8> {
        vec![0x55; self.training_bytes]
    }
}

/// Clock setup, reset pulse and boot delay.
pub fn reset_sequence(config: &SessionConfig) -> CommandBuffer {
    let bit_rate = config.bit_rate();
    let mut cmd = CommandBuffer::new();
    cmd.clock(ClockSetup::for_bit_rate(bit_rate))
        .set_bits_low(Pins::MOSI, Pins::OUTPUTS)
        .delay(bit_rate, 0.001)
        .set_bits_low(Pins::MOSI | Pins::RESET, Pins::OUTPUTS)
        .delay(bit_rate, 0.100);
    cmd
}

/// Leaves the reference idle high and the target out of reset.
pub fn release_sequence() -> CommandBuffer {
    let mut cmd = CommandBuffer::new();
    cmd.set_bits_low(Pins::MOSI | Pins::RESET, Pins::OUTPUTS);
    cmd
}

/// One calibration run against a single target.
pub struct Session<T> {
    transport: T,
    config: SessionConfig,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Reset, handshake, train, release.
    ///
    /// Pins are released even when the handshake or training fails.
    pub fn run(&mut self) -> HostResult<SignalVerdict> {
        self.reset_target()?;
        let result = self.wait_ready().and_then(|_| self.train());
        let released = self.release();
        let verdict = result?;
        released?;
        Ok(verdict)
    }

    pub fn reset_target(&mut self) -> HostResult<()> {
        let cmd = reset_sequence(&self.config);
        tracing::debug!(
            "Resetting target at {} bit/s ({} command bytes)",
            self.config.bit_rate(),
            cmd.len()
        );
        self.transport.write(cmd.as_bytes())
    }

    /// Polls the status line until a whole window reads high.
    ///
    /// Returns the number of windows that were not yet idle.
    pub fn wait_ready(&mut self) -> HostResult<u32> {
        let len = self.config.ready_window_bytes;
        let mut cmd = CommandBuffer::new();
        cmd.read(len)?;

        for poll in 0..self.config.max_ready_polls {
            self.transport.write(cmd.as_bytes())?;
            let window = self.read_exact(len)?;
            if window.iter().all(|&b| b == 0xFF) {
                tracing::info!("Target ready after {} polls", poll);
                return Ok(poll);
            }
            tracing::debug!("Status line not idle yet (poll {})", poll);
        }

        Err(HostError::NotReady {
            polls: self.config.max_ready_polls,
        })
    }

    /// Clocks the training pattern and decodes the captured status line.
    pub fn train(&mut self) -> HostResult<SignalVerdict> {
        let pattern = self.config.training_pattern();
        let mut cmd = CommandBuffer::new();
        cmd.write_read(&pattern)?;
        self.transport.write(cmd.as_bytes())?;
        let capture = self.read_exact(pattern.len())?;

        let verdict = decode_done_signal(&capture);
        match verdict {
            SignalVerdict::Done { at_sample } => {
                tracing::info!("Done signal received at sample {}", at_sample)
            }
            other => tracing::warn!("No done signal: {:?}", other),
        }
        Ok(verdict)
    }

    pub fn release(&mut self) -> HostResult<()> {
        self.transport.write(release_sequence().as_bytes())
    }

    fn read_exact(&mut self, len: usize) -> HostResult<Vec<u8>> {
        let data = self.transport.read(len)?;
        if data.len() != len {
            return Err(HostError::ShortRead {
                expected: len,
                got: data.len(),
            });
        }
        Ok(data)
    }
}
