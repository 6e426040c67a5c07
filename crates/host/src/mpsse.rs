// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! FTDI MPSSE command encoding for the programmer.

use crate::error::{HostError, HostResult};

pub mod opcode {
    pub const MPSSE_DO_WRITE: u8 = 0x10;
    pub const MPSSE_DO_READ: u8 = 0x20;
    pub const SET_BITS_LOW: u8 = 0x80;
    pub const TCK_DIVISOR: u8 = 0x86;
    pub const DIS_DIV_5: u8 = 0x8a;
    pub const EN_DIV_5: u8 = 0x8b;
    pub const CLK_BITS: u8 = 0x8e;
    pub const CLK_BYTES: u8 = 0x8f;
}

/// ADBUS pin assignment of the programming cable.
#[derive(Debug, Clone, Copy)]
pub struct Pins;

impl Pins {
    /// Reference clock out, the target's MOSI.
    pub const MOSI: u8 = 1 << 1;
    /// Status in, the target's MISO.
    pub const MISO: u8 = 1 << 2;
    pub const RESET: u8 = 1 << 3;
    /// Level-shifter output enable.
    pub const BUFFER: u8 = 1 << 6;
    pub const OUTPUTS: u8 = Self::MOSI | Self::RESET | Self::BUFFER;
}

/// MPSSE engine clock before the optional divide-by-5.
pub const BASE_CLOCK_HZ: f64 = 30_000_000.0;

/// Largest payload of one clocked transfer.
pub const MAX_TRANSFER: usize = 65536;

/// Prescaler settings for a given bit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSetup {
    pub divide_by_5: bool,
    pub divisor: u16,
}

impl ClockSetup {
    /// Closest settings for `bit_rate` bits per second.
    ///
    /// Rates below 1 kHz need the divide-by-5 prescaler to stay in range.
    pub fn for_bit_rate(bit_rate: u32) -> Self {
        let divide_by_5 = bit_rate < 1000;
        let numerator = if divide_by_5 {
            BASE_CLOCK_HZ / 5.0
        } else {
            BASE_CLOCK_HZ
        };
        let divisor = (numerator / f64::from(bit_rate) - 1.0)
            .round()
            .clamp(0.0, f64::from(u16::MAX));
        Self {
            divide_by_5,
            divisor: divisor as u16,
        }
    }

    /// Bit rate these settings actually produce.
    pub fn actual_rate(&self) -> f64 {
        let numerator = if self.divide_by_5 {
            BASE_CLOCK_HZ / 5.0
        } else {
            BASE_CLOCK_HZ
        };
        numerator / (f64::from(self.divisor) + 1.0)
    }
}

/// Accumulates MPSSE commands for a single USB write.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandBuffer {
    bytes: Vec<u8>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn op16(&mut self, op: u8, arg: u16) -> &mut Self {
        self.bytes.push(op);
        self.bytes.extend_from_slice(&arg.to_le_bytes());
        self
    }

    /// Length field of a transfer: byte count minus one.
    fn transfer_length(len: usize) -> HostResult<u16> {
        if len == 0 || len > MAX_TRANSFER {
            return Err(HostError::TransferLength(len));
        }
        Ok((len - 1) as u16)
    }

    pub fn clock(&mut self, setup: ClockSetup) -> &mut Self {
        self.bytes.push(if setup.divide_by_5 {
            opcode::EN_DIV_5
        } else {
            opcode::DIS_DIV_5
        });
        self.op16(opcode::TCK_DIVISOR, setup.divisor)
    }

    pub fn set_bits_low(&mut self, value: u8, direction: u8) -> &mut Self {
        self.bytes
            .extend_from_slice(&[opcode::SET_BITS_LOW, value, direction]);
        self
    }

    /// Idle clocks lasting `seconds` at `bit_rate`, truncated to whole clocks.
    pub fn delay(&mut self, bit_rate: u32, seconds: f64) -> &mut Self {
        let clocks = (seconds * f64::from(bit_rate)) as u64;
        let mut whole_bytes = clocks / 8;
        while whole_bytes > 0 {
            let chunk = whole_bytes.min(MAX_TRANSFER as u64);
            self.op16(opcode::CLK_BYTES, (chunk - 1) as u16);
            whole_bytes -= chunk;
        }
        let bits = (clocks % 8) as u8;
        if bits != 0 {
            self.bytes.extend_from_slice(&[opcode::CLK_BITS, bits - 1]);
        }
        self
    }

    /// Sample the data-in pin for `len` bytes.
    pub fn read(&mut self, len: usize) -> HostResult<&mut Self> {
        let length = Self::transfer_length(len)?;
        Ok(self.op16(opcode::MPSSE_DO_READ, length))
    }

    /// Clock `data` out on the data-out pin while sampling data-in.
    pub fn write_read(&mut self, data: &[u8]) -> HostResult<&mut Self> {
        let length = Self::transfer_length(data.len())?;
        self.op16(opcode::MPSSE_DO_WRITE | opcode::MPSSE_DO_READ, length);
        self.bytes.extend_from_slice(data);
        Ok(self)
    }
}
