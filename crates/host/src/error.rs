// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("MPSSE transfers carry 1 to 65536 bytes, got {0}")]
    TransferLength(usize),
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },
    #[error("status line never read high after {polls} polls")]
    NotReady { polls: u32 },
    #[cfg(feature = "hardware")]
    #[error("no programmer with ID {vendor_id:04x}:{product_id:04x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },
    #[cfg(feature = "hardware")]
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
}

pub type HostResult<T> = Result<T, HostError>;
