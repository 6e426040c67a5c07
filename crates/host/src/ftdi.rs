// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! USB transport to an FT2232H programmer.
//!
//! Every bulk IN packet from the chip starts with two modem-status bytes,
//! even when it carries no data. `PacketReader` strips them and queues the
//! payload; `FtdiTransport` (feature `hardware`) feeds it from `rusb`.

use crate::error::HostResult;

/// Modem-status bytes at the head of every IN packet.
pub const STATUS_BYTES: usize = 2;

/// Max packet size of the FT2232H bulk endpoints at high speed.
pub const HIGH_SPEED_PACKET: usize = 512;

/// Reassembles MPSSE read data from raw bulk IN transfers.
#[derive(Debug)]
pub struct PacketReader {
    packet_size: usize,
    pending: Vec<u8>,
}

impl PacketReader {
    /// `packet_size` is clamped so every packet has room for payload.
    pub fn new(packet_size: usize) -> Self {
        Self {
            packet_size: packet_size.max(STATUS_BYTES + 1),
            pending: Vec::new(),
        }
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Payload received but not yet handed out.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queues the payload of one transfer, which may span several packets.
    ///
    /// Returns the number of payload bytes it carried.
    pub fn push_transfer(&mut self, transfer: &[u8]) -> usize {
        let before = self.pending.len();
        for packet in transfer.chunks(self.packet_size) {
            if let Some(payload) = packet.get(STATUS_BYTES..) {
                self.pending.extend_from_slice(payload);
            }
        }
        self.pending.len() - before
    }

    /// Takes up to `len` queued bytes, oldest first.
    pub fn take(&mut self, len: usize) -> Vec<u8> {
        let len = len.min(self.pending.len());
        self.pending.drain(..len).collect()
    }

    /// Reads transfers from `read_transfer` until `len` payload bytes are
    /// queued, then takes them.
    ///
    /// Gives up after `max_idle_reads` transfers in a row without payload and
    /// returns what it has.
    pub fn fill<F>(
        &mut self,
        len: usize,
        max_idle_reads: u32,
        mut read_transfer: F,
    ) -> HostResult<Vec<u8>>
    where
        F: FnMut(&mut [u8]) -> HostResult<usize>,
    {
        let mut buf = vec![0u8; self.packet_size];
        let mut idle = 0u32;
        while self.pending.len() < len && idle < max_idle_reads {
            let n = read_transfer(&mut buf)?.min(buf.len());
            if self.push_transfer(&buf[..n]) == 0 {
                idle += 1;
            } else {
                idle = 0;
            }
        }
        if self.pending.len() < len {
            tracing::debug!(
                "Read stalled with {} of {} bytes after {} idle transfers",
                self.pending.len(),
                len,
                idle
            );
        }
        Ok(self.take(len))
    }
}

#[cfg(feature = "hardware")]
pub use usb::{FtdiOptions, FtdiTransport};

#[cfg(feature = "hardware")]
mod usb {
    use std::time::Duration;

    use rusb::{DeviceHandle, Direction, GlobalContext, Recipient, RequestType};

    use super::{PacketReader, HIGH_SPEED_PACKET};
    use crate::error::{HostError, HostResult};
    use crate::session::Transport;

    const SIO_RESET_REQUEST: u8 = 0x00;
    const SIO_SET_BITMODE_REQUEST: u8 = 0x0B;
    const SIO_RESET_SIO: u16 = 0;
    const BITMODE_RESET: u16 = 0x00;
    const BITMODE_MPSSE: u16 = 0x02;

    // Interface A
    const INTERFACE: u8 = 0;
    const INTERFACE_INDEX: u16 = 1;
    const EP_IN: u8 = 0x81;
    const EP_OUT: u8 = 0x02;

    const WRITE_CHUNK: usize = 4096;

    #[derive(Debug, Clone)]
    pub struct FtdiOptions {
        pub vendor_id: u16,
        pub product_id: u16,
        /// Timeout for control requests and bulk writes.
        pub usb_timeout: Duration,
        /// Timeout for a single bulk IN transfer.
        pub read_timeout: Duration,
        pub max_idle_reads: u32,
    }

    impl Default for FtdiOptions {
        fn default() -> Self {
            Self {
                vendor_id: 0x0403,
                product_id: 0x6010,
                usb_timeout: Duration::from_secs(5),
                read_timeout: Duration::from_millis(100),
                max_idle_reads: 200,
            }
        }
    }

    /// Interface A of an FT2232H in MPSSE mode.
    pub struct FtdiTransport {
        handle: DeviceHandle<GlobalContext>,
        reader: PacketReader,
        options: FtdiOptions,
    }

    impl FtdiTransport {
        /// Opens the first matching device, resets it and enters MPSSE mode.
        pub fn open(options: FtdiOptions) -> HostResult<Self> {
            let mut handle =
                rusb::open_device_with_vid_pid(options.vendor_id, options.product_id).ok_or(
                    HostError::DeviceNotFound {
                        vendor_id: options.vendor_id,
                        product_id: options.product_id,
                    },
                )?;

            if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
                tracing::debug!("Kernel driver auto-detach unavailable: {}", e);
            }
            handle.claim_interface(INTERFACE)?;

            let packet_size = in_packet_size(&handle)?;
            let transport = Self {
                handle,
                reader: PacketReader::new(packet_size),
                options,
            };
            transport.control(SIO_RESET_REQUEST, SIO_RESET_SIO)?;
            transport.control(SIO_SET_BITMODE_REQUEST, BITMODE_MPSSE << 8)?;
            tracing::info!(
                "Opened programmer {:04x}:{:04x} ({}-byte packets)",
                transport.options.vendor_id,
                transport.options.product_id,
                packet_size
            );
            Ok(transport)
        }

        fn control(&self, request: u8, value: u16) -> HostResult<()> {
            let request_type =
                rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);
            self.handle.write_control(
                request_type,
                request,
                value,
                INTERFACE_INDEX,
                &[],
                self.options.usb_timeout,
            )?;
            Ok(())
        }
    }

    fn in_packet_size(handle: &DeviceHandle<GlobalContext>) -> HostResult<usize> {
        let config = handle.device().active_config_descriptor()?;
        for interface in config.interfaces() {
            for descriptor in interface.descriptors() {
                for endpoint in descriptor.endpoint_descriptors() {
                    if endpoint.address() == EP_IN {
                        return Ok(usize::from(endpoint.max_packet_size()));
                    }
                }
            }
        }
        Ok(HIGH_SPEED_PACKET)
    }

    impl Transport for FtdiTransport {
        fn write(&mut self, data: &[u8]) -> HostResult<()> {
            for chunk in data.chunks(WRITE_CHUNK) {
                let mut sent = 0;
                while sent < chunk.len() {
                    let n = self
                        .handle
                        .write_bulk(EP_OUT, &chunk[sent..], self.options.usb_timeout)?;
                    if n == 0 {
                        return Err(HostError::Transport(
                            "bulk write accepted no data".to_string(),
                        ));
                    }
                    sent += n;
                }
            }
            Ok(())
        }

        fn read(&mut self, len: usize) -> HostResult<Vec<u8>> {
            let handle = &self.handle;
            let timeout = self.options.read_timeout;
            self.reader
                .fill(len, self.options.max_idle_reads, |buf| {
                    match handle.read_bulk(EP_IN, buf, timeout) {
                        Ok(n) => Ok(n),
                        Err(rusb::Error::Timeout) => Ok(0),
                        Err(e) => Err(e.into()),
                    }
                })
        }
    }

    impl Drop for FtdiTransport {
        fn drop(&mut self) {
            if let Err(e) = self.control(SIO_SET_BITMODE_REQUEST, BITMODE_RESET) {
                tracing::warn!("Failed to leave MPSSE mode: {}", e);
            }
            let _ = self.handle.release_interface(INTERFACE);
        }
    }
}
