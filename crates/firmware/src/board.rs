// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! STM32L476 implementations of the calibration hardware.
//!
//! Programming header: PA6 is the status output (MISO), PA7 the reference
//! clock input (MOSI). Core clock is MSI range 6 (4 MHz) out of reset.

use cortex_m::peripheral::DWT;
use osccal_core::hal::{NvStorage, ReferenceLine, StatusLine, TickMeter, TrimRegister, Watchdog};
use osccal_core::DigitalLevel;

// RCC
const RCC_BASE: u32 = 0x4002_1000;
const RCC_ICSCR: *mut u32 = (RCC_BASE + 0x04) as *mut u32;
const RCC_AHB2ENR: *mut u32 = (RCC_BASE + 0x4C) as *mut u32;
const RCC_APB1ENR1: *mut u32 = (RCC_BASE + 0x58) as *mut u32;

const RCC_AHB2ENR_GPIOAEN: u32 = 1 << 0;
const RCC_APB1ENR1_RTCAPBEN: u32 = 1 << 10;
const RCC_APB1ENR1_PWREN: u32 = 1 << 28;
const ICSCR_MSITRIM_SHIFT: u32 = 8;
const ICSCR_MSITRIM_MASK: u32 = 0xFF << ICSCR_MSITRIM_SHIFT;

// PWR
const PWR_CR1: *mut u32 = 0x4000_7000 as *mut u32;
const PWR_CR1_DBP: u32 = 1 << 8;

// RTC backup registers
const RTC_BKP0R: u32 = 0x4000_2800 + 0x50;
const BACKUP_REGISTERS: u16 = 32;

// GPIOA
const GPIOA_BASE: u32 = 0x4800_0000;
const GPIOA_MODER: *mut u32 = GPIOA_BASE as *mut u32;
const GPIOA_PUPDR: *mut u32 = (GPIOA_BASE + 0x0C) as *mut u32;
const GPIOA_IDR: *mut u32 = (GPIOA_BASE + 0x10) as *mut u32;
const GPIOA_BSRR: *mut u32 = (GPIOA_BASE + 0x18) as *mut u32;

const STATUS_PIN: u32 = 6;
const REFERENCE_PIN: u32 = 7;

// IWDG
const IWDG_BASE: u32 = 0x4000_3000;
const IWDG_KR: *mut u32 = IWDG_BASE as *mut u32;
const IWDG_PR: *mut u32 = (IWDG_BASE + 0x04) as *mut u32;
const IWDG_RLR: *mut u32 = (IWDG_BASE + 0x08) as *mut u32;

const IWDG_KEY_RELOAD: u32 = 0xAAAA;
const IWDG_KEY_UNLOCK: u32 = 0x5555;
const IWDG_KEY_START: u32 = 0xCCCC;

fn read(reg: *mut u32) -> u32 {
    unsafe { core::ptr::read_volatile(reg) }
}

fn write(reg: *mut u32, value: u32) {
    unsafe { core::ptr::write_volatile(reg, value) }
}

fn modify(reg: *mut u32, f: impl FnOnce(u32) -> u32) {
    write(reg, f(read(reg)));
}

/// Clocks GPIOA and opens the backup domain for writing.
pub fn init_clocks() {
    modify(RCC_AHB2ENR, |v| v | RCC_AHB2ENR_GPIOAEN);
    modify(RCC_APB1ENR1, |v| v | RCC_APB1ENR1_PWREN | RCC_APB1ENR1_RTCAPBEN);
    modify(PWR_CR1, |v| v | PWR_CR1_DBP);
}

/// MSITRIM, added to the factory MSICAL value.
pub struct MsiTrim;

impl TrimRegister for MsiTrim {
    fn read(&self) -> u8 {
        ((read(RCC_ICSCR) & ICSCR_MSITRIM_MASK) >> ICSCR_MSITRIM_SHIFT) as u8
    }

    fn write(&mut self, value: u8) {
        modify(RCC_ICSCR, |v| {
            (v & !ICSCR_MSITRIM_MASK) | (u32::from(value) << ICSCR_MSITRIM_SHIFT)
        });
    }
}

fn reference_high() -> bool {
    read(GPIOA_IDR) & (1 << REFERENCE_PIN) != 0
}

fn wait_rising_edge() {
    while reference_high() {}
    while !reference_high() {}
}

/// Counts core cycles over `freq_cycles` reference periods with the DWT
/// cycle counter.
pub struct CycleMeter {
    freq_cycles: u32,
}

impl CycleMeter {
    /// Needs trace enabled and the DWT cycle counter running.
    pub fn new(freq_cycles: u32) -> Self {
        Self { freq_cycles }
    }
}

impl TickMeter for CycleMeter {
    fn measure(&mut self) -> u32 {
        // let the oscillator settle on the new trim for one period
        wait_rising_edge();
        wait_rising_edge();
        let start = DWT::cycle_count();
        for _ in 0..self.freq_cycles {
            wait_rising_edge();
        }
        DWT::cycle_count().wrapping_sub(start)
    }
}

/// Independent watchdog, about one second at the 32 kHz LSI.
pub struct Iwdg;

impl Iwdg {
    pub fn start() -> Self {
        write(IWDG_KR, IWDG_KEY_START);
        write(IWDG_KR, IWDG_KEY_UNLOCK);
        write(IWDG_PR, 3); // /32
        write(IWDG_RLR, 1000);
        write(IWDG_KR, IWDG_KEY_RELOAD);
        Self
    }
}

impl Watchdog for Iwdg {
    fn kick(&mut self) {
        write(IWDG_KR, IWDG_KEY_RELOAD);
    }
}

pub struct ReferencePin;

impl ReferenceLine for ReferencePin {
    fn enable_pull_up(&mut self) {
        let shift = REFERENCE_PIN * 2;
        modify(GPIOA_MODER, |v| v & !(0b11 << shift));
        modify(GPIOA_PUPDR, |v| (v & !(0b11 << shift)) | (0b01 << shift));
    }

    fn level(&mut self) -> DigitalLevel {
        reference_high().into()
    }
}

pub struct StatusPin;

impl StatusLine for StatusPin {
    fn set_output(&mut self) {
        let shift = STATUS_PIN * 2;
        modify(GPIOA_MODER, |v| (v & !(0b11 << shift)) | (0b01 << shift));
    }

    fn set_level(&mut self, level: DigitalLevel) {
        let bit = match level {
            DigitalLevel::High => 1 << STATUS_PIN,
            DigitalLevel::Low => 1 << (STATUS_PIN + 16),
        };
        write(GPIOA_BSRR, bit);
    }

    /// Eight toggles, one per reference rising edge.
    fn signal_done(&mut self) {
        let mut level = if read(GPIOA_IDR) & (1 << STATUS_PIN) != 0 {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        };
        for _ in 0..8 {
            wait_rising_edge();
            level = level.toggled();
            self.set_level(level);
        }
    }
}

/// RTC backup registers as byte storage; survives resets while VBAT is up.
pub struct BackupStorage;

impl BackupStorage {
    fn locate(address: u16) -> (*mut u32, u32) {
        let index = (address / 4) % BACKUP_REGISTERS;
        let reg = (RTC_BKP0R + u32::from(index) * 4) as *mut u32;
        (reg, u32::from(address % 4) * 8)
    }
}

impl NvStorage for BackupStorage {
    fn read_byte(&self, address: u16) -> u8 {
        let (reg, shift) = Self::locate(address);
        (read(reg) >> shift) as u8
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        let (reg, shift) = Self::locate(address);
        modify(reg, |v| (v & !(0xFF << shift)) | (u32::from(value) << shift));
    }
}
