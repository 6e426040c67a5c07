#![no_std]
// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.
#![no_main]
#![allow(clippy::empty_loop)]

use cortex_m_rt::entry;
use osccal_core::{
    CalibrationParams, Calibrator, CalibratorConfig, ClockConfig, OscVariant, Parts,
};
use panic_halt as _;

mod board;

const F_CPU: u32 = 4_000_000;
const INPUT_FREQ: u32 = 32_768;
const FREQ_CYCLES: u32 = 8;
const MAX_STEP: u8 = 16;

// MSITRIM is signed: 0x80..=0xFF trims below 0x00..=0x7F
const CONFIG: CalibratorConfig = CalibratorConfig {
    params: CalibrationParams::from_clock(
        ClockConfig::new(F_CPU, INPUT_FREQ, FREQ_CYCLES),
        MAX_STEP,
    ),
    variant: OscVariant::V5,
    storage_address: 0,
};

#[entry]
fn main() -> ! {
    cortex_m::interrupt::disable();

    let Some(mut cp) = cortex_m::Peripherals::take() else {
        loop {}
    };
    cp.DCB.enable_trace();
    cp.DWT.enable_cycle_counter();

    board::init_clocks();

    let parts = Parts {
        trim: board::MsiTrim,
        meter: board::CycleMeter::new(FREQ_CYCLES),
        watchdog: board::Iwdg::start(),
        reference: board::ReferencePin,
        status: board::StatusPin,
        storage: board::BackupStorage,
    };
    Calibrator::new(parts, CONFIG).run()
}
