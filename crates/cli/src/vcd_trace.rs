// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use osccal_core::DigitalLevel;
use osccal_sim::SimDevice;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use vcd::{IdCode, TimescaleUnit, Value, Writer};

#[derive(Debug, Clone, Copy)]
enum Change {
    Trim(u8),
    Status(bool),
}

struct TraceIds {
    trim: IdCode,
    status: IdCode,
}

/// Dumps the trim register and status line of a finished run, one time unit
/// per reference cycle.
pub fn write_device_trace(path: &Path, device: &SimDevice) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = Writer::new(BufWriter::new(file));
    let ids = write_header(&mut writer)?;

    let mut changes: Vec<(u64, Change)> = device
        .trim_trace()
        .into_iter()
        .map(|(cycle, value)| (cycle, Change::Trim(value)))
        .chain(
            device
                .status_events()
                .into_iter()
                .map(|event| (event.cycle, Change::Status(event.level.is_high()))),
        )
        .collect();
    // stable: same-cycle changes keep their recorded order
    changes.sort_by_key(|&(cycle, _)| cycle);

    writer.timestamp(0)?;
    writer.change_vector(ids.trim, u8_to_vec(device.setup().initial_trim))?;
    writer.change_scalar(ids.status, level_value(DigitalLevel::High))?;

    let mut current_time = 0;
    for (cycle, change) in changes {
        if cycle != current_time {
            writer.timestamp(cycle)?;
            current_time = cycle;
        }
        match change {
            Change::Trim(value) => writer.change_vector(ids.trim, u8_to_vec(value))?,
            Change::Status(high) => writer.change_scalar(ids.status, level_value(high.into()))?,
        }
    }
    writer.timestamp(device.cycle().max(current_time))?;
    Ok(())
}

fn write_header<W: Write>(writer: &mut Writer<W>) -> std::io::Result<TraceIds> {
    writer.timescale(1, TimescaleUnit::US)?;
    writer.add_module("target")?;
    let trim = writer.add_wire(8, "trim")?;
    let status = writer.add_wire(1, "status")?;
    writer.upscope()?;
    writer.enddefinitions()?;
    Ok(TraceIds { trim, status })
}

fn level_value(level: DigitalLevel) -> Value {
    if level.is_high() {
        Value::V1
    } else {
        Value::V0
    }
}

// MSB first
fn u8_to_vec(val: u8) -> Vec<Value> {
    (0..8)
        .rev()
        .map(|i| if (val >> i) & 1 == 1 { Value::V1 } else { Value::V0 })
        .collect()
}
