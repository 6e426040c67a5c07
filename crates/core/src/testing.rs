// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Shared fake hardware for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::hal::{NvStorage, ReferenceLine, StatusLine, TickMeter, TrimRegister, Watchdog};
use crate::signals::DigitalLevel;

pub struct Bench {
    curve: Box<dyn Fn(u8) -> u32>,
    trim: Cell<u8>,
    writes: RefCell<Vec<u8>>,
    measured: RefCell<Vec<u8>>,
    kicks: Cell<u32>,
    reference: RefCell<VecDeque<DigitalLevel>>,
    pull_up: Cell<bool>,
    status: RefCell<Vec<DigitalLevel>>,
    status_output: Cell<bool>,
    done_signals: Cell<u32>,
    storage: RefCell<[u8; 8]>,
    storage_writes: Cell<u32>,
}

impl Bench {
    pub fn new(curve: impl Fn(u8) -> u32 + 'static) -> Self {
        Self {
            curve: Box::new(curve),
            trim: Cell::new(0),
            writes: RefCell::new(Vec::new()),
            measured: RefCell::new(Vec::new()),
            kicks: Cell::new(0),
            reference: RefCell::new(VecDeque::new()),
            pull_up: Cell::new(false),
            status: RefCell::new(Vec::new()),
            status_output: Cell::new(false),
            done_signals: Cell::new(0),
            storage: RefCell::new([0xFF; 8]),
            storage_writes: Cell::new(0),
        }
    }

    /// Levels returned by successive reference reads; high once exhausted.
    pub fn with_reference(self, levels: &[DigitalLevel]) -> Self {
        self.reference.borrow_mut().extend(levels.iter().copied());
        self
    }

    pub fn trim(&self) -> BenchTrim<'_> {
        BenchTrim(self)
    }

    pub fn meter(&self) -> BenchMeter<'_> {
        BenchMeter(self)
    }

    pub fn watchdog(&self) -> BenchWatchdog<'_> {
        BenchWatchdog(self)
    }

    pub fn reference(&self) -> BenchReference<'_> {
        BenchReference(self)
    }

    pub fn status(&self) -> BenchStatus<'_> {
        BenchStatus(self)
    }

    pub fn storage(&self) -> BenchStorage<'_> {
        BenchStorage(self)
    }

    pub fn value(&self) -> u8 {
        self.trim.get()
    }

    pub fn ticks_now(&self) -> u32 {
        (self.curve)(self.trim.get())
    }

    pub fn writes(&self) -> Vec<u8> {
        self.writes.borrow().clone()
    }

    pub fn measured(&self) -> Vec<u8> {
        self.measured.borrow().clone()
    }

    pub fn kicks(&self) -> u32 {
        self.kicks.get()
    }

    pub fn pull_up(&self) -> bool {
        self.pull_up.get()
    }

    pub fn status_levels(&self) -> Vec<DigitalLevel> {
        self.status.borrow().clone()
    }

    pub fn status_is_output(&self) -> bool {
        self.status_output.get()
    }

    pub fn done_signals(&self) -> u32 {
        self.done_signals.get()
    }

    pub fn stored(&self, address: u16) -> u8 {
        self.storage.borrow()[usize::from(address)]
    }

    pub fn storage_writes(&self) -> u32 {
        self.storage_writes.get()
    }
}

pub struct BenchTrim<'a>(&'a Bench);
pub struct BenchMeter<'a>(&'a Bench);
pub struct BenchWatchdog<'a>(&'a Bench);
pub struct BenchReference<'a>(&'a Bench);
pub struct BenchStatus<'a>(&'a Bench);
pub struct BenchStorage<'a>(&'a Bench);

impl TrimRegister for BenchTrim<'_> {
    fn read(&self) -> u8 {
        self.0.trim.get()
    }

    fn write(&mut self, value: u8) {
        self.0.trim.set(value);
        self.0.writes.borrow_mut().push(value);
    }
}

impl TickMeter for BenchMeter<'_> {
    fn measure(&mut self) -> u32 {
        let trim = self.0.trim.get();
        self.0.measured.borrow_mut().push(trim);
        (self.0.curve)(trim)
    }
}

impl Watchdog for BenchWatchdog<'_> {
    fn kick(&mut self) {
        self.0.kicks.set(self.0.kicks.get() + 1);
    }
}

impl ReferenceLine for BenchReference<'_> {
    fn enable_pull_up(&mut self) {
        self.0.pull_up.set(true);
    }

    fn level(&mut self) -> DigitalLevel {
        self.0
            .reference
            .borrow_mut()
            .pop_front()
            .unwrap_or(DigitalLevel::High)
    }
}

impl StatusLine for BenchStatus<'_> {
    fn set_output(&mut self) {
        self.0.status_output.set(true);
    }

    fn set_level(&mut self, level: DigitalLevel) {
        self.0.status.borrow_mut().push(level);
    }

    fn signal_done(&mut self) {
        self.0.done_signals.set(self.0.done_signals.get() + 1);
    }
}

impl NvStorage for BenchStorage<'_> {
    fn read_byte(&self, address: u16) -> u8 {
        self.0.storage.borrow()[usize::from(address)]
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        self.0.storage.borrow_mut()[usize::from(address)] = value;
        self.0.storage_writes.set(self.0.storage_writes.get() + 1);
    }
}
