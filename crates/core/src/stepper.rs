// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::hal::TrimRegister;

/// Moves the trim register toward a target without large jumps.
///
/// A single write never changes the register by more than `max_step`;
/// larger moves are split into intermediate writes.
#[derive(Debug)]
pub struct TrimStepper<R> {
    register: R,
    max_step: u8,
}

impl<R: TrimRegister> TrimStepper<R> {
    /// A `max_step` of 0 is treated as 1.
    pub fn new(register: R, max_step: u8) -> Self {
        Self {
            register,
            max_step: max_step.max(1),
        }
    }

    /// Value currently held by the register.
    pub fn current(&self) -> u8 {
        self.register.read()
    }

    pub fn apply(&mut self, target: u8) {
        let mut current = self.register.read();
        while current != target {
            current = if current.abs_diff(target) > self.max_step {
                if current > target {
                    current - self.max_step
                } else {
                    current + self.max_step
                }
            } else {
                target
            };
            self.register.write(current);
        }
    }

    pub fn into_inner(self) -> R {
        self.register
    }
}

#[cfg(test)]
mod tests {
    use super::TrimStepper;
    use crate::hal::TrimRegister;

    #[derive(Debug, Default)]
    struct RecordingTrim {
        value: u8,
        writes: Vec<u8>,
    }

    impl TrimRegister for RecordingTrim {
        fn read(&self) -> u8 {
            self.value
        }

        fn write(&mut self, value: u8) {
            self.value = value;
            self.writes.push(value);
        }
    }

    fn stepper_at(start: u8, max_step: u8) -> TrimStepper<RecordingTrim> {
        TrimStepper::new(
            RecordingTrim {
                value: start,
                writes: Vec::new(),
            },
            max_step,
        )
    }

    #[test]
    fn test_small_move_is_single_write() {
        let mut stepper = stepper_at(100, 16);
        stepper.apply(110);
        assert_eq!(stepper.into_inner().writes, vec![110]);
    }

    #[test]
    fn test_large_move_is_split() {
        let mut stepper = stepper_at(0, 16);
        stepper.apply(40);
        assert_eq!(stepper.into_inner().writes, vec![16, 32, 40]);

        let mut stepper = stepper_at(255, 100);
        stepper.apply(0);
        assert_eq!(stepper.into_inner().writes, vec![155, 55, 0]);
    }

    #[test]
    fn test_no_write_when_already_there() {
        let mut stepper = stepper_at(77, 4);
        stepper.apply(77);
        assert!(stepper.into_inner().writes.is_empty());
    }

    #[test]
    fn test_zero_max_step_still_terminates() {
        let mut stepper = stepper_at(10, 0);
        stepper.apply(13);
        assert_eq!(stepper.into_inner().writes, vec![11, 12, 13]);
    }

    #[test]
    fn test_delta_bound_holds_for_every_pair() {
        for max_step in [1u8, 3, 16, 127, 255] {
            for start in (0..=255u8).step_by(17) {
                for target in (0..=255u8).step_by(13) {
                    let mut stepper = stepper_at(start, max_step);
                    stepper.apply(target);
                    assert_eq!(stepper.current(), target);

                    let trim = stepper.into_inner();
                    let mut previous = start;
                    for &value in &trim.writes {
                        assert!(
                            previous.abs_diff(value) <= max_step,
                            "{} -> {} exceeds {} (start {}, target {})",
                            previous,
                            value,
                            max_step,
                            start,
                            target
                        );
                        previous = value;
                    }
                }
            }
        }
    }
}
