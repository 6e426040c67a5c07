// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Decoder for the "done" toggle pattern captured from the status line.

use serde::Serialize;

/// Transitions that make a complete done signal.
pub const DONE_TRANSITIONS: u32 = 8;

/// Longest level, in samples, allowed between two toggles.
pub const MAX_TOGGLE_SAMPLES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum SignalVerdict {
    /// All transitions seen; `at_sample` is the bit index of the last one.
    Done { at_sample: usize },
    /// The line held a level too long once toggling had started.
    Glitch { transitions: u32, at_sample: usize },
    /// The capture ended before the pattern completed.
    NotSeen { transitions: u32 },
}

impl SignalVerdict {
    pub fn is_done(&self) -> bool {
        matches!(self, SignalVerdict::Done { .. })
    }
}

/// Walks the capture MSB first, starting from the idle-high level.
///
/// The transition count is checked at byte boundaries, so a malformed level
/// in the byte that carries the last transition still fails the capture.
pub fn decode_done_signal(samples: &[u8]) -> SignalVerdict {
    let mut level = true;
    let mut run = 0u32;
    let mut transitions = 0u32;
    let mut done_at = 0usize;

    for (index, &byte) in samples.iter().enumerate() {
        if (level && byte == 0xFF) || (!level && byte == 0x00) {
            run = run.saturating_add(8);
            continue;
        }
        for bit in (0..8).rev() {
            let sample = (byte >> bit) & 1 == 1;
            if sample == level {
                run = run.saturating_add(1);
                continue;
            }
            let at_sample = index * 8 + (7 - bit);
            if transitions != 0 && run > MAX_TOGGLE_SAMPLES {
                return SignalVerdict::Glitch {
                    transitions,
                    at_sample,
                };
            }
            transitions += 1;
            run = 1;
            level = sample;
            if transitions == DONE_TRANSITIONS {
                done_at = at_sample;
            }
        }
        if transitions == DONE_TRANSITIONS {
            return SignalVerdict::Done { at_sample: done_at };
        }
    }

    SignalVerdict::NotSeen { transitions }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(bytes: usize) -> Vec<u8> {
        vec![0xFF; bytes]
    }

    #[test]
    fn test_clean_toggle_pattern() {
        let mut capture = idle(16);
        capture.extend_from_slice(&[0x33, 0x33, 0xFF, 0xFF]);
        assert_eq!(
            decode_done_signal(&capture),
            SignalVerdict::Done {
                at_sample: 16 * 8 + 14
            }
        );
    }

    #[test]
    fn test_pattern_split_across_bytes() {
        // three-sample levels, starting mid-byte
        let mut capture = idle(2);
        capture.extend_from_slice(&[0xF8, 0xE3, 0x8E, 0x3F, 0xFF]);
        assert_eq!(
            decode_done_signal(&capture),
            SignalVerdict::Done {
                at_sample: 5 * 8 + 2
            }
        );
    }

    #[test]
    fn test_long_level_in_last_toggle_byte() {
        let capture = [0xFF, 0x57, 0x78];
        assert_eq!(
            decode_done_signal(&capture),
            SignalVerdict::Glitch {
                transitions: 8,
                at_sample: 2 * 8 + 5
            }
        );
    }

    #[test]
    fn test_extra_toggle_in_last_byte() {
        let mut capture = idle(1);
        capture.extend_from_slice(&[0x33, 0x32, 0x00]);
        assert_eq!(
            decode_done_signal(&capture),
            SignalVerdict::NotSeen { transitions: 9 }
        );
    }

    #[test]
    fn test_failure_level_is_not_done() {
        let mut capture = idle(4);
        capture.extend_from_slice(&[0x00; 32]);
        assert_eq!(
            decode_done_signal(&capture),
            SignalVerdict::NotSeen { transitions: 1 }
        );
    }

    #[test]
    fn test_idle_capture() {
        assert_eq!(
            decode_done_signal(&idle(4000)),
            SignalVerdict::NotSeen { transitions: 0 }
        );
        assert_eq!(
            decode_done_signal(&[]),
            SignalVerdict::NotSeen { transitions: 0 }
        );
    }

    #[test]
    fn test_long_level_after_first_toggle() {
        let mut capture = idle(1);
        capture.extend_from_slice(&[0b0011_1110, 0x00]);
        assert_eq!(
            decode_done_signal(&capture),
            SignalVerdict::Glitch {
                transitions: 2,
                at_sample: 8 + 7
            }
        );
    }

    #[test]
    fn test_truncated_pattern() {
        let mut capture = idle(1);
        capture.push(0x33);
        assert_eq!(
            decode_done_signal(&capture),
            SignalVerdict::NotSeen { transitions: 4 }
        );
    }

    #[test]
    fn test_verdict_serializes_tagged() {
        let json = serde_json::to_string(&SignalVerdict::NotSeen { transitions: 3 }).unwrap();
        assert_eq!(json, r#"{"verdict":"not_seen","transitions":3}"#);
    }
}
