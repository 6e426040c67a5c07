// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn write_temp_file(prefix: &str, extension: &str, contents: &[u8]) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("osccal-tests");
    let _ = std::fs::create_dir_all(&dir);

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = dir.join(format!("{}-{}.{}", prefix, nonce, extension));
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

fn profile_file(prefix: &str, ticks_at_128: u32, slope: f64) -> PathBuf {
    let yaml = format!(
        r#"
schema_version: "1.0"
name: {prefix}
variant: 1
clock:
  f_cpu: 8000000
  input_freq: 32768
  freq_cycles: 8
storage_address: 3
oscillator:
  kind: linear
  center: 128
  ticks_at_center: {ticks_at_128}
  slope: {slope:.1}
"#
    );
    write_temp_file(prefix, "yaml", yaml.as_bytes())
}

fn osccal(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_osccal"))
        .args(args)
        .output()
        .expect("failed to run osccal")
}

#[test]
fn test_params_json() {
    let profile = profile_file("params", 1953, 10.0);
    let output = osccal(&["params", "--profile", profile.to_str().unwrap(), "--json"]);

    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["target_ticks"], 1953);
    assert_eq!(value["tolerance_ticks"], 20);
    assert_eq!(value["variant"], 1);
    assert_eq!(value["ranges"][0], "[0x00, 0xff]");
}

#[test]
fn test_simulate_success_exit_code() {
    let profile = profile_file("simulate-ok", 1958, 40.0);
    let output = osccal(&["simulate", "--profile", profile.to_str().unwrap(), "--json"]);

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["calibrated"], true);
    assert_eq!(report["trim"], 128);
    assert_eq!(report["stored_trim"], 128);
    assert_eq!(report["host_verdict"]["verdict"], "done");
}

#[test]
fn test_simulate_failure_exit_code() {
    let profile = profile_file("simulate-fail", 2003, 200.0);
    let output = osccal(&["simulate", "--profile", profile.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL"), "stdout: {}", stdout);
    assert!(stdout.contains("no done signal"), "stdout: {}", stdout);
}

#[test]
fn test_simulate_writes_vcd() {
    let profile = profile_file("simulate-vcd", 1953, 10.0);
    let vcd = std::env::temp_dir()
        .join("osccal-tests")
        .join(format!(
            "trace-{}.vcd",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
    let output = osccal(&[
        "simulate",
        "--profile",
        profile.to_str().unwrap(),
        "--vcd",
        vcd.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(0));
    let trace = std::fs::read_to_string(&vcd).unwrap();
    assert!(trace.contains("$var wire 8"));
    assert!(trace.contains("trim"));
    assert!(trace.contains("status"));
}

#[test]
fn test_invalid_profile_is_config_error() {
    let profile = write_temp_file(
        "bad-variant",
        "yaml",
        br#"
name: broken
variant: 9
clock:
  f_cpu: 8000000
  input_freq: 32768
  freq_cycles: 8
"#,
    );
    let output = osccal(&["simulate", "--profile", profile.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unsupported oscillator version 9"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_missing_profile_is_config_error() {
    let output = osccal(&["params", "--profile", "/nonexistent/osccal.yaml"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_decode_hex_capture() {
    let done = write_temp_file("capture-done", "hex", b"ff ff ff ff\ncc cc ff\n");
    let output = osccal(&["decode", "--capture", done.to_str().unwrap(), "--hex"]);
    assert_eq!(output.status.code(), Some(0));

    let failed = write_temp_file("capture-fail", "hex", b"ff ff 00 00 00");
    let output = osccal(&[
        "decode",
        "--capture",
        failed.to_str().unwrap(),
        "--hex",
        "--json",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let verdict: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(verdict["verdict"], "not_seen");
    assert_eq!(verdict["transitions"], 1);
}

#[test]
fn test_decode_raw_capture() {
    let mut samples = vec![0xFF; 100];
    samples.extend_from_slice(&[0x33, 0x33, 0xFF]);
    let capture = write_temp_file("capture-raw", "bin", &samples);
    let output = osccal(&["decode", "--capture", capture.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_plan_prints_reset_sequence() {
    let profile = profile_file("plan", 1953, 10.0);
    let output = osccal(&["plan", "--profile", profile.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(
        "reset:   8a 86 c9 01 80 02 4a 8f 07 00 8e 00 80 0a 4a 8f 32 03 8e 00"
    ));
    assert!(stdout.contains("ready:   20 9f 0f"));
    assert!(stdout.contains("train:   30 9f 0f + 4000 x 55"));
    assert!(stdout.contains("release: 80 0a 4a"));
}

#[cfg(feature = "hardware")]
#[test]
fn test_run_checks_profile_before_opening_programmer() {
    let output = osccal(&["run", "--profile", "/nonexistent/osccal.yaml"]);
    assert_eq!(output.status.code(), Some(2));
}
