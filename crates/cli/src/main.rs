// OscCal - RC Oscillator Calibration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use osccal_config::CalibrationProfile;
use osccal_host::mpsse::ClockSetup;
use osccal_host::session::{release_sequence, reset_sequence};
use osccal_host::{decode_done_signal, CommandBuffer, SignalVerdict};
use osccal_sim::{run_session, session_config, SimError, SimulationReport};

mod vcd_trace;

const EXIT_PASS: u8 = 0;
const EXIT_CALIBRATION_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "RC oscillator calibration tools",
    long_about = None
)]
struct Cli {
    /// Enable debug-level logging
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the calibration targets derived from a profile.
    Params(ParamsArgs),

    /// Run a programmer session against the simulated target.
    Simulate(SimulateArgs),

    /// Look for the completion signal in a captured status-line sample.
    Decode(DecodeArgs),

    /// Print the MPSSE command stream the programmer sends.
    Plan(PlanArgs),

    /// Calibrate a real target through an FT2232H programmer.
    #[cfg(feature = "hardware")]
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct ParamsArgs {
    /// Path to the calibration profile (YAML)
    #[arg(short, long)]
    profile: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Path to the calibration profile (YAML)
    #[arg(short, long)]
    profile: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write a VCD trace of the trim register and status line
    #[arg(long)]
    vcd: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    /// Capture file, MSB-first samples
    #[arg(short, long)]
    capture: PathBuf,

    /// The capture is hex text rather than raw bytes
    #[arg(long)]
    hex: bool,

    /// Print the verdict as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Path to the calibration profile (YAML)
    #[arg(short, long)]
    profile: PathBuf,
}

#[cfg(feature = "hardware")]
#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the calibration profile (YAML)
    #[arg(short, long)]
    profile: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so reports on stdout stay machine-readable
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Params(args) => run_params(args),
        Commands::Simulate(args) => run_simulate(args),
        Commands::Decode(args) => run_decode(args),
        Commands::Plan(args) => run_plan(args),
        #[cfg(feature = "hardware")]
        Commands::Run(args) => run_hardware(args),
    }
}

fn load_profile(path: &Path) -> Option<CalibrationProfile> {
    info!("Loading calibration profile: {:?}", path);
    match CalibrationProfile::from_file(path) {
        Ok(profile) => Some(profile),
        Err(e) => {
            error!("{:#}", e);
            None
        }
    }
}

fn run_params(args: ParamsArgs) -> ExitCode {
    let Some(profile) = load_profile(&args.profile) else {
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };
    let config = match profile.calibrator_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let ranges: Vec<String> = config
        .variant
        .ranges()
        .iter()
        .map(|range| range.to_string())
        .collect();

    if args.json {
        let value = serde_json::json!({
            "profile": profile.name,
            "variant": config.variant.version(),
            "target_ticks": config.params.target_ticks,
            "tolerance_ticks": config.params.tolerance_ticks,
            "max_step": config.params.max_step,
            "storage_address": config.storage_address,
            "ranges": ranges,
        });
        println!("{}", value);
    } else {
        println!("profile:         {}", profile.name);
        println!("variant:         {}", config.variant);
        println!("target ticks:    {}", config.params.target_ticks);
        println!("tolerance:       {}", config.params.tolerance_ticks);
        println!("max step:        {}", config.params.max_step);
        println!("storage address: {:#06x}", config.storage_address);
        println!("ranges:          {}", ranges.join(", "));
    }
    ExitCode::from(EXIT_PASS)
}

fn run_simulate(args: SimulateArgs) -> ExitCode {
    let Some(profile) = load_profile(&args.profile) else {
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    let (device, report) = match run_session(&profile) {
        Ok(result) => result,
        Err(SimError::Config(e)) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
        Err(SimError::Host(e)) => {
            error!("Programmer session failed: {}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    if let Some(path) = &args.vcd {
        if let Err(e) = vcd_trace::write_device_trace(path, &device) {
            error!("Failed to write VCD trace {:?}: {:#}", path, e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
        info!("VCD trace written to {:?}", path);
    }

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::from(EXIT_RUNTIME_ERROR);
            }
        }
    } else {
        print_report(&report);
    }

    if report.watchdog_bites > 0 {
        warn!(
            "Watchdog would have reset the target {} time(s)",
            report.watchdog_bites
        );
    }

    if report.passed() {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_CALIBRATION_FAIL)
    }
}

fn print_report(report: &SimulationReport) {
    let status = if report.passed() { "PASS" } else { "FAIL" };
    println!("{}: {}", report.profile, status);
    println!(
        "  trim {:#04x}: {} ticks (target {}, off by {}, tolerance {})",
        report.trim, report.ticks, report.target_ticks, report.deviation, report.tolerance_ticks
    );
    println!(
        "  {} measurements, {} trim writes, largest step {}",
        report.measurements, report.trim_writes, report.largest_trim_step
    );
    println!(
        "  stored trim {:#04x} ({} storage writes)",
        report.stored_trim, report.storage_writes
    );
    println!("  programmer: {}", describe_verdict(&report.host_verdict));
}

fn describe_verdict(verdict: &SignalVerdict) -> String {
    match verdict {
        SignalVerdict::Done { at_sample } => format!("done signal at sample {}", at_sample),
        SignalVerdict::Glitch {
            transitions,
            at_sample,
        } => format!(
            "malformed signal after {} transitions (sample {})",
            transitions, at_sample
        ),
        SignalVerdict::NotSeen { transitions } => {
            format!("no done signal ({} transitions)", transitions)
        }
    }
}

fn parse_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    let digits: String = text
        .split_whitespace()
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if digits.len() % 2 != 0 {
        bail!("hex capture has an odd number of digits ({})", digits.len());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let pair = digits
                .get(i..i + 2)
                .with_context(|| format!("non-ASCII data at digit {}", i))?;
            u8::from_str_radix(pair, 16)
                .with_context(|| format!("invalid hex byte '{}' at digit {}", pair, i))
        })
        .collect()
}

fn read_capture(args: &DecodeArgs) -> anyhow::Result<Vec<u8>> {
    if args.hex {
        let text = std::fs::read_to_string(&args.capture)
            .with_context(|| format!("Failed to read capture {:?}", args.capture))?;
        parse_hex(&text).with_context(|| format!("Failed to parse capture {:?}", args.capture))
    } else {
        std::fs::read(&args.capture)
            .with_context(|| format!("Failed to read capture {:?}", args.capture))
    }
}

fn run_decode(args: DecodeArgs) -> ExitCode {
    let samples = match read_capture(&args) {
        Ok(samples) => samples,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    info!("Decoding {} capture bytes", samples.len());

    let verdict = decode_done_signal(&samples);
    if args.json {
        match serde_json::to_string(&verdict) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to serialize verdict: {}", e);
                return ExitCode::from(EXIT_RUNTIME_ERROR);
            }
        }
    } else {
        println!("{}", describe_verdict(&verdict));
    }

    if verdict.is_done() {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_CALIBRATION_FAIL)
    }
}

fn hex_line(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn run_plan(args: PlanArgs) -> ExitCode {
    let Some(profile) = load_profile(&args.profile) else {
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };
    let config = session_config(&profile);
    let bit_rate = config.bit_rate();
    let clock = ClockSetup::for_bit_rate(bit_rate);

    let mut ready = CommandBuffer::new();
    let mut train = CommandBuffer::new();
    let built = ready
        .read(config.ready_window_bytes)
        .and_then(|_| train.write_read(&config.training_pattern()));
    if let Err(e) = built {
        error!("{}", e);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    println!(
        "clock:   {} bit/s (divisor {}{}, actual {:.1} bit/s)",
        bit_rate,
        clock.divisor,
        if clock.divide_by_5 { ", /5" } else { "" },
        clock.actual_rate()
    );
    println!("reset:   {}", hex_line(reset_sequence(&config).as_bytes()));
    println!("ready:   {}", hex_line(ready.as_bytes()));
    println!(
        "train:   {} + {} x 55",
        hex_line(&train.as_bytes()[..3]),
        config.training_bytes
    );
    println!("release: {}", hex_line(release_sequence().as_bytes()));
    ExitCode::from(EXIT_PASS)
}

#[cfg(feature = "hardware")]
fn run_hardware(args: RunArgs) -> ExitCode {
    use osccal_host::{FtdiOptions, FtdiTransport, HostError, Session};

    let Some(profile) = load_profile(&args.profile) else {
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };
    let config = session_config(&profile);

    let transport = match FtdiTransport::open(FtdiOptions::default()) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Failed to open programmer: {}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    let mut session = Session::new(transport, config);
    match session.run() {
        Ok(verdict) => {
            println!("{}: {}", profile.name, describe_verdict(&verdict));
            if verdict.is_done() {
                ExitCode::from(EXIT_PASS)
            } else {
                ExitCode::from(EXIT_CALIBRATION_FAIL)
            }
        }
        Err(HostError::NotReady { polls }) => {
            error!("Target never signalled ready ({} polls)", polls);
            ExitCode::from(EXIT_CALIBRATION_FAIL)
        }
        Err(e) => {
            error!("Programmer session failed: {}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
