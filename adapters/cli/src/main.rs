#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives the vent status tracker.
//!
//! `simulate` runs a seeded synthetic game against a fresh tracker and can
//! emit the observation stream as a session-transfer string. `replay` feeds
//! such a string back through a tracker, reproducing the estimates the
//! original session saw.

mod session;
mod simulate;

use std::{
    fmt::Write as _,
    fs,
    io::{self, Read as _},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ventwatch_core::{
    Command as TrackerCommand, DisplayState, InferenceConfig, VentEstimate, MAX_GAME_TICKS,
};
use ventwatch_tracker::{apply, query, VentTracker};

use crate::session::SessionRecording;

/// Observation-driven status tracking for hidden mining vents.
#[derive(Parser)]
#[command(name = "ventwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

/// Top-level subcommands of the `ventwatch` binary.
#[derive(Subcommand)]
enum CliCommand {
    /// Runs a seeded synthetic game against a fresh tracker.
    Simulate {
        /// Seed for the deterministic game randomness.
        #[arg(long, default_value_t = 7)]
        seed: u64,

        /// Number of game ticks to simulate.
        #[arg(long, default_value_t = 150)]
        ticks: u32,

        /// Mining team size, overriding any config file.
        #[arg(long)]
        team_size: Option<u8>,

        /// Path to a TOML file carrying the tracker configuration.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Tick on which the simulated game resets its vents.
        #[arg(long)]
        reset_at: Option<u32>,

        /// Prints the session-transfer string after the run.
        #[arg(long)]
        emit_recording: bool,
    },
    /// Replays a session-transfer string captured earlier.
    Replay {
        /// File holding the session string; read from stdin when omitted.
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
}

/// Entry point for the ventwatch command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        CliCommand::Simulate {
            seed,
            ticks,
            team_size,
            config,
            reset_at,
            emit_recording,
        } => {
            if ticks > MAX_GAME_TICKS {
                bail!("cannot simulate past the {MAX_GAME_TICKS}-tick game limit");
            }
            let config = resolve_config(team_size, config.as_deref())?;
            let (recording, summary, final_display) = simulate::run(seed, ticks, config, reset_at);
            println!(
                "simulated {ticks} ticks with seed {seed} and a team of {}",
                config.team_size()
            );
            println!(
                "{} stability updates, {} vent identifications, {} resets",
                summary.updates, summary.identifications, summary.resets
            );
            println!(
                "truth containment: {} of {} probes passed",
                summary.containment_checks - summary.containment_misses,
                summary.containment_checks
            );
            println!("final {}", format_display(&final_display));
            if emit_recording {
                println!("{}", recording.encode());
            }
        }
        CliCommand::Replay { input } => {
            let raw = read_session_input(input.as_deref())?;
            let recording = SessionRecording::decode(&raw)
                .context("failed to decode the session-transfer string")?;
            println!(
                "replaying {} recorded ticks with a team of {}",
                recording.ticks.len(),
                recording.team_size
            );
            let tracker = drive_recording(&recording);
            println!("final {}", format_display(&query::display_state(&tracker)));
        }
    }
    Ok(())
}

/// Resolves the tracker configuration from the command line.
///
/// An explicit `--team-size` wins over a config file; with neither, the
/// default configuration applies.
fn resolve_config(team_size: Option<u8>, path: Option<&Path>) -> Result<InferenceConfig> {
    if let Some(team_size) = team_size {
        return Ok(InferenceConfig::new(team_size));
    }
    let Some(path) = path else {
        return Ok(InferenceConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read tracker config from {}", path.display()))?;
    let manifest: ConfigManifest =
        toml::from_str(&contents).context("failed to parse tracker config toml contents")?;
    Ok(InferenceConfig::new(manifest.team_size))
}

/// On-disk shape of the tracker configuration file.
#[derive(Debug, serde::Deserialize)]
struct ConfigManifest {
    team_size: u8,
}

/// Reads the session string from a file, or from stdin when no path is given.
fn read_session_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read session recording from {}", path.display())),
        None => {
            let mut raw = String::new();
            let _ = io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read session recording from stdin")?;
            Ok(raw)
        }
    }
}

/// Feeds a decoded recording through a fresh tracker, printing one line per
/// stability update along the way.
fn drive_recording(recording: &SessionRecording) -> VentTracker {
    let config = InferenceConfig::new(recording.team_size);
    let mut tracker = VentTracker::new(config);
    let mut events = Vec::new();
    apply(&mut tracker, TrackerCommand::Configure { config }, &mut events);
    for tick in &recording.ticks {
        events.clear();
        apply(
            &mut tracker,
            TrackerCommand::IngestTick {
                readings: tick.readings,
                directions: tick.directions,
            },
            &mut events,
        );
        if let Some(raw_delta) = tick.delta {
            apply(
                &mut tracker,
                TrackerCommand::IngestStabilityDelta { raw_delta },
                &mut events,
            );
            println!(
                "raw {raw_delta:+} -> {}",
                format_display(&query::display_state(&tracker))
            );
        }
        if tick.reset {
            apply(&mut tracker, TrackerCommand::ResetVents, &mut events);
        }
    }
    tracker
}

/// Renders a display payload as a single status line.
fn format_display(display: &DisplayState) -> String {
    let mut line = format!("tick {:>4}", display.tick.get());
    for slot in &display.vents {
        let _ = write!(
            line,
            " | {}{} {}",
            slot.vent.label(),
            slot.direction.arrow(),
            format_estimate(slot.estimate)
        );
    }
    match display.predicted_delta {
        Some(bounds) if bounds.low() == bounds.high() => {
            let _ = write!(line, " | delta {:+}", bounds.low());
        }
        Some(bounds) => {
            let _ = write!(line, " | delta {:+}..{:+}", bounds.low(), bounds.high());
        }
        None => line.push_str(" | delta ?"),
    }
    line
}

/// Renders a vent estimate in the compact operator notation.
///
/// Exact values read `=50`, with a trailing `~` when the value was pinned by
/// a freeze-band clip rather than a direct reveal.
fn format_estimate(estimate: VentEstimate) -> String {
    match estimate {
        VentEstimate::Unknown => "?".to_owned(),
        VentEstimate::Exact {
            value,
            via_freeze_clip: false,
        } => format!("={value}"),
        VentEstimate::Exact {
            value,
            via_freeze_clip: true,
        } => format!("={value}~"),
        VentEstimate::Range { span } => format!("{}..{}", span.start(), span.end()),
        VentEstimate::SplitRange { lower, upper } => format!(
            "{}..{} or {}..{}",
            lower.start(),
            lower.end(),
            upper.start(),
            upper.end()
        ),
    }
}
