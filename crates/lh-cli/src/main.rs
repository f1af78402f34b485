use std::{fs, path::Path, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use lh_core::{PulseEvent, Real, TrackerGeometry};
use lh_pipeline::{LogSink, Session, SessionConfig, TriggerOutcome};
use log::info;
use serde::{Deserialize, Serialize};

/// Lighthouse calibration from a recorded pulse log.
#[derive(Debug, Parser)]
#[command(author, version, about = "Replay a pulse log and register the lighthouses")]
struct Args {
    /// Path to JSON file containing the tracker geometry and pulse log.
    #[arg(long)]
    input: PathBuf,

    /// Optional path to JSON SessionConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the calibration file from the configuration.
    #[arg(long)]
    calfile: Option<PathBuf>,
}

/// One pulse as recorded, with its arrival time in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordedPulse {
    stamp: Real,
    tracker: String,
    #[serde(flatten)]
    pulse: PulseEvent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReplayInput {
    trackers: Vec<TrackerGeometry>,
    pulses: Vec<RecordedPulse>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

/// Replay `input` in offline mode and stop through the idle trigger.
fn replay(input: &ReplayInput, mut config: SessionConfig) -> Result<TriggerOutcome> {
    config.offline = true;
    let idle_timeout = config.idle_timeout;
    let mut session = Session::new(config, LogSink)?;
    for geometry in &input.trackers {
        session.register_tracker(geometry.clone());
    }

    let mut last = None;
    for recorded in &input.pulses {
        session.handle_pulse(recorded.stamp, &recorded.tracker, recorded.pulse);
        last = Some(recorded.stamp);
    }
    let Some(last) = last else {
        bail!("pulse log is empty");
    };
    info!(
        "replayed {} pulses, {} bundles recorded",
        input.pulses.len(),
        session.measurement_count()
    );
    // The log ends in silence.
    session
        .poll_idle(last + 2.0 * idle_timeout)
        .context("recording did not stop at the end of the log")
}

fn run_from_files(
    input_path: &Path,
    config_path: Option<&Path>,
    calfile: Option<&Path>,
) -> Result<TriggerOutcome> {
    let input: ReplayInput = load_json_file(input_path)?;
    let mut config = match config_path {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(calfile) = calfile {
        config.calfile = calfile.to_path_buf();
    }
    replay(&input, config)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match try_main() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn try_main() -> Result<bool> {
    let args = Args::parse();
    let outcome = run_from_files(&args.input, args.config.as_deref(), args.calfile.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.success)
}
