//! Run binary for energy-deposition reduction.
//!
//! Replays a recorded step stream through the configured detectors and
//! writes their exports. The transport engine that produced the stream is
//! stood in for by a host that logs retention requests.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `EDEP_CONFIG` (default `edep-config.yaml`)
//! 3. Build the detectors and start the run driver
//! 4. Open the step stream from `EDEP_STEPS` or `input.steps_file`
//! 5. Feed every step record to the driver
//! 6. Finalize the detectors and merge their exports
//! 7. Write one JSON container per output file

mod error;
mod host;
mod input;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use edep_core::{Driver, EdepConfig, JsonWriter, RunMetadata};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::host::LoggingHost;
use crate::input::StepReader;

/// Configuration file used when `EDEP_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "edep-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, ingestion, the run or the export
/// fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("edep-engine starting");

    // 2. Load configuration.
    let config_path = std::env::var_os("EDEP_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = EdepConfig::from_file(&config_path).map_err(EngineError::from)?;
    info!(
        path = %config_path.display(),
        detectors = config.detectors.len(),
        num_events = ?config.run.num_events,
        dtype = ?config.output.dtype,
        "Configuration loaded"
    );

    // 3. Build the detectors.
    let mut driver = Driver::new(&config).map_err(EngineError::from)?;

    // 4. Open the step stream.
    let steps_path = steps_path(&config)?;
    let file = File::open(&steps_path).map_err(|source| EngineError::Io {
        path: steps_path.clone(),
        source,
    })?;
    info!(path = %steps_path.display(), "Step stream opened");

    // 5. Feed every step.
    let mut host = LoggingHost::default();
    for step in StepReader::new(&steps_path, BufReader::new(file)) {
        driver
            .process_step(&step?, &mut host)
            .map_err(EngineError::from)?;
    }

    // 6. Finalize and merge.
    let (exports, summary) = driver.finish(&mut host).map_err(EngineError::from)?;

    // 7. Write.
    let meta = RunMetadata::now();
    exports
        .write_all(&JsonWriter, &meta)
        .map_err(EngineError::from)?;

    info!(
        run_id = %meta.run_id,
        events = summary.events,
        steps = summary.steps,
        hits = summary.hits,
        files = summary.files,
        kept_events = host.kept().len(),
        retention_finished = host.is_finished(),
        "edep-engine finished"
    );
    Ok(())
}

/// The step stream: `EDEP_STEPS` if set, else `input.steps_file`.
fn steps_path(config: &EdepConfig) -> Result<PathBuf, EngineError> {
    std::env::var_os("EDEP_STEPS")
        .map(PathBuf::from)
        .or_else(|| config.input.steps_file.clone())
        .ok_or(EngineError::MissingSteps)
}

