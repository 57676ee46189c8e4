//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup, step ingestion and export.

use std::path::PathBuf;

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or detector construction failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: edep_core::ConfigError,
    },

    /// Neither `EDEP_STEPS` nor `input.steps_file` names a step stream.
    #[error("no step stream: set EDEP_STEPS or input.steps_file")]
    MissingSteps,

    /// The step stream could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The step stream.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A line of the step stream is not a valid step record.
    #[error("{path}:{line}: malformed step record: {source}")]
    Input {
        /// The step stream.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// The underlying decode error.
        source: serde_json::Error,
    },

    /// The run aborted.
    #[error("run error: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: edep_core::RunError,
    },

    /// Writing the exports failed.
    #[error("export error: {source}")]
    Export {
        /// The underlying export error.
        #[from]
        source: edep_core::ExportError,
    },
}
