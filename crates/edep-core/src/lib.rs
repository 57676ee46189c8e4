//! Energy-deposition reduction: detectors, configuration and the run driver.
//!
//! The transport engine hands every step it takes to a [`Driver`], which
//! keeps the per-event ancestry tree and forwards the step to each detector
//! (sink) attached to the step's volume. At the end of the run each sink
//! reduces what it saw into datasets, merged into one container per output
//! file.
//!
//! # Modules
//!
//! - [`config`] -- YAML run configuration: run settings, output dtype and
//!   the ordered detector table.
//! - [`context`] -- [`EventContext`], the per-event ancestry tree lent to
//!   sinks.
//! - [`driver`] -- [`Driver`]: event boundaries, dispatch and finalization.
//! - [`export`] -- Container model, per-file merging and [`JsonWriter`].
//! - [`expr`] -- Arithmetic expressions with units and array constructors,
//!   used for bin edges.
//! - [`host`] -- [`HostEngine`], the callbacks into the transport engine.
//! - [`progress`] -- Periodic status logging.
//! - [`sink`] -- The five detector kinds and [`DetectorSet`] routing.
//! - [`transform`] -- Affine transforms built from named operations.
//! - [`volume`] -- Axis-aligned boxes.
//!
//! [`JsonWriter`]: export::JsonWriter

pub mod config;
pub mod context;
pub mod driver;
pub mod export;
pub mod expr;
pub mod host;
pub mod progress;
pub mod sink;
pub mod transform;
pub mod volume;

// Re-export primary types at crate root.
pub use config::{ConfigError, DetectorConfig, EdepConfig};
pub use context::EventContext;
pub use driver::{Driver, RunError, RunSummary};
pub use export::{ContainerWriter, ExportError, ExportSet, JsonWriter, RunMetadata};
pub use host::{HostEngine, NoOpHost};
pub use sink::{DetectorSet, Sink, SinkError};
pub use transform::Transform;
pub use volume::BoxVolume;
