//! Deposition sinks and volume routing.
//!
//! A [`Sink`] is one configured detector: a reduction policy fed with the
//! steps taken in the volumes it is attached to. Every sink goes through
//! the same two phases. While collecting it accepts hits; [`Sink::finalize`]
//! flushes, exports and freezes it, and any later hit is an error.
//!
//! [`DetectorSet`] owns every sink and the volume-to-sink routing table. A
//! volume may feed several sinks; they receive the step in configuration
//! order.

pub mod binned;
pub mod flag;
pub mod simple;
pub mod spectral;
pub mod transmission;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use edep_histogram::HistogramError;
use edep_tree::{FilterSpec, TreeError};
use edep_types::StepRecord;
use edep_types::units::{DEGREE, MILLIMETER};
use tracing::{debug, info};

pub use binned::BinnedDeposition;
pub use flag::ThresholdFlag;
pub use simple::SimpleDeposition;
pub use spectral::SpectralDeposition;
pub use transmission::{Crossings, Transmission};

use crate::config::{ConfigError, DetectorConfig, EdepConfig, OutputConfig, TransformationConfig};
use crate::context::EventContext;
use crate::export::SinkExport;
use crate::host::HostEngine;
use crate::transform::Transform;

/// Errors raised while feeding or finalizing a sink.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    /// The hit's track has no ancestry to filter on.
    #[error("sink {sink}: {source}")]
    Tree {
        /// The sink.
        sink: String,
        /// The underlying lookup error.
        source: TreeError,
    },

    /// The accumulator rejected a sample.
    #[error("sink {sink}: {source}")]
    Histogram {
        /// The sink.
        sink: String,
        /// The underlying histogram error.
        source: HistogramError,
    },

    /// A hit arrived from a volume the sink has no histogram for.
    #[error("sink {sink}: no histogram for volume {volume:?}")]
    UnknownVolume {
        /// The sink.
        sink: String,
        /// The hit's volume.
        volume: String,
    },

    /// The sink was used after it was finalized.
    #[error("sink {sink} is already finalized")]
    Finalized {
        /// The sink.
        sink: String,
    },
}

/// Lifecycle shared by every sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Collecting,
    Finalized,
}

impl Phase {
    fn ensure_collecting(self, sink: &str) -> Result<(), SinkError> {
        match self {
            Self::Collecting => Ok(()),
            Self::Finalized => Err(SinkError::Finalized {
                sink: sink.to_owned(),
            }),
        }
    }

    fn finish(&mut self, sink: &str) -> Result<(), SinkError> {
        self.ensure_collecting(sink)?;
        *self = Self::Finalized;
        Ok(())
    }
}

/// Whether a hit passes the sink's ancestry filter. No filter admits all.
fn admitted(
    sink: &str,
    filter: Option<&FilterSpec>,
    step: &StepRecord,
    ctx: &EventContext,
) -> Result<bool, SinkError> {
    let Some(filter) = filter else {
        return Ok(true);
    };
    let path = ctx.path_to(step.track_id).map_err(|source| SinkError::Tree {
        sink: sink.to_owned(),
        source,
    })?;
    Ok(filter.admits(&path))
}

/// Transformation values are in mm and degrees.
fn build_transform(
    detector: &str,
    config: Option<&TransformationConfig>,
) -> Result<Transform, ConfigError> {
    let Some(config) = config else {
        return Ok(Transform::identity());
    };
    let operations = config.operations(detector)?;
    Transform::build(operations, MILLIMETER, DEGREE).map_err(|source| ConfigError::Transform {
        detector: detector.to_owned(),
        source,
    })
}

/// A configured detector.
#[derive(Debug, Clone)]
pub enum Sink {
    /// See [`SimpleDeposition`].
    Simple(SimpleDeposition),
    /// See [`BinnedDeposition`].
    Binned(Box<BinnedDeposition>),
    /// See [`SpectralDeposition`].
    Spectral(SpectralDeposition),
    /// See [`Transmission`].
    Transmission(Transmission),
    /// See [`ThresholdFlag`].
    Flag(Box<ThresholdFlag>),
}

impl Sink {
    /// Build a sink from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the detector's transformation, bin edges
    /// or volume list is invalid. The volume list must be non-empty and
    /// free of repeats.
    pub fn build(
        name: &str,
        config: &DetectorConfig,
        output: &OutputConfig,
    ) -> Result<Self, ConfigError> {
        if config.volumes().is_empty() {
            return Err(ConfigError::NoVolumes {
                detector: name.to_owned(),
            });
        }
        let mut seen = BTreeSet::new();
        if let Some(volume) = config.volumes().iter().find(|v| !seen.insert(v.as_str())) {
            return Err(ConfigError::DuplicateVolume {
                detector: name.to_owned(),
                volume: volume.clone(),
            });
        }
        let sink = match config {
            DetectorConfig::SimpleDeposition(c) => {
                Self::Simple(SimpleDeposition::new(name, c, output.dtype))
            }
            DetectorConfig::BinnedDeposition(c) => {
                Self::Binned(Box::new(BinnedDeposition::new(name, c, output.dtype)?))
            }
            DetectorConfig::SpectralDeposition(c) => {
                Self::Spectral(SpectralDeposition::new(name, c, output.dtype)?)
            }
            DetectorConfig::Transmission(c) => Self::Transmission(Transmission::new(name, c)),
            DetectorConfig::Flag(c) => Self::Flag(Box::new(ThresholdFlag::new(name, c)?)),
        };
        debug!(detector = name, kind = config.type_name(), "Detector built");
        Ok(sink)
    }

    /// Detector name.
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(s) => s.name(),
            Self::Binned(s) => s.name(),
            Self::Spectral(s) => s.name(),
            Self::Transmission(s) => s.name(),
            Self::Flag(s) => s.name(),
        }
    }

    /// Output file, for sinks that export.
    pub fn file(&self) -> Option<&Path> {
        match self {
            Self::Simple(s) => Some(s.file()),
            Self::Binned(s) => Some(s.file()),
            Self::Spectral(s) => Some(s.file()),
            Self::Transmission(s) => Some(s.file()),
            Self::Flag(_) => None,
        }
    }

    /// Feed one step taken in an attached volume.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] after finalization, for a filtered hit whose
    /// track is not in the tree, or for a spectral hit in an unknown volume.
    pub fn process_hit(
        &mut self,
        step: &StepRecord,
        ctx: &EventContext,
        host: &mut dyn HostEngine,
    ) -> Result<(), SinkError> {
        match self {
            Self::Simple(s) => s.process_hit(step),
            Self::Binned(s) => s.process_hit(step, ctx),
            Self::Spectral(s) => s.process_hit(step, ctx),
            Self::Transmission(s) => s.process_hit(step),
            Self::Flag(s) => s.process_hit(step, host),
        }
    }

    /// Notify the sink that the current event is complete.
    pub fn end_event(&mut self, host: &mut dyn HostEngine) {
        if let Self::Flag(s) = self {
            s.end_event(host);
        }
    }

    /// Flush, freeze and export.
    ///
    /// Returns `None` for sinks that produce no dataset.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Finalized`] if called twice.
    pub fn finalize(&mut self, num_events: u64) -> Result<Option<SinkExport>, SinkError> {
        match self {
            Self::Simple(s) => s.finalize(num_events).map(Some),
            Self::Binned(s) => s.finalize(num_events).map(Some),
            Self::Spectral(s) => s.finalize(num_events).map(Some),
            Self::Transmission(s) => s.finalize(num_events).map(Some),
            Self::Flag(s) => s.finalize().map(|()| None),
        }
    }
}

/// Every sink of a run plus the volume routing table.
#[derive(Debug, Clone, Default)]
pub struct DetectorSet {
    sinks: Vec<Sink>,
    routes: BTreeMap<String, Vec<usize>>,
}

impl DetectorSet {
    /// An empty set.
    pub const fn new() -> Self {
        Self {
            sinks: Vec::new(),
            routes: BTreeMap::new(),
        }
    }

    /// Build every configured detector, in configuration order.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] raised by [`Sink::build`].
    pub fn from_config(config: &EdepConfig) -> Result<Self, ConfigError> {
        let mut set = Self::new();
        for (name, detector) in &config.detectors {
            let sink = Sink::build(name, detector, &config.output)?;
            set.attach(sink, detector.volumes());
        }
        info!(
            detectors = set.len(),
            volumes = set.routes.len(),
            "Detectors built"
        );
        Ok(set)
    }

    /// Add a sink fed by `volumes`.
    pub fn attach(&mut self, sink: Sink, volumes: &[String]) {
        let index = self.sinks.len();
        self.sinks.push(sink);
        for volume in volumes {
            let targets = self.routes.entry(volume.clone()).or_default();
            if !targets.contains(&index) {
                targets.push(index);
            }
        }
    }

    /// Deliver a step to every sink attached to its volume.
    ///
    /// Returns the number of sinks fed.
    ///
    /// # Errors
    ///
    /// Returns the first [`SinkError`].
    pub fn route(
        &mut self,
        step: &StepRecord,
        ctx: &EventContext,
        host: &mut dyn HostEngine,
    ) -> Result<usize, SinkError> {
        let Some(targets) = self.routes.get(&step.current_volume) else {
            return Ok(0);
        };
        for &index in targets {
            if let Some(sink) = self.sinks.get_mut(index) {
                sink.process_hit(step, ctx, host)?;
            }
        }
        Ok(targets.len())
    }

    /// Notify every sink that the current event is complete.
    pub fn end_event(&mut self, host: &mut dyn HostEngine) {
        for sink in &mut self.sinks {
            sink.end_event(host);
        }
    }

    /// Finalize every sink, collecting exports in configuration order.
    ///
    /// # Errors
    ///
    /// Returns the first [`SinkError`].
    pub fn finalize(&mut self, num_events: u64) -> Result<Vec<SinkExport>, SinkError> {
        let mut exports = Vec::new();
        for sink in &mut self.sinks {
            if let Some(export) = sink.finalize(num_events)? {
                exports.push(export);
            }
        }
        Ok(exports)
    }

    /// The sinks, in configuration order.
    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    /// Sink by name.
    pub fn get(&self, name: &str) -> Option<&Sink> {
        self.sinks.iter().find(|s| s.name() == name)
    }

    /// Names of sinks attached to `volume`, in delivery order.
    pub fn routes_for(&self, volume: &str) -> Vec<&str> {
        self.routes
            .get(volume)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.sinks.get(i))
            .map(Sink::name)
            .collect()
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Whether any sink writes to `file`.
    pub fn writes_to(&self, file: &Path) -> bool {
        self.sinks.iter().any(|s| s.file() == Some(file))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use edep_types::{EventId, TrackId};

    use super::*;
    use crate::host::NoOpHost;

    const CONFIG: &str = r"
detectors:
  Raw:
    type: SimpleDepositionSD
    file: out/raw.json
    volumes: [World.Target, World.Backing]
  Map:
    type: BinnedDepositionSD
    file: out/raw.json
    group: map
    volumes: [World.Target]
    bin_edges: [[0, 10], [0, 10], [0, 10]]
  Trigger:
    type: FlagSD
    volumes: [World.Target]
    volume: [[0, 10], [0, 10], [0, 10]]
    threshold: 1
    limit_count: 1
";

    fn step(volume: &str) -> StepRecord {
        StepRecord {
            event_id: EventId(0),
            track_id: TrackId(1),
            parent_id: TrackId(0),
            particle_name: "gamma".to_owned(),
            creation_process: None,
            current_volume: volume.to_owned(),
            pre_step_position: [1.0, 1.0, 1.0],
            post_step_position: [1.0, 1.0, 2.0],
            momentum_direction: [0.0, 0.0, 1.0],
            pre_step_kinetic_energy: 1.0,
            post_step_kinetic_energy: 0.5,
            energy_deposit: 0.5,
            global_time: 0.0,
            post_step_process_name: None,
        }
    }

    #[test]
    fn routes_follow_configuration_order() {
        let config = EdepConfig::parse(CONFIG).unwrap();
        let set = DetectorSet::from_config(&config).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.routes_for("World.Target"), vec!["Raw", "Map", "Trigger"]);
        assert_eq!(set.routes_for("World.Backing"), vec!["Raw"]);
        assert!(set.routes_for("World.Elsewhere").is_empty());
        assert!(set.writes_to(Path::new("out/raw.json")));
        assert_eq!(set.get("Trigger").unwrap().file(), None);
    }

    #[test]
    fn route_feeds_every_attached_sink() {
        let config = EdepConfig::parse(CONFIG).unwrap();
        let mut set = DetectorSet::from_config(&config).unwrap();
        let mut ctx = EventContext::new();
        ctx.begin(EventId(0));
        let target = step("World.Target");
        ctx.observe(&target).unwrap();

        let mut host = NoOpHost;
        assert_eq!(set.route(&target, &ctx, &mut host).unwrap(), 3);
        assert_eq!(set.route(&step("World.Backing"), &ctx, &mut host).unwrap(), 1);
        assert_eq!(set.route(&step("World.Elsewhere"), &ctx, &mut host).unwrap(), 0);

        let Some(Sink::Simple(raw)) = set.get("Raw") else {
            panic!("Raw should be simple");
        };
        assert_eq!(raw.len(), 2);
        let Some(Sink::Binned(map)) = set.get("Map") else {
            panic!("Map should be binned");
        };
        assert_eq!(map.histogram().pending(), 1);
    }

    #[test]
    fn finalize_skips_flag_and_refuses_twice() {
        let config = EdepConfig::parse(CONFIG).unwrap();
        let mut set = DetectorSet::from_config(&config).unwrap();
        let exports = set.finalize(4).unwrap();
        assert_eq!(exports.len(), 2);
        assert_eq!(exports[1].group.as_deref(), Some("map"));

        let err = set.finalize(4).unwrap_err();
        assert_eq!(
            err,
            SinkError::Finalized {
                sink: "Raw".to_owned()
            }
        );

        let mut ctx = EventContext::new();
        ctx.begin(EventId(0));
        let err = set
            .route(&step("World.Target"), &ctx, &mut NoOpHost)
            .unwrap_err();
        assert!(matches!(err, SinkError::Finalized { .. }));
    }

    #[test]
    fn detector_without_volumes_is_rejected() {
        let config = EdepConfig::parse(
            r"
detectors:
  Empty:
    type: SimpleDepositionSD
    file: out.json
    volumes: []
",
        )
        .unwrap();
        let err = DetectorSet::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::NoVolumes { detector } if detector == "Empty"));
    }

    #[test]
    fn repeated_volume_is_rejected() {
        let config = EdepConfig::parse(
            r"
detectors:
  Twice:
    type: SimpleDepositionSD
    file: out.json
    volumes: [World.Target, World.Backing, World.Target]
",
        )
        .unwrap();
        let err = DetectorSet::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateVolume { detector, volume }
                if detector == "Twice" && volume == "World.Target"
        ));
    }

    #[test]
    fn filtered_hit_on_unknown_track_is_an_error() {
        let config = EdepConfig::parse(
            r"
detectors:
  Map:
    type: BinnedDepositionSD
    file: out.json
    volumes: [World.Target]
    tree_filter: {mode: Include, process: '*', volume: '*', level: 0}
    bin_edges: [[0, 10]]
",
        )
        .unwrap();
        let mut set = DetectorSet::from_config(&config).unwrap();
        let mut ctx = EventContext::new();
        ctx.begin(EventId(0));
        let err = set
            .route(&step("World.Target"), &ctx, &mut NoOpHost)
            .unwrap_err();
        assert_eq!(
            err,
            SinkError::Tree {
                sink: "Map".to_owned(),
                source: TreeError::TrackNotFound(TrackId(1)),
            }
        );
    }
}
