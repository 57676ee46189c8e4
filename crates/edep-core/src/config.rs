//! Configuration loading and typed config structures.
//!
//! The run is described by one YAML document, `edep-config.yaml` by default.
//! This module defines strongly-typed structs that mirror the YAML
//! structure and a loader that reads the file. Bin edges written as
//! expressions stay as text here; they are evaluated once, when the
//! detectors are built.
//!
//! ```yaml
//! run:
//!   num_events: 1000
//!   status_update_period_s: 5.0
//! input:
//!   steps_file: steps.jsonl
//! output:
//!   dtype: f32
//! detectors:
//!   Calorimeter:
//!     type: BinnedDepositionSD
//!     file: out/calorimeter.json
//!     volumes: [World.Calorimeter]
//!     transformation: [[TranslateZ, -50], [RotateY, 90]]
//!     bin_edges:
//!       - linspace(-5, 5, 11)*mm
//!       - linspace(-5, 5, 11)*mm
//! ```

use std::path::{Path, PathBuf};

use edep_histogram::HistogramError;
use edep_tree::FilterSpec;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::expr::{self, ExprError};
use crate::transform::TransformError;
use crate::volume::BoxVolume;

/// Errors that can occur when loading configuration or building detectors
/// from it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A transformation named an unknown operation.
    #[error("detector {detector}: {source}")]
    Transform {
        /// Detector being built.
        detector: String,
        /// The underlying transform error.
        source: TransformError,
    },

    /// A transformation given as two columns has columns of different length.
    #[error("detector {detector}: {operations} transform operation(s) but {values} value(s)")]
    TransformColumns {
        /// Detector being built.
        detector: String,
        /// Number of operation names.
        operations: usize,
        /// Number of values.
        values: usize,
    },

    /// A bin-edge expression failed to evaluate.
    #[error("detector {detector}: bin edges: {source}")]
    Expr {
        /// Detector being built.
        detector: String,
        /// The underlying expression error.
        source: ExprError,
    },

    /// Evaluated bin edges are not a valid binning.
    #[error("detector {detector}: bin edges: {source}")]
    Bins {
        /// Detector being built.
        detector: String,
        /// The underlying binning error.
        source: HistogramError,
    },

    /// A detector is attached to no volume.
    #[error("detector {detector} lists no volumes")]
    NoVolumes {
        /// The offending detector.
        detector: String,
    },

    /// A volume is listed more than once for one detector.
    #[error("detector {detector}: volume {volume:?} is listed twice")]
    DuplicateVolume {
        /// The offending detector.
        detector: String,
        /// The repeated volume.
        volume: String,
    },

    /// A spectral volume name has no dotted prefix to strip for its label.
    #[error("detector {detector}: volume {volume:?} has no '.' separated parent name")]
    VolumeLabel {
        /// The offending detector.
        detector: String,
        /// The offending volume.
        volume: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level run configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EdepConfig {
    /// Run-level settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Where step records come from.
    #[serde(default)]
    pub input: InputConfig,

    /// Export settings shared by all detectors.
    #[serde(default)]
    pub output: OutputConfig,

    /// Detectors, in configuration order.
    #[serde(default, deserialize_with = "ordered_detectors")]
    pub detectors: Vec<(String, DetectorConfig)>,
}

impl EdepConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML or does not
    /// match the schema.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or does
    /// not match the schema.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Look up a detector by name.
    pub fn detector(&self, name: &str) -> Option<&DetectorConfig> {
        self.detectors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }
}

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Event count recorded in exports. When absent, the number of events
    /// observed in the step stream is used.
    #[serde(default)]
    pub num_events: Option<u64>,

    /// Minimum seconds between progress log lines.
    #[serde(default = "default_status_update_period_s")]
    pub status_update_period_s: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_events: None,
            status_update_period_s: default_status_update_period_s(),
        }
    }
}

/// Input settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InputConfig {
    /// JSON-lines file of step records.
    #[serde(default)]
    pub steps_file: Option<PathBuf>,
}

/// Export settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Precision of exported deposition and count arrays.
    #[serde(default)]
    pub dtype: Dtype,
}

/// Floating-point precision of exported arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// Single precision.
    #[default]
    F32,
    /// Double precision.
    F64,
}

/// One detector, tagged by its `type` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum DetectorConfig {
    /// Record every deposition verbatim.
    #[serde(rename = "SimpleDepositionSD")]
    SimpleDeposition(SimpleConfig),
    /// Bin depositions spatially.
    #[serde(rename = "BinnedDepositionSD")]
    BinnedDeposition(BinnedConfig),
    /// Histogram deposited energy per volume.
    #[serde(rename = "SpectralDepositionSD")]
    SpectralDeposition(SpectralConfig),
    /// Record particles crossing volume boundaries.
    #[serde(rename = "TransmissionSD")]
    Transmission(TransmissionConfig),
    /// Ask the host to keep events above an energy threshold.
    #[serde(rename = "FlagSD")]
    Flag(FlagConfig),
}

impl DetectorConfig {
    /// The volumes this detector is attached to.
    pub fn volumes(&self) -> &[String] {
        match self {
            Self::SimpleDeposition(c) => &c.volumes,
            Self::BinnedDeposition(c) => &c.volumes,
            Self::SpectralDeposition(c) => &c.volumes,
            Self::Transmission(c) => &c.volumes,
            Self::Flag(c) => &c.volumes,
        }
    }

    /// The configuration tag of this detector type.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::SimpleDeposition(_) => "SimpleDepositionSD",
            Self::BinnedDeposition(_) => "BinnedDepositionSD",
            Self::SpectralDeposition(_) => "SpectralDepositionSD",
            Self::Transmission(_) => "TransmissionSD",
            Self::Flag(_) => "FlagSD",
        }
    }
}

/// `SimpleDepositionSD` settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimpleConfig {
    /// Output file.
    pub file: PathBuf,
    /// Volumes feeding the detector.
    pub volumes: Vec<String>,
    /// Group to export under; the file root when absent.
    #[serde(default)]
    pub group: Option<String>,
}

/// `BinnedDepositionSD` settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinnedConfig {
    /// Output file.
    pub file: PathBuf,
    /// Volumes feeding the detector.
    pub volumes: Vec<String>,
    /// Group to export under; the file root when absent.
    #[serde(default)]
    pub group: Option<String>,
    /// Transform applied to the pre-step position before binning.
    #[serde(default)]
    pub transformation: Option<TransformationConfig>,
    /// Ancestry filter.
    #[serde(default)]
    pub tree_filter: Option<FilterSpec>,
    /// One to three axes of bin edges, in mm.
    pub bin_edges: Vec<EdgeSource>,
    /// Pending samples held before a flush; the cell count when absent.
    #[serde(default)]
    pub flush_threshold: Option<usize>,
}

/// `SpectralDepositionSD` settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpectralConfig {
    /// Output file.
    pub file: PathBuf,
    /// Volumes feeding the detector, one histogram each.
    pub volumes: Vec<String>,
    /// Group to export under; the file root when absent.
    #[serde(default)]
    pub group: Option<String>,
    /// Ancestry filter.
    #[serde(default)]
    pub tree_filter: Option<FilterSpec>,
    /// Energy bin edges, in MeV.
    pub bin_edges: EdgeSource,
    /// Pending hits held per volume before a flush.
    #[serde(default = "default_spectral_flush_threshold")]
    pub flush_threshold: usize,
}

/// `TransmissionSD` settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransmissionConfig {
    /// Output file.
    pub file: PathBuf,
    /// Volumes feeding the detector.
    pub volumes: Vec<String>,
    /// Particle species to record.
    pub particles: Vec<String>,
    /// Group to export under; the file root when absent.
    #[serde(default)]
    pub group: Option<String>,
}

/// `FlagSD` settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlagConfig {
    /// Volumes feeding the detector.
    pub volumes: Vec<String>,
    /// Transform applied to the pre-step position before the box test.
    #[serde(default)]
    pub transformation: Option<TransformationConfig>,
    /// Region, in mm, whose deposits count toward the tally.
    pub volume: BoxVolume,
    /// Per-event tally, in MeV, at which the event is flagged.
    pub threshold: f64,
    /// Most events the host is asked to keep.
    pub limit_count: u64,
}

/// An ordered list of transform operations.
///
/// Accepted as a list of `[name, value]` pairs, or as two parallel lists
/// `[[names...], [values...]]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TransformationConfig {
    /// `[[TranslateX, 1], [RotateZ, 90]]`
    Pairs(Vec<(String, f64)>),
    /// `[[TranslateX, RotateZ], [1, 90]]`
    Columns(Vec<String>, Vec<f64>),
}

impl TransformationConfig {
    /// The operations as `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TransformColumns`] if the two column lists
    /// differ in length.
    pub fn operations(&self, detector: &str) -> Result<Vec<(&str, f64)>, ConfigError> {
        match self {
            Self::Pairs(pairs) => Ok(pairs.iter().map(|(n, v)| (n.as_str(), *v)).collect()),
            Self::Columns(names, values) => {
                if names.len() != values.len() {
                    return Err(ConfigError::TransformColumns {
                        detector: detector.to_owned(),
                        operations: names.len(),
                        values: values.len(),
                    });
                }
                Ok(names
                    .iter()
                    .map(String::as_str)
                    .zip(values.iter().copied())
                    .collect())
            }
        }
    }
}

/// Bin edges written literally or as an expression.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EdgeSource {
    /// A list whose items are numbers or scalar expressions.
    Values(Vec<EdgeValue>),
    /// An expression producing an array.
    Expression(String),
}

/// One literal bin edge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EdgeValue {
    /// A plain number.
    Number(f64),
    /// A scalar expression such as `5*cm`.
    Expression(String),
}

impl EdgeSource {
    /// Evaluate to a list of edges in internal units.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] if an expression fails or has the wrong shape.
    pub fn evaluate(&self) -> Result<Vec<f64>, ExprError> {
        match self {
            Self::Expression(source) => expr::evaluate_array(source),
            Self::Values(values) => values
                .iter()
                .map(|v| match v {
                    EdgeValue::Number(x) => Ok(*x),
                    EdgeValue::Expression(source) => expr::evaluate_scalar(source),
                })
                .collect(),
        }
    }
}

/// Deserialize a YAML mapping into a list, keeping document order.
fn ordered_detectors<'de, D>(deserializer: D) -> Result<Vec<(String, DetectorConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<(String, DetectorConfig)>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a map of detector name to detector config")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut detectors: Self::Value = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, detector)) = map.next_entry::<String, DetectorConfig>()? {
                if detectors.iter().any(|(n, _)| *n == name) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate detector {name:?}"
                    )));
                }
                detectors.push((name, detector));
            }
            Ok(detectors)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_status_update_period_s() -> f64 {
    1.0
}

const fn default_spectral_flush_threshold() -> usize {
    1000
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use approx::assert_relative_eq;
    use edep_tree::FilterMode;

    use super::*;

    const FULL: &str = r"
run:
  num_events: 500
  status_update_period_s: 2.5
input:
  steps_file: steps.jsonl
output:
  dtype: f64
detectors:
  Zeta:
    type: SimpleDepositionSD
    file: out/simple.json
    volumes: [World.Target]
  Alpha:
    type: BinnedDepositionSD
    file: out/binned.json
    group: calorimeter
    volumes: [World.Target, World.Backing]
    transformation: [[TranslateZ, -50], [RotateY, 90]]
    tree_filter: {mode: Exclude, process: 'eBrem', volume: 'World.*', level: -1}
    bin_edges:
      - linspace(-5, 5, 11)*mm
      - [-1, 0, '1*cm']
    flush_threshold: 64
  Spectrum:
    type: SpectralDepositionSD
    file: out/spectra.json
    volumes: [World.D1, World.D2]
    bin_edges: arange(0, 2, 0.5)*MeV
  Exit:
    type: TransmissionSD
    file: out/exit.json
    volumes: [World.Exit]
    particles: [gamma, e-]
  Trigger:
    type: FlagSD
    volumes: [World.Target]
    transformation: [[TranslateX, RotateZ], [1, 90]]
    volume: [[-5, 5], [-5, 5], [0, 10]]
    threshold: 10
    limit_count: 3
";

    #[test]
    fn default_config_is_empty() {
        let config = EdepConfig::default();
        assert!(config.detectors.is_empty());
        assert_eq!(config.output.dtype, Dtype::F32);
        assert_eq!(config.run.num_events, None);
    }

    #[test]
    fn parse_full_yaml() {
        let config = EdepConfig::parse(FULL).unwrap();
        assert_eq!(config.run.num_events, Some(500));
        assert_relative_eq!(config.run.status_update_period_s, 2.5);
        assert_eq!(config.input.steps_file, Some(PathBuf::from("steps.jsonl")));
        assert_eq!(config.output.dtype, Dtype::F64);

        let names: Vec<&str> = config.detectors.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Spectrum", "Exit", "Trigger"]);
    }

    #[test]
    fn binned_fields() {
        let config = EdepConfig::parse(FULL).unwrap();
        let Some(DetectorConfig::BinnedDeposition(binned)) = config.detector("Alpha") else {
            panic!("Alpha should be binned");
        };
        assert_eq!(binned.group.as_deref(), Some("calorimeter"));
        assert_eq!(binned.flush_threshold, Some(64));
        let filter = binned.tree_filter.as_ref().unwrap();
        assert_eq!(filter.mode, FilterMode::Exclude);
        assert_eq!(filter.level, -1);
        assert_eq!(binned.bin_edges.len(), 2);
        assert_eq!(binned.bin_edges[1].evaluate().unwrap(), vec![-1.0, 0.0, 10.0]);
        assert_eq!(binned.bin_edges[0].evaluate().unwrap().len(), 11);
        let ops = binned
            .transformation
            .as_ref()
            .unwrap()
            .operations("Alpha")
            .unwrap();
        assert_eq!(ops, vec![("TranslateZ", -50.0), ("RotateY", 90.0)]);
    }

    #[test]
    fn spectral_threshold_defaults_to_1000() {
        let config = EdepConfig::parse(FULL).unwrap();
        let Some(DetectorConfig::SpectralDeposition(spectral)) = config.detector("Spectrum") else {
            panic!("Spectrum should be spectral");
        };
        assert_eq!(spectral.flush_threshold, 1000);
        assert_eq!(spectral.bin_edges.evaluate().unwrap(), vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn flag_accepts_column_transformation() {
        let config = EdepConfig::parse(FULL).unwrap();
        let Some(DetectorConfig::Flag(flag)) = config.detector("Trigger") else {
            panic!("Trigger should be a flag");
        };
        assert_eq!(flag.limit_count, 3);
        assert_relative_eq!(flag.threshold, 10.0);
        let ops = flag.transformation.as_ref().unwrap().operations("Trigger").unwrap();
        assert_eq!(ops, vec![("TranslateX", 1.0), ("RotateZ", 90.0)]);
        assert!(flag.volume.contains([0.0, 0.0, 10.0]));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let t = TransformationConfig::Columns(vec!["TranslateX".to_owned()], vec![1.0, 2.0]);
        assert!(matches!(
            t.operations("D"),
            Err(ConfigError::TransformColumns { operations: 1, values: 2, .. })
        ));
    }

    #[test]
    fn unknown_detector_type_is_rejected() {
        let yaml = "
detectors:
  X:
    type: MagicSD
    file: x.json
    volumes: [World]
";
        assert!(matches!(EdepConfig::parse(yaml), Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let yaml = "
detectors:
  X:
    type: TransmissionSD
    file: x.json
    volumes: [World]
";
        assert!(matches!(EdepConfig::parse(yaml), Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn duplicate_detector_is_rejected() {
        let yaml = "
detectors:
  X: {type: SimpleDepositionSD, file: a.json, volumes: [A]}
  X: {type: SimpleDepositionSD, file: b.json, volumes: [B]}
";
        assert!(EdepConfig::parse(yaml).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = EdepConfig::from_file(Path::new("/nonexistent/edep-config.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
