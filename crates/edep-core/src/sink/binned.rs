//! Spatially binned energy deposition.

use std::path::{Path, PathBuf};

use edep_histogram::{BinSpec, HistogramAccumulator};
use edep_tree::FilterSpec;
use edep_types::StepRecord;
use edep_types::units::{MEV, MILLIMETER};
use tracing::debug;

use super::{Phase, SinkError, admitted};
use crate::config::{BinnedConfig, ConfigError, Dtype};
use crate::context::EventContext;
use crate::export::{ArrayData, Dataset, Group, SinkExport};
use crate::transform::Transform;

/// Dataset names for the edges of each axis.
const EDGE_NAMES: [&str; 3] = ["xbin", "ybin", "zbin"];

/// Bins the (optionally transformed) pre-step position of each hit,
/// weighted by its energy deposit.
///
/// A histogram with fewer than three axes bins the leading coordinates:
/// one axis uses x, two use x and y.
#[derive(Debug, Clone)]
pub struct BinnedDeposition {
    name: String,
    file: PathBuf,
    group: Option<String>,
    dtype: Dtype,
    transform: Transform,
    filter: Option<FilterSpec>,
    hist: HistogramAccumulator,
    phase: Phase,
}

impl BinnedDeposition {
    /// Build from configuration, evaluating the bin edges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a bad transformation, a bad edge
    /// expression or an invalid binning.
    pub fn new(name: &str, config: &BinnedConfig, dtype: Dtype) -> Result<Self, ConfigError> {
        let transform = super::build_transform(name, config.transformation.as_ref())?;
        let edges = config
            .bin_edges
            .iter()
            .map(|source| {
                source.evaluate().map_err(|source| ConfigError::Expr {
                    detector: name.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let spec = BinSpec::spatial(edges).map_err(|source| ConfigError::Bins {
            detector: name.to_owned(),
            source,
        })?;

        Ok(Self {
            name: name.to_owned(),
            file: config.file.clone(),
            group: config.group.clone(),
            dtype,
            transform,
            filter: config.tree_filter.clone(),
            hist: HistogramAccumulator::new(spec, config.flush_threshold),
            phase: Phase::Collecting,
        })
    }

    /// Detector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// The accumulator, for inspection.
    pub const fn histogram(&self) -> &HistogramAccumulator {
        &self.hist
    }

    pub(super) fn process_hit(
        &mut self,
        step: &StepRecord,
        ctx: &EventContext,
    ) -> Result<(), SinkError> {
        self.phase.ensure_collecting(&self.name)?;
        if !admitted(&self.name, self.filter.as_ref(), step, ctx)? {
            return Ok(());
        }

        let position = self.transform.apply_point(step.pre_step_position);
        let ndim = self.hist.spec().ndim();
        let coords = position.get(..ndim).unwrap_or(&position);
        self.hist
            .add_sample(coords, step.energy_deposit)
            .map_err(|source| SinkError::Histogram {
                sink: self.name.clone(),
                source,
            })?;
        self.hist.maybe_flush();
        Ok(())
    }

    pub(super) fn finalize(&mut self, num_events: u64) -> Result<SinkExport, SinkError> {
        self.phase.finish(&self.name)?;
        let (hist, spec) = self.hist.finalize();

        let edep: Vec<f64> = hist.iter().map(|e| e / MEV).collect();
        let mut contents = Group::new().with_dataset(
            "edep",
            Dataset::new(hist.shape().to_vec(), ArrayData::floats(edep, self.dtype))
                .with_unit("MeV")
                .with_attr("num_events", num_events),
        );
        for (axis, name) in spec.axes().iter().zip(EDGE_NAMES) {
            let edges = axis.edges().iter().map(|e| e / MILLIMETER).collect();
            contents = contents.with_dataset(
                name,
                Dataset::vector(ArrayData::F64(edges)).with_unit("mm"),
            );
        }

        debug!(
            detector = %self.name,
            dropped = self.hist.dropped(),
            total_mev = self.hist.total() / MEV,
            "binned deposition finalized"
        );
        Ok(SinkExport {
            file: self.file.clone(),
            group: self.group.clone(),
            contents,
        })
    }
}
