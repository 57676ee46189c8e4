//! Per-volume deposited-energy spectra.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use edep_histogram::{BinSpec, HistogramAccumulator};
use edep_tree::FilterSpec;
use edep_types::StepRecord;
use edep_types::units::MEV;
use tracing::debug;

use super::{Phase, SinkError, admitted};
use crate::config::{ConfigError, Dtype, SpectralConfig};
use crate::context::EventContext;
use crate::export::{ArrayData, Dataset, Group, SinkExport};

/// Counts hits per deposited-energy bin, with one histogram per volume.
///
/// Each hit adds a unit weight to the histogram of the volume it occurred
/// in. Volumes are exported in configuration order; each label is the
/// volume name without its leading (world) component.
#[derive(Debug, Clone)]
pub struct SpectralDeposition {
    name: String,
    file: PathBuf,
    group: Option<String>,
    dtype: Dtype,
    filter: Option<FilterSpec>,
    labels: Vec<String>,
    index: BTreeMap<String, usize>,
    hists: Vec<HistogramAccumulator>,
    edges: Vec<f64>,
    phase: Phase,
}

impl SpectralDeposition {
    /// Build from configuration, evaluating the bin edges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a bad edge expression, an invalid binning,
    /// or a volume name without a `.`-separated parent.
    pub fn new(name: &str, config: &SpectralConfig, dtype: Dtype) -> Result<Self, ConfigError> {
        let edges = config
            .bin_edges
            .evaluate()
            .map_err(|source| ConfigError::Expr {
                detector: name.to_owned(),
                source,
            })?;
        let spec = BinSpec::spectral(edges.clone()).map_err(|source| ConfigError::Bins {
            detector: name.to_owned(),
            source,
        })?;

        let mut labels = Vec::with_capacity(config.volumes.len());
        let mut index = BTreeMap::new();
        let mut hists = Vec::with_capacity(config.volumes.len());
        for volume in &config.volumes {
            let Some((_, label)) = volume.split_once('.') else {
                return Err(ConfigError::VolumeLabel {
                    detector: name.to_owned(),
                    volume: volume.clone(),
                });
            };
            if index.insert(volume.clone(), hists.len()).is_some() {
                return Err(ConfigError::DuplicateVolume {
                    detector: name.to_owned(),
                    volume: volume.clone(),
                });
            }
            labels.push(label.to_owned());
            hists.push(HistogramAccumulator::new(
                spec.clone(),
                Some(config.flush_threshold),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            file: config.file.clone(),
            group: config.group.clone(),
            dtype,
            filter: config.tree_filter.clone(),
            labels,
            index,
            hists,
            edges,
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

    /// The histogram for one volume.
    pub fn histogram(&self, volume: &str) -> Option<&HistogramAccumulator> {
        self.index.get(volume).and_then(|&i| self.hists.get(i))
    }

    /// Add one hit.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::UnknownVolume`] if the hit's volume is not one of
    /// the configured volumes, or [`SinkError::Finalized`] after export.
    pub(super) fn process_hit(
        &mut self,
        step: &StepRecord,
        ctx: &EventContext,
    ) -> Result<(), SinkError> {
        self.phase.ensure_collecting(&self.name)?;
        if !admitted(&self.name, self.filter.as_ref(), step, ctx)? {
            return Ok(());
        }

        let hist = self
            .index
            .get(&step.current_volume)
            .and_then(|&i| self.hists.get_mut(i))
            .ok_or_else(|| SinkError::UnknownVolume {
                sink: self.name.clone(),
                volume: step.current_volume.clone(),
            })?;
        hist.add_scalar(step.energy_deposit, 1.0)
            .map_err(|source| SinkError::Histogram {
                sink: self.name.clone(),
                source,
            })?;
        hist.maybe_flush();
        Ok(())
    }

    pub(super) fn finalize(&mut self, num_events: u64) -> Result<SinkExport, SinkError> {
        self.phase.finish(&self.name)?;

        let bins = self.edges.len().saturating_sub(1);
        let mut hits = Vec::with_capacity(bins.saturating_mul(self.hists.len()));
        let mut dropped: u64 = 0;
        for hist in &mut self.hists {
            let (counts, _) = hist.finalize();
            hits.extend(counts.iter().copied());
            dropped = dropped.saturating_add(hist.dropped());
        }
        debug!(detector = %self.name, dropped, "spectral deposition finalized");

        let photon_bin = self.edges.iter().map(|e| e / MEV).collect();
        let contents = Group::new()
            .with_dataset(
                "hits",
                Dataset::new(
                    vec![self.hists.len(), bins],
                    ArrayData::floats(hits, self.dtype),
                )
                .with_unit("count")
                .with_attr("num_events", num_events),
            )
            .with_dataset(
                "detector_bin",
                Dataset::vector(ArrayData::Text(self.labels.clone())).with_unit("name"),
            )
            .with_dataset(
                "photon_bin",
                Dataset::vector(ArrayData::F64(photon_bin)).with_unit("MeV"),
            );
        Ok(SinkExport {
            file: self.file.clone(),
            group: self.group.clone(),
            contents,
        })
    }
}
