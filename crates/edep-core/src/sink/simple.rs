//! Verbatim deposition recording.

use std::path::{Path, PathBuf};

use edep_types::units::{KEV, MILLIMETER};
use edep_types::{StepRecord, Vec3};

use super::{Phase, SinkError};
use crate::config::{Dtype, SimpleConfig};
use crate::export::{ArrayData, Dataset, Group, SinkExport};

/// Records the pre-step position and energy deposit of every hit.
#[derive(Debug, Clone)]
pub struct SimpleDeposition {
    name: String,
    file: PathBuf,
    group: Option<String>,
    dtype: Dtype,
    positions: Vec<Vec3>,
    edep: Vec<f64>,
    phase: Phase,
}

impl SimpleDeposition {
    /// Build from configuration.
    pub fn new(name: &str, config: &SimpleConfig, dtype: Dtype) -> Self {
        Self {
            name: name.to_owned(),
            file: config.file.clone(),
            group: config.group.clone(),
            dtype,
            positions: Vec::new(),
            edep: Vec::new(),
            phase: Phase::Collecting,
        }
    }

    /// Detector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Number of hits recorded so far.
    pub fn len(&self) -> usize {
        self.edep.len()
    }

    /// Whether no hit has been recorded.
    pub fn is_empty(&self) -> bool {
        self.edep.is_empty()
    }

    pub(super) fn process_hit(&mut self, step: &StepRecord) -> Result<(), SinkError> {
        self.phase.ensure_collecting(&self.name)?;
        self.positions.push(step.pre_step_position);
        self.edep.push(step.energy_deposit);
        Ok(())
    }

    pub(super) fn finalize(&mut self, num_events: u64) -> Result<SinkExport, SinkError> {
        self.phase.finish(&self.name)?;
        let positions = std::mem::take(&mut self.positions);
        let edep: Vec<f64> = std::mem::take(&mut self.edep)
            .into_iter()
            .map(|e| e / KEV)
            .collect();

        let contents = Group::new()
            .with_dataset(
                "position",
                Dataset::vectors(&positions, MILLIMETER).with_unit("mm"),
            )
            .with_dataset(
                "edep",
                Dataset::vector(ArrayData::floats(edep, self.dtype))
                    .with_unit("keV")
                    .with_attr("num_events", num_events),
            );
        Ok(SinkExport {
            file: self.file.clone(),
            group: self.group.clone(),
            contents,
        })
    }
}
