//! Boundary-crossing particle records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use edep_types::units::{MEV, MILLIMETER, NANOSECOND};
use edep_types::{StepRecord, Vec3};

use super::{Phase, SinkError};
use crate::config::TransmissionConfig;
use crate::export::{ArrayData, Dataset, Group, SinkExport};

/// Post-step state of one species' boundary crossings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Crossings {
    /// Post-step positions.
    pub position: Vec<Vec3>,
    /// Momentum directions.
    pub direction: Vec<Vec3>,
    /// Post-step kinetic energies.
    pub energy: Vec<f64>,
    /// Global times.
    pub time: Vec<f64>,
}

impl Crossings {
    /// Number of recorded crossings.
    pub fn len(&self) -> usize {
        self.energy.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }
}

/// Records particles of selected species as they leave a step through a
/// geometry boundary.
#[derive(Debug, Clone)]
pub struct Transmission {
    name: String,
    file: PathBuf,
    group: Option<String>,
    results: BTreeMap<String, Crossings>,
    phase: Phase,
}

impl Transmission {
    /// Build from configuration.
    pub fn new(name: &str, config: &TransmissionConfig) -> Self {
        Self {
            name: name.to_owned(),
            file: config.file.clone(),
            group: config.group.clone(),
            results: config
                .particles
                .iter()
                .map(|p| (p.clone(), Crossings::default()))
                .collect(),
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

    /// Crossings recorded so far for one species.
    pub fn crossings(&self, particle: &str) -> Option<&Crossings> {
        self.results.get(particle)
    }

    pub(super) fn process_hit(&mut self, step: &StepRecord) -> Result<(), SinkError> {
        self.phase.ensure_collecting(&self.name)?;
        if !step.is_transport_boundary() {
            return Ok(());
        }
        if let Some(result) = self.results.get_mut(&step.particle_name) {
            result.position.push(step.post_step_position);
            result.direction.push(step.momentum_direction);
            result.energy.push(step.post_step_kinetic_energy);
            result.time.push(step.global_time);
        }
        Ok(())
    }

    pub(super) fn finalize(&mut self, num_events: u64) -> Result<SinkExport, SinkError> {
        self.phase.finish(&self.name)?;

        let mut contents = Group::new().with_dataset("num_events", Dataset::count(num_events));
        for (particle, result) in std::mem::take(&mut self.results) {
            let energy = result.energy.iter().map(|e| e / MEV).collect();
            let time = result.time.iter().map(|t| t / NANOSECOND).collect();
            let group = Group::new()
                .with_dataset(
                    "position",
                    Dataset::vectors(&result.position, MILLIMETER).with_unit("mm"),
                )
                .with_dataset("direction", Dataset::vectors(&result.direction, 1.0))
                .with_dataset(
                    "energy",
                    Dataset::vector(ArrayData::F64(energy)).with_unit("MeV"),
                )
                .with_dataset("time", Dataset::vector(ArrayData::F64(time)).with_unit("ns"));
            contents = contents.with_group(&particle, group);
        }
        Ok(SinkExport {
            file: self.file.clone(),
            group: self.group.clone(),
            contents,
        })
    }
}
