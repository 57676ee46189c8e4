//! The step record: one observation of a particle over a simulated step.
//!
//! The transport engine produces exactly one [`StepRecord`] per step and
//! hands it to the core by value. The record is fully populated, so sinks
//! never need to reach back into engine state to learn about the current
//! track or step.

use serde::{Deserialize, Serialize};

use crate::ids::{EventId, TrackId};

/// A 3-vector in the internal unit system.
pub type Vec3 = [f64; 3];

/// Name of the process the engine reports for a geometry-boundary step.
pub const TRANSPORTATION: &str = "Transportation";

/// Process name recorded for tracks that were not created by a process.
pub const PRIMARY_PROCESS: &str = "primary";

/// One step of one track, as emitted by the transport engine.
///
/// Positions are in mm, energies in MeV and times in ns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Event the step belongs to.
    pub event_id: EventId,
    /// Track taking the step.
    pub track_id: TrackId,
    /// Parent of the track, or [`TrackId::NONE`] for a primary.
    #[serde(default)]
    pub parent_id: TrackId,
    /// Particle species name (e.g. `e-`, `gamma`).
    pub particle_name: String,
    /// Process that created the track; absent for primaries.
    #[serde(default)]
    pub creation_process: Option<String>,
    /// Name of the volume the track is currently in.
    pub current_volume: String,
    /// Position at the start of the step.
    pub pre_step_position: Vec3,
    /// Position at the end of the step.
    pub post_step_position: Vec3,
    /// Unit momentum direction at the end of the step.
    pub momentum_direction: Vec3,
    /// Kinetic energy at the start of the step.
    pub pre_step_kinetic_energy: f64,
    /// Kinetic energy at the end of the step.
    pub post_step_kinetic_energy: f64,
    /// Total energy deposited along the step.
    pub energy_deposit: f64,
    /// Global time at the end of the step.
    pub global_time: f64,
    /// Process that limited the step; absent if the engine defined none.
    #[serde(default)]
    pub post_step_process_name: Option<String>,
}

impl StepRecord {
    /// Parse one JSON-encoded step record.
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// The creating process name, or `"primary"` when there is none.
    pub fn creation_process_or_primary(&self) -> &str {
        self.creation_process.as_deref().unwrap_or(PRIMARY_PROCESS)
    }

    /// The parent track, if this track has one.
    pub const fn parent(&self) -> Option<TrackId> {
        if self.parent_id.is_none() {
            None
        } else {
            Some(self.parent_id)
        }
    }

    /// Whether the step ended on a geometry boundary.
    pub fn is_transport_boundary(&self) -> bool {
        self.post_step_process_name.as_deref() == Some(TRANSPORTATION)
    }
}
