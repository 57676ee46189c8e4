//! Threshold-triggered event retention.

use edep_types::units::{MEV, MILLIMETER};
use edep_types::{EventId, StepRecord};
use tracing::info;

use super::{Phase, SinkError};
use crate::config::{ConfigError, FlagConfig};
use crate::host::HostEngine;
use crate::transform::Transform;
use crate::volume::BoxVolume;

/// Flags events whose deposit inside a box reaches a threshold and asks the
/// host to keep the first `limit_count` of them.
///
/// The per-event tally only grows while it is below the threshold, so an
/// event is flagged at most once. Nothing is exported.
#[derive(Debug, Clone)]
pub struct ThresholdFlag {
    name: String,
    transform: Transform,
    region: BoxVolume,
    threshold: f64,
    limit_count: u64,
    num_flagged: u64,
    current_event: Option<EventId>,
    tally: f64,
    retained_this_event: bool,
    retention_finished: bool,
    phase: Phase,
}

impl ThresholdFlag {
    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a bad transformation.
    pub fn new(name: &str, config: &FlagConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.to_owned(),
            transform: super::build_transform(name, config.transformation.as_ref())?,
            region: config.volume.scaled(MILLIMETER),
            threshold: config.threshold * MEV,
            limit_count: config.limit_count,
            num_flagged: 0,
            current_event: None,
            tally: 0.0,
            retained_this_event: false,
            retention_finished: false,
            phase: Phase::Collecting,
        })
    }

    /// Detector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Events flagged so far, including those past the limit.
    pub const fn num_flagged(&self) -> u64 {
        self.num_flagged
    }

    /// Deposit tallied in the current event.
    pub const fn tally(&self) -> f64 {
        self.tally
    }

    pub(super) fn process_hit(
        &mut self,
        step: &StepRecord,
        host: &mut dyn HostEngine,
    ) -> Result<(), SinkError> {
        self.phase.ensure_collecting(&self.name)?;
        if self.current_event != Some(step.event_id) {
            self.current_event = Some(step.event_id);
            self.tally = 0.0;
            self.retained_this_event = false;
        }
        if self.tally >= self.threshold {
            return Ok(());
        }
        if !self
            .region
            .contains(self.transform.apply_point(step.pre_step_position))
        {
            return Ok(());
        }

        self.tally += step.energy_deposit;
        if self.tally >= self.threshold {
            self.num_flagged = self.num_flagged.saturating_add(1);
            info!(
                detector = %self.name,
                event_id = %step.event_id,
                num_flagged = self.num_flagged,
                "Event flagged"
            );
            if self.num_flagged <= self.limit_count {
                host.keep_current_event(step.event_id);
                self.retained_this_event = true;
            }
        }
        Ok(())
    }

    pub(super) fn end_event(&mut self, host: &mut dyn HostEngine) {
        if self.retained_this_event
            && !self.retention_finished
            && self.num_flagged >= self.limit_count
        {
            info!(detector = %self.name, limit_count = self.limit_count, "Retention limit reached");
            host.retention_finished();
            self.retention_finished = true;
        }
        self.retained_this_event = false;
    }

    pub(super) fn finalize(&mut self) -> Result<(), SinkError> {
        self.phase.finish(&self.name)
    }
}
