//! The run driver: event boundaries, ancestry bookkeeping and dispatch.
//!
//! Steps arrive in transport order. The driver watches the event id to
//! detect boundaries, records each step's track in the event's ancestry
//! tree before any sink sees it, then routes the step by volume. At the end
//! of the run every sink is finalized and the exports are merged per file.

use edep_tree::TreeError;
use edep_types::{EventId, StepRecord};
use tracing::{debug, info};

use crate::config::{ConfigError, EdepConfig};
use crate::context::EventContext;
use crate::export::{ExportError, ExportSet};
use crate::host::HostEngine;
use crate::progress::ProgressReporter;
use crate::sink::{DetectorSet, SinkError};

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A step could not be placed in its event's ancestry tree.
    #[error("event {event_id}: {source}")]
    Tree {
        /// The event being processed.
        event_id: EventId,
        /// The underlying tree error.
        source: TreeError,
    },

    /// A sink rejected a step or failed to finalize.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The sinks' exports could not be merged.
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Counters reported when a run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Distinct events observed.
    pub events: u64,
    /// Steps processed.
    pub steps: u64,
    /// Steps delivered to at least one sink.
    pub hits: u64,
    /// Event count written into the exports.
    pub num_events: u64,
    /// Output files produced.
    pub files: usize,
}

/// Feeds steps to the configured detectors.
#[derive(Debug)]
pub struct Driver {
    detectors: DetectorSet,
    ctx: EventContext,
    progress: ProgressReporter,
    num_events_override: Option<u64>,
    events: u64,
    steps: u64,
    hits: u64,
}

impl Driver {
    /// Build every detector and start the run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a detector cannot be built.
    pub fn new(config: &EdepConfig) -> Result<Self, ConfigError> {
        let detectors = DetectorSet::from_config(config)?;
        Ok(Self::with_detectors(
            detectors,
            config.run.num_events,
            config.run.status_update_period_s,
        ))
    }

    /// Start a run over an already built detector set.
    pub fn with_detectors(
        detectors: DetectorSet,
        num_events: Option<u64>,
        status_update_period_s: f64,
    ) -> Self {
        Self {
            detectors,
            ctx: EventContext::new(),
            progress: ProgressReporter::start(num_events, status_update_period_s),
            num_events_override: num_events,
            events: 0,
            steps: 0,
            hits: 0,
        }
    }

    /// Process one step.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Tree`] for a secondary whose parent was never
    /// seen, or [`RunError::Sink`] if a sink rejects the step.
    pub fn process_step(
        &mut self,
        step: &StepRecord,
        host: &mut dyn HostEngine,
    ) -> Result<(), RunError> {
        if self.ctx.event_id() != Some(step.event_id) {
            self.end_event(host);
            self.ctx.begin(step.event_id);
            self.events = self.events.saturating_add(1);
        }

        self.ctx.observe(step).map_err(|source| RunError::Tree {
            event_id: step.event_id,
            source,
        })?;
        self.steps = self.steps.saturating_add(1);

        if self.detectors.route(step, &self.ctx, host)? > 0 {
            self.hits = self.hits.saturating_add(1);
        }
        Ok(())
    }

    /// Process every step of an iterator.
    ///
    /// # Errors
    ///
    /// Stops at the first error from [`Self::process_step`].
    pub fn process_all<'a, I>(&mut self, steps: I, host: &mut dyn HostEngine) -> Result<(), RunError>
    where
        I: IntoIterator<Item = &'a StepRecord>,
    {
        for step in steps {
            self.process_step(step, host)?;
        }
        Ok(())
    }

    /// Close the last event, finalize every sink and merge the exports.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Sink`] if a sink fails to finalize, or
    /// [`RunError::Export`] if two sinks write the same dataset.
    pub fn finish(
        mut self,
        host: &mut dyn HostEngine,
    ) -> Result<(ExportSet, RunSummary), RunError> {
        self.end_event(host);
        let num_events = self.num_events_override.unwrap_or(self.events);

        let mut exports = ExportSet::new();
        for export in self.detectors.finalize(num_events)? {
            exports.add(export)?;
        }

        let summary = RunSummary {
            events: self.events,
            steps: self.steps,
            hits: self.hits,
            num_events,
            files: exports.len(),
        };
        info!(
            events = summary.events,
            steps = summary.steps,
            hits = summary.hits,
            num_events = summary.num_events,
            files = summary.files,
            "Run finished"
        );
        Ok((exports, summary))
    }

    /// The detectors, for inspection.
    pub const fn detectors(&self) -> &DetectorSet {
        &self.detectors
    }

    /// The current event's context.
    pub const fn context(&self) -> &EventContext {
        &self.ctx
    }

    /// Distinct events observed so far.
    pub const fn events(&self) -> u64 {
        self.events
    }

    fn end_event(&mut self, host: &mut dyn HostEngine) {
        let Some(event_id) = self.ctx.event_id() else {
            return;
        };
        debug!(event_id = %event_id, steps = self.ctx.steps(), "event end");
        self.detectors.end_event(host);
        self.progress.event_finished();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use edep_types::TrackId;

    use super::*;
    use crate::host::NoOpHost;

    const CONFIG: &str = r"
run:
  status_update_period_s: 0
detectors:
  Raw:
    type: SimpleDepositionSD
    file: out/raw.json
    volumes: [World.Target]
";

    fn step(event: u64, track: u32, parent: u32, volume: &str) -> StepRecord {
        StepRecord {
            event_id: EventId(event),
            track_id: TrackId(track),
            parent_id: TrackId(parent),
            particle_name: "e-".to_owned(),
            creation_process: (parent != 0).then(|| "eIoni".to_owned()),
            current_volume: volume.to_owned(),
            pre_step_position: [0.0; 3],
            post_step_position: [0.0; 3],
            momentum_direction: [1.0, 0.0, 0.0],
            pre_step_kinetic_energy: 1.0,
            post_step_kinetic_energy: 0.9,
            energy_deposit: 0.1,
            global_time: 0.0,
            post_step_process_name: None,
        }
    }

    #[test]
    fn counts_events_steps_and_hits() {
        let config = EdepConfig::parse(CONFIG).unwrap();
        let mut driver = Driver::new(&config).unwrap();
        let steps = [
            step(0, 1, 0, "World.Target"),
            step(0, 2, 1, "World"),
            step(1, 1, 0, "World.Target"),
            step(1, 1, 0, "World.Target"),
        ];
        driver.process_all(&steps, &mut NoOpHost).unwrap();
        assert_eq!(driver.events(), 2);
        assert_eq!(driver.context().event_id(), Some(EventId(1)));
        assert_eq!(driver.context().steps(), 2);

        let (exports, summary) = driver.finish(&mut NoOpHost).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                events: 2,
                steps: 4,
                hits: 3,
                num_events: 2,
                files: 1,
            }
        );
        assert_eq!(exports.len(), 1);
    }

    #[test]
    fn configured_event_count_overrides_observed() {
        let mut config = EdepConfig::parse(CONFIG).unwrap();
        config.run.num_events = Some(1000);
        let mut driver = Driver::new(&config).unwrap();
        driver
            .process_step(&step(3, 1, 0, "World.Target"), &mut NoOpHost)
            .unwrap();
        let (_, summary) = driver.finish(&mut NoOpHost).unwrap();
        assert_eq!(summary.num_events, 1000);
        assert_eq!(summary.events, 1);
    }

    #[test]
    fn orphan_step_aborts_run() {
        let config = EdepConfig::parse(CONFIG).unwrap();
        let mut driver = Driver::new(&config).unwrap();
        let err = driver
            .process_step(&step(0, 4, 3, "World.Target"), &mut NoOpHost)
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Tree {
                event_id: EventId(0),
                source: TreeError::ParentNotFound { .. }
            }
        ));
    }

    #[test]
    fn track_ids_restart_per_event() {
        let config = EdepConfig::parse(CONFIG).unwrap();
        let mut driver = Driver::new(&config).unwrap();
        let steps = [
            step(0, 1, 0, "World.Target"),
            step(0, 2, 1, "World.Target"),
            step(1, 1, 0, "World.Target"),
            step(1, 2, 1, "World.Target"),
        ];
        driver.process_all(&steps, &mut NoOpHost).unwrap();
        assert_eq!(driver.context().tree().len(), 2);
    }
}
