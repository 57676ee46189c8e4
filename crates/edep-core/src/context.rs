//! Per-event state lent to every sink call.

use edep_tree::{AncestryPath, AncestryTree, NewTrack, TreeError};
use edep_types::{EventId, StepRecord, TrackId};
use tracing::debug;

/// State that lives for exactly one event.
///
/// Owned by the run driver and replaced at every event boundary. Sinks only
/// ever see it by shared reference.
#[derive(Debug, Default, Clone)]
pub struct EventContext {
    event_id: Option<EventId>,
    tree: AncestryTree,
    steps: u64,
}

impl EventContext {
    /// A context before the first event.
    pub const fn new() -> Self {
        Self {
            event_id: None,
            tree: AncestryTree::new(),
            steps: 0,
        }
    }

    /// Start a new event, discarding the previous event's tree.
    pub fn begin(&mut self, event_id: EventId) {
        debug!(
            event_id = %event_id,
            previous_tracks = self.tree.len(),
            previous_steps = self.steps,
            "event begin"
        );
        self.event_id = Some(event_id);
        self.tree.begin_event();
        self.steps = 0;
    }

    /// Record the step's track if this is its first observation.
    ///
    /// The track's creation volume and energy are taken from the step, so
    /// this must be called for the first step of every track.
    ///
    /// Returns whether a new node was added.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ParentNotFound`] for a secondary whose parent
    /// was never observed.
    pub fn observe(&mut self, step: &StepRecord) -> Result<bool, TreeError> {
        self.steps = self.steps.saturating_add(1);
        // Later steps of a known track, the primary included, leave the
        // tree alone.
        if self.tree.contains(step.track_id) {
            return Ok(false);
        }
        self.tree.insert(NewTrack {
            track_id: step.track_id,
            parent_id: step.parent_id,
            particle: &step.particle_name,
            process: step.creation_process_or_primary(),
            volume: &step.current_volume,
            energy: step.pre_step_kinetic_energy,
        })
    }

    /// The current event, if one has begun.
    pub const fn event_id(&self) -> Option<EventId> {
        self.event_id
    }

    /// The ancestry tree of the current event.
    pub const fn tree(&self) -> &AncestryTree {
        &self.tree
    }

    /// Root-first ancestry of a track in the current event.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::TrackNotFound`] for an unobserved track.
    pub fn path_to(&self, track_id: TrackId) -> Result<AncestryPath<'_>, TreeError> {
        self.tree.path_to(track_id)
    }

    /// Steps observed in the current event.
    pub const fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn step(event: u64, track: u32, parent: u32, process: Option<&str>) -> StepRecord {
        StepRecord {
            event_id: EventId(event),
            track_id: TrackId(track),
            parent_id: TrackId(parent),
            particle_name: "e-".to_owned(),
            creation_process: process.map(str::to_owned),
            current_volume: "World.Target".to_owned(),
            pre_step_position: [0.0; 3],
            post_step_position: [0.0; 3],
            momentum_direction: [0.0, 0.0, 1.0],
            pre_step_kinetic_energy: 2.0,
            post_step_kinetic_energy: 1.0,
            energy_deposit: 1.0,
            global_time: 0.0,
            post_step_process_name: None,
        }
    }

    #[test]
    fn first_step_creates_node_from_step_fields() {
        let mut ctx = EventContext::new();
        ctx.begin(EventId(7));
        assert!(ctx.observe(&step(7, 1, 0, None)).unwrap());
        assert!(ctx.observe(&step(7, 2, 1, Some("compt"))).unwrap());
        assert!(!ctx.observe(&step(7, 2, 1, Some("compt"))).unwrap());

        let node = ctx.tree().get(TrackId(2)).unwrap();
        assert_eq!(node.process, "compt");
        assert_eq!(node.volume, "World.Target");
        assert_eq!(ctx.tree().get(TrackId(1)).unwrap().process, "primary");
        assert_eq!(ctx.path_to(TrackId(2)).unwrap().track_ids(), vec![TrackId(1), TrackId(2)]);
        assert_eq!(ctx.steps(), 3);
        assert_eq!(ctx.event_id(), Some(EventId(7)));
    }

    #[test]
    fn later_primary_steps_keep_secondaries() {
        let mut ctx = EventContext::new();
        ctx.begin(EventId(3));
        ctx.observe(&step(3, 1, 0, None)).unwrap();
        ctx.observe(&step(3, 2, 1, Some("eBrem"))).unwrap();
        assert!(!ctx.observe(&step(3, 1, 0, None)).unwrap());
        assert_eq!(ctx.tree().len(), 2);
        assert_eq!(ctx.path_to(TrackId(2)).unwrap().track_ids(), vec![TrackId(1), TrackId(2)]);
    }

    #[test]
    fn begin_discards_previous_tree() {
        let mut ctx = EventContext::new();
        ctx.begin(EventId(0));
        ctx.observe(&step(0, 1, 0, None)).unwrap();
        ctx.begin(EventId(1));
        assert!(ctx.tree().is_empty());
        assert_eq!(ctx.steps(), 0);
    }

    #[test]
    fn orphan_is_rejected() {
        let mut ctx = EventContext::new();
        ctx.begin(EventId(0));
        assert_eq!(
            ctx.observe(&step(0, 5, 4, Some("eIoni"))),
            Err(TreeError::ParentNotFound {
                track: TrackId(5),
                parent: TrackId(4)
            })
        );
    }
}
