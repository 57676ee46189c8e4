//! The seam through which the core signals back to the transport engine.

use edep_types::EventId;

/// Callbacks into the transport engine.
///
/// These are the only ways a sink can influence the engine. The engine
/// binary implements this by logging; an embedding host would forward the
/// requests to its own event-retention machinery.
pub trait HostEngine {
    /// Ask the engine to retain the event currently being processed.
    fn keep_current_event(&mut self, event_id: EventId);

    /// Report that no further retention requests will be made.
    fn retention_finished(&mut self);
}

/// A host that ignores every signal, for tests and offline replays.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHost;

impl HostEngine for NoOpHost {
    fn keep_current_event(&mut self, _event_id: EventId) {}

    fn retention_finished(&mut self) {}
}
