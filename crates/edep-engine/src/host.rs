//! Host callbacks for offline replays.

use edep_core::HostEngine;
use edep_types::EventId;
use tracing::info;

/// Logs retention requests and remembers them.
///
/// A replayed stream has no engine to keep events in, so the requests are
/// reported in the run log instead.
#[derive(Debug, Default)]
pub struct LoggingHost {
    kept: Vec<EventId>,
    finished: bool,
}

impl LoggingHost {
    /// Events the detectors asked to keep, in request order.
    pub fn kept(&self) -> &[EventId] {
        &self.kept
    }

    /// Whether retention signalling has been closed.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

impl HostEngine for LoggingHost {
    fn keep_current_event(&mut self, event_id: EventId) {
        info!(event_id = %event_id, "Event retention requested");
        self.kept.push(event_id);
    }

    fn retention_finished(&mut self) {
        info!(kept = self.kept.len(), "Event retention finished");
        self.finished = true;
    }
}
