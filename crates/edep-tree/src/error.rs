//! Error types for the `edep-tree` crate.
//!
//! Both variants signal that the core and the transport engine disagree
//! about which tracks exist. They are never swallowed.

use edep_types::TrackId;

/// Errors that can occur during ancestry-tree operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A path was requested for a track that was never inserted.
    #[error("track {0} is not in the ancestry tree")]
    TrackNotFound(TrackId),

    /// A secondary track referenced a parent that was never inserted.
    #[error("track {track} references unknown parent {parent}")]
    ParentNotFound {
        /// The track being inserted.
        track: TrackId,
        /// The missing parent.
        parent: TrackId,
    },
}
