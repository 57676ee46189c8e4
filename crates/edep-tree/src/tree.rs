//! The per-event ancestry tree.
//!
//! [`AncestryTree`] records, for every track observed in the current event,
//! its parent, species, creating process, creation volume and creation
//! kinetic energy. Paths are derived on demand by walking parent links; the
//! tree itself is never materialized as a nested structure.
//!
//! # Lifecycle
//!
//! - The tree holds exactly one event's tracks.
//! - Inserting the primary track (id 1) into a tree that does not already
//!   hold it discards everything and starts a new event.
//! - A track is recorded once, at first observation. Later inserts of the
//!   same id are no-ops, so the driver may insert on every step.
//! - A secondary must name a parent that is already present. This keeps the
//!   structure acyclic, so path walks always terminate.

use std::collections::BTreeMap;

use edep_types::TrackId;
use serde::Serialize;
use tracing::trace;

use crate::error::TreeError;

/// One recorded track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackNode {
    /// The track's id within the event.
    pub track_id: TrackId,
    /// The parent track, or `None` for a root.
    pub parent: Option<TrackId>,
    /// Particle species name.
    pub particle: String,
    /// Creating process name (`"primary"` for primaries).
    pub process: String,
    /// Volume the track was in when first observed.
    pub volume: String,
    /// Kinetic energy when first observed.
    pub energy: f64,
}

/// Borrowed description of a track to insert.
#[derive(Debug, Clone, Copy)]
pub struct NewTrack<'a> {
    /// The track's id within the event.
    pub track_id: TrackId,
    /// The parent id, [`TrackId::NONE`] for a root.
    pub parent_id: TrackId,
    /// Particle species name.
    pub particle: &'a str,
    /// Creating process name.
    pub process: &'a str,
    /// Volume at creation.
    pub volume: &'a str,
    /// Kinetic energy at creation.
    pub energy: f64,
}

/// Forest of the tracks seen so far in the current event.
#[derive(Debug, Default, Clone)]
pub struct AncestryTree {
    /// All nodes, keyed by track id.
    nodes: BTreeMap<TrackId, TrackNode>,
}

impl AncestryTree {
    /// Create an empty tree.
    pub const fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    /// Discard every node; the next insert starts a fresh event.
    pub fn begin_event(&mut self) {
        trace!(discarded = self.nodes.len(), "ancestry tree reset");
        self.nodes.clear();
    }

    /// Record a track at first observation.
    ///
    /// The primary track always starts a new event: the tree is discarded
    /// before it is inserted. Any other track is added only if absent.
    ///
    /// Returns `Ok(true)` if a node was added and `Ok(false)` if the track
    /// was already present.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ParentNotFound`] if a non-root track names a
    /// parent that is not in the tree.
    pub fn insert(&mut self, track: NewTrack<'_>) -> Result<bool, TreeError> {
        if track.track_id.is_primary() {
            self.begin_event();
        } else if self.nodes.contains_key(&track.track_id) {
            return Ok(false);
        }

        let parent = if track.track_id.is_primary() || track.parent_id.is_none() {
            None
        } else if self.nodes.contains_key(&track.parent_id) {
            Some(track.parent_id)
        } else {
            return Err(TreeError::ParentNotFound {
                track: track.track_id,
                parent: track.parent_id,
            });
        };

        self.nodes.insert(
            track.track_id,
            TrackNode {
                track_id: track.track_id,
                parent,
                particle: track.particle.to_owned(),
                process: track.process.to_owned(),
                volume: track.volume.to_owned(),
                energy: track.energy,
            },
        );
        Ok(true)
    }

    /// Root-first path from the track's root down to the track itself.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::TrackNotFound`] if the track was never inserted.
    pub fn path_to(&self, track_id: TrackId) -> Result<AncestryPath<'_>, TreeError> {
        let mut nodes = Vec::new();
        let mut cursor = Some(track_id);

        while let Some(id) = cursor {
            let node = self.nodes.get(&id).ok_or(TreeError::TrackNotFound(id))?;
            nodes.push(node);
            cursor = node.parent;
        }

        nodes.reverse();
        Ok(AncestryPath { nodes })
    }

    /// Look up a single node.
    pub fn get(&self, track_id: TrackId) -> Option<&TrackNode> {
        self.nodes.get(&track_id)
    }

    /// Whether the track has been recorded in this event.
    pub fn contains(&self, track_id: TrackId) -> bool {
        self.nodes.contains_key(&track_id)
    }

    /// Number of tracks recorded in this event.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no tracks have been recorded in this event.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Root-first sequence of nodes ending at a queried track.
///
/// Index 0 is the root. Negative levels count from the leaf, so level -1 is
/// the queried track and level -2 its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct AncestryPath<'a> {
    nodes: Vec<&'a TrackNode>,
}

impl<'a> AncestryPath<'a> {
    /// Number of nodes on the path.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the path is empty. Paths produced by the tree never are.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at an ancestry level, or `None` when the level is outside
    /// `[-len, len - 1]`.
    pub fn get(&self, level: i64) -> Option<&'a TrackNode> {
        let len = i64::try_from(self.nodes.len()).ok()?;
        let index = if level < 0 {
            len.checked_add(level)?
        } else {
            level
        };
        let index = usize::try_from(index).ok()?;
        self.nodes.get(index).copied()
    }

    /// The root of the path.
    pub fn root(&self) -> Option<&'a TrackNode> {
        self.nodes.first().copied()
    }

    /// The queried track.
    pub fn leaf(&self) -> Option<&'a TrackNode> {
        self.nodes.last().copied()
    }

    /// Iterate root-first.
    pub fn iter(&self) -> impl Iterator<Item = &'a TrackNode> + '_ {
        self.nodes.iter().copied()
    }

    /// Track ids on the path, root-first.
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.nodes.iter().map(|n| n.track_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u32, parent: u32, process: &'static str) -> NewTrack<'static> {
        NewTrack {
            track_id: TrackId(id),
            parent_id: TrackId(parent),
            particle: "e-",
            process,
            volume: "World",
            energy: 1.0,
        }
    }

    fn sample_tree() -> AncestryTree {
        let mut tree = AncestryTree::new();
        for (id, parent, process) in [
            (1, 0, "primary"),
            (2, 1, "eBrem"),
            (3, 1, "eIoni"),
            (4, 2, "compt"),
            (5, 4, "phot"),
        ] {
            let _ = tree.insert(track(id, parent, process));
        }
        tree
    }

    #[test]
    fn new_tree_is_empty() {
        let tree = AncestryTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn path_is_root_first() {
        let tree = sample_tree();
        let path = tree.path_to(TrackId(5));
        assert_eq!(
            path.map(|p| p.track_ids()),
            Ok(vec![TrackId(1), TrackId(2), TrackId(4), TrackId(5)])
        );
    }

    #[test]
    fn root_has_no_parent() {
        let tree = sample_tree();
        let root = tree.path_to(TrackId(3)).ok().and_then(|p| p.root().cloned());
        assert_eq!(root.map(|r| r.parent), Some(None));
    }

    #[test]
    fn reinsert_is_noop() {
        let mut tree = sample_tree();
        let mut revisit = track(4, 3, "changed");
        revisit.energy = 99.0;
        assert_eq!(tree.insert(revisit), Ok(false));
        let node = tree.get(TrackId(4));
        assert_eq!(node.map(|n| n.parent), Some(Some(TrackId(2))));
        assert_eq!(node.map(|n| n.process.as_str()), Some("compt"));
    }

    #[test]
    fn primary_insert_replaces_previous_event() {
        let mut tree = sample_tree();
        assert_eq!(tree.insert(track(1, 0, "primary")), Ok(true));
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains(TrackId(2)));

        assert_eq!(tree.insert(track(2, 1, "compt")), Ok(true));
        assert_eq!(tree.get(TrackId(2)).map(|n| n.process.as_str()), Some("compt"));
        assert_eq!(
            tree.path_to(TrackId(4)),
            Err(TreeError::TrackNotFound(TrackId(4)))
        );
    }

    #[test]
    fn new_primary_discards_previous_event() {
        let mut tree = sample_tree();
        tree.begin_event();
        assert!(tree.is_empty());
        assert_eq!(tree.insert(track(1, 0, "primary")), Ok(true));
        assert_eq!(tree.len(), 1);
        assert_eq!(
            tree.path_to(TrackId(4)),
            Err(TreeError::TrackNotFound(TrackId(4)))
        );
    }

    #[test]
    fn primary_insert_clears_stray_roots() {
        let mut tree = AncestryTree::new();
        let _ = tree.insert(track(7, 0, "primary"));
        assert_eq!(tree.insert(track(1, 0, "primary")), Ok(true));
        assert!(!tree.contains(TrackId(7)));
    }

    #[test]
    fn orphan_is_rejected() {
        let mut tree = sample_tree();
        assert_eq!(
            tree.insert(track(9, 8, "eIoni")),
            Err(TreeError::ParentNotFound {
                track: TrackId(9),
                parent: TrackId(8),
            })
        );
        assert!(!tree.contains(TrackId(9)));
    }

    #[test]
    fn unknown_track_is_lookup_error() {
        let tree = sample_tree();
        assert_eq!(
            tree.path_to(TrackId(42)),
            Err(TreeError::TrackNotFound(TrackId(42)))
        );
    }

    #[test]
    fn negative_levels_count_from_leaf() {
        let tree = sample_tree();
        let Ok(path) = tree.path_to(TrackId(5)) else {
            return;
        };
        assert_eq!(path.get(-1).map(|n| n.track_id), Some(TrackId(5)));
        assert_eq!(path.get(-2).map(|n| n.track_id), Some(TrackId(4)));
        assert_eq!(path.get(-4).map(|n| n.track_id), Some(TrackId(1)));
        assert_eq!(path.get(0).map(|n| n.track_id), Some(TrackId(1)));
        assert_eq!(path.get(3).map(|n| n.track_id), Some(TrackId(5)));
        assert!(path.get(4).is_none());
        assert!(path.get(-5).is_none());
    }
}
