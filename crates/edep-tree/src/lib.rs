//! Per-event particle ancestry tree and ancestry filtering.
//!
//! The transport engine frees its per-track bookkeeping as soon as a track
//! and its descendants finish processing. To answer "where did this particle
//! come from?" at the moment a deposition is recorded, the core keeps its
//! own minimal tree, built eagerly as tracks are first observed and thrown
//! away when the next event starts.
//!
//! # Modules
//!
//! - [`error`] -- Error types for tree lookups and insertions.
//! - [`tree`] -- [`AncestryTree`], [`TrackNode`] and the derived
//!   [`AncestryPath`].
//! - [`filter`] -- [`FilterSpec`] and wildcard matching against an
//!   ancestry path.
//!
//! # Usage
//!
//! ```
//! use edep_tree::{AncestryTree, FilterMode, FilterSpec, NewTrack};
//! use edep_types::TrackId;
//!
//! let mut tree = AncestryTree::new();
//! tree.insert(NewTrack {
//!     track_id: TrackId(1),
//!     parent_id: TrackId::NONE,
//!     particle: "e-",
//!     process: "primary",
//!     volume: "World",
//!     energy: 10.0,
//! })
//! .ok();
//! tree.insert(NewTrack {
//!     track_id: TrackId(2),
//!     parent_id: TrackId(1),
//!     particle: "gamma",
//!     process: "eBrem",
//!     volume: "World.Converter",
//!     energy: 2.0,
//! })
//! .ok();
//!
//! let path = tree.path_to(TrackId(2)).ok();
//! let spec = FilterSpec::new(FilterMode::Include, "eBrem", "World.*", -1);
//! assert_eq!(path.map(|p| spec.admits(&p)), Some(true));
//! ```

pub mod error;
pub mod filter;
pub mod tree;

// Re-export primary types at crate root.
pub use error::TreeError;
pub use filter::{FilterMode, FilterSpec, Wildcard, matches, wildcard_match};
pub use tree::{AncestryPath, AncestryTree, NewTrack, TrackNode};
