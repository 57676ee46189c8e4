//! Property tests for the ancestry tree and filter.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use edep_tree::{AncestryTree, FilterMode, FilterSpec, NewTrack, matches, wildcard_match};
use edep_types::TrackId;
use proptest::prelude::*;

/// Random tree shapes: entry `i` is the parent of track `i + 2`, chosen
/// among the tracks already inserted.
fn parent_choices() -> impl Strategy<Value = Vec<u32>> {
    (1usize..40).prop_flat_map(|n| {
        (0..n)
            .map(|i| 1u32..=u32::try_from(i + 1).unwrap())
            .collect::<Vec<_>>()
    })
}

fn build(parents: &[u32]) -> AncestryTree {
    let mut tree = AncestryTree::new();
    tree.insert(NewTrack {
        track_id: TrackId::PRIMARY,
        parent_id: TrackId::NONE,
        particle: "e-",
        process: "primary",
        volume: "World",
        energy: 10.0,
    })
    .unwrap();
    for (i, &parent) in parents.iter().enumerate() {
        let id = u32::try_from(i).unwrap() + 2;
        tree.insert(NewTrack {
            track_id: TrackId(id),
            parent_id: TrackId(parent),
            particle: "gamma",
            process: "eBrem",
            volume: "World.Target",
            energy: 1.0,
        })
        .unwrap();
    }
    tree
}

proptest! {
    #[test]
    fn paths_are_root_first_and_linked(parents in parent_choices()) {
        let tree = build(&parents);
        for id in 1..=u32::try_from(parents.len()).unwrap() + 1 {
            let path = tree.path_to(TrackId(id)).unwrap();
            let root = path.root().unwrap();
            prop_assert_eq!(root.parent, None);
            prop_assert_eq!(path.leaf().unwrap().track_id, TrackId(id));
            let nodes: Vec<_> = path.iter().collect();
            for pair in nodes.windows(2) {
                prop_assert_eq!(pair[1].parent, Some(pair[0].track_id));
            }
        }
    }

    #[test]
    fn reinsertion_never_changes_shape(parents in parent_choices(), pick in any::<prop::sample::Index>()) {
        let mut tree = build(&parents);
        let count = parents.len() + 1;
        // Secondaries only: the primary always restarts the tree.
        let victim = u32::try_from(pick.index(parents.len())).unwrap() + 2;
        let before = tree.path_to(TrackId(victim)).unwrap().track_ids();
        let added = tree
            .insert(NewTrack {
                track_id: TrackId(victim),
                parent_id: TrackId::PRIMARY,
                particle: "proton",
                process: "hadElastic",
                volume: "Elsewhere",
                energy: 5.0,
            })
            .unwrap();
        prop_assert!(!added);
        prop_assert_eq!(tree.len(), count);
        prop_assert_eq!(tree.path_to(TrackId(victim)).unwrap().track_ids(), before);
    }

    #[test]
    fn out_of_range_levels_fail_closed(parents in parent_choices(), level in -200i64..200) {
        let tree = build(&parents);
        let leaf = TrackId(u32::try_from(parents.len()).unwrap() + 1);
        let path = tree.path_to(leaf).unwrap();
        let n = i64::try_from(path.len()).unwrap();
        let spec = FilterSpec::new(FilterMode::Include, "*", "*", level);
        prop_assert_eq!(matches(&path, &spec), (-n..n).contains(&level));
    }

    #[test]
    fn prefix_wildcard_is_starts_with(value in "[a-z]{0,8}", prefix in "[a-z]{0,4}") {
        let pattern = format!("{prefix}*");
        prop_assert_eq!(wildcard_match(&value, &pattern), value.starts_with(&prefix));
        prop_assert_eq!(wildcard_match(&value, &prefix), value == prefix);
    }
}
