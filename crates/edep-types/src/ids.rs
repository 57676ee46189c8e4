//! Type-safe identifier wrappers around the engine's integer ids.
//!
//! Track and event ids are plain integers on the wire. Wrapping them keeps
//! a track id from being compared against an event id by accident.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around an integer id with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of a track, unique within one event.
    ///
    /// The engine numbers tracks from 1; id 0 is reserved to mean "no
    /// parent" in [`StepRecord::parent_id`](crate::StepRecord::parent_id).
    TrackId(u32)
}

define_id! {
    /// Identifier of a simulated event (one primary cascade).
    EventId(u64)
}

impl TrackId {
    /// The id the engine assigns to the primary track of every event.
    pub const PRIMARY: Self = Self(1);

    /// The sentinel parent id of a track that has no parent.
    pub const NONE: Self = Self(0);

    /// Whether this is the primary track id.
    pub const fn is_primary(self) -> bool {
        self.0 == Self::PRIMARY.0
    }

    /// Whether this is the "no parent" sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }
}
