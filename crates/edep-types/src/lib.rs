//! Shared type definitions for the energy-deposition reduction core.
//!
//! Every crate in the workspace speaks in terms of the types defined here:
//! the per-step record emitted by the transport engine, strongly-typed
//! track and event identifiers, and the physical-unit symbol table used to
//! interpret configuration values.
//!
//! # Modules
//!
//! - [`ids`] -- [`TrackId`] and [`EventId`] newtypes.
//! - [`step`] -- [`StepRecord`], the atomic unit of input.
//! - [`units`] -- Internal unit system constants and the [`UnitTable`]
//!   symbol lookup used by the configuration expression evaluator.
//! - [`kinematics`] -- Compton-edge helpers for photon spectra.
//!
//! # Unit system
//!
//! All quantities carried by a [`StepRecord`] are expressed in the internal
//! unit system: millimetres, MeV, nanoseconds and radians. Scaling to an
//! output unit happens only at export time.

pub mod ids;
pub mod kinematics;
pub mod step;
pub mod units;

// Re-export primary types at crate root.
pub use ids::{EventId, TrackId};
pub use step::{StepRecord, TRANSPORTATION, Vec3};
pub use units::UnitTable;
