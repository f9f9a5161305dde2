//! Structures, arena geometry, and structural integrity for Rampart.
//!
//! This crate models the physical side of a match: the authoritative
//! registry of placed structures, the spatial collaborator used to find
//! neighbours and obstructions, and the engine that decides which
//! structures are still held up.
//!
//! # Modules
//!
//! - [`catalog`] -- Static per-type data (category, cost, max health).
//! - [`error`] -- Error types for world operations.
//! - [`registry`] -- [`StructureRegistry`], the `id -> Structure` arena.
//! - [`spatial`] -- The [`SpatialIndex`] and [`GroundProbe`] seams plus the
//!   in-memory [`GridIndex`] used for headless matches.
//! - [`integrity`] -- [`IntegrityEngine`]: support distances, stability,
//!   and cascading collapse.

pub mod catalog;
pub mod error;
pub mod integrity;
pub mod registry;
pub mod spatial;

// Re-export primary types at crate root.
pub use catalog::{CatalogEntry, catalog_entry};
pub use error::WorldError;
pub use integrity::{CascadeReport, IntegrityConfig, IntegrityEngine, StabilityUpdate};
pub use registry::{SpawnParams, StructureRegistry};
pub use spatial::{
    ArenaGeometry, GridIndex, GroundProbe, LayerFilter, SpatialHandle, SpatialHit, SpatialIndex,
};
