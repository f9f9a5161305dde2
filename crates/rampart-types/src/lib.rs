//! Shared type definitions for the Rampart build-phase server.
//!
//! This crate is the single source of truth for all types used across the
//! Rampart workspace. Wire-facing types flow downstream to `TypeScript` via
//! `ts-rs` for client UIs.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity identifiers
//! - [`enums`] -- Structure types, categories, phases, rejection reasons
//! - [`structs`] -- Structures, budgets, placement and blueprint records
//! - [`events`] -- Outbound match events

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Phase, RejectionReason, RemovalCause, StructureCategory, StructureType};
pub use events::MatchEvent;
pub use ids::{MatchId, PlayerId, StructureId, TeamId};
pub use structs::{
    Blueprint, BlueprintEntry, BlueprintSummary, Budget, BudgetChange, DamageOutcome,
    DeployEntryOutcome, DeployResult, PlacementRequest, PlacementResult, Rejection, Structure,
    SupportState,
};
