//! Build-phase rules and orchestration for Rampart.
//!
//! Everything a player can ask of the build system enters through the
//! [`BuildOrchestrator`]. It gates requests through the [`RateLimiter`],
//! re-snaps them with [`GridSnap`], runs [`validate_placement`], charges the
//! economy ledger, updates the structure registry, and settles structural
//! integrity before returning.
//!
//! # Modules
//!
//! - [`rate_limit`] -- Sliding-window throttling per player.
//! - [`grid`] -- Server-side position and yaw snapping.
//! - [`validation`] -- The staged placement pipeline.
//! - [`blueprint`] -- Saved structure layouts.
//! - [`orchestrator`] -- The single-writer build state for one match.
//! - [`error`] -- Setup errors.

pub mod blueprint;
pub mod error;
pub mod grid;
pub mod orchestrator;
pub mod rate_limit;
pub mod validation;

// Re-export primary types at crate root.
pub use blueprint::{BlueprintConfig, BlueprintStore};
pub use error::BuildError;
pub use grid::{GridSnap, SnapError};
pub use orchestrator::{BuildOrchestrator, BuildSettings, MatchContext};
pub use rate_limit::{RateLimitConfig, RateLimiter, Throttle};
pub use validation::{PlacementConfig, PlacementContext, PlacementTicket, validate_placement};
