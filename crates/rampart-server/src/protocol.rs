//! Line protocol between a driver process and the match server.
//!
//! Every line on stdin is one [`ClientMessage`]; every line on stdout is one
//! [`ServerMessage`]. Both are JSON objects tagged by a `type` field.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use rampart_types::{
    BlueprintSummary, DamageOutcome, DeployResult, MatchEvent, Phase, PlacementResult, PlayerId,
    Rejection, RemovalCause, StructureId, StructureType, TeamId,
};

/// A request read from stdin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Add a player; IDs are generated when omitted.
    Join {
        /// Player ID to use.
        #[serde(default)]
        player: Option<PlayerId>,
        /// Team to join.
        #[serde(default)]
        team: Option<TeamId>,
    },
    /// Drive the round state machine.
    SetPhase {
        /// The new phase.
        phase: Phase,
    },
    /// Place one structure.
    PlaceStructure {
        /// Requesting player.
        player: PlayerId,
        /// What to build.
        structure_type: StructureType,
        /// Client-side snapped position.
        position: Vec3,
        /// Client-side rotation; identity when omitted.
        #[serde(default)]
        rotation: Option<Quat>,
    },
    /// Remove a structure.
    RemoveStructure {
        /// The structure.
        id: StructureId,
        /// Why it is being removed.
        cause: RemovalCause,
    },
    /// Damage a structure.
    DamageStructure {
        /// The structure.
        id: StructureId,
        /// Health to subtract.
        amount: u32,
    },
    /// Save a blueprint.
    SaveBlueprint {
        /// Owning player.
        player: PlayerId,
        /// Blueprint name.
        name: String,
        /// Capture anchor.
        anchor: Vec3,
    },
    /// Deploy a blueprint.
    DeployBlueprint {
        /// Owning player.
        player: PlayerId,
        /// Blueprint name.
        name: String,
        /// New anchor.
        anchor: Vec3,
    },
    /// Delete a blueprint.
    DeleteBlueprint {
        /// Owning player.
        player: PlayerId,
        /// Blueprint name.
        name: String,
    },
    /// List a player's blueprints.
    ListBlueprints {
        /// Owning player.
        player: PlayerId,
    },
    /// Stop the server.
    Shutdown,
}

/// A line written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A player joined.
    Joined {
        /// The player.
        player: PlayerId,
        /// The player's team.
        team: TeamId,
        /// Assigned spawn point.
        spawn: Vec3,
    },
    /// The phase was changed.
    PhaseSet {
        /// The new phase.
        phase: Phase,
    },
    /// Reply to `PlaceStructure`.
    Placement {
        /// The outcome.
        result: PlacementResult,
    },
    /// Reply to `RemoveStructure`.
    Removed {
        /// The removed structure.
        id: StructureId,
    },
    /// Reply to `DamageStructure`.
    Damaged {
        /// The structure.
        id: StructureId,
        /// The outcome.
        outcome: DamageOutcome,
    },
    /// Reply to `SaveBlueprint`.
    BlueprintStored {
        /// The stored blueprint.
        summary: BlueprintSummary,
    },
    /// Reply to `DeployBlueprint`.
    Deployment {
        /// Itemized outcome.
        result: DeployResult,
    },
    /// Reply to `DeleteBlueprint`.
    BlueprintRemoved {
        /// The deleted name.
        name: String,
    },
    /// Reply to `ListBlueprints`.
    Blueprints {
        /// Summaries in name order.
        blueprints: Vec<BlueprintSummary>,
    },
    /// A request was refused.
    Rejected {
        /// Why.
        rejection: Rejection,
    },
    /// A committed match event.
    Event {
        /// The event.
        event: MatchEvent,
    },
    /// Events were dropped because this output fell behind.
    Lagged {
        /// How many events were skipped.
        skipped: u64,
    },
    /// A line could not be understood.
    Error {
        /// Description of the problem.
        message: String,
    },
}

impl From<Rejection> for ServerMessage {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected { rejection }
    }
}
