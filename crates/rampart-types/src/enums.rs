//! Enumeration types shared across the Rampart workspace.
//!
//! Structure types and their budget categories, match phases, rejection
//! reason codes, and removal causes.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Structure types
// ---------------------------------------------------------------------------

/// A kind of structure a player can place in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum StructureType {
    // --- Walls ---
    /// Cheap, low-health wall panel.
    WoodWall,
    /// Reinforced wall panel.
    MetalWall,

    // --- Elevation ---
    /// Flat walkable floor piece.
    Platform,
    /// Inclined floor piece.
    Ramp,

    // --- Traps ---
    /// Floor spikes that damage players standing on them.
    TrapSpike,
    /// Slows players that walk through it.
    TrapGlue,
    /// Launches players upward.
    TrapSpringboard,
    /// Fires darts at players in line of sight.
    TrapDartTurret,

    // --- Utility ---
    /// A wall segment that the owning team can open.
    UtilityGate,

    // --- Core ---
    /// The team objective. Spawned by the match, never placed by players.
    CoreStructure,
}

impl StructureType {
    /// Every structure type, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::WoodWall,
        Self::MetalWall,
        Self::Platform,
        Self::Ramp,
        Self::TrapSpike,
        Self::TrapGlue,
        Self::TrapSpringboard,
        Self::TrapDartTurret,
        Self::UtilityGate,
        Self::CoreStructure,
    ];

    /// The budget category this type draws from.
    pub const fn category(self) -> StructureCategory {
        match self {
            Self::WoodWall | Self::MetalWall => StructureCategory::Wall,
            Self::Platform | Self::Ramp => StructureCategory::Elevation,
            Self::TrapSpike | Self::TrapGlue | Self::TrapSpringboard | Self::TrapDartTurret => {
                StructureCategory::Trap
            }
            Self::UtilityGate => StructureCategory::Utility,
            Self::CoreStructure => StructureCategory::Core,
        }
    }

    /// Budget points consumed from [`category`](Self::category) when placed.
    #[allow(clippy::match_same_arms)] // One arm per type keeps the price table readable.
    pub const fn cost(self) -> u32 {
        match self {
            Self::WoodWall => 2,
            Self::MetalWall => 4,
            Self::Platform => 2,
            Self::Ramp => 3,
            Self::TrapSpike => 3,
            Self::TrapGlue => 2,
            Self::TrapSpringboard => 3,
            Self::TrapDartTurret => 5,
            Self::UtilityGate => 3,
            Self::CoreStructure => 0,
        }
    }

    /// Whether players may request this type through the placement pipeline.
    pub const fn is_player_placeable(self) -> bool {
        self.category().has_budget_pool()
    }
}

/// The budget pool a structure type draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum StructureCategory {
    /// Wall panels.
    Wall,
    /// Platforms and ramps.
    Elevation,
    /// Damaging or movement-altering traps.
    Trap,
    /// Gates and other team utilities.
    Utility,
    /// Match-owned objectives; no player budget.
    Core,
}

impl StructureCategory {
    /// The four categories players hold budget points in.
    pub const BUDGETED: [Self; 4] = [Self::Wall, Self::Elevation, Self::Trap, Self::Utility];

    /// Whether players hold a budget pool for this category.
    pub const fn has_budget_pool(self) -> bool {
        !matches!(self, Self::Core)
    }
}

// ---------------------------------------------------------------------------
// Match phase
// ---------------------------------------------------------------------------

/// The phase of the round state machine, consumed read-only by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// Players are still joining.
    #[default]
    Waiting,
    /// Timed build phase; the only phase that accepts placements.
    Build,
    /// Fighting phase.
    Combat,
    /// Between rounds.
    RoundEnd,
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Machine-readable reason a request was rejected.
///
/// Rejections are expected outcomes, not errors: the core never panics or
/// returns an `Err` for invalid player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum RejectionReason {
    /// Placement was requested outside the build phase.
    WrongPhase,
    /// The requested position is beyond the build radius around the spawn.
    TooFarFromSpawn,
    /// Another structure or obstacle occupies the target cell.
    Overlap,
    /// The player cannot afford the structure.
    InsufficientBudget,
    /// The player is sending placements faster than allowed.
    RateLimited,
    /// The structure type cannot be placed by players.
    InvalidStructureType,
    /// No blueprint with that name exists for the player.
    BlueprintNotFound,
    /// The player already has a blueprint with that name.
    BlueprintNameTaken,
    /// The player has reached the blueprint cap.
    MaxBlueprintsReached,
    /// The client-reported position is not on the placement grid.
    InvalidPosition,
    /// The requester has not joined the match.
    UnknownPlayer,
    /// There were no owned structures near the blueprint anchor.
    EmptyBlueprint,
    /// The blueprint name is empty or too long.
    InvalidBlueprintName,
    /// The referenced structure does not exist.
    StructureNotFound,
}

/// Why a structure left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum RemovalCause {
    /// Health reached zero.
    Destroyed,
    /// Stability fell below the collapse floor.
    Collapsed,
    /// Removed by the match (round reset, admin action).
    Cleared,
}
