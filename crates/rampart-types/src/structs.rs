//! Core entity structs: structures, budgets, placement requests and results,
//! and blueprints.
//!
//! Positions are [`Vec3`] in world units with `y` up; a structure's position
//! is the centre of its base. Rotations are [`Quat`].

use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{RejectionReason, StructureCategory, StructureType};
use crate::ids::{PlayerId, StructureId, TeamId};

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// How a structure is currently held up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum SupportState {
    /// Resting on ground.
    Grounded,
    /// Held up through a chain of neighbours.
    Supported {
        /// Accumulated support distance to the nearest grounded anchor.
        distance: f32,
    },
    /// No qualifying neighbour within reach.
    Unsupported,
    /// Below the collapse floor; about to be removed.
    Collapsing,
    /// Gone from the registry.
    Removed,
}

/// A placed structure: immutable identity plus mutable simulation state.
///
/// Category and cost are deliberately not stored; they are always derived
/// from [`structure_type`](Self::structure_type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Structure {
    /// Unique structure identifier.
    pub id: StructureId,
    /// Player who placed the structure.
    pub owner: PlayerId,
    /// Team of the owner at placement time.
    pub team: TeamId,
    /// The kind of structure.
    pub structure_type: StructureType,
    /// Centre of the structure's base.
    #[ts(type = "[number, number, number]")]
    pub position: Vec3,
    /// Orientation.
    #[ts(type = "[number, number, number, number]")]
    pub rotation: Quat,
    /// Health at full repair.
    pub max_health: u32,
    /// Current health; owned by the external damage system.
    pub current_health: u32,
    /// Structural stability, 0 to 100.
    pub stability: f32,
    /// Whether the ground probe hit ground on the last recompute.
    pub is_grounded: bool,
    /// Support classification from the last recompute.
    pub support: SupportState,
    /// Match tick at which the structure was placed.
    pub created_at_tick: u64,
}

impl Structure {
    /// The budget category of this structure.
    pub const fn category(&self) -> StructureCategory {
        self.structure_type.category()
    }

    /// The budget cost of this structure.
    pub const fn cost(&self) -> u32 {
        self.structure_type.cost()
    }
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Per-category budget points held by one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Budget {
    /// Points for walls.
    pub wall: u32,
    /// Points for platforms and ramps.
    pub elevation: u32,
    /// Points for traps.
    pub trap: u32,
    /// Points for utilities.
    pub utility: u32,
}

impl Budget {
    /// Build a budget from explicit per-category values.
    pub const fn new(wall: u32, elevation: u32, trap: u32, utility: u32) -> Self {
        Self {
            wall,
            elevation,
            trap,
            utility,
        }
    }

    /// Points held in `category`, or `None` for categories without a pool.
    pub const fn get(&self, category: StructureCategory) -> Option<u32> {
        match category {
            StructureCategory::Wall => Some(self.wall),
            StructureCategory::Elevation => Some(self.elevation),
            StructureCategory::Trap => Some(self.trap),
            StructureCategory::Utility => Some(self.utility),
            StructureCategory::Core => None,
        }
    }

    /// Mutable access to the pool for `category`.
    pub const fn get_mut(&mut self, category: StructureCategory) -> Option<&mut u32> {
        match category {
            StructureCategory::Wall => Some(&mut self.wall),
            StructureCategory::Elevation => Some(&mut self.elevation),
            StructureCategory::Trap => Some(&mut self.trap),
            StructureCategory::Utility => Some(&mut self.utility),
            StructureCategory::Core => None,
        }
    }
}

/// A single budget counter after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BudgetChange {
    /// Whose budget changed.
    pub player: PlayerId,
    /// Which pool changed.
    pub category: StructureCategory,
    /// The pool's value after the change.
    pub new_value: u32,
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// A client's request to place one structure. Transient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlacementRequest {
    /// Client-reported position (re-snapped server side).
    #[ts(type = "[number, number, number]")]
    pub position: Vec3,
    /// Client-reported rotation (re-snapped server side).
    #[ts(type = "[number, number, number, number]")]
    pub rotation: Quat,
    /// What to place.
    pub structure_type: StructureType,
    /// Who is asking.
    pub requester: PlayerId,
    /// Client timestamp in milliseconds; informational only.
    pub timestamp_ms: u64,
}

/// A rejected request with enough context to render feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Rejection {
    /// Machine-readable reason code.
    pub reason: RejectionReason,
    /// Human-readable explanation.
    pub message: String,
}

impl Rejection {
    /// Create a rejection with a message.
    pub fn new(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}: {}", self.reason, self.message)
    }
}

/// The typed outcome of a placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PlacementResult {
    /// The structure was placed.
    Accepted {
        /// The new structure's identifier.
        structure_id: StructureId,
    },
    /// The request was refused.
    Rejected(Rejection),
}

impl PlacementResult {
    /// The accepted structure ID, if any.
    pub const fn structure_id(&self) -> Option<StructureId> {
        match self {
            Self::Accepted { structure_id } => Some(*structure_id),
            Self::Rejected(_) => None,
        }
    }

    /// The rejection reason, if any.
    pub const fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected(rejection) => Some(rejection.reason),
        }
    }

    /// Whether the placement was accepted.
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

impl From<Rejection> for PlacementResult {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// Result of applying damage to a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum DamageOutcome {
    /// The structure survived.
    Damaged {
        /// Health left.
        remaining_health: u32,
    },
    /// Health reached zero and the structure was removed.
    Destroyed,
}

// ---------------------------------------------------------------------------
// Blueprints
// ---------------------------------------------------------------------------

/// One recorded structure inside a blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BlueprintEntry {
    /// What to place.
    pub structure_type: StructureType,
    /// Position relative to the blueprint anchor.
    #[ts(type = "[number, number, number]")]
    pub offset: Vec3,
    /// Orientation at capture time.
    #[ts(type = "[number, number, number, number]")]
    pub rotation: Quat,
    /// Category at capture time.
    pub category: StructureCategory,
    /// Cost at capture time.
    pub cost: u32,
}

/// A saved relative layout of a player's own structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Blueprint {
    /// Name, unique per owner.
    pub name: String,
    /// The player who saved it.
    pub owner: PlayerId,
    /// Anchor the offsets were measured from.
    #[ts(type = "[number, number, number]")]
    pub anchor: Vec3,
    /// Match tick at which it was saved.
    pub saved_at_tick: u64,
    /// Recorded structures, nearest to the anchor first.
    pub entries: Vec<BlueprintEntry>,
}

impl Blueprint {
    /// Total cost per category of deploying every entry.
    pub fn total_cost(&self) -> BTreeMap<StructureCategory, u32> {
        let mut totals = BTreeMap::new();
        for entry in &self.entries {
            let total = totals.entry(entry.category).or_insert(0_u32);
            *total = total.saturating_add(entry.cost);
        }
        totals
    }
}

/// Outcome of one entry in a blueprint deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DeployEntryOutcome {
    /// Index into [`Blueprint::entries`].
    pub index: u32,
    /// The entry's structure type.
    pub structure_type: StructureType,
    /// Whether it was placed and why not.
    pub result: PlacementResult,
}

/// Result of replaying a blueprint; partial success is normal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DeployResult {
    /// Entries that were placed.
    pub placed: u32,
    /// Entries that were attempted.
    pub attempted: u32,
    /// Itemized per-entry outcomes, in blueprint order.
    pub entries: Vec<DeployEntryOutcome>,
}

impl DeployResult {
    /// Outcomes of the entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = &DeployEntryOutcome> {
        self.entries.iter().filter(|e| !e.result.is_accepted())
    }
}

/// Lightweight description of a stored blueprint for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BlueprintSummary {
    /// Blueprint name.
    pub name: String,
    /// Number of recorded structures.
    pub entry_count: u32,
    /// Total cost per category.
    pub total_cost: BTreeMap<StructureCategory, u32>,
    /// Match tick at which it was saved.
    pub saved_at_tick: u64,
}

impl From<&Blueprint> for BlueprintSummary {
    fn from(blueprint: &Blueprint) -> Self {
        Self {
            name: blueprint.name.clone(),
            entry_count: u32::try_from(blueprint.entries.len()).unwrap_or(u32::MAX),
            total_cost: blueprint.total_cost(),
            saved_at_tick: blueprint.saved_at_tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_has_no_core_pool() {
        let mut budget = Budget::new(1, 2, 3, 4);
        assert_eq!(budget.get(StructureCategory::Trap), Some(3));
        assert_eq!(budget.get(StructureCategory::Core), None);
        assert!(budget.get_mut(StructureCategory::Core).is_none());
    }

    #[test]
    fn structure_category_and_cost_follow_type() {
        let s = Structure {
            id: StructureId::new(),
            owner: PlayerId::new(),
            team: TeamId::new(),
            structure_type: StructureType::MetalWall,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            max_health: 400,
            current_health: 400,
            stability: 100.0,
            is_grounded: true,
            support: SupportState::Grounded,
            created_at_tick: 0,
        };
        assert_eq!(s.category(), StructureCategory::Wall);
        assert_eq!(s.cost(), 4);
    }

    #[test]
    fn blueprint_total_cost_sums_per_category() {
        let entry = |structure_type: StructureType| BlueprintEntry {
            structure_type,
            offset: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            category: structure_type.category(),
            cost: structure_type.cost(),
        };
        let bp = Blueprint {
            name: "fort".to_owned(),
            owner: PlayerId::new(),
            anchor: Vec3::ZERO,
            saved_at_tick: 3,
            entries: vec![
                entry(StructureType::WoodWall),
                entry(StructureType::WoodWall),
                entry(StructureType::Ramp),
            ],
        };
        let totals = bp.total_cost();
        assert_eq!(totals.get(&StructureCategory::Wall).copied(), Some(4));
        assert_eq!(totals.get(&StructureCategory::Elevation).copied(), Some(3));

        let summary = BlueprintSummary::from(&bp);
        assert_eq!(summary.entry_count, 3);
    }

    #[test]
    fn placement_result_accessors() {
        let id = StructureId::new();
        let ok = PlacementResult::Accepted { structure_id: id };
        assert!(ok.is_accepted());
        assert_eq!(ok.structure_id(), Some(id));

        let no = PlacementResult::from(Rejection::new(RejectionReason::Overlap, "blocked"));
        assert_eq!(no.rejection_reason(), Some(RejectionReason::Overlap));
        assert_eq!(no.structure_id(), None);
    }
}
