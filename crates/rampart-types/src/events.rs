//! Outbound match events.
//!
//! Every committed state change produces one [`MatchEvent`]. Events are
//! transport-agnostic: the match actor fans them out and whatever sits on
//! the other side of the channel decides how to replicate them.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{RemovalCause, StructureCategory, StructureType};
use crate::ids::{PlayerId, StructureId};
use crate::structs::{BudgetChange, SupportState};

/// A committed change in match state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MatchEvent {
    /// A structure entered the registry.
    StructurePlaced {
        /// The new structure.
        id: StructureId,
        /// Its type.
        structure_type: StructureType,
        /// Snapped base position.
        #[ts(type = "[number, number, number]")]
        position: Vec3,
        /// Snapped rotation.
        #[ts(type = "[number, number, number, number]")]
        rotation: Quat,
        /// The placing player.
        owner: PlayerId,
    },
    /// A structure left the registry.
    StructureRemoved {
        /// The removed structure.
        id: StructureId,
        /// Why it was removed.
        cause: RemovalCause,
    },
    /// A structure's stability or support state changed.
    StabilityChanged {
        /// The structure.
        id: StructureId,
        /// New stability, 0 to 100.
        stability: f32,
        /// New support classification.
        support: SupportState,
    },
    /// A player's budget pool changed.
    BudgetChanged {
        /// Whose budget changed.
        player: PlayerId,
        /// Which pool.
        category: StructureCategory,
        /// The pool's value after the change.
        new_value: u32,
    },
    /// A blueprint was stored.
    BlueprintSaved {
        /// Owner of the blueprint.
        owner: PlayerId,
        /// Blueprint name.
        name: String,
        /// Number of recorded structures.
        entry_count: u32,
    },
    /// A blueprint was replayed.
    BlueprintDeployed {
        /// Owner of the blueprint.
        owner: PlayerId,
        /// Blueprint name.
        name: String,
        /// Entries placed.
        placed: u32,
        /// Entries attempted.
        attempted: u32,
    },
    /// A blueprint was deleted.
    BlueprintDeleted {
        /// Owner of the blueprint.
        owner: PlayerId,
        /// Blueprint name.
        name: String,
    },
}

impl From<BudgetChange> for MatchEvent {
    fn from(change: BudgetChange) -> Self {
        Self::BudgetChanged {
            player: change.player,
            category: change.category,
            new_value: change.new_value,
        }
    }
}

impl MatchEvent {
    /// The structure this event concerns, if any.
    pub const fn structure_id(&self) -> Option<StructureId> {
        match self {
            Self::StructurePlaced { id, .. }
            | Self::StructureRemoved { id, .. }
            | Self::StabilityChanged { id, .. } => Some(*id),
            Self::BudgetChanged { .. }
            | Self::BlueprintSaved { .. }
            | Self::BlueprintDeployed { .. }
            | Self::BlueprintDeleted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_change_converts_to_event() {
        let player = PlayerId::new();
        let event = MatchEvent::from(BudgetChange {
            player,
            category: StructureCategory::Wall,
            new_value: 4,
        });
        assert_eq!(
            event,
            MatchEvent::BudgetChanged {
                player,
                category: StructureCategory::Wall,
                new_value: 4
            }
        );
        assert_eq!(event.structure_id(), None);
    }

    #[test]
    fn removal_event_is_externally_tagged() {
        let id = StructureId::new();
        let event = MatchEvent::StructureRemoved {
            id,
            cause: RemovalCause::Collapsed,
        };
        let value = serde_json::to_value(&event).ok();
        let cause = value
            .as_ref()
            .and_then(|v| v.get("StructureRemoved"))
            .and_then(|v| v.get("cause"))
            .and_then(serde_json::Value::as_str);
        assert_eq!(cause, Some("Collapsed"));
        assert_eq!(event.structure_id(), Some(id));
    }
}
