//! Per-player blueprint storage.
//!
//! A blueprint is a snapshot of a player's own structures near an anchor,
//! stored as offsets so it can be replayed anywhere. Replay goes through
//! the normal placement pipeline (see
//! [`BuildOrchestrator::deploy_blueprint`](crate::BuildOrchestrator::deploy_blueprint)),
//! so a blueprint never bypasses phase, distance, overlap, or budget rules.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::Deserialize;
use tracing::info;

use rampart_types::{
    Blueprint, BlueprintEntry, BlueprintSummary, PlayerId, Rejection, RejectionReason,
};
use rampart_world::StructureRegistry;

/// Blueprint limits.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BlueprintConfig {
    /// Blueprints one player may keep.
    #[serde(default = "default_max_per_player")]
    pub max_per_player: u32,

    /// Radius around the anchor captured by a save.
    #[serde(default = "default_capture_radius")]
    pub capture_radius: f32,

    /// Maximum blueprint name length in characters.
    #[serde(default = "default_max_name_len")]
    pub max_name_len: u32,
}

impl Default for BlueprintConfig {
    fn default() -> Self {
        Self {
            max_per_player: default_max_per_player(),
            capture_radius: default_capture_radius(),
            max_name_len: default_max_name_len(),
        }
    }
}

const fn default_max_per_player() -> u32 {
    10
}

const fn default_capture_radius() -> f32 {
    12.0
}

const fn default_max_name_len() -> u32 {
    32
}

/// Blueprints keyed by owner, then name.
#[derive(Debug, Default)]
pub struct BlueprintStore {
    config: BlueprintConfig,
    by_owner: BTreeMap<PlayerId, BTreeMap<String, Blueprint>>,
}

impl BlueprintStore {
    /// Create an empty store.
    pub const fn new(config: BlueprintConfig) -> Self {
        Self {
            config,
            by_owner: BTreeMap::new(),
        }
    }

    /// Capture `owner`'s live structures within the capture radius of
    /// `anchor` and store them under `name`.
    ///
    /// Entries are ordered nearest-to-anchor first so a partial deploy
    /// builds outward from the anchor.
    ///
    /// # Errors
    ///
    /// [`RejectionReason::InvalidBlueprintName`],
    /// [`RejectionReason::BlueprintNameTaken`],
    /// [`RejectionReason::MaxBlueprintsReached`], or
    /// [`RejectionReason::EmptyBlueprint`].
    pub fn save(
        &mut self,
        owner: PlayerId,
        name: &str,
        anchor: Vec3,
        tick: u64,
        registry: &StructureRegistry,
    ) -> Result<&Blueprint, Rejection> {
        let name = self.check_name(name)?;

        let existing = self.by_owner.get(&owner);
        if existing.is_some_and(|m| m.contains_key(&name)) {
            return Err(Rejection::new(
                RejectionReason::BlueprintNameTaken,
                format!("a blueprint named '{name}' already exists"),
            ));
        }
        let count = existing.map_or(0, BTreeMap::len);
        if count >= usize::try_from(self.config.max_per_player).unwrap_or(usize::MAX) {
            return Err(Rejection::new(
                RejectionReason::MaxBlueprintsReached,
                format!("blueprint limit of {} reached", self.config.max_per_player),
            ));
        }

        let mut captured: Vec<_> = registry
            .owned_within(owner, anchor, self.config.capture_radius)
            .filter(|s| s.structure_type.is_player_placeable())
            .collect();
        if captured.is_empty() {
            return Err(Rejection::new(
                RejectionReason::EmptyBlueprint,
                "no owned structures near the anchor",
            ));
        }
        captured.sort_by(|a, b| {
            a.position
                .distance_squared(anchor)
                .total_cmp(&b.position.distance_squared(anchor))
                .then_with(|| a.id.cmp(&b.id))
        });

        let entries: Vec<BlueprintEntry> = captured
            .iter()
            .map(|s| BlueprintEntry {
                structure_type: s.structure_type,
                offset: s.position - anchor,
                rotation: s.rotation,
                category: s.category(),
                cost: s.cost(),
            })
            .collect();

        info!(
            owner = %owner,
            name = %name,
            entries = entries.len(),
            "Blueprint saved"
        );

        let blueprint = Blueprint {
            name: name.clone(),
            owner,
            anchor,
            saved_at_tick: tick,
            entries,
        };
        let slot = self.by_owner.entry(owner).or_default();
        Ok(slot.entry(name).or_insert(blueprint))
    }

    /// Look up a blueprint.
    pub fn get(&self, owner: PlayerId, name: &str) -> Option<&Blueprint> {
        self.by_owner.get(&owner).and_then(|m| m.get(name.trim()))
    }

    /// Delete a blueprint, returning it.
    ///
    /// # Errors
    ///
    /// [`RejectionReason::BlueprintNotFound`] if it does not exist.
    pub fn delete(&mut self, owner: PlayerId, name: &str) -> Result<Blueprint, Rejection> {
        let removed = self
            .by_owner
            .get_mut(&owner)
            .and_then(|m| m.remove(name.trim()))
            .ok_or_else(|| not_found(name))?;
        if self.by_owner.get(&owner).is_some_and(BTreeMap::is_empty) {
            self.by_owner.remove(&owner);
        }
        Ok(removed)
    }

    /// Summaries of `owner`'s blueprints in name order.
    pub fn list(&self, owner: PlayerId) -> Vec<BlueprintSummary> {
        self.by_owner
            .get(&owner)
            .map(|m| m.values().map(BlueprintSummary::from).collect())
            .unwrap_or_default()
    }

    /// Number of blueprints `owner` holds.
    pub fn count(&self, owner: PlayerId) -> usize {
        self.by_owner.get(&owner).map_or(0, BTreeMap::len)
    }

    fn check_name(&self, name: &str) -> Result<String, Rejection> {
        let trimmed = name.trim();
        let len = trimmed.chars().count();
        let max = usize::try_from(self.config.max_name_len).unwrap_or(usize::MAX);
        if len == 0 || len > max {
            return Err(Rejection::new(
                RejectionReason::InvalidBlueprintName,
                format!("blueprint names must be 1 to {max} characters"),
            ));
        }
        Ok(trimmed.to_owned())
    }
}

/// Rejection for a missing blueprint.
pub fn not_found(name: &str) -> Rejection {
    Rejection::new(
        RejectionReason::BlueprintNotFound,
        format!("no blueprint named '{}'", name.trim()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use rampart_types::{StructureType, TeamId};
    use rampart_world::SpawnParams;

    fn spawn(registry: &mut StructureRegistry, owner: PlayerId, x: f32, t: StructureType) {
        registry.spawn(SpawnParams {
            owner,
            team: TeamId::new(),
            structure_type: t,
            position: Vec3::new(x, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            tick: 0,
            is_grounded: true,
        });
    }

    fn reason<T>(result: Result<T, Rejection>) -> Option<RejectionReason> {
        result.err().map(|r| r.reason)
    }

    #[test]
    fn save_captures_own_structures_nearest_first() {
        let mut registry = StructureRegistry::new();
        let me = PlayerId::new();
        let them = PlayerId::new();
        spawn(&mut registry, me, 3.0, StructureType::Ramp);
        spawn(&mut registry, me, 1.0, StructureType::WoodWall);
        spawn(&mut registry, them, 2.0, StructureType::MetalWall);
        spawn(&mut registry, me, 40.0, StructureType::WoodWall);

        let mut store = BlueprintStore::new(BlueprintConfig::default());
        let saved = store.save(me, " fort ", Vec3::ZERO, 9, &registry);

        let types: Option<Vec<StructureType>> = saved
            .ok()
            .map(|bp| bp.entries.iter().map(|e| e.structure_type).collect());
        assert_eq!(types, Some(vec![StructureType::WoodWall, StructureType::Ramp]));
        assert!(store.get(me, "fort").is_some());
        assert_eq!(store.get(me, "fort").map(|b| b.saved_at_tick), Some(9));
    }

    #[test]
    fn names_are_validated_and_unique() {
        let mut registry = StructureRegistry::new();
        let me = PlayerId::new();
        spawn(&mut registry, me, 1.0, StructureType::WoodWall);
        let mut store = BlueprintStore::new(BlueprintConfig::default());

        assert_eq!(
            reason(store.save(me, "   ", Vec3::ZERO, 0, &registry)),
            Some(RejectionReason::InvalidBlueprintName)
        );
        assert_eq!(
            reason(store.save(me, &"x".repeat(33), Vec3::ZERO, 0, &registry)),
            Some(RejectionReason::InvalidBlueprintName)
        );
        assert!(store.save(me, "a", Vec3::ZERO, 0, &registry).is_ok());
        assert_eq!(
            reason(store.save(me, "a", Vec3::ZERO, 0, &registry)),
            Some(RejectionReason::BlueprintNameTaken)
        );
    }

    #[test]
    fn cap_is_enforced() {
        let mut registry = StructureRegistry::new();
        let me = PlayerId::new();
        spawn(&mut registry, me, 1.0, StructureType::WoodWall);
        let mut store = BlueprintStore::new(BlueprintConfig {
            max_per_player: 2,
            ..BlueprintConfig::default()
        });

        assert!(store.save(me, "one", Vec3::ZERO, 0, &registry).is_ok());
        assert!(store.save(me, "two", Vec3::ZERO, 0, &registry).is_ok());
        assert_eq!(
            reason(store.save(me, "three", Vec3::ZERO, 0, &registry)),
            Some(RejectionReason::MaxBlueprintsReached)
        );
        assert_eq!(store.count(me), 2);
    }

    #[test]
    fn nothing_to_capture_is_empty_blueprint() {
        let registry = StructureRegistry::new();
        let mut store = BlueprintStore::new(BlueprintConfig::default());
        assert_eq!(
            reason(store.save(PlayerId::new(), "void", Vec3::ZERO, 0, &registry)),
            Some(RejectionReason::EmptyBlueprint)
        );
    }

    #[test]
    fn delete_and_list() {
        let mut registry = StructureRegistry::new();
        let me = PlayerId::new();
        spawn(&mut registry, me, 1.0, StructureType::WoodWall);
        let mut store = BlueprintStore::new(BlueprintConfig::default());
        assert!(store.save(me, "b", Vec3::ZERO, 0, &registry).is_ok());
        assert!(store.save(me, "a", Vec3::ZERO, 0, &registry).is_ok());

        let names: Vec<String> = store.list(me).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);

        assert!(store.delete(me, "a").is_ok());
        assert_eq!(
            reason(store.delete(me, "a")),
            Some(RejectionReason::BlueprintNotFound)
        );
        assert_eq!(store.count(me), 1);
    }
}
