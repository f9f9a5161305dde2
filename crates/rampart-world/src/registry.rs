//! The authoritative `id -> Structure` arena for one match.
//!
//! Structures reference each other only by [`StructureId`]; neighbour
//! relations are derived on demand through the spatial index, never stored
//! here.

use std::collections::BTreeMap;

use glam::{Quat, Vec3};

use rampart_types::{PlayerId, Structure, StructureId, StructureType, SupportState, TeamId};

use crate::catalog::catalog_entry;

/// Inputs for spawning a fresh structure.
#[derive(Debug, Clone, Copy)]
pub struct SpawnParams {
    /// Player who placed it.
    pub owner: PlayerId,
    /// Owner's team.
    pub team: TeamId,
    /// What to spawn.
    pub structure_type: StructureType,
    /// Snapped base position.
    pub position: Vec3,
    /// Snapped rotation.
    pub rotation: Quat,
    /// Match tick of placement.
    pub tick: u64,
    /// Result of the ground probe at `position`.
    pub is_grounded: bool,
}

/// Live structures keyed by ID, iterated in ID (creation) order.
#[derive(Debug, Default)]
pub struct StructureRegistry {
    structures: BTreeMap<StructureId, Structure>,
}

impl StructureRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            structures: BTreeMap::new(),
        }
    }

    /// Number of live structures.
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// Whether no structures are live.
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Build a structure from the catalog and insert it.
    ///
    /// The structure starts unsupported with zero stability; the integrity
    /// engine settles both on its next pass.
    pub fn spawn(&mut self, params: SpawnParams) -> StructureId {
        let entry = catalog_entry(params.structure_type);
        let id = StructureId::new();
        self.structures.insert(
            id,
            Structure {
                id,
                owner: params.owner,
                team: params.team,
                structure_type: params.structure_type,
                position: params.position,
                rotation: params.rotation,
                max_health: entry.max_health,
                current_health: entry.max_health,
                stability: 0.0,
                is_grounded: params.is_grounded,
                support: SupportState::Unsupported,
                created_at_tick: params.tick,
            },
        );
        id
    }

    /// Remove a structure, returning it.
    pub fn remove(&mut self, id: StructureId) -> Option<Structure> {
        self.structures.remove(&id)
    }

    /// Look up a structure.
    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    /// Look up a structure mutably.
    pub fn get_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.structures.get_mut(&id)
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: StructureId) -> bool {
        self.structures.contains_key(&id)
    }

    /// All live structures in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.structures.values()
    }

    /// All live IDs in order.
    pub fn ids(&self) -> impl Iterator<Item = StructureId> + '_ {
        self.structures.keys().copied()
    }

    /// Live structures owned by `owner`.
    pub fn owned_by(&self, owner: PlayerId) -> impl Iterator<Item = &Structure> {
        self.structures.values().filter(move |s| s.owner == owner)
    }

    /// Live structures owned by `owner` within `radius` of `point`.
    pub fn owned_within(
        &self,
        owner: PlayerId,
        point: Vec3,
        radius: f32,
    ) -> impl Iterator<Item = &Structure> {
        self.owned_by(owner)
            .filter(move |s| s.position.distance(point) <= radius)
    }

    /// Remove every structure, returning them in ID order.
    pub fn clear(&mut self) -> Vec<Structure> {
        std::mem::take(&mut self.structures).into_values().collect()
    }
}
