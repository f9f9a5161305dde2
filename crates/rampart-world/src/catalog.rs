//! Static per-type structure data.
//!
//! Category and cost live on [`StructureType`] itself; this table adds the
//! numbers the simulation needs when a structure is spawned.

use serde::Serialize;

use rampart_types::{StructureCategory, StructureType};

/// Catalog row for one structure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// The type this row describes.
    pub structure_type: StructureType,
    /// Budget pool it draws from.
    pub category: StructureCategory,
    /// Budget points it costs.
    pub cost: u32,
    /// Health when freshly placed.
    pub max_health: u32,
}

/// Return the catalog row for `structure_type`.
pub const fn catalog_entry(structure_type: StructureType) -> CatalogEntry {
    CatalogEntry {
        structure_type,
        category: structure_type.category(),
        cost: structure_type.cost(),
        max_health: max_health(structure_type),
    }
}

#[allow(clippy::match_same_arms)] // One arm per type keeps the table readable.
const fn max_health(structure_type: StructureType) -> u32 {
    match structure_type {
        StructureType::WoodWall => 150,
        StructureType::MetalWall => 400,
        StructureType::Platform => 200,
        StructureType::Ramp => 200,
        StructureType::TrapSpike => 100,
        StructureType::TrapGlue => 100,
        StructureType::TrapSpringboard => 120,
        StructureType::TrapDartTurret => 150,
        StructureType::UtilityGate => 250,
        StructureType::CoreStructure => 1000,
    }
}
