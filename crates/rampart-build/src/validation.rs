//! The placement validation pipeline.
//!
//! The pipeline runs five stages in order and stops at the first failure:
//! 0. Type -- can players place this structure type at all?
//! 1. Phase -- is the match in the build phase?
//! 2. Distance -- is the position inside the player's build radius?
//! 3. Overlap -- is the cell free of structures and static obstacles?
//! 4. Budget -- can the player afford it?
//!
//! Each stage returns `Ok(())` or a [`Rejection`]. The pipeline itself is
//! pure: it reads the context and produces a [`PlacementTicket`], and the
//! orchestrator commits the ticket. Nothing is spent or inserted here.

use glam::{Quat, Vec3};
use serde::Deserialize;

use rampart_types::{
    Budget, Phase, PlacementRequest, PlayerId, Rejection, RejectionReason, StructureCategory,
    StructureType,
};
use rampart_world::{LayerFilter, SpatialHandle, SpatialIndex};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Geometry rules for placement.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PlacementConfig {
    /// Maximum distance from the player's spawn to a placed structure.
    #[serde(default = "default_max_build_distance")]
    pub max_build_distance: f32,

    /// Minimum clearance between a new structure and any obstruction.
    #[serde(default = "default_min_separation")]
    pub min_separation: f32,

    /// Build grid cell size.
    #[serde(default = "default_grid_size")]
    pub grid_size: f32,

    /// Allowed distance between a client position and its snapped cell.
    #[serde(default = "default_snap_tolerance")]
    pub snap_tolerance: f32,

    /// Yaw quantization step in degrees.
    #[serde(default = "default_rotation_step_degrees")]
    pub rotation_step_degrees: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_build_distance: default_max_build_distance(),
            min_separation: default_min_separation(),
            grid_size: default_grid_size(),
            snap_tolerance: default_snap_tolerance(),
            rotation_step_degrees: default_rotation_step_degrees(),
        }
    }
}

const fn default_max_build_distance() -> f32 {
    30.0
}

const fn default_min_separation() -> f32 {
    0.5
}

const fn default_grid_size() -> f32 {
    1.0
}

const fn default_snap_tolerance() -> f32 {
    0.1
}

const fn default_rotation_step_degrees() -> f32 {
    90.0
}

// ---------------------------------------------------------------------------
// Context and ticket
// ---------------------------------------------------------------------------

/// Everything the pipeline reads, assembled by the orchestrator.
#[derive(Clone, Copy)]
pub struct PlacementContext<'a> {
    /// Current match phase.
    pub phase: Phase,
    /// The requester's spawn point, if known.
    pub spawn: Option<Vec3>,
    /// The requester's current budget.
    pub budget: Budget,
    /// Spatial collaborator for the overlap check.
    pub spatial: &'a dyn SpatialIndex,
    /// Geometry rules.
    pub config: &'a PlacementConfig,
}

/// An accepted placement, ready to commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementTicket {
    /// Who placed it.
    pub owner: PlayerId,
    /// What to place.
    pub structure_type: StructureType,
    /// Budget pool to charge.
    pub category: StructureCategory,
    /// Points to charge.
    pub cost: u32,
    /// Canonical base position.
    pub position: Vec3,
    /// Canonical rotation.
    pub rotation: Quat,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Validate a snapped placement request through the full pipeline.
///
/// `request.position` and `request.rotation` must already be canonical.
///
/// # Errors
///
/// Returns the first stage's [`Rejection`].
pub fn validate_placement(
    request: &PlacementRequest,
    ctx: &PlacementContext<'_>,
) -> Result<PlacementTicket, Rejection> {
    // Stage 0: Type
    validate_type(request.structure_type)?;

    // Stage 1: Phase
    validate_phase(ctx.phase)?;

    // Stage 2: Distance from spawn
    validate_distance(request.position, ctx.spawn, ctx.config.max_build_distance)?;

    // Stage 3: Overlap
    validate_overlap(request.position, ctx.spatial, ctx.config.min_separation)?;

    // Stage 4: Budget
    validate_budget(request.structure_type, &ctx.budget)?;

    Ok(PlacementTicket {
        owner: request.requester,
        structure_type: request.structure_type,
        category: request.structure_type.category(),
        cost: request.structure_type.cost(),
        position: request.position,
        rotation: request.rotation,
    })
}

fn validate_type(structure_type: StructureType) -> Result<(), Rejection> {
    if structure_type.is_player_placeable() {
        Ok(())
    } else {
        Err(Rejection::new(
            RejectionReason::InvalidStructureType,
            format!("{structure_type:?} cannot be placed by players"),
        ))
    }
}

pub(crate) fn validate_phase(phase: Phase) -> Result<(), Rejection> {
    if phase == Phase::Build {
        Ok(())
    } else {
        Err(Rejection::new(
            RejectionReason::WrongPhase,
            format!("building is only allowed during the build phase (current: {phase:?})"),
        ))
    }
}

fn validate_distance(
    position: Vec3,
    spawn: Option<Vec3>,
    max_build_distance: f32,
) -> Result<(), Rejection> {
    let Some(spawn) = spawn else {
        return Err(Rejection::new(
            RejectionReason::TooFarFromSpawn,
            "no spawn point is known for this player",
        ));
    };
    let distance = position.distance(spawn);
    if distance <= max_build_distance {
        Ok(())
    } else {
        Err(Rejection::new(
            RejectionReason::TooFarFromSpawn,
            format!("position is {distance:.1} units from spawn (max {max_build_distance:.1})"),
        ))
    }
}

fn validate_overlap(
    position: Vec3,
    spatial: &dyn SpatialIndex,
    min_separation: f32,
) -> Result<(), Rejection> {
    let hits = spatial.query(position, min_separation, LayerFilter::OBSTRUCTIONS);
    match hits.first() {
        None => Ok(()),
        Some(hit) => {
            let what = match hit.handle {
                SpatialHandle::Structure(_) => "a structure",
                SpatialHandle::Obstacle(_) => "an obstacle",
                SpatialHandle::Player(_) => "a player",
            };
            Err(Rejection::new(
                RejectionReason::Overlap,
                format!("cell is occupied by {what}"),
            ))
        }
    }
}

fn validate_budget(structure_type: StructureType, budget: &Budget) -> Result<(), Rejection> {
    let category = structure_type.category();
    let cost = structure_type.cost();
    let available = budget.get(category).unwrap_or(0);
    if available >= cost {
        Ok(())
    } else {
        Err(Rejection::new(
            RejectionReason::InsufficientBudget,
            format!("{structure_type:?} costs {cost} {category:?} points, {available} available"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_types::StructureId;
    use rampart_world::GridIndex;

    fn request(structure_type: StructureType, position: Vec3) -> PlacementRequest {
        PlacementRequest {
            position,
            rotation: Quat::IDENTITY,
            structure_type,
            requester: PlayerId::new(),
            timestamp_ms: 0,
        }
    }

    fn ctx<'a>(
        phase: Phase,
        budget: Budget,
        grid: &'a GridIndex,
        config: &'a PlacementConfig,
    ) -> PlacementContext<'a> {
        PlacementContext {
            phase,
            spawn: Some(Vec3::ZERO),
            budget,
            spatial: grid,
            config,
        }
    }

    fn rejection(result: Result<PlacementTicket, Rejection>) -> Option<RejectionReason> {
        result.err().map(|r| r.reason)
    }

    #[test]
    fn valid_request_produces_ticket() {
        let grid = GridIndex::default();
        let config = PlacementConfig::default();
        let req = request(StructureType::MetalWall, Vec3::new(3.0, 0.0, 0.0));
        let ticket = validate_placement(&req, &ctx(Phase::Build, Budget::new(10, 0, 0, 0), &grid, &config));

        assert_eq!(
            ticket.map(|t| (t.category, t.cost)),
            Ok((StructureCategory::Wall, 4))
        );
    }

    #[test]
    fn combat_phase_is_always_wrong_phase() {
        let mut grid = GridIndex::default();
        grid.track_structure(StructureId::new(), Vec3::new(1.0, 0.0, 0.0));
        let config = PlacementConfig::default();

        // Overlapping, unaffordable, and out of range at once: phase wins.
        for position in [Vec3::new(1.0, 0.0, 0.0), Vec3::new(500.0, 0.0, 0.0)] {
            let req = request(StructureType::WoodWall, position);
            let reason = rejection(validate_placement(
                &req,
                &ctx(Phase::Combat, Budget::default(), &grid, &config),
            ));
            assert_eq!(reason, Some(RejectionReason::WrongPhase));
        }
    }

    #[test]
    fn core_structure_is_not_placeable() {
        let grid = GridIndex::default();
        let config = PlacementConfig::default();
        let req = request(StructureType::CoreStructure, Vec3::ZERO);
        let reason = rejection(validate_placement(
            &req,
            &ctx(Phase::Build, Budget::new(99, 99, 99, 99), &grid, &config),
        ));
        assert_eq!(reason, Some(RejectionReason::InvalidStructureType));
    }

    #[test]
    fn far_position_is_rejected() {
        let grid = GridIndex::default();
        let config = PlacementConfig::default();
        let req = request(StructureType::WoodWall, Vec3::new(31.0, 0.0, 0.0));
        let reason = rejection(validate_placement(
            &req,
            &ctx(Phase::Build, Budget::new(10, 0, 0, 0), &grid, &config),
        ));
        assert_eq!(reason, Some(RejectionReason::TooFarFromSpawn));
    }

    #[test]
    fn unknown_spawn_is_too_far() {
        let grid = GridIndex::default();
        let config = PlacementConfig::default();
        let req = request(StructureType::WoodWall, Vec3::ZERO);
        let mut context = ctx(Phase::Build, Budget::new(10, 0, 0, 0), &grid, &config);
        context.spawn = None;
        assert_eq!(
            rejection(validate_placement(&req, &context)),
            Some(RejectionReason::TooFarFromSpawn)
        );
    }

    #[test]
    fn occupied_cell_overlaps_but_player_does_not() {
        let mut grid = GridIndex::default();
        grid.add_obstacle(Vec3::new(2.0, 0.0, 0.0), 0.0);
        grid.set_player(PlayerId::new(), Vec3::new(4.0, 0.0, 0.0));
        let config = PlacementConfig::default();
        let budget = Budget::new(10, 0, 0, 0);

        let blocked = request(StructureType::WoodWall, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(
            rejection(validate_placement(&blocked, &ctx(Phase::Build, budget, &grid, &config))),
            Some(RejectionReason::Overlap)
        );

        let under_player = request(StructureType::WoodWall, Vec3::new(4.0, 0.0, 0.0));
        assert!(validate_placement(&under_player, &ctx(Phase::Build, budget, &grid, &config)).is_ok());
    }

    #[test]
    fn budget_checked_per_category() {
        let grid = GridIndex::default();
        let config = PlacementConfig::default();
        // Plenty of walls, no traps.
        let budget = Budget::new(50, 0, 0, 0);
        let req = request(StructureType::TrapSpike, Vec3::ZERO);
        assert_eq!(
            rejection(validate_placement(&req, &ctx(Phase::Build, budget, &grid, &config))),
            Some(RejectionReason::InsufficientBudget)
        );
    }
}
