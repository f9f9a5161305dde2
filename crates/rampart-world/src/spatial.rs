//! Spatial queries and ground probing.
//!
//! The match core never owns collision geometry. It talks to the arena
//! through two narrow traits: [`SpatialIndex`] answers "what is near this
//! point" and [`GroundProbe`] answers "is there ground under this point".
//! A physics engine can implement both; [`GridIndex`] is the in-memory
//! implementation used for headless matches and tests.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rampart_types::{PlayerId, StructureId};

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Something the spatial index can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpatialHandle {
    /// A placed structure.
    Structure(StructureId),
    /// A static arena obstacle (rock, pillar, spawn pad).
    Obstacle(u32),
    /// A player body.
    Player(PlayerId),
}

/// Which layers a query should consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerFilter {
    /// Include placed structures.
    pub structures: bool,
    /// Include static obstacles.
    pub obstacles: bool,
    /// Include player bodies.
    pub players: bool,
}

impl LayerFilter {
    /// Only placed structures; used for support adjacency.
    pub const STRUCTURES: Self = Self {
        structures: true,
        obstacles: false,
        players: false,
    };

    /// Anything a new structure may not overlap. Players are excluded so a
    /// player standing in a cell cannot veto a build.
    pub const OBSTRUCTIONS: Self = Self {
        structures: true,
        obstacles: true,
        players: false,
    };

    /// Every layer.
    pub const ALL: Self = Self {
        structures: true,
        obstacles: true,
        players: true,
    };

    const fn accepts(self, handle: SpatialHandle) -> bool {
        match handle {
            SpatialHandle::Structure(_) => self.structures,
            SpatialHandle::Obstacle(_) => self.obstacles,
            SpatialHandle::Player(_) => self.players,
        }
    }
}

/// One query result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialHit {
    /// What was found.
    pub handle: SpatialHandle,
    /// Where it is.
    pub position: Vec3,
    /// Distance from the query point to the nearest point of the hit.
    pub distance: f32,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Proximity queries over the arena.
pub trait SpatialIndex {
    /// Everything on the filtered layers within `radius` of `point`,
    /// ordered by distance then handle.
    fn query(&self, point: Vec3, radius: f32, filter: LayerFilter) -> Vec<SpatialHit>;

    /// Start tracking a structure at `position`.
    fn track_structure(&mut self, id: StructureId, position: Vec3);

    /// Stop tracking a structure. Unknown IDs are ignored.
    fn untrack_structure(&mut self, id: StructureId);
}

/// Downward ground test.
pub trait GroundProbe {
    /// Whether a downward probe of `length` from `base` hits ground.
    fn probe(&self, base: Vec3, length: f32) -> bool;
}

/// Everything the build core needs from the arena.
pub trait ArenaGeometry: SpatialIndex + GroundProbe {
    /// This arena as a bare spatial index.
    fn as_spatial(&self) -> &dyn SpatialIndex;

    /// This arena as a mutable spatial index.
    fn as_spatial_mut(&mut self) -> &mut dyn SpatialIndex;
}

impl<T: SpatialIndex + GroundProbe> ArenaGeometry for T {
    fn as_spatial(&self) -> &dyn SpatialIndex {
        self
    }

    fn as_spatial_mut(&mut self) -> &mut dyn SpatialIndex {
        self
    }
}

// ---------------------------------------------------------------------------
// GridIndex
// ---------------------------------------------------------------------------

type CellKey = [i32; 3];

#[derive(Debug, Clone, Copy)]
struct Body {
    position: Vec3,
    radius: f32,
}

/// Uniform hash-grid spatial index over a flat ground plane.
///
/// Bodies are bucketed by the cell containing their position. Queries scan
/// the cells overlapping the query sphere (widened by the largest body
/// radius) and then do an exact distance check. All maps are `BTreeMap`s so
/// results are deterministic.
#[derive(Debug)]
pub struct GridIndex {
    cell_size: f32,
    ground_height: f32,
    max_body_radius: f32,
    next_obstacle: u32,
    bodies: BTreeMap<SpatialHandle, Body>,
    cells: BTreeMap<CellKey, Vec<SpatialHandle>>,
}

impl GridIndex {
    /// Create an empty index.
    ///
    /// Non-positive or non-finite `cell_size` falls back to `1.0`.
    pub fn new(cell_size: f32, ground_height: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            ground_height,
            max_body_radius: 0.0,
            next_obstacle: 0,
            bodies: BTreeMap::new(),
            cells: BTreeMap::new(),
        }
    }

    /// Number of tracked bodies across all layers.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Add a static obstacle and return its handle.
    pub fn add_obstacle(&mut self, position: Vec3, radius: f32) -> SpatialHandle {
        let handle = SpatialHandle::Obstacle(self.next_obstacle);
        self.next_obstacle = self.next_obstacle.saturating_add(1);
        self.insert(handle, position, radius.max(0.0));
        handle
    }

    /// Move (or start tracking) a player body.
    pub fn set_player(&mut self, player: PlayerId, position: Vec3) {
        let handle = SpatialHandle::Player(player);
        self.remove(handle);
        self.insert(handle, position, 0.0);
    }

    #[allow(clippy::cast_possible_truncation)] // Arena coordinates are far inside i32 range.
    fn cell_of(&self, position: Vec3) -> CellKey {
        let c = (position / self.cell_size).floor();
        [c.x as i32, c.y as i32, c.z as i32]
    }

    fn insert(&mut self, handle: SpatialHandle, position: Vec3, radius: f32) {
        let key = self.cell_of(position);
        self.cells.entry(key).or_default().push(handle);
        self.bodies.insert(handle, Body { position, radius });
        if radius > self.max_body_radius {
            self.max_body_radius = radius;
        }
    }

    fn remove(&mut self, handle: SpatialHandle) {
        let Some(body) = self.bodies.remove(&handle) else {
            return;
        };
        let key = self.cell_of(body.position);
        if let Some(bucket) = self.cells.get_mut(&key) {
            bucket.retain(|h| *h != handle);
            if bucket.is_empty() {
                self.cells.remove(&key);
            }
        }
    }
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl SpatialIndex for GridIndex {
    fn query(&self, point: Vec3, radius: f32, filter: LayerFilter) -> Vec<SpatialHit> {
        if !radius.is_finite() || radius < 0.0 {
            return Vec::new();
        }
        let reach = Vec3::splat(radius + self.max_body_radius);
        let lo = self.cell_of(point - reach);
        let hi = self.cell_of(point + reach);

        let mut hits = Vec::new();
        let buckets = (lo[0]..=hi[0]).flat_map(move |x| {
            (lo[1]..=hi[1]).flat_map(move |y| self.cells.range([x, y, lo[2]]..=[x, y, hi[2]]))
        });
        for (_, bucket) in buckets {
            for &handle in bucket {
                if !filter.accepts(handle) {
                    continue;
                }
                let Some(body) = self.bodies.get(&handle) else {
                    continue;
                };
                let distance = (body.position.distance(point) - body.radius).max(0.0);
                if distance <= radius {
                    hits.push(SpatialHit {
                        handle,
                        position: body.position,
                        distance,
                    });
                }
            }
        }
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.handle.cmp(&b.handle))
        });
        hits
    }

    fn track_structure(&mut self, id: StructureId, position: Vec3) {
        let handle = SpatialHandle::Structure(id);
        self.remove(handle);
        self.insert(handle, position, 0.0);
    }

    fn untrack_structure(&mut self, id: StructureId) {
        self.remove(SpatialHandle::Structure(id));
        debug!(structure_id = %id, "Structure untracked");
    }
}

impl GroundProbe for GridIndex {
    fn probe(&self, base: Vec3, length: f32) -> bool {
        let height = base.y - self.ground_height;
        height >= -length && height <= length
    }
}
