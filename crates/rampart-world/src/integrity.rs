//! Structural integrity: support distances, stability, and collapse.
//!
//! A structure is held up either by the ground or by a neighbour within
//! `check_radius` that is itself grounded or stable above
//! `support_cutoff`. Support distance accumulates along the chain, and
//! stability falls linearly with it:
//!
//! ```text
//! stability = clamp(max_stability - distance * loss_per_unit, 0, max_stability)
//! ```
//!
//! Anything whose stability ends up below `min_stability` collapses, which
//! re-queues its neighbours. The engine never polls: callers mark topology
//! changes with [`IntegrityEngine::on_inserted`] and
//! [`IntegrityEngine::on_removed`], then call [`IntegrityEngine::resolve`]
//! once per operation.
//!
//! # Resolution pass
//!
//! 1. Gather the connected region around the dirty seeds (BFS over
//!    `check_radius` adjacency with a visited set).
//! 2. Run a multi-source shortest-distance relaxation from every grounded
//!    structure in the region. Only grounded structures or structures whose
//!    own stability exceeds `support_cutoff` relay support.
//! 3. Write back stability and support state, recording changes.
//! 4. Remove everything below `min_stability`, queue its neighbours, and
//!    repeat until the queue drains.
//!
//! Because step 2 is a pure function of live topology, resolving an
//! unchanged region produces no changes.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};

use glam::Vec3;
use serde::Deserialize;
use tracing::{debug, warn};

use rampart_types::{Structure, StructureId, SupportState};

use crate::error::WorldError;
use crate::registry::StructureRegistry;
use crate::spatial::{LayerFilter, SpatialHandle, SpatialIndex};

/// Stability changes smaller than this are not reported.
const STABILITY_EPSILON: f32 = 1e-4;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable integrity parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct IntegrityConfig {
    /// Maximum distance at which one structure can support another.
    #[serde(default = "default_check_radius")]
    pub check_radius: f32,

    /// Stability a non-grounded structure needs to relay support.
    #[serde(default = "default_support_cutoff")]
    pub support_cutoff: f32,

    /// Stability of a grounded structure.
    #[serde(default = "default_max_stability")]
    pub max_stability: f32,

    /// Stability below which a structure collapses.
    #[serde(default = "default_min_stability")]
    pub min_stability: f32,

    /// Stability lost per world unit of support distance.
    #[serde(default = "default_loss_per_unit")]
    pub loss_per_unit: f32,

    /// Length of the downward ground probe.
    #[serde(default = "default_probe_length")]
    pub probe_length: f32,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            check_radius: default_check_radius(),
            support_cutoff: default_support_cutoff(),
            max_stability: default_max_stability(),
            min_stability: default_min_stability(),
            loss_per_unit: default_loss_per_unit(),
            probe_length: default_probe_length(),
        }
    }
}

impl IntegrityConfig {
    /// Check `0 <= min_stability <= support_cutoff < max_stability` and
    /// that radius, loss, and probe length are positive and finite.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), WorldError> {
        let finite = [
            self.check_radius,
            self.support_cutoff,
            self.max_stability,
            self.min_stability,
            self.loss_per_unit,
            self.probe_length,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(WorldError::InvalidConfig(
                "all integrity values must be finite".to_owned(),
            ));
        }
        if self.check_radius <= 0.0 {
            return Err(WorldError::InvalidConfig("check_radius must be > 0".to_owned()));
        }
        if self.loss_per_unit <= 0.0 {
            return Err(WorldError::InvalidConfig("loss_per_unit must be > 0".to_owned()));
        }
        if self.probe_length <= 0.0 {
            return Err(WorldError::InvalidConfig("probe_length must be > 0".to_owned()));
        }
        if self.min_stability < 0.0 {
            return Err(WorldError::InvalidConfig("min_stability must be >= 0".to_owned()));
        }
        if self.min_stability > self.support_cutoff {
            return Err(WorldError::InvalidConfig(
                "min_stability must be <= support_cutoff".to_owned(),
            ));
        }
        if self.support_cutoff >= self.max_stability {
            return Err(WorldError::InvalidConfig(
                "support_cutoff must be < max_stability".to_owned(),
            ));
        }
        Ok(())
    }

    /// Stability at a given support distance.
    pub fn stability_at(&self, distance: f32) -> f32 {
        (self.max_stability - distance * self.loss_per_unit).clamp(0.0, self.max_stability)
    }
}

const fn default_check_radius() -> f32 {
    1.5
}

const fn default_support_cutoff() -> f32 {
    50.0
}

const fn default_max_stability() -> f32 {
    100.0
}

const fn default_min_stability() -> f32 {
    10.0
}

const fn default_loss_per_unit() -> f32 {
    10.0
}

const fn default_probe_length() -> f32 {
    0.25
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// A structure whose stability or support state changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityUpdate {
    /// The structure.
    pub id: StructureId,
    /// New stability.
    pub stability: f32,
    /// New support state.
    pub support: SupportState,
}

/// Everything one [`IntegrityEngine::resolve`] call did.
#[derive(Debug, Default)]
pub struct CascadeReport {
    /// Surviving structures whose state changed, in resolution order.
    pub changed: Vec<StabilityUpdate>,
    /// Structures removed by collapse, in removal order.
    pub collapsed: Vec<Structure>,
    /// Number of resolution passes run.
    pub passes: u32,
}

impl CascadeReport {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.collapsed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Min-heap entry for the support relaxation.
struct Frontier {
    distance: f32,
    id: StructureId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest distance is "greatest".
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Adjacency for one region, built during the BFS and reused by the
/// relaxation. Edges carry the physical gap.
type Adjacency = BTreeMap<StructureId, Vec<(StructureId, f32)>>;

/// Event-driven structural integrity solver.
#[derive(Debug, Default)]
pub struct IntegrityEngine {
    config: IntegrityConfig,
    dirty: BTreeSet<StructureId>,
}

impl IntegrityEngine {
    /// Create an engine with the given parameters.
    pub const fn new(config: IntegrityConfig) -> Self {
        Self {
            config,
            dirty: BTreeSet::new(),
        }
    }

    /// Queue a newly inserted structure.
    pub fn on_inserted(&mut self, id: StructureId) {
        self.dirty.insert(id);
    }

    /// Queue every structure within `check_radius` of a removed one.
    ///
    /// Call after the removed structure has been untracked.
    pub fn on_removed(&mut self, position: Vec3, spatial: &dyn SpatialIndex) {
        for id in neighbour_ids(spatial, position, self.config.check_radius) {
            self.dirty.insert(id);
        }
    }

    fn mark_all(&mut self, registry: &StructureRegistry) {
        self.dirty.extend(registry.ids());
    }

    /// Drop all queued work.
    pub fn clear_pending(&mut self) {
        self.dirty.clear();
    }

    /// Queue every live structure and resolve.
    pub fn recompute_all(
        &mut self,
        registry: &mut StructureRegistry,
        spatial: &mut dyn SpatialIndex,
    ) -> CascadeReport {
        self.mark_all(registry);
        self.resolve(registry, spatial)
    }

    /// Drain the queue, applying stability changes and collapses.
    ///
    /// Collapsed structures are removed from `registry` and untracked from
    /// `spatial` before this returns; no removed ID is left in either.
    pub fn resolve(
        &mut self,
        registry: &mut StructureRegistry,
        spatial: &mut dyn SpatialIndex,
    ) -> CascadeReport {
        let mut report = CascadeReport::default();

        while !self.dirty.is_empty() {
            report.passes = report.passes.saturating_add(1);
            let seeds = std::mem::take(&mut self.dirty);

            let adjacency = self.gather_region(&seeds, registry, &*spatial);
            let distances = self.relax(&adjacency, registry);

            let mut collapsing = Vec::new();
            for &id in adjacency.keys() {
                let Some(structure) = registry.get_mut(id) else {
                    continue;
                };
                let (stability, support) = self.classify(structure.is_grounded, distances.get(&id));
                let collapses = stability < self.config.min_stability;
                let support = if collapses {
                    SupportState::Collapsing
                } else {
                    support
                };

                let changed = (structure.stability - stability).abs() > STABILITY_EPSILON
                    || !same_support(structure.support, support);
                structure.stability = stability;
                structure.support = support;

                if collapses {
                    collapsing.push(id);
                } else if changed {
                    report.changed.push(StabilityUpdate {
                        id,
                        stability,
                        support,
                    });
                }
            }

            if collapsing.is_empty() {
                debug!(
                    region = adjacency.len(),
                    pass = report.passes,
                    "Integrity region settled"
                );
                continue;
            }

            for id in collapsing {
                let Some(mut removed) = registry.remove(id) else {
                    continue;
                };
                spatial.untrack_structure(id);
                removed.support = SupportState::Removed;
                self.on_removed(removed.position, &*spatial);
                report.collapsed.push(removed);
            }
            warn!(
                collapsed = report.collapsed.len(),
                pass = report.passes,
                "Structural collapse cascade"
            );
        }

        // Drop updates for structures that collapsed in a later pass.
        report.changed.retain(|u| registry.contains(u.id));
        report
    }

    /// BFS outward from the live seeds, returning the region's adjacency.
    fn gather_region(
        &self,
        seeds: &BTreeSet<StructureId>,
        registry: &StructureRegistry,
        spatial: &dyn SpatialIndex,
    ) -> Adjacency {
        let mut adjacency = Adjacency::new();
        let mut queue: VecDeque<StructureId> = seeds
            .iter()
            .copied()
            .filter(|id| registry.contains(*id))
            .collect();
        let mut visited: BTreeSet<StructureId> = queue.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            let Some(structure) = registry.get(id) else {
                continue;
            };
            let mut edges = Vec::new();
            for hit in spatial.query(structure.position, self.config.check_radius, LayerFilter::STRUCTURES)
            {
                let SpatialHandle::Structure(other) = hit.handle else {
                    continue;
                };
                if other == id || !registry.contains(other) {
                    continue;
                }
                edges.push((other, hit.distance));
                if visited.insert(other) {
                    queue.push_back(other);
                }
            }
            adjacency.insert(id, edges);
        }

        adjacency
    }

    /// Shortest support distance from any grounded structure in the region.
    fn relax(
        &self,
        adjacency: &Adjacency,
        registry: &StructureRegistry,
    ) -> BTreeMap<StructureId, f32> {
        let mut best: BTreeMap<StructureId, f32> = BTreeMap::new();
        let mut heap = BinaryHeap::new();

        for &id in adjacency.keys() {
            if registry.get(id).is_some_and(|s| s.is_grounded) {
                best.insert(id, 0.0);
                heap.push(Frontier { distance: 0.0, id });
            }
        }

        while let Some(Frontier { distance, id }) = heap.pop() {
            if best.get(&id).is_some_and(|&d| distance > d) {
                continue;
            }
            let grounded = registry.get(id).is_some_and(|s| s.is_grounded);
            if !grounded && self.config.stability_at(distance) <= self.config.support_cutoff {
                continue;
            }
            let Some(edges) = adjacency.get(&id) else {
                continue;
            };
            for &(other, gap) in edges {
                let candidate = distance + gap;
                let improves = best.get(&other).is_none_or(|&d| candidate < d);
                if improves {
                    best.insert(other, candidate);
                    heap.push(Frontier {
                        distance: candidate,
                        id: other,
                    });
                }
            }
        }

        best
    }

    fn classify(&self, is_grounded: bool, distance: Option<&f32>) -> (f32, SupportState) {
        if is_grounded {
            return (self.config.max_stability, SupportState::Grounded);
        }
        match distance {
            Some(&distance) => (
                self.config.stability_at(distance),
                SupportState::Supported { distance },
            ),
            None => (0.0, SupportState::Unsupported),
        }
    }
}

fn neighbour_ids(spatial: &dyn SpatialIndex, point: Vec3, radius: f32) -> Vec<StructureId> {
    spatial
        .query(point, radius, LayerFilter::STRUCTURES)
        .into_iter()
        .filter_map(|hit| match hit.handle {
            SpatialHandle::Structure(id) => Some(id),
            SpatialHandle::Obstacle(_) | SpatialHandle::Player(_) => None,
        })
        .collect()
}

fn same_support(a: SupportState, b: SupportState) -> bool {
    match (a, b) {
        (SupportState::Supported { distance: x }, SupportState::Supported { distance: y }) => {
            (x - y).abs() <= STABILITY_EPSILON
        }
        _ => std::mem::discriminant(&a) == std::mem::discriminant(&b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use rampart_types::{PlayerId, StructureType, TeamId};

    use crate::registry::SpawnParams;
    use crate::spatial::{GridIndex, GroundProbe};

    struct Arena {
        registry: StructureRegistry,
        grid: GridIndex,
        engine: IntegrityEngine,
        owner: PlayerId,
        team: TeamId,
    }

    impl Arena {
        fn new() -> Self {
            Self {
                registry: StructureRegistry::new(),
                grid: GridIndex::new(1.0, 0.0),
                engine: IntegrityEngine::new(IntegrityConfig::default()),
                owner: PlayerId::new(),
                team: TeamId::new(),
            }
        }

        fn place(&mut self, position: Vec3) -> StructureId {
            let probe = IntegrityConfig::default().probe_length;
            let id = self.registry.spawn(SpawnParams {
                owner: self.owner,
                team: self.team,
                structure_type: StructureType::Platform,
                position,
                rotation: Quat::IDENTITY,
                tick: 0,
                is_grounded: self.grid.probe(position, probe),
            });
            self.grid.track_structure(id, position);
            self.engine.on_inserted(id);
            id
        }

        fn remove(&mut self, id: StructureId) {
            if let Some(s) = self.registry.remove(id) {
                self.grid.untrack_structure(id);
                self.engine.on_removed(s.position, &self.grid);
            }
        }

        fn resolve(&mut self) -> CascadeReport {
            self.engine.resolve(&mut self.registry, &mut self.grid)
        }

        fn stability(&self, id: StructureId) -> Option<f32> {
            self.registry.get(id).map(|s| s.stability)
        }

        /// A vertical tower: grounded base at y=0 plus `height` pieces one
        /// unit apart.
        fn tower(&mut self, height: u8) -> Vec<StructureId> {
            (0..=height)
                .map(|y| self.place(Vec3::new(0.0, f32::from(y), 0.0)))
                .collect()
        }
    }

    fn approx(a: Option<f32>, b: f32) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-3)
    }

    #[test]
    fn default_config_is_valid() {
        assert!(IntegrityConfig::default().validate().is_ok());
    }

    #[test]
    fn config_rejects_min_above_cutoff() {
        let config = IntegrityConfig {
            min_stability: 60.0,
            ..IntegrityConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: Option<IntegrityConfig> =
            serde_json::from_str(r#"{"loss_per_unit": 20.0}"#).ok();
        assert_eq!(
            config,
            Some(IntegrityConfig {
                loss_per_unit: 20.0,
                ..IntegrityConfig::default()
            })
        );
    }

    #[test]
    fn config_rejects_cutoff_at_max() {
        let config = IntegrityConfig {
            support_cutoff: 100.0,
            ..IntegrityConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn grounded_structure_has_max_stability() {
        let mut arena = Arena::new();
        let id = arena.place(Vec3::ZERO);
        let report = arena.resolve();
        assert!(approx(arena.stability(id), 100.0));
        assert_eq!(
            arena.registry.get(id).map(|s| s.support),
            Some(SupportState::Grounded)
        );
        assert_eq!(report.changed.len(), 1);
    }

    #[test]
    fn stability_decreases_along_chain() {
        let mut arena = Arena::new();
        let ids = arena.tower(4);
        let report = arena.resolve();
        assert!(report.collapsed.is_empty());

        let values: Vec<f32> = ids.iter().filter_map(|id| arena.stability(*id)).collect();
        assert_eq!(values.len(), 5);
        for pair in values.windows(2) {
            if let [lower, upper] = pair {
                assert!(upper <= lower, "stability rose along the chain: {values:?}");
            }
        }
        assert!(approx(values.last().copied(), 60.0));
    }

    #[test]
    fn support_stops_at_cutoff_and_overhang_collapses() {
        let mut arena = Arena::new();
        // Base + 6: the piece at distance 5 sits exactly at the cutoff and
        // cannot relay, so the piece at distance 6 is unsupported.
        let ids = arena.tower(6);
        let report = arena.resolve();

        let collapsed: Vec<StructureId> = report.collapsed.iter().map(|s| s.id).collect();
        assert_eq!(collapsed, ids.get(6).copied().into_iter().collect::<Vec<_>>());
        assert!(approx(ids.get(5).and_then(|id| arena.stability(*id)), 50.0));
        assert_eq!(arena.registry.len(), 6);
    }

    #[test]
    fn removing_anchor_cascades_whole_tower() {
        let mut arena = Arena::new();
        let ids = arena.tower(3);
        arena.resolve();

        if let Some(&base) = ids.first() {
            arena.remove(base);
        }
        let report = arena.resolve();

        assert_eq!(report.collapsed.len(), 3);
        assert!(arena.registry.is_empty());
        assert!(arena.grid.is_empty());
        for id in &ids {
            assert!(!arena.registry.contains(*id));
        }
        assert!(report.changed.iter().all(|u| arena.registry.contains(u.id)));
    }

    #[test]
    fn second_anchor_keeps_bridge_standing() {
        let mut arena = Arena::new();
        // Two grounded posts two units apart, one raised piece between them.
        let left = arena.place(Vec3::new(0.0, 0.0, 0.0));
        let right = arena.place(Vec3::new(2.0, 0.0, 0.0));
        let span = arena.place(Vec3::new(1.0, 1.0, 0.0));
        arena.resolve();

        arena.remove(left);
        let report = arena.resolve();
        assert!(report.collapsed.is_empty());
        assert!(arena.registry.contains(span));
        assert!(arena.registry.contains(right));
        assert!(approx(arena.stability(span), 100.0 - 10.0 * 2.0_f32.sqrt()));
    }

    #[test]
    fn resolving_twice_changes_nothing() {
        let mut arena = Arena::new();
        arena.tower(4);
        arena.resolve();

        let again = arena.engine.recompute_all(&mut arena.registry, &mut arena.grid);
        assert!(again.is_empty());
        assert_eq!(again.passes, 1);
    }

    #[test]
    fn seeds_sharing_a_region_settle_in_one_pass() {
        let mut arena = Arena::new();
        let ids = arena.tower(4);

        let report = arena.resolve();
        assert_eq!(report.passes, 1);
        assert!(report.collapsed.is_empty());
        assert_eq!(report.changed.len(), ids.len());
        let mut seen = BTreeSet::new();
        assert!(report.changed.iter().all(|u| seen.insert(u.id)));
    }

    #[test]
    fn floating_piece_collapses_immediately() {
        let mut arena = Arena::new();
        let id = arena.place(Vec3::new(5.0, 4.0, 5.0));
        let report = arena.resolve();
        assert_eq!(report.collapsed.iter().map(|s| s.id).collect::<Vec<_>>(), vec![id]);
        assert_eq!(
            report.collapsed.first().map(|s| s.support),
            Some(SupportState::Removed)
        );
        assert_eq!(arena.resolve().passes, 0);
    }
}
