//! The build orchestrator: one match's authoritative build state.
//!
//! Every inbound build operation runs to completion here, including any
//! collapse cascade it triggers, before the next one is looked at. Each
//! committed change is appended to an outbox of [`MatchEvent`]s that the
//! caller drains and fans out.
//!
//! Flow for a placement:
//!
//! ```text
//! known player? -> rate limit -> phase -> grid re-snap -> validate_placement
//!     -> ledger spend -> registry spawn -> spatial track
//!     -> integrity on_inserted -> resolve -> events
//! ```

use std::collections::BTreeMap;

use glam::Vec3;
use serde::Deserialize;
use tracing::{debug, error, info};

use rampart_ledger::{EconomyLedger, LedgerAnomaly};
use rampart_types::{
    Budget, BlueprintSummary, DamageOutcome, DeployEntryOutcome, DeployResult, MatchEvent, Phase,
    PlacementRequest, PlacementResult, PlayerId, Rejection, RejectionReason, RemovalCause,
    Structure, StructureId, TeamId,
};
use rampart_world::{
    ArenaGeometry, CascadeReport, IntegrityConfig, IntegrityEngine, SpatialIndex, SpawnParams,
    StructureRegistry,
};

use crate::blueprint::{BlueprintConfig, BlueprintStore, not_found};
use crate::error::BuildError;
use crate::grid::{GridSnap, SnapError};
use crate::rate_limit::{RateLimitConfig, RateLimiter, Throttle};
use crate::validation::{
    PlacementConfig, PlacementContext, PlacementTicket, validate_phase, validate_placement,
};

// ---------------------------------------------------------------------------
// Collaborators and settings
// ---------------------------------------------------------------------------

/// Read-only view of the round state machine.
pub trait MatchContext {
    /// The current match phase.
    fn current_phase(&self) -> Phase;

    /// Where `player` spawns, if known.
    fn spawn_position(&self, player: PlayerId) -> Option<Vec3>;
}

/// Tunables for every build subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct BuildSettings {
    /// Placement geometry.
    #[serde(default)]
    pub placement: PlacementConfig,
    /// Structural integrity.
    #[serde(default)]
    pub integrity: IntegrityConfig,
    /// Request throttling.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Blueprint limits.
    #[serde(default)]
    pub blueprints: BlueprintConfig,
}

impl BuildSettings {
    /// Check cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidConfig`] or a wrapped world error.
    pub fn validate(&self) -> Result<(), BuildError> {
        self.integrity.validate()?;
        let p = &self.placement;
        if !(p.max_build_distance.is_finite() && p.max_build_distance > 0.0) {
            return Err(BuildError::InvalidConfig(
                "placement.max_build_distance must be > 0".to_owned(),
            ));
        }
        if !(p.min_separation.is_finite() && p.min_separation >= 0.0) {
            return Err(BuildError::InvalidConfig(
                "placement.min_separation must be >= 0".to_owned(),
            ));
        }
        if !(p.grid_size.is_finite() && p.grid_size > 0.0) {
            return Err(BuildError::InvalidConfig(
                "placement.grid_size must be > 0".to_owned(),
            ));
        }
        if !(p.snap_tolerance.is_finite() && p.snap_tolerance >= 0.0) {
            return Err(BuildError::InvalidConfig(
                "placement.snap_tolerance must be >= 0".to_owned(),
            ));
        }
        if !(p.rotation_step_degrees.is_finite() && p.rotation_step_degrees > 0.0) {
            return Err(BuildError::InvalidConfig(
                "placement.rotation_step_degrees must be > 0".to_owned(),
            ));
        }
        if self.rate_limit.max_per_window == 0 || self.rate_limit.window_ms == 0 {
            return Err(BuildError::InvalidConfig(
                "rate_limit.window_ms and rate_limit.max_per_window must be > 0".to_owned(),
            ));
        }
        let radius = self.blueprints.capture_radius;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(BuildError::InvalidConfig(
                "blueprints.capture_radius must be > 0".to_owned(),
            ));
        }
        if self.blueprints.max_name_len == 0 {
            return Err(BuildError::InvalidConfig(
                "blueprints.max_name_len must be > 0".to_owned(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Owns every piece of one match's build state.
pub struct BuildOrchestrator {
    settings: BuildSettings,
    snap: GridSnap,
    registry: StructureRegistry,
    ledger: EconomyLedger,
    limiter: RateLimiter,
    integrity: IntegrityEngine,
    blueprints: BlueprintStore,
    arena: Box<dyn ArenaGeometry + Send>,
    context: Box<dyn MatchContext + Send>,
    players: BTreeMap<PlayerId, TeamId>,
    tick: u64,
    outbox: Vec<MatchEvent>,
}

impl core::fmt::Debug for BuildOrchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("structures", &self.registry.len())
            .field("players", &self.players.len())
            .field("tick", &self.tick)
            .field("pending_events", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl BuildOrchestrator {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        settings: BuildSettings,
        arena: Box<dyn ArenaGeometry + Send>,
        context: Box<dyn MatchContext + Send>,
    ) -> Self {
        let p = &settings.placement;
        Self {
            snap: GridSnap::new(p.grid_size, p.rotation_step_degrees, p.snap_tolerance),
            registry: StructureRegistry::new(),
            ledger: EconomyLedger::new(),
            limiter: RateLimiter::new(settings.rate_limit),
            integrity: IntegrityEngine::new(settings.integrity),
            blueprints: BlueprintStore::new(settings.blueprints),
            arena,
            context,
            players: BTreeMap::new(),
            tick: 0,
            outbox: Vec::new(),
            settings,
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// The active settings.
    pub const fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Look up a live structure.
    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.registry.get(id)
    }

    /// The structure registry.
    pub const fn registry(&self) -> &StructureRegistry {
        &self.registry
    }

    /// The arena's spatial index.
    pub fn spatial(&self) -> &dyn SpatialIndex {
        self.arena.as_spatial()
    }

    /// The economy ledger.
    pub const fn ledger(&self) -> &EconomyLedger {
        &self.ledger
    }

    /// Replay the ledger journal against live balances.
    ///
    /// # Errors
    ///
    /// Returns the [`LedgerAnomaly`] after logging it.
    pub fn reconcile_ledger(&self) -> Result<(), LedgerAnomaly> {
        self.ledger.reconcile().inspect_err(|anomaly| {
            error!(
                mismatches = anomaly.mismatches.len(),
                message = %anomaly.message,
                "Ledger reconciliation failed"
            );
        })
    }

    /// A player's current budget.
    pub fn budget(&self, player: PlayerId) -> Option<Budget> {
        self.ledger.budget(player)
    }

    /// The current match tick.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Set the match tick stamped on new structures and blueprints.
    pub const fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Take every event committed since the last drain.
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.outbox)
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Add a player with a starting budget.
    ///
    /// Returns `false` (and changes nothing) if the player is already known.
    pub fn register_player(&mut self, player: PlayerId, team: TeamId, budget: Budget) -> bool {
        if self.players.contains_key(&player) {
            return false;
        }
        match self.ledger.open_account(player, budget) {
            Ok(changes) => {
                self.players.insert(player, team);
                self.outbox.extend(changes.into_iter().map(MatchEvent::from));
                info!(player = %player, team = %team, ?budget, "Player registered");
                true
            }
            Err(e) => {
                error!(player = %player, error = %e, "Ledger refused a new player account");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Run one client placement request through the full pipeline.
    pub fn place(&mut self, request: PlacementRequest, now_ms: u64) -> PlacementResult {
        let result = self.place_inner(request, now_ms);
        match &result {
            Ok(id) => {
                info!(
                    player = %request.requester,
                    structure_id = %id,
                    structure_type = ?request.structure_type,
                    "Placement accepted"
                );
            }
            Err(rejection) => {
                debug!(
                    player = %request.requester,
                    reason = ?rejection.reason,
                    message = %rejection.message,
                    "Placement rejected"
                );
            }
        }
        let report = self.integrity.resolve(&mut self.registry, self.arena.as_spatial_mut());
        self.publish_cascade(report);
        match result {
            Ok(structure_id) => PlacementResult::Accepted { structure_id },
            Err(rejection) => PlacementResult::Rejected(rejection),
        }
    }

    fn place_inner(
        &mut self,
        request: PlacementRequest,
        now_ms: u64,
    ) -> Result<StructureId, Rejection> {
        let team = self.require_player(request.requester)?;
        self.throttle(request.requester, now_ms)?;
        // Outside the build phase nothing else about the request matters.
        validate_phase(self.context.current_phase())?;

        let position = self.snap.snap_client(request.position).map_err(snap_rejection)?;
        let canonical = PlacementRequest {
            position,
            rotation: self.snap.snap_rotation(request.rotation),
            ..request
        };
        self.place_canonical(&canonical, team)
    }

    /// Validate and commit an already-snapped request. Does not resolve
    /// integrity; callers batch that per operation.
    fn place_canonical(
        &mut self,
        request: &PlacementRequest,
        team: TeamId,
    ) -> Result<StructureId, Rejection> {
        let budget = self.ledger.budget(request.requester).unwrap_or_default();
        let ctx = PlacementContext {
            phase: self.context.current_phase(),
            spawn: self.context.spawn_position(request.requester),
            budget,
            spatial: self.arena.as_spatial(),
            config: &self.settings.placement,
        };
        let ticket = validate_placement(request, &ctx)?;
        self.commit(ticket, team)
    }

    fn commit(&mut self, ticket: PlacementTicket, team: TeamId) -> Result<StructureId, Rejection> {
        let costs = BTreeMap::from([(ticket.category, ticket.cost)]);
        let changes = self.ledger.try_spend(ticket.owner, &costs).map_err(|e| {
            error!(player = %ticket.owner, error = %e, "Ledger rejected a validated spend");
            Rejection::new(RejectionReason::InsufficientBudget, e.to_string())
        })?;

        let is_grounded = self
            .arena
            .probe(ticket.position, self.settings.integrity.probe_length);
        let id = self.registry.spawn(SpawnParams {
            owner: ticket.owner,
            team,
            structure_type: ticket.structure_type,
            position: ticket.position,
            rotation: ticket.rotation,
            tick: self.tick,
            is_grounded,
        });
        self.arena.track_structure(id, ticket.position);
        self.integrity.on_inserted(id);

        self.outbox.push(MatchEvent::StructurePlaced {
            id,
            structure_type: ticket.structure_type,
            position: ticket.position,
            rotation: ticket.rotation,
            owner: ticket.owner,
        });
        self.outbox.extend(changes.into_iter().map(MatchEvent::from));
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Removal and damage
    // -----------------------------------------------------------------------

    /// Remove a structure and settle whatever it was holding up.
    ///
    /// Budget is never refunded.
    ///
    /// # Errors
    ///
    /// [`RejectionReason::StructureNotFound`] if `id` is not live.
    pub fn remove(&mut self, id: StructureId, cause: RemovalCause) -> Result<Structure, Rejection> {
        let removed = self.detach(id, cause)?;
        let report = self.integrity.resolve(&mut self.registry, self.arena.as_spatial_mut());
        self.publish_cascade(report);
        Ok(removed)
    }

    /// Apply damage from the health system; removes the structure at zero.
    ///
    /// # Errors
    ///
    /// [`RejectionReason::StructureNotFound`] if `id` is not live.
    pub fn apply_damage(&mut self, id: StructureId, amount: u32) -> Result<DamageOutcome, Rejection> {
        let structure = self.registry.get_mut(id).ok_or_else(|| structure_not_found(id))?;
        structure.current_health = structure.current_health.saturating_sub(amount);
        let remaining_health = structure.current_health;
        debug!(structure_id = %id, amount, remaining_health, "Structure damaged");

        if remaining_health > 0 {
            return Ok(DamageOutcome::Damaged { remaining_health });
        }
        self.remove(id, RemovalCause::Destroyed)?;
        Ok(DamageOutcome::Destroyed)
    }

    /// Remove every structure (round reset).
    pub fn clear_structures(&mut self) -> usize {
        let cleared = self.registry.clear();
        for structure in &cleared {
            self.arena.untrack_structure(structure.id);
            self.outbox.push(MatchEvent::StructureRemoved {
                id: structure.id,
                cause: RemovalCause::Cleared,
            });
        }
        self.integrity.clear_pending();
        info!(count = cleared.len(), "Structures cleared");
        cleared.len()
    }

    /// Rebuild stability for every live structure.
    pub fn recompute_integrity(&mut self) -> usize {
        let report = self
            .integrity
            .recompute_all(&mut self.registry, self.arena.as_spatial_mut());
        let touched = report.changed.len().saturating_add(report.collapsed.len());
        self.publish_cascade(report);
        touched
    }

    fn detach(&mut self, id: StructureId, cause: RemovalCause) -> Result<Structure, Rejection> {
        let removed = self.registry.remove(id).ok_or_else(|| structure_not_found(id))?;
        self.arena.untrack_structure(id);
        self.integrity.on_removed(removed.position, self.arena.as_spatial());
        self.outbox.push(MatchEvent::StructureRemoved { id, cause });
        info!(structure_id = %id, ?cause, "Structure removed");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Blueprints
    // -----------------------------------------------------------------------

    /// Snapshot the player's nearby structures as a named blueprint.
    ///
    /// # Errors
    ///
    /// [`RejectionReason::UnknownPlayer`], [`RejectionReason::InvalidPosition`]
    /// for a non-finite anchor, or any blueprint-store rejection.
    pub fn save_blueprint(
        &mut self,
        owner: PlayerId,
        name: &str,
        anchor: Vec3,
    ) -> Result<BlueprintSummary, Rejection> {
        self.require_player(owner)?;
        let anchor = self.snap_anchor(anchor)?;
        let saved = self
            .blueprints
            .save(owner, name, anchor, self.tick, &self.registry)?;
        let summary = BlueprintSummary::from(saved);
        self.outbox.push(MatchEvent::BlueprintSaved {
            owner,
            name: summary.name.clone(),
            entry_count: summary.entry_count,
        });
        Ok(summary)
    }

    /// Replay a blueprint at `anchor` through the placement pipeline.
    ///
    /// Costs one rate-limit token. Each entry is validated and charged on
    /// its own, so partial success is normal; integrity is resolved once
    /// after every entry has been attempted.
    ///
    /// # Errors
    ///
    /// [`RejectionReason::UnknownPlayer`], [`RejectionReason::BlueprintNotFound`],
    /// [`RejectionReason::InvalidPosition`], or [`RejectionReason::RateLimited`]. Per-entry failures are reported in
    /// the [`DeployResult`], not here.
    pub fn deploy_blueprint(
        &mut self,
        owner: PlayerId,
        name: &str,
        anchor: Vec3,
        now_ms: u64,
    ) -> Result<DeployResult, Rejection> {
        let team = self.require_player(owner)?;
        let blueprint = self
            .blueprints
            .get(owner, name)
            .cloned()
            .ok_or_else(|| not_found(name))?;
        let anchor = self.snap_anchor(anchor)?;
        self.throttle(owner, now_ms)?;

        let mut entries = Vec::with_capacity(blueprint.entries.len());
        let mut placed: u32 = 0;

        for (index, entry) in (0_u32..).zip(blueprint.entries.iter()) {
            let request = PlacementRequest {
                position: self.snap.snap_position(anchor + entry.offset),
                rotation: self.snap.snap_rotation(entry.rotation),
                structure_type: entry.structure_type,
                requester: owner,
                timestamp_ms: now_ms,
            };
            let result = match self.place_canonical(&request, team) {
                Ok(structure_id) => {
                    placed = placed.saturating_add(1);
                    PlacementResult::Accepted { structure_id }
                }
                Err(rejection) => PlacementResult::Rejected(rejection),
            };
            entries.push(DeployEntryOutcome {
                index,
                structure_type: entry.structure_type,
                result,
            });
        }

        let attempted = u32::try_from(entries.len()).unwrap_or(u32::MAX);
        let report = self.integrity.resolve(&mut self.registry, self.arena.as_spatial_mut());
        self.publish_cascade(report);

        self.outbox.push(MatchEvent::BlueprintDeployed {
            owner,
            name: blueprint.name.clone(),
            placed,
            attempted,
        });
        info!(
            owner = %owner,
            name = %blueprint.name,
            placed,
            attempted,
            "Blueprint deployed"
        );

        Ok(DeployResult {
            placed,
            attempted,
            entries,
        })
    }

    /// Delete one of the player's blueprints.
    ///
    /// # Errors
    ///
    /// [`RejectionReason::BlueprintNotFound`].
    pub fn delete_blueprint(&mut self, owner: PlayerId, name: &str) -> Result<(), Rejection> {
        let removed = self.blueprints.delete(owner, name)?;
        self.outbox.push(MatchEvent::BlueprintDeleted {
            owner,
            name: removed.name,
        });
        Ok(())
    }

    /// The player's blueprints in name order.
    pub fn list_blueprints(&self, owner: PlayerId) -> Vec<BlueprintSummary> {
        self.blueprints.list(owner)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn require_player(&self, player: PlayerId) -> Result<TeamId, Rejection> {
        self.players.get(&player).copied().ok_or_else(|| {
            Rejection::new(
                RejectionReason::UnknownPlayer,
                "player has not joined this match",
            )
        })
    }

    fn snap_anchor(&self, anchor: Vec3) -> Result<Vec3, Rejection> {
        if anchor.is_finite() {
            Ok(self.snap.snap_position(anchor))
        } else {
            Err(snap_rejection(SnapError::NonFinite))
        }
    }

    fn throttle(&mut self, player: PlayerId, now_ms: u64) -> Result<(), Rejection> {
        self.limiter.try_consume(player, now_ms).map_err(|throttle| {
            let message = match throttle {
                Throttle::Window { retry_after_ms } => {
                    format!("too many build requests; retry in {retry_after_ms} ms")
                }
                Throttle::Cooldown { retry_after_ms } => {
                    format!("build requests too close together; retry in {retry_after_ms} ms")
                }
            };
            Rejection::new(RejectionReason::RateLimited, message)
        })
    }

    fn publish_cascade(&mut self, report: CascadeReport) {
        if report.is_empty() {
            return;
        }
        if !report.collapsed.is_empty() {
            info!(
                collapsed = report.collapsed.len(),
                passes = report.passes,
                "Collapse cascade published"
            );
        }
        for update in report.changed {
            self.outbox.push(MatchEvent::StabilityChanged {
                id: update.id,
                stability: update.stability,
                support: update.support,
            });
        }
        for structure in report.collapsed {
            self.outbox.push(MatchEvent::StructureRemoved {
                id: structure.id,
                cause: RemovalCause::Collapsed,
            });
        }
    }
}

fn structure_not_found(id: StructureId) -> Rejection {
    Rejection::new(
        RejectionReason::StructureNotFound,
        format!("structure {id} does not exist"),
    )
}

fn snap_rejection(error: SnapError) -> Rejection {
    let message = match error {
        SnapError::NonFinite => "position is not a finite point".to_owned(),
        SnapError::OffGrid { deviation } => {
            format!("position is {deviation:.3} units off the build grid")
        }
    };
    Rejection::new(RejectionReason::InvalidPosition, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(BuildSettings::default().validate().is_ok());
    }

    #[test]
    fn bad_snap_and_capture_values_are_rejected() {
        let mut cases = Vec::new();
        for snap_tolerance in [-0.1, f32::NAN] {
            let mut settings = BuildSettings::default();
            settings.placement.snap_tolerance = snap_tolerance;
            cases.push(settings);
        }
        for rotation_step_degrees in [0.0, f32::INFINITY] {
            let mut settings = BuildSettings::default();
            settings.placement.rotation_step_degrees = rotation_step_degrees;
            cases.push(settings);
        }
        for capture_radius in [-2.0, 0.0, f32::NAN] {
            let mut settings = BuildSettings::default();
            settings.blueprints.capture_radius = capture_radius;
            cases.push(settings);
        }
        for settings in cases {
            assert!(
                matches!(settings.validate(), Err(BuildError::InvalidConfig(_))),
                "accepted {settings:?}"
            );
        }
    }
}
