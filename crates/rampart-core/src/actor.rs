//! The per-match build actor.
//!
//! One [`MatchActor`] task owns one [`BuildOrchestrator`]. Commands arrive
//! on an `mpsc` channel and are handled strictly in receipt order; each one,
//! including any collapse cascade it triggers, completes before the next is
//! read. Replies go back on a `oneshot` per command, and every committed
//! [`MatchEvent`] is fanned out on a `broadcast` channel.
//!
//! A caller that drops its reply receiver does not cancel the operation.
//!
//! # Architecture
//!
//! ```text
//! MatchHandle --(mpsc<MatchCommand>)--> MatchActor --(broadcast<MatchEvent>)--> subscribers
//!      ^                                    |
//!      +------------(oneshot reply)---------+
//! ```

use std::time::Duration;

use glam::Vec3;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use rampart_build::BuildOrchestrator;
use rampart_types::{
    BlueprintSummary, Budget, DamageOutcome, DeployResult, MatchEvent, MatchId, PlacementRequest,
    PlacementResult, PlayerId, Rejection, RemovalCause, Structure, StructureId, TeamId,
};

/// Capacity of the command queue.
pub const COMMAND_CAPACITY: usize = 256;

/// Capacity of the event fan-out; slow subscribers that fall further behind
/// than this observe `RecvError::Lagged`.
pub const BROADCAST_CAPACITY: usize = 1024;

/// Errors seen by [`MatchHandle`] callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    /// The actor has stopped and accepts no more commands.
    #[error("match actor has stopped")]
    Closed,

    /// The actor stopped before replying.
    #[error("match actor stopped before replying")]
    NoReply,
}

/// Actor runtime settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorSettings {
    /// Which match this actor serves.
    pub match_id: MatchId,
    /// Real-time milliseconds per match tick.
    pub tick_interval_ms: u64,
    /// Budget granted to each player on registration.
    pub starting_budget: Budget,
}

type Reply<T> = oneshot::Sender<T>;

/// A request to the match actor.
#[derive(Debug)]
pub enum MatchCommand {
    /// Add a player to the match.
    RegisterPlayer {
        /// The player.
        player: PlayerId,
        /// The player's team.
        team: TeamId,
        /// `true` if newly registered.
        reply: Reply<bool>,
    },
    /// Place one structure.
    PlaceStructure {
        /// The client request.
        request: PlacementRequest,
        /// The placement outcome.
        reply: Reply<PlacementResult>,
    },
    /// Remove a structure.
    RemoveStructure {
        /// The structure.
        id: StructureId,
        /// Why it is being removed.
        cause: RemovalCause,
        /// The removed structure.
        reply: Reply<Result<Structure, Rejection>>,
    },
    /// Apply damage to a structure.
    DamageStructure {
        /// The structure.
        id: StructureId,
        /// Health to subtract.
        amount: u32,
        /// The damage outcome.
        reply: Reply<Result<DamageOutcome, Rejection>>,
    },
    /// Save a blueprint.
    SaveBlueprint {
        /// Owning player.
        owner: PlayerId,
        /// Blueprint name.
        name: String,
        /// Capture anchor.
        anchor: Vec3,
        /// The stored blueprint's summary.
        reply: Reply<Result<BlueprintSummary, Rejection>>,
    },
    /// Deploy a blueprint.
    DeployBlueprint {
        /// Owning player.
        owner: PlayerId,
        /// Blueprint name.
        name: String,
        /// New anchor.
        anchor: Vec3,
        /// The itemized deployment result.
        reply: Reply<Result<DeployResult, Rejection>>,
    },
    /// Delete a blueprint.
    DeleteBlueprint {
        /// Owning player.
        owner: PlayerId,
        /// Blueprint name.
        name: String,
        /// Deletion outcome.
        reply: Reply<Result<(), Rejection>>,
    },
    /// List a player's blueprints.
    ListBlueprints {
        /// Owning player.
        owner: PlayerId,
        /// Summaries in name order.
        reply: Reply<Vec<BlueprintSummary>>,
    },
    /// Look up a structure.
    GetStructure {
        /// The structure.
        id: StructureId,
        /// A copy of the structure, if live.
        reply: Reply<Option<Structure>>,
    },
    /// Read a player's budget.
    GetBudget {
        /// The player.
        player: PlayerId,
        /// The budget, if the player is known.
        reply: Reply<Option<Budget>>,
    },
    /// Remove every structure.
    ClearStructures {
        /// Number removed.
        reply: Reply<usize>,
    },
    /// Stop the actor after draining nothing further.
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable client side of a running match actor.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    commands: mpsc::Sender<MatchCommand>,
    events: broadcast::Sender<MatchEvent>,
}

impl MatchHandle {
    /// Which match this handle talks to.
    pub const fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Receive every event committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.events.subscribe()
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> MatchCommand,
    ) -> Result<T, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| ActorError::Closed)?;
        rx.await.map_err(|_| ActorError::NoReply)
    }

    /// Register a player with the configured starting budget.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn register_player(&self, player: PlayerId, team: TeamId) -> Result<bool, ActorError> {
        self.call(|reply| MatchCommand::RegisterPlayer {
            player,
            team,
            reply,
        })
        .await
    }

    /// Submit a placement request.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn place(&self, request: PlacementRequest) -> Result<PlacementResult, ActorError> {
        self.call(|reply| MatchCommand::PlaceStructure { request, reply })
            .await
    }

    /// Remove a structure.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn remove(
        &self,
        id: StructureId,
        cause: RemovalCause,
    ) -> Result<Result<Structure, Rejection>, ActorError> {
        self.call(|reply| MatchCommand::RemoveStructure { id, cause, reply })
            .await
    }

    /// Apply damage to a structure.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn damage(
        &self,
        id: StructureId,
        amount: u32,
    ) -> Result<Result<DamageOutcome, Rejection>, ActorError> {
        self.call(|reply| MatchCommand::DamageStructure { id, amount, reply })
            .await
    }

    /// Save a blueprint around `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn save_blueprint(
        &self,
        owner: PlayerId,
        name: impl Into<String>,
        anchor: Vec3,
    ) -> Result<Result<BlueprintSummary, Rejection>, ActorError> {
        let name = name.into();
        self.call(|reply| MatchCommand::SaveBlueprint {
            owner,
            name,
            anchor,
            reply,
        })
        .await
    }

    /// Deploy a blueprint at `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn deploy_blueprint(
        &self,
        owner: PlayerId,
        name: impl Into<String>,
        anchor: Vec3,
    ) -> Result<Result<DeployResult, Rejection>, ActorError> {
        let name = name.into();
        self.call(|reply| MatchCommand::DeployBlueprint {
            owner,
            name,
            anchor,
            reply,
        })
        .await
    }

    /// Delete a blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn delete_blueprint(
        &self,
        owner: PlayerId,
        name: impl Into<String>,
    ) -> Result<Result<(), Rejection>, ActorError> {
        let name = name.into();
        self.call(|reply| MatchCommand::DeleteBlueprint { owner, name, reply })
            .await
    }

    /// List a player's blueprints.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn list_blueprints(
        &self,
        owner: PlayerId,
    ) -> Result<Vec<BlueprintSummary>, ActorError> {
        self.call(|reply| MatchCommand::ListBlueprints { owner, reply })
            .await
    }

    /// Look up a structure.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn get(&self, id: StructureId) -> Result<Option<Structure>, ActorError> {
        self.call(|reply| MatchCommand::GetStructure { id, reply })
            .await
    }

    /// Read a player's budget.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn budget(&self, player: PlayerId) -> Result<Option<Budget>, ActorError> {
        self.call(|reply| MatchCommand::GetBudget { player, reply })
            .await
    }

    /// Remove every structure.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError`] if the actor is gone.
    pub async fn clear_structures(&self) -> Result<usize, ActorError> {
        self.call(|reply| MatchCommand::ClearStructures { reply })
            .await
    }

    /// Ask the actor to stop.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Closed`] if it has already stopped.
    pub async fn shutdown(&self) -> Result<(), ActorError> {
        self.commands
            .send(MatchCommand::Shutdown)
            .await
            .map_err(|_| ActorError::Closed)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The task that owns a match's build state.
#[derive(Debug)]
pub struct MatchActor {
    settings: ActorSettings,
    orchestrator: BuildOrchestrator,
    commands: mpsc::Receiver<MatchCommand>,
    events: broadcast::Sender<MatchEvent>,
    started: Instant,
}

impl MatchActor {
    /// Create an actor and its handle without starting it.
    pub fn new(settings: ActorSettings, orchestrator: BuildOrchestrator) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        let handle = MatchHandle {
            match_id: settings.match_id,
            commands: command_tx,
            events: events.clone(),
        };
        let actor = Self {
            settings,
            orchestrator,
            commands: command_rx,
            events,
            started: Instant::now(),
        };
        (actor, handle)
    }

    /// Create an actor and run it on the current tokio runtime.
    ///
    /// The join handle yields the orchestrator once the actor stops.
    pub fn spawn(
        settings: ActorSettings,
        orchestrator: BuildOrchestrator,
    ) -> (MatchHandle, JoinHandle<BuildOrchestrator>) {
        let (actor, handle) = Self::new(settings, orchestrator);
        (handle, tokio::spawn(actor.run()))
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) -> BuildOrchestrator {
        let match_id = self.settings.match_id;
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.settings.tick_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(match_id = %match_id, "Match actor started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        info!(match_id = %match_id, "All match handles dropped");
                        break;
                    };
                    if !self.handle(command) {
                        info!(match_id = %match_id, "Match actor shutting down");
                        break;
                    }
                    self.publish();
                }
                _ = ticker.tick() => {
                    let tick = self.orchestrator.tick().saturating_add(1);
                    self.orchestrator.set_tick(tick);
                }
            }
        }

        if let Err(anomaly) = self.orchestrator.reconcile_ledger() {
            warn!(match_id = %match_id, %anomaly, "Match ended with a ledger anomaly");
        }
        self.orchestrator
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Handle one command. Returns `false` on shutdown.
    fn handle(&mut self, command: MatchCommand) -> bool {
        let now_ms = self.now_ms();
        let orch = &mut self.orchestrator;
        match command {
            MatchCommand::RegisterPlayer {
                player,
                team,
                reply,
            } => {
                let added = orch.register_player(player, team, self.settings.starting_budget);
                respond(reply, added);
            }
            MatchCommand::PlaceStructure { request, reply } => {
                respond(reply, orch.place(request, now_ms));
            }
            MatchCommand::RemoveStructure { id, cause, reply } => {
                respond(reply, orch.remove(id, cause));
            }
            MatchCommand::DamageStructure { id, amount, reply } => {
                respond(reply, orch.apply_damage(id, amount));
            }
            MatchCommand::SaveBlueprint {
                owner,
                name,
                anchor,
                reply,
            } => {
                respond(reply, orch.save_blueprint(owner, &name, anchor));
            }
            MatchCommand::DeployBlueprint {
                owner,
                name,
                anchor,
                reply,
            } => {
                respond(reply, orch.deploy_blueprint(owner, &name, anchor, now_ms));
            }
            MatchCommand::DeleteBlueprint { owner, name, reply } => {
                respond(reply, orch.delete_blueprint(owner, &name));
            }
            MatchCommand::ListBlueprints { owner, reply } => {
                respond(reply, orch.list_blueprints(owner));
            }
            MatchCommand::GetStructure { id, reply } => {
                respond(reply, orch.get(id).cloned());
            }
            MatchCommand::GetBudget { player, reply } => {
                respond(reply, orch.budget(player));
            }
            MatchCommand::ClearStructures { reply } => {
                respond(reply, orch.clear_structures());
            }
            MatchCommand::Shutdown => return false,
        }
        true
    }

    fn publish(&mut self) {
        for event in self.orchestrator.drain_events() {
            // No subscribers is not an error; the event is simply unobserved.
            if self.events.send(event).is_err() {
                debug!(match_id = %self.settings.match_id, "Event dropped with no subscribers");
            }
        }
    }
}

fn respond<T>(reply: Reply<T>, value: T) {
    if reply.send(value).is_err() {
        debug!("Caller dropped its reply channel");
    }
}
