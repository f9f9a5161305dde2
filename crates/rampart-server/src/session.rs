//! Translates protocol messages into match actor calls.

use glam::{Quat, Vec3};
use tokio::time::Instant;
use tracing::{info, warn};

use rampart_core::config::ArenaConfig;
use rampart_core::{MatchHandle, RoundControl};
use rampart_types::{PlacementRequest, TeamId};

use crate::error::ServerError;
use crate::protocol::{ClientMessage, ServerMessage};

/// One driver connection's view of a running match.
#[derive(Debug)]
pub struct Session {
    handle: MatchHandle,
    control: RoundControl,
    arena: ArenaConfig,
    teams: Vec<TeamId>,
    joined: usize,
    started: Instant,
}

impl Session {
    /// Create a session; one team is created per spawn point.
    pub fn new(handle: MatchHandle, control: RoundControl, arena: ArenaConfig) -> Self {
        let teams = arena.spawn_points.iter().map(|_| TeamId::new()).collect();
        Self {
            handle,
            control,
            arena,
            teams,
            joined: 0,
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn slot(&self) -> (Vec3, TeamId) {
        let spawn = self.arena.spawn_for(self.joined).unwrap_or(Vec3::ZERO);
        let team = self
            .joined
            .checked_rem(self.teams.len())
            .and_then(|i| self.teams.get(i))
            .copied()
            .unwrap_or_default();
        (spawn, team)
    }

    /// Handle one message. Returns `None` when the driver asked to stop.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Actor`] if the match actor has stopped.
    pub async fn dispatch(
        &mut self,
        message: ClientMessage,
    ) -> Result<Option<ServerMessage>, ServerError> {
        let reply = match message {
            ClientMessage::Join { player, team } => {
                let player = player.unwrap_or_default();
                let (spawn, default_team) = self.slot();
                let team = team.unwrap_or(default_team);
                if self.handle.register_player(player, team).await? {
                    self.control.assign_spawn(player, spawn);
                    self.joined = self.joined.saturating_add(1);
                    info!(player = %player, team = %team, ?spawn, "Player joined");
                    ServerMessage::Joined {
                        player,
                        team,
                        spawn,
                    }
                } else {
                    ServerMessage::Error {
                        message: format!("player {player} has already joined"),
                    }
                }
            }
            ClientMessage::SetPhase { phase } => {
                self.control.set_phase(phase);
                ServerMessage::PhaseSet { phase }
            }
            ClientMessage::PlaceStructure {
                player,
                structure_type,
                position,
                rotation,
            } => {
                let request = PlacementRequest {
                    position,
                    rotation: rotation.unwrap_or(Quat::IDENTITY),
                    structure_type,
                    requester: player,
                    timestamp_ms: self.elapsed_ms(),
                };
                let result = self.handle.place(request).await?;
                ServerMessage::Placement { result }
            }
            ClientMessage::RemoveStructure { id, cause } => {
                match self.handle.remove(id, cause).await? {
                    Ok(removed) => ServerMessage::Removed { id: removed.id },
                    Err(rejection) => rejection.into(),
                }
            }
            ClientMessage::DamageStructure { id, amount } => {
                match self.handle.damage(id, amount).await? {
                    Ok(outcome) => ServerMessage::Damaged { id, outcome },
                    Err(rejection) => rejection.into(),
                }
            }
            ClientMessage::SaveBlueprint {
                player,
                name,
                anchor,
            } => match self.handle.save_blueprint(player, name, anchor).await? {
                Ok(summary) => ServerMessage::BlueprintStored { summary },
                Err(rejection) => rejection.into(),
            },
            ClientMessage::DeployBlueprint {
                player,
                name,
                anchor,
            } => match self.handle.deploy_blueprint(player, name, anchor).await? {
                Ok(result) => ServerMessage::Deployment { result },
                Err(rejection) => rejection.into(),
            },
            ClientMessage::DeleteBlueprint { player, name } => {
                match self.handle.delete_blueprint(player, name.clone()).await? {
                    Ok(()) => ServerMessage::BlueprintRemoved { name },
                    Err(rejection) => rejection.into(),
                }
            }
            ClientMessage::ListBlueprints { player } => ServerMessage::Blueprints {
                blueprints: self.handle.list_blueprints(player).await?,
            },
            ClientMessage::Shutdown => return Ok(None),
        };
        Ok(Some(reply))
    }
}

/// Parse one input line, mapping failures to an error reply.
pub fn parse_line(line: &str) -> Result<ClientMessage, ServerMessage> {
    serde_json::from_str(line).map_err(|e| {
        warn!(error = %e, "Unparseable input line");
        ServerMessage::Error {
            message: format!("invalid message: {e}"),
        }
    })
}
