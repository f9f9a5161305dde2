//! Round state seen by the build core.
//!
//! The round state machine lives outside the build core. It publishes the
//! current [`Phase`] and each player's spawn point on `watch` channels;
//! [`RoundControl`] is the publishing side and [`MatchSignals`] the
//! read-only side handed to the orchestrator as its [`MatchContext`].

use std::collections::BTreeMap;

use glam::Vec3;
use tokio::sync::watch;
use tracing::info;

use rampart_build::MatchContext;
use rampart_types::{Phase, PlayerId};

/// Publishing side of the round signals.
#[derive(Debug)]
pub struct RoundControl {
    phase: watch::Sender<Phase>,
    spawns: watch::Sender<BTreeMap<PlayerId, Vec3>>,
}

impl RoundControl {
    /// Start in [`Phase::Waiting`] with no spawns assigned.
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::default());
        let (spawns, _) = watch::channel(BTreeMap::new());
        Self { phase, spawns }
    }

    /// Move the match to `phase`.
    pub fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            info!(from = ?previous, to = ?phase, "Match phase changed");
        }
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Record where `player` spawns.
    pub fn assign_spawn(&self, player: PlayerId, spawn: Vec3) {
        self.spawns.send_modify(|spawns| {
            spawns.insert(player, spawn);
        });
    }

    /// A fresh read-only view for an orchestrator.
    pub fn signals(&self) -> MatchSignals {
        MatchSignals {
            phase: self.phase.subscribe(),
            spawns: self.spawns.subscribe(),
        }
    }
}

impl Default for RoundControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only round state backed by `watch` receivers.
#[derive(Debug, Clone)]
pub struct MatchSignals {
    phase: watch::Receiver<Phase>,
    spawns: watch::Receiver<BTreeMap<PlayerId, Vec3>>,
}

impl MatchContext for MatchSignals {
    fn current_phase(&self) -> Phase {
        *self.phase.borrow()
    }

    fn spawn_position(&self, player: PlayerId) -> Option<Vec3> {
        self.spawns.borrow().get(&player).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_follow_control() {
        let control = RoundControl::new();
        let signals = control.signals();
        let player = PlayerId::new();

        assert_eq!(signals.current_phase(), Phase::Waiting);
        assert_eq!(signals.spawn_position(player), None);

        control.set_phase(Phase::Build);
        control.assign_spawn(player, Vec3::new(1.0, 0.0, 2.0));

        assert_eq!(signals.current_phase(), Phase::Build);
        assert_eq!(control.phase(), Phase::Build);
        assert_eq!(signals.spawn_position(player), Some(Vec3::new(1.0, 0.0, 2.0)));
    }
}
