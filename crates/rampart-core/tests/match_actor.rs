//! Integration tests for the per-match build actor.
//!
//! Each test spawns a real [`MatchActor`] on the test runtime and talks to
//! it only through its [`MatchHandle`] and event subscription.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    clippy::panic
)]

use glam::{Quat, Vec3};
use rampart_build::{BuildOrchestrator, BuildSettings, RateLimitConfig};
use rampart_core::{ActorError, ActorSettings, MatchActor, MatchHandle, RoundControl};
use rampart_types::{
    Budget, MatchEvent, MatchId, Phase, PlacementRequest, PlayerId, RejectionReason,
    RemovalCause, StructureCategory, StructureType, TeamId,
};
use rampart_world::GridIndex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

fn relaxed_limits() -> BuildSettings {
    BuildSettings {
        rate_limit: RateLimitConfig {
            window_ms: 5_000,
            max_per_window: 100,
            min_interval_ms: 0,
        },
        ..BuildSettings::default()
    }
}

fn start(
    settings: BuildSettings,
    budget: Budget,
) -> (MatchHandle, JoinHandle<BuildOrchestrator>, RoundControl) {
    let control = RoundControl::new();
    let orchestrator =
        BuildOrchestrator::new(settings, Box::new(GridIndex::default()), Box::new(control.signals()));
    let (handle, join) = MatchActor::spawn(
        ActorSettings {
            match_id: MatchId::new(),
            tick_interval_ms: 50,
            starting_budget: budget,
        },
        orchestrator,
    );
    (handle, join, control)
}

async fn join_player(handle: &MatchHandle, control: &RoundControl) -> PlayerId {
    let player = PlayerId::new();
    control.assign_spawn(player, Vec3::ZERO);
    assert!(handle.register_player(player, TeamId::new()).await.unwrap());
    player
}

fn wall(player: PlayerId, x: f32) -> PlacementRequest {
    PlacementRequest {
        position: Vec3::new(x, 0.0, 0.0),
        rotation: Quat::IDENTITY,
        structure_type: StructureType::WoodWall,
        requester: player,
        timestamp_ms: 0,
    }
}

async fn next_placed(events: &mut broadcast::Receiver<MatchEvent>) -> MatchEvent {
    loop {
        let event = events.recv().await.unwrap();
        if matches!(event, MatchEvent::StructurePlaced { .. }) {
            return event;
        }
    }
}

#[tokio::test]
async fn placement_is_replied_and_broadcast() {
    let (handle, _join, control) = start(relaxed_limits(), Budget::new(10, 0, 0, 0));
    control.set_phase(Phase::Build);
    let mut events = handle.subscribe();
    let player = join_player(&handle, &control).await;

    let result = handle.place(wall(player, 2.0)).await.unwrap();
    let id = result.structure_id().unwrap();

    match next_placed(&mut events).await {
        MatchEvent::StructurePlaced {
            id: placed, owner, ..
        } => {
            assert_eq!(placed, id);
            assert_eq!(owner, player);
        }
        other => panic!("unexpected event {other:?}"),
    }
    let stored = handle.get(id).await.unwrap().unwrap();
    assert_eq!(stored.position, Vec3::new(2.0, 0.0, 0.0));
    assert_eq!(
        handle.budget(player).await.unwrap().and_then(|b| b.get(StructureCategory::Wall)),
        Some(8)
    );
}

#[tokio::test]
async fn phase_changes_are_seen_immediately() {
    let (handle, _join, control) = start(relaxed_limits(), Budget::new(10, 0, 0, 0));
    let player = join_player(&handle, &control).await;

    let early = handle.place(wall(player, 1.0)).await.unwrap();
    assert_eq!(early.rejection_reason(), Some(RejectionReason::WrongPhase));

    control.set_phase(Phase::Build);
    assert!(handle.place(wall(player, 1.0)).await.unwrap().is_accepted());

    control.set_phase(Phase::Combat);
    let late = handle.place(wall(player, 3.0)).await.unwrap();
    assert_eq!(late.rejection_reason(), Some(RejectionReason::WrongPhase));
}

#[tokio::test]
async fn concurrent_requests_are_serialized_against_the_budget() {
    let (handle, _join, control) = start(relaxed_limits(), Budget::new(6, 0, 0, 0));
    control.set_phase(Phase::Build);
    let player = join_player(&handle, &control).await;

    let tasks: Vec<_> = (1..=10_u8)
        .map(|x| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.place(wall(player, f32::from(x))).await })
        })
        .collect();

    let mut accepted = 0;
    let mut insufficient = 0;
    for task in tasks {
        let result = task.await.unwrap().unwrap();
        if result.is_accepted() {
            accepted += 1;
        } else if result.rejection_reason() == Some(RejectionReason::InsufficientBudget) {
            insufficient += 1;
        }
    }
    assert_eq!(accepted, 3);
    assert_eq!(insufficient, 7);
    assert_eq!(
        handle.budget(player).await.unwrap().and_then(|b| b.get(StructureCategory::Wall)),
        Some(0)
    );
}

#[tokio::test]
async fn back_to_back_requests_hit_the_cooldown() {
    let (handle, _join, control) = start(BuildSettings::default(), Budget::new(10, 0, 0, 0));
    control.set_phase(Phase::Build);
    let player = join_player(&handle, &control).await;

    assert!(handle.place(wall(player, 1.0)).await.unwrap().is_accepted());
    let burst = handle.place(wall(player, 2.0)).await.unwrap();
    assert_eq!(burst.rejection_reason(), Some(RejectionReason::RateLimited));
}

#[tokio::test]
async fn blueprints_and_removal_through_the_handle() {
    let (handle, _join, control) = start(relaxed_limits(), Budget::new(20, 0, 0, 0));
    control.set_phase(Phase::Build);
    let player = join_player(&handle, &control).await;

    let id = handle
        .place(wall(player, 1.0))
        .await
        .unwrap()
        .structure_id()
        .unwrap();
    let summary = handle
        .save_blueprint(player, "post", Vec3::ZERO)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.entry_count, 1);

    let deployed = handle
        .deploy_blueprint(player, "post", Vec3::new(0.0, 0.0, 4.0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!((deployed.placed, deployed.attempted), (1, 1));
    assert_eq!(handle.list_blueprints(player).await.unwrap().len(), 1);

    assert!(handle.remove(id, RemovalCause::Destroyed).await.unwrap().is_ok());
    assert_eq!(
        handle
            .remove(id, RemovalCause::Destroyed)
            .await
            .unwrap()
            .err()
            .map(|r| r.reason),
        Some(RejectionReason::StructureNotFound)
    );

    assert!(handle.delete_blueprint(player, "post").await.unwrap().is_ok());
    assert_eq!(handle.clear_structures().await.unwrap(), 1);
}

#[tokio::test]
async fn shutdown_returns_the_orchestrator() {
    let (handle, join, control) = start(relaxed_limits(), Budget::new(10, 0, 0, 0));
    control.set_phase(Phase::Build);
    let player = join_player(&handle, &control).await;
    assert!(handle.place(wall(player, 1.0)).await.unwrap().is_accepted());

    handle.shutdown().await.unwrap();
    let orchestrator = join.await.unwrap();
    assert_eq!(orchestrator.registry().len(), 1);
    assert!(orchestrator.reconcile_ledger().is_ok());

    assert_eq!(
        handle.place(wall(player, 2.0)).await.err(),
        Some(ActorError::Closed)
    );
}

#[test]
fn events_serialize_externally_tagged() {
    let event = MatchEvent::StructureRemoved {
        id: rampart_types::StructureId::new(),
        cause: RemovalCause::Collapsed,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["StructureRemoved"]["cause"], "Collapsed");
}
