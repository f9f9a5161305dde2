//! Headless match server for Rampart.
//!
//! Hosts a single match and speaks newline-delimited JSON: requests on
//! stdin, replies and broadcast match events on stdout. Logs go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$RAMPART_CONFIG` or `rampart-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the arena and the round signals
//! 4. Spawn the match actor
//! 5. Forward broadcast events to stdout
//! 6. Dispatch stdin lines until EOF or `Shutdown`
//! 7. Stop the actor and log the final ledger state

mod error;
mod protocol;
mod session;

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rampart_build::BuildOrchestrator;
use rampart_core::config::LoggingConfig;
use rampart_core::{ActorSettings, MatchActor, MatchConfig, RoundControl};
use rampart_types::MatchId;

use crate::error::ServerError;
use crate::protocol::ServerMessage;
use crate::session::{Session, parse_line};

/// Outbound line queue depth.
const OUTPUT_CAPACITY: usize = 1024;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging, or stdio fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let path = MatchConfig::path_from_env();
    let (config, from_file) = load_config(&path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        path = %path.display(),
        from_file,
        tick_interval_ms = config.arena.tick_interval_ms,
        spawn_points = config.arena.spawn_points.len(),
        obstacles = config.arena.obstacles.len(),
        "Configuration loaded"
    );

    // 3. Arena and round signals.
    let control = RoundControl::new();
    let orchestrator = BuildOrchestrator::new(
        config.build_settings(),
        Box::new(config.build_arena()),
        Box::new(control.signals()),
    );

    // 4. Match actor.
    let match_id = MatchId::new();
    let (handle, join) = MatchActor::spawn(
        ActorSettings {
            match_id,
            tick_interval_ms: config.arena.tick_interval_ms,
            starting_budget: config.economy.starting_budget(),
        },
        orchestrator,
    );
    info!(match_id = %match_id, "Match started");

    // 5. Output writer and event forwarder.
    let (out_tx, out_rx) = mpsc::channel::<ServerMessage>(OUTPUT_CAPACITY);
    let writer = tokio::spawn(write_output(out_rx));
    let forwarder = tokio::spawn(forward_events(handle.subscribe(), out_tx.clone()));

    // 6. Input loop.
    let mut session = Session::new(handle.clone(), control, config.arena.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(ServerError::from)? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match parse_line(&line) {
            Ok(message) => match session.dispatch(message).await? {
                Some(reply) => reply,
                None => break,
            },
            Err(reply) => reply,
        };
        if out_tx.send(reply).await.is_err() {
            warn!("Output closed; stopping input loop");
            break;
        }
    }

    // 7. Shutdown.
    if handle.shutdown().await.is_err() {
        info!("Match actor had already stopped");
    }
    let orchestrator = join.await.map_err(|e| ServerError::Join {
        message: e.to_string(),
    })?;
    info!(
        match_id = %match_id,
        structures = orchestrator.registry().len(),
        accounts = orchestrator.ledger().account_count(),
        journal_entries = orchestrator.ledger().journal().len(),
        "Match ended"
    );

    // The forwarder ends once the actor's broadcast sender is gone.
    drop(handle);
    drop(session);
    if let Err(e) = forwarder.await {
        error!(error = %e, "Event forwarder failed");
    }
    drop(out_tx);
    writer.await.map_err(|e| ServerError::Join {
        message: e.to_string(),
    })??;

    info!("rampart-server shutdown complete");
    Ok(())
}

/// Load configuration, falling back to defaults when the file is absent.
fn load_config(path: &Path) -> Result<(MatchConfig, bool), ServerError> {
    if path.exists() {
        Ok((MatchConfig::from_file(path)?, true))
    } else {
        Ok((MatchConfig::default(), false))
    }
}

/// Install the global tracing subscriber on stderr.
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &LoggingConfig) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ServerError::Logging {
            message: e.to_string(),
        })?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ServerError::Logging {
        message: e.to_string(),
    })
}

/// Write each outbound message as one JSON line.
async fn write_output(mut rx: mpsc::Receiver<ServerMessage>) -> Result<(), ServerError> {
    let mut stdout = tokio::io::stdout();
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Relay broadcast match events to the output queue.
async fn forward_events(
    mut events: broadcast::Receiver<rampart_types::MatchEvent>,
    out: mpsc::Sender<ServerMessage>,
) {
    loop {
        let message = match events.recv().await {
            Ok(event) => ServerMessage::Event { event },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event output lagging");
                ServerMessage::Lagged { skipped }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if out.send(message).await.is_err() {
            break;
        }
    }
}
