//! Match runtime for Rampart: configuration, round signals, and the actor
//! that serializes every build operation for one match.
//!
//! # Modules
//!
//! - [`config`] -- [`MatchConfig`] loaded from `rampart-config.yaml`.
//! - [`context`] -- [`RoundControl`] and the `watch`-backed [`MatchSignals`].
//! - [`actor`] -- [`MatchActor`] and its cloneable [`MatchHandle`].

pub mod actor;
pub mod config;
pub mod context;

// Re-export primary types at crate root.
pub use actor::{ActorError, ActorSettings, MatchActor, MatchCommand, MatchHandle};
pub use config::{ConfigError, MatchConfig};
pub use context::{MatchSignals, RoundControl};
