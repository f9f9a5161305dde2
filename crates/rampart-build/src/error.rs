//! Error types for the build crate.
//!
//! Player-facing failures are [`Rejection`](rampart_types::Rejection)s and
//! never surface here. [`BuildError`] covers operator mistakes such as a
//! bad configuration.

use rampart_world::WorldError;

/// Errors raised while setting up the build core.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A setting is out of range.
    #[error("invalid build configuration: {0}")]
    InvalidConfig(String),

    /// The world layer refused its configuration.
    #[error(transparent)]
    World(#[from] WorldError),
}
