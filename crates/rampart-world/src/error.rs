//! Error types for the `rampart-world` crate.

/// Errors that can occur during world operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// An integrity parameter is out of range.
    #[error("invalid integrity config: {0}")]
    InvalidConfig(String),
}
