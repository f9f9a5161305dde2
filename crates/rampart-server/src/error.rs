//! Error types for the match server binary.

/// Top-level error for the match server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: rampart_core::ConfigError,
    },

    /// The match actor stopped unexpectedly.
    #[error("actor error: {source}")]
    Actor {
        /// The underlying actor error.
        #[from]
        source: rampart_core::ActorError,
    },

    /// Reading stdin or writing stdout failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An outbound message could not be encoded.
    #[error("encode error: {source}")]
    Encode {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The match task panicked or was cancelled.
    #[error("match task failed: {message}")]
    Join {
        /// Description of the join failure.
        message: String,
    },

    /// Logging could not be initialised.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the logging failure.
        message: String,
    },
}
