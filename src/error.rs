//! Error types for tunnelup.

use thiserror::Error;

/// Errors produced by the provisioning pipeline.
#[derive(Debug, Error)]
pub enum TunnelupError {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The local service could not be spawned.
    #[error("Failed to launch service: {0}")]
    Launch(String),

    /// A tunnel provider could not be started.
    #[error("Tunnel provider '{provider}' failed to start: {cause}")]
    ProviderStart { provider: String, cause: String },

    /// An HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TunnelupError {
    /// Shorthand for a [`TunnelupError::ProviderStart`].
    pub fn provider_start(provider: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::ProviderStart {
            provider: provider.into(),
            cause: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TunnelupError>;
