//! Error types for the iptv-probe crate.

/// Errors raised while setting up probing. Probes themselves never error.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// Invalid configuration provided
    #[error("Invalid probe configuration: {0}")]
    InvalidConfiguration(String),
}

/// Convenience type alias for Results using ProbeError.
pub type Result<T> = std::result::Result<T, ProbeError>;
