use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the connectivity supervisor.
///
/// Probe failures never appear here: they become registry state and report
/// lines. These are configuration problems, contract violations and
/// lifecycle conditions.
#[derive(Error, Debug)]
pub enum ConnectivityError {
    /// Missing or invalid configuration, not retried
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A registry command referred to an unknown endpoint or device
    #[error(transparent)]
    Registry(#[from] iptv_registry::RegistryError),

    /// The probe stack could not be constructed
    #[error("Probe setup failed: {0}")]
    Probe(#[from] iptv_probe::ProbeError),

    /// A full check pass is already running for this registry
    #[error("A connectivity check is already in progress")]
    CheckInProgress,

    /// The supervisor is shutting down; in-flight probes were abandoned
    #[error("Batch cancelled by shutdown")]
    Cancelled,

    /// The credential or configuration file could not be read or written
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A TOML file did not parse
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The credential could not be encoded
    #[error("Failed to encode credential: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for connectivity operations
pub type Result<T> = std::result::Result<T, ConnectivityError>;
