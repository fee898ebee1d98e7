//! Error types for the iptv-registry crate.

/// Contract violations reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No entry exists for this server/device pair
    #[error("Endpoint not found: {server_url} / {device_id}")]
    EndpointNotFound {
        /// The server URL
        server_url: String,
        /// The device identifier
        device_id: String,
    },

    /// The device identifier is not registered under any server
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}

/// Convenience type alias for Results using RegistryError.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
