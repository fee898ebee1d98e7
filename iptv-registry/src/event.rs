//! Registry change notifications.

use crate::entry::Endpoint;

/// Broadcast whenever the registry changes in a way the UI or logs care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A new pair was inserted
    Added(Endpoint),
    /// A pair was removed by the user
    Removed(Endpoint),
    /// The failure counter reached its threshold
    Deactivated {
        endpoint: Endpoint,
        consecutive_failures: u32,
    },
    /// A success brought an inactive entry back
    Reactivated(Endpoint),
    /// A manual override set the entry's state
    Toggled { endpoint: Endpoint, active: bool },
}

impl RegistryEvent {
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            RegistryEvent::Added(endpoint)
            | RegistryEvent::Removed(endpoint)
            | RegistryEvent::Reactivated(endpoint) => endpoint,
            RegistryEvent::Deactivated { endpoint, .. } | RegistryEvent::Toggled { endpoint, .. } => {
                endpoint
            }
        }
    }
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEvent::Added(endpoint) => write!(f, "added {endpoint}"),
            RegistryEvent::Removed(endpoint) => write!(f, "removed {endpoint}"),
            RegistryEvent::Deactivated {
                endpoint,
                consecutive_failures,
            } => write!(
                f,
                "deactivated {endpoint} after {consecutive_failures} consecutive failures"
            ),
            RegistryEvent::Reactivated(endpoint) => write!(f, "reactivated {endpoint}"),
            RegistryEvent::Toggled { endpoint, active } => {
                let state = if *active { "active" } else { "inactive" };
                write!(f, "{endpoint} manually set {state}")
            }
        }
    }
}
