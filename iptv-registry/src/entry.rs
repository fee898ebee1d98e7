//! Device entries and the values the registry hands out.

use serde::Serialize;

use crate::FAILURE_THRESHOLD;

/// A `(server_url, device_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Endpoint {
    pub server_url: String,
    pub device_id: String,
}

impl Endpoint {
    pub fn new(server_url: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            device_id: device_id.into(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.server_url, self.device_id)
    }
}

/// Canonical form of a device id: trimmed, hex digits upper-cased.
///
/// The registry applies it on every call, so `00:1a:…` and `00:1A:…` name
/// the same device.
pub fn normalize_device_id(device_id: &str) -> String {
    device_id.trim().to_ascii_uppercase()
}

/// One row of a registry snapshot, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    pub server_url: String,
    pub device_id: String,
    pub active: bool,
    pub consecutive_failures: u32,
}

impl EndpointStatus {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.server_url.clone(), self.device_id.clone())
    }
}

/// What a recorded check result did to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Deactivated,
    Reactivated,
}

/// State of one device under one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    device_id: String,
    active: bool,
    consecutive_failures: u32,
    /// Failure count at which the entry deactivates. Moves past the current
    /// count on a manual reactivation so the device gets a full threshold of
    /// fresh failures before being switched off again.
    deactivate_at: u32,
}

impl DeviceEntry {
    pub(crate) fn new(device_id: String) -> Self {
        Self {
            device_id,
            active: true,
            consecutive_failures: 0,
            deactivate_at: FAILURE_THRESHOLD,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub(crate) fn record_success(&mut self) -> Transition {
        self.consecutive_failures = 0;
        self.deactivate_at = FAILURE_THRESHOLD;
        if self.active {
            Transition::Unchanged
        } else {
            self.active = true;
            Transition::Reactivated
        }
    }

    pub(crate) fn record_failure(&mut self) -> Transition {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.active && self.consecutive_failures >= self.deactivate_at {
            self.active = false;
            Transition::Deactivated
        } else {
            Transition::Unchanged
        }
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        if active && !self.active {
            self.deactivate_at = self.consecutive_failures.saturating_add(FAILURE_THRESHOLD);
        }
        self.active = active;
    }

    pub(crate) fn status(&self, server_url: &str) -> EndpointStatus {
        EndpointStatus {
            server_url: server_url.to_string(),
            device_id: self.device_id.clone(),
            active: self.active,
            consecutive_failures: self.consecutive_failures,
        }
    }
}
