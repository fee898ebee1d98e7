//! Probe outcomes.

use std::fmt;

/// Why a probe did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No response within the attempt timeout
    Timeout,
    /// The connection could not be established (refused, DNS, unreachable host)
    ConnectionRefused,
    /// A response arrived with a status other than 200
    BadStatus(u16),
    /// Any other transport failure (TLS, malformed URL, broken body)
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::ConnectionRefused => write!(f, "connection refused"),
            FailureKind::BadStatus(status) => write!(f, "bad status {status}"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// Outcome of one probe, or of a whole retry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationResult {
    Reachable,
    Unreachable(FailureKind),
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationResult::Reachable)
    }

    /// The failure classification, `None` on success.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ValidationResult::Reachable => None,
            ValidationResult::Unreachable(kind) => Some(*kind),
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationResult::Reachable => write!(f, "reachable"),
            ValidationResult::Unreachable(kind) => write!(f, "unreachable ({kind})"),
        }
    }
}
