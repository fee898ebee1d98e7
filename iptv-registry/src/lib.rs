//! # iptv-registry
//!
//! The authoritative in-memory store of subscription endpoints: which device
//! identifiers are known under which server URL, and whether each is
//! currently considered reachable.
//!
//! Each device entry runs a small state machine driven by check results:
//!
//! ```text
//!            failure, counter reaches FAILURE_THRESHOLD
//!   Active ───────────────────────────────────────────▶ Inactive
//!     ▲  │                                                 │
//!     │  └── success (counter reset) ──┐                   │
//!     └────────────────────────────────┴── any success ────┘
//! ```
//!
//! Manual [`SubscriptionRegistry::toggle`] can force either state at any time
//! without touching the failure counter.
//!
//! All mutations are serialised behind one lock; readers receive
//! point-in-time copies. State transitions are broadcast as
//! [`RegistryEvent`]s to anyone holding a [`SubscriptionRegistry::subscribe`]
//! receiver.

mod entry;
mod error;
mod event;
mod registry;

pub use entry::{normalize_device_id, DeviceEntry, Endpoint, EndpointStatus, Transition};
pub use error::{RegistryError, RegistryResult};
pub use event::RegistryEvent;
pub use registry::SubscriptionRegistry;

/// Consecutive failed checks after which an endpoint is deactivated.
pub const FAILURE_THRESHOLD: u32 = 3;
