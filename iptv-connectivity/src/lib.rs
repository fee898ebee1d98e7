//! # iptv-connectivity
//!
//! Keeps a [`SubscriptionRegistry`] of IPTV endpoints honest. The
//! [`ConnectivitySupervisor`] imports endpoints from free-form text, validates
//! manual additions, and re-checks every known endpoint on a schedule,
//! deactivating those that keep failing and restoring those that recover.
//!
//! ## Architecture
//!
//! ```text
//!   text ──▶ iptv_extract::extract ──▶ URL × device pairs
//!                                         │
//!                                         ▼
//!                       ConnectivitySupervisor (fan-out, bounded)
//!                                         │  Prober: Validator + RetryPolicy
//!                                         ▼
//!                       SubscriptionRegistry::mark_result ──▶ RegistryEvent
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use iptv_connectivity::{ConnectivityConfig, ConnectivitySupervisor, SubscriptionRegistry};
//!
//! # async fn example() -> iptv_connectivity::Result<()> {
//! let registry = Arc::new(SubscriptionRegistry::new());
//! let supervisor = ConnectivitySupervisor::new(Arc::clone(&registry), ConnectivityConfig::default())?;
//!
//! supervisor.import_from_text("http://svc.example/c\n00:1A:79:70:E2:97").await?;
//! let summary = supervisor.check_all().await?;
//! println!("{summary}");
//!
//! for endpoint in registry.list_active() {
//!     println!("{endpoint}");
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod credentials;
mod error;
mod report;
mod supervisor;

pub use config::{ConnectivityConfig, RegistrationPolicy};
pub use credentials::{CredentialStore, StoredCredential};
pub use error::{ConnectivityError, Result};
pub use report::{CheckSummary, ImportReport, ReportLine};
pub use supervisor::ConnectivitySupervisor;

// Re-export the building blocks so callers need only this crate.
pub use iptv_extract::{extract, extract_bytes, Extraction, ExtractionWarning};
pub use iptv_probe::{FailureKind, HttpValidator, ProbeConfig, RetryPolicy, ValidationResult, Validator};
pub use iptv_registry::{
    normalize_device_id, DeviceEntry, Endpoint, EndpointStatus, RegistryError, RegistryEvent,
    SubscriptionRegistry, Transition, FAILURE_THRESHOLD,
};
