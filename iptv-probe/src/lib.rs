//! # iptv-probe
//!
//! Reachability checks for IPTV portal endpoints.
//!
//! A probe is one HTTP GET against a portal URL carrying the device identifier
//! in a request header. The outcome is a typed [`ValidationResult`] rather than
//! an error: timeouts, refused connections and non-200 responses are expected
//! events that callers branch on, not failures to propagate.
//!
//! - [`Validator`]: the single-probe seam, implemented over HTTP by [`HttpValidator`]
//! - [`RetryPolicy`]: bounded attempts with exponential backoff between them
//! - [`Prober`]: a validator bound to a policy and a per-attempt timeout
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use iptv_probe::{HttpValidator, ProbeConfig, Prober, RetryPolicy};
//!
//! # async fn example() -> iptv_probe::Result<()> {
//! let config = ProbeConfig::default();
//! let validator = Arc::new(HttpValidator::new(&config)?);
//! let prober = Prober::new(validator, RetryPolicy::default(), config.timeout);
//!
//! let result = prober.validate_with_retry("http://svc.example/c", "00:1A:79:70:E2:97").await;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

mod error;
mod result;
mod retry;
mod validator;

pub use error::{ProbeError, Result};
pub use result::{FailureKind, ValidationResult};
pub use retry::{Prober, RetryPolicy};
pub use validator::{HttpValidator, ProbeConfig, Validator};
