//! Connectivity supervision: imports, ad hoc additions and periodic checks.

use std::collections::HashSet;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use iptv_probe::{HttpValidator, Prober, ValidationResult, Validator};
use iptv_registry::{normalize_device_id, Endpoint, SubscriptionRegistry};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConnectivityConfig, RegistrationPolicy};
use crate::credentials::{CredentialStore, StoredCredential};
use crate::error::{ConnectivityError, Result};
use crate::report::{CheckSummary, ImportReport, ReportLine};

/// Drives validation of the registry's endpoints.
///
/// The supervisor owns no endpoint state itself. Every outcome is applied in
/// place to the injected [`SubscriptionRegistry`], which stays the single
/// source of truth for the UI and for playback.
///
/// All probes of a batch run concurrently unless
/// [`ConnectivityConfig::max_concurrent_probes`] sets a bound. Each result
/// is recorded as soon as its retry sequence ends. A failing endpoint never
/// aborts the batch. [`shutdown`](Self::shutdown) abandons in-flight probes.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use iptv_connectivity::{ConnectivityConfig, ConnectivitySupervisor, SubscriptionRegistry};
///
/// # async fn example() -> iptv_connectivity::Result<()> {
/// let registry = Arc::new(SubscriptionRegistry::new());
/// let supervisor = Arc::new(ConnectivitySupervisor::new(
///     Arc::clone(&registry),
///     ConnectivityConfig::default(),
/// )?);
///
/// let report = supervisor
///     .import_from_text("http://svc.example/c\n00:1A:79:70:E2:97")
///     .await?;
/// println!("{report}");
///
/// let periodic = supervisor.spawn_periodic(supervisor.config().check_interval);
/// // ...
/// supervisor.shutdown();
/// let _ = periodic.await;
/// # Ok(())
/// # }
/// ```
pub struct ConnectivitySupervisor {
    registry: Arc<SubscriptionRegistry>,
    prober: Prober,
    config: ConnectivityConfig,
    credentials: Option<CredentialStore>,
    /// Held for the duration of a `check_all` pass
    check_lock: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ConnectivitySupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivitySupervisor")
            .field("registry", &self.registry)
            .field("prober", &self.prober)
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl ConnectivitySupervisor {
    /// Create a supervisor probing over HTTP.
    pub fn new(registry: Arc<SubscriptionRegistry>, config: ConnectivityConfig) -> Result<Self> {
        let validator = Arc::new(HttpValidator::new(&config.probe)?);
        Self::with_validator(registry, validator, config)
    }

    /// Create a supervisor with a custom [`Validator`].
    pub fn with_validator(
        registry: Arc<SubscriptionRegistry>,
        validator: Arc<dyn Validator>,
        config: ConnectivityConfig,
    ) -> Result<Self> {
        config.validate()?;
        let prober = Prober::new(validator, config.retry, config.probe.timeout);

        Ok(Self {
            registry,
            prober,
            config,
            credentials: None,
            check_lock: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Persist remembered endpoints to `store`.
    pub fn with_credential_store(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ConnectivityConfig {
        &self.config
    }

    pub fn credential_store(&self) -> Option<&CredentialStore> {
        self.credentials.as_ref()
    }

    /// Register a remembered endpoint without probing it; checks decide its state.
    pub fn seed(&self, credential: &StoredCredential) -> bool {
        let added = self.registry.upsert(&credential.server_url, &credential.device_id);
        if added {
            info!(server_url = %credential.server_url, device_id = %credential.device_id, "Seeded stored endpoint");
        }
        added
    }

    /// Seed from the configured credential store, if it holds anything.
    pub fn seed_from_store(&self) -> Result<Option<StoredCredential>> {
        let Some(store) = &self.credentials else {
            return Ok(None);
        };
        let credential = store.load()?;
        if let Some(credential) = &credential {
            self.seed(credential);
        }
        Ok(credential)
    }

    /// Seed from the configured credential store, which must hold a complete
    /// credential.
    pub fn seed_required(&self) -> Result<StoredCredential> {
        let store = self.credentials.as_ref().ok_or_else(|| {
            ConnectivityError::Configuration("No credential store configured".to_string())
        })?;
        let credential = store.load_required()?;
        self.seed(&credential);
        Ok(credential)
    }

    /// Extract endpoints from `text` and validate every URL × device pair.
    ///
    /// Returns one report line per distinct pair. Text without a URL or
    /// without a device id yields an empty report and changes nothing.
    pub async fn import_from_text(&self, text: &str) -> Result<ImportReport> {
        let extraction = iptv_extract::extract(text);
        for warning in &extraction.warnings {
            warn!("{warning}");
        }

        let mut seen = HashSet::new();
        let endpoints: Vec<Endpoint> = extraction
            .candidates()
            .into_iter()
            .filter(|candidate| seen.insert(candidate.clone()))
            .map(|candidate| Endpoint::new(candidate.server_url, candidate.device_id))
            .collect();

        if endpoints.is_empty() {
            debug!(
                urls = extraction.urls.len(),
                devices = extraction.devices.len(),
                "Nothing to import"
            );
            return Ok(ImportReport {
                lines: Vec::new(),
                warnings: extraction.warnings,
            });
        }

        info!(
            urls = extraction.urls.len(),
            devices = extraction.devices.len(),
            pairs = endpoints.len(),
            "Importing endpoints"
        );

        let lines = self.validate_new(endpoints).await?;
        let report = ImportReport {
            lines,
            warnings: extraction.warnings,
        };
        info!(
            reachable = report.succeeded(),
            unreachable = report.failed(),
            "Import finished"
        );
        Ok(report)
    }

    /// Validate one endpoint entered by the user.
    ///
    /// With `remember` set the endpoint is written to the credential store,
    /// whatever the probe outcome.
    pub async fn add_endpoint(&self, server_url: &str, device_id: &str, remember: bool) -> Result<ReportLine> {
        let server_url = server_url.trim();
        let device_id = normalize_device_id(device_id);
        if server_url.is_empty() || device_id.is_empty() {
            return Err(ConnectivityError::Configuration(
                "Both a server URL and a device id are required".to_string(),
            ));
        }

        if remember {
            let store = self.credentials.as_ref().ok_or_else(|| {
                ConnectivityError::Configuration("No credential store configured".to_string())
            })?;
            store.save(&StoredCredential::new(server_url, device_id.as_str()))?;
        }

        let mut lines = self
            .validate_new(vec![Endpoint::new(server_url, device_id.as_str())])
            .await?;
        lines.pop().ok_or(ConnectivityError::Cancelled)
    }

    /// Re-validate every known endpoint, active or not.
    ///
    /// Only one pass runs at a time per supervisor; an overlapping call gets
    /// [`ConnectivityError::CheckInProgress`] instead of starting a second one.
    pub async fn check_all(&self) -> Result<CheckSummary> {
        let _pass = self
            .check_lock
            .try_lock()
            .map_err(|_| ConnectivityError::CheckInProgress)?;

        let endpoints = self.registry.endpoints();
        if endpoints.is_empty() {
            debug!("No endpoints to check");
            return Ok(CheckSummary::default());
        }

        debug!(endpoints = endpoints.len(), "Starting connectivity check");
        let lines = self.cancellable(self.probe_batch(endpoints, false)).await?;

        let mut summary = CheckSummary::default();
        for line in &lines {
            summary.record(line);
        }
        info!(%summary, "Connectivity check finished");
        Ok(summary)
    }

    /// Run [`check_all`](Self::check_all) then sleep `interval`, until shutdown.
    pub async fn run_periodic(&self, interval: Duration) {
        info!(?interval, "Starting periodic connectivity checks");

        loop {
            match self.check_all().await {
                Ok(_) => {}
                Err(ConnectivityError::CheckInProgress) => {
                    debug!("Skipping periodic check, another pass is still running");
                }
                Err(ConnectivityError::Cancelled) => break,
                Err(e) => warn!(error = %e, "Periodic check failed"),
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Periodic connectivity checks stopped");
    }

    /// Run [`run_periodic`](Self::run_periodic) on the current runtime.
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move { supervisor.run_periodic(interval).await })
    }

    /// Cancel running batches and stop the periodic loop.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Shutting down connectivity supervisor");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Manually set every entry with this device id active or inactive.
    pub fn toggle(&self, device_id: &str, active: bool) -> Result<usize> {
        Ok(self.registry.toggle(device_id, active)?)
    }

    /// Remove one endpoint from the registry.
    pub fn remove(&self, server_url: &str, device_id: &str) -> Result<()> {
        self.registry.remove(server_url, device_id)?;
        Ok(())
    }

    /// Probe endpoints that may not be registered yet, following the registration policy.
    async fn validate_new(&self, endpoints: Vec<Endpoint>) -> Result<Vec<ReportLine>> {
        // A shut-down supervisor must not register anything.
        if self.shutdown.is_cancelled() {
            return Err(ConnectivityError::Cancelled);
        }
        if self.config.registration == RegistrationPolicy::Immediately {
            for endpoint in &endpoints {
                self.registry.upsert(&endpoint.server_url, &endpoint.device_id);
            }
        }
        self.cancellable(self.probe_batch(endpoints, true)).await
    }

    async fn cancellable<T>(&self, batch: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!("Batch abandoned on shutdown");
                Err(ConnectivityError::Cancelled)
            }
            value = batch => Ok(value),
        }
    }

    /// Fan out one retry sequence per endpoint and record each result as it lands.
    async fn probe_batch(&self, endpoints: Vec<Endpoint>, register_on_success: bool) -> Vec<ReportLine> {
        let prober = &self.prober;
        let limit = self.config.max_concurrent_probes.unwrap_or(endpoints.len()).max(1);
        let probes = stream::iter(endpoints)
            .map(|endpoint| async move {
                let result = prober
                    .validate_with_retry(&endpoint.server_url, &endpoint.device_id)
                    .await;
                (endpoint, result)
            })
            .buffer_unordered(limit);
        let mut probes = pin!(probes);

        let mut lines = Vec::new();
        while let Some((endpoint, result)) = probes.next().await {
            lines.push(self.record(endpoint, result, register_on_success));
        }
        lines
    }

    fn record(&self, endpoint: Endpoint, result: ValidationResult, register_on_success: bool) -> ReportLine {
        if register_on_success && result.is_ok() {
            self.registry.upsert(&endpoint.server_url, &endpoint.device_id);
        }

        // Unregistered pairs (failed first probe, or removed mid-batch) only
        // get a report line.
        let transition = match self
            .registry
            .mark_result(&endpoint.server_url, &endpoint.device_id, result.is_ok())
        {
            Ok(transition) => Some(transition),
            Err(e) => {
                debug!(error = %e, "Result not recorded");
                None
            }
        };

        ReportLine {
            endpoint,
            result,
            transition,
        }
    }
}
