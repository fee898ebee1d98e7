//! Configuration types for the iptv-connectivity crate
//!
//! [`ConnectivityConfig`] controls probing, retries, the periodic check
//! schedule and the registration policy. It can be built in code or layered
//! from a TOML file over the defaults.

use std::path::Path;
use std::time::Duration;

use iptv_probe::{ProbeConfig, RetryPolicy};
use serde::Deserialize;

use crate::error::{ConnectivityError, Result};

/// When a newly imported endpoint enters the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationPolicy {
    /// Only after its first probe succeeds
    #[default]
    OnSuccess,
    /// Before probing, as active; a failed first probe starts the count
    Immediately,
}

/// Configuration for the connectivity supervisor
#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    /// HTTP probe settings, including the per-attempt timeout
    pub probe: ProbeConfig,

    /// Attempts and backoff per endpoint
    pub retry: RetryPolicy,

    /// Pause between periodic full checks
    /// Default: 300 seconds
    pub check_interval: Duration,

    /// Maximum number of endpoints probed at the same time; `None` probes a
    /// whole batch at once
    /// Default: None
    pub max_concurrent_probes: Option<usize>,

    /// When imported endpoints are registered
    /// Default: OnSuccess
    pub registration: RegistrationPolicy,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            retry: RetryPolicy::default(),
            check_interval: Duration::from_secs(300),
            max_concurrent_probes: None,
            registration: RegistrationPolicy::OnSuccess,
        }
    }
}

impl ConnectivityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short timeouts and frequent checks, for interactive use
    pub fn fast_checks() -> Self {
        Self {
            probe: ProbeConfig::default().with_timeout(Duration::from_secs(5)),
            retry: RetryPolicy::new(3, Duration::from_millis(250)),
            check_interval: Duration::from_secs(60),
            ..Default::default()
        }
    }

    /// Fewer simultaneous connections and a relaxed schedule
    pub fn resource_efficient() -> Self {
        Self {
            check_interval: Duration::from_secs(900),
            max_concurrent_probes: Some(8),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        self.probe.validate()?;
        self.retry.validate()?;

        if self.check_interval == Duration::ZERO {
            return Err(ConnectivityError::Configuration(
                "Check interval must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_probes == Some(0) {
            return Err(ConnectivityError::Configuration(
                "Max concurrent probes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.retry = RetryPolicy::new(max_attempts, base_delay);
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_max_concurrent_probes(mut self, max: usize) -> Self {
        self.max_concurrent_probes = Some(max);
        self
    }

    pub fn with_registration(mut self, policy: RegistrationPolicy) -> Self {
        self.registration = policy;
        self
    }

    /// Layer a TOML document over the defaults.
    ///
    /// Every table and field is optional:
    ///
    /// ```toml
    /// [probe]
    /// timeout_secs = 20
    /// user_agent = "IPTV Manager"
    /// device_header = "X-Device-Id"
    ///
    /// [retry]
    /// max_attempts = 3
    /// base_delay_ms = 1000
    ///
    /// [supervisor]
    /// check_interval_secs = 300
    /// max_concurrent_probes = 50       # unbounded when absent
    /// registration = "on-success"   # or "immediately"
    /// ```
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(file.apply(Self::default()))
    }

    /// Read and layer a TOML file over the defaults, then validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConnectivityError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text).map_err(|source| ConnectivityError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    probe: ProbeSection,
    retry: RetrySection,
    supervisor: SupervisorSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProbeSection {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    device_header: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RetrySection {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SupervisorSection {
    check_interval_secs: Option<u64>,
    max_concurrent_probes: Option<usize>,
    registration: Option<RegistrationPolicy>,
}

impl ConfigFile {
    fn apply(self, mut config: ConnectivityConfig) -> ConnectivityConfig {
        if let Some(secs) = self.probe.timeout_secs {
            config.probe.timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = self.probe.user_agent {
            config.probe.user_agent = user_agent;
        }
        if let Some(header) = self.probe.device_header {
            config.probe.device_header = header;
        }
        if let Some(attempts) = self.retry.max_attempts {
            config.retry.max_attempts = attempts;
        }
        if let Some(ms) = self.retry.base_delay_ms {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = self.supervisor.check_interval_secs {
            config.check_interval = Duration::from_secs(secs);
        }
        if let Some(max) = self.supervisor.max_concurrent_probes {
            config.max_concurrent_probes = Some(max);
        }
        if let Some(policy) = self.supervisor.registration {
            config.registration = policy;
        }
        config
    }
}
