//! Single reachability probes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{ProbeError, Result};
use crate::result::{FailureKind, ValidationResult};

/// Performs one reachability check against one endpoint.
///
/// Implementations must not retry and must not touch any shared state; the
/// retry policy and the supervisor are layered on top of this seam.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, server_url: &str, device_id: &str, timeout: Duration) -> ValidationResult;
}

/// Configuration for HTTP probes
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Time allowed for one attempt, connection included
    /// Default: 20 seconds
    pub timeout: Duration,

    /// User-Agent sent with every probe
    /// Default: "IPTV Manager"
    pub user_agent: String,

    /// Request header carrying the device identifier
    /// Default: "X-Device-Id"
    pub device_header: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: "IPTV Manager".to_string(),
            device_header: "X-Device-Id".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.timeout == Duration::ZERO {
            return Err(ProbeError::InvalidConfiguration(
                "Probe timeout must be greater than 0".to_string(),
            ));
        }

        if HeaderName::from_bytes(self.device_header.as_bytes()).is_err() {
            return Err(ProbeError::InvalidConfiguration(format!(
                "Invalid device header name: {:?}",
                self.device_header
            )));
        }

        if HeaderValue::from_str(&self.user_agent).is_err() {
            return Err(ProbeError::InvalidConfiguration(format!(
                "Invalid user agent: {:?}",
                self.user_agent
            )));
        }

        Ok(())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_device_header(mut self, header: impl Into<String>) -> Self {
        self.device_header = header.into();
        self
    }
}

/// [`Validator`] issuing an HTTP GET and accepting only a 200 response.
#[derive(Debug, Clone)]
pub struct HttpValidator {
    client: reqwest::Client,
    device_header: HeaderName,
}

impl HttpValidator {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        config.validate()?;

        let device_header = HeaderName::from_bytes(config.device_header.as_bytes())
            .map_err(|e| ProbeError::InvalidConfiguration(e.to_string()))?;
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ProbeError::InvalidConfiguration(e.to_string()))?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(USER_AGENT, user_agent);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            device_header,
        })
    }

    fn classify(error: &reqwest::Error) -> FailureKind {
        if error.is_timeout() {
            FailureKind::Timeout
        } else if error.is_connect() {
            FailureKind::ConnectionRefused
        } else {
            FailureKind::Other
        }
    }
}

#[async_trait]
impl Validator for HttpValidator {
    async fn validate(&self, server_url: &str, device_id: &str, timeout: Duration) -> ValidationResult {
        let request = self
            .client
            .get(server_url)
            .header(self.device_header.as_str(), device_id)
            .timeout(timeout);

        // The client timeout covers the exchange; the outer one also bounds
        // anything reqwest does before its own timer starts.
        match tokio::time::timeout(timeout, request.send()).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => ValidationResult::Reachable,
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                debug!(server_url, device_id, status, "Probe answered with non-200 status");
                ValidationResult::Unreachable(FailureKind::BadStatus(status))
            }
            Ok(Err(error)) => {
                let kind = Self::classify(&error);
                debug!(server_url, device_id, %kind, error = %error, "Probe failed");
                ValidationResult::Unreachable(kind)
            }
            Err(_) => {
                debug!(server_url, device_id, ?timeout, "Probe timed out");
                ValidationResult::Unreachable(FailureKind::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProbeConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.user_agent, "IPTV Manager");
        assert_eq!(config.device_header, "X-Device-Id");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero_timeout = ProbeConfig::new().with_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());

        let bad_header = ProbeConfig::new().with_device_header("not a header");
        assert!(matches!(
            bad_header.validate(),
            Err(ProbeError::InvalidConfiguration(_))
        ));
        assert!(HttpValidator::new(&bad_header).is_err());

        let bad_agent = ProbeConfig::new().with_user_agent("line\nbreak");
        assert!(bad_agent.validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ProbeConfig::new()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("MAG250")
            .with_device_header("X-Mac");

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "MAG250");
        assert_eq!(config.device_header, "X-Mac");
        assert!(HttpValidator::new(&config).is_ok());
    }
}
