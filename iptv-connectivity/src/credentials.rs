//! The single remembered endpoint.
//!
//! Users can ask for a manually added endpoint to be remembered; it is written
//! to a small TOML file and used to seed the registry on the next start.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConnectivityError, Result};

const APP_DIR: &str = "iptv-manager";
const FILE_NAME: &str = "credentials.toml";

/// A remembered `(server_url, device_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub server_url: String,
    #[serde(rename = "mac_address", alias = "device_id")]
    pub device_id: String,
}

impl StoredCredential {
    pub fn new(server_url: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            device_id: device_id.into(),
        }
    }

    /// Parse a `server_url,device_id` record, ignoring any further fields.
    pub fn from_record(record: &str) -> Option<Self> {
        let mut fields = record.trim().split(',').map(str::trim);
        let server_url = fields.next().filter(|field| !field.is_empty())?;
        let device_id = fields.next().filter(|field| !field.is_empty())?;
        Some(Self::new(server_url, device_id))
    }

    fn is_complete(&self) -> bool {
        !self.server_url.trim().is_empty() && !self.device_id.trim().is_empty()
    }
}

/// File-backed storage for one [`StoredCredential`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/iptv-manager/credentials.toml`, if the platform has a config dir.
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join(APP_DIR).join(FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored credential, or `None` if nothing has been remembered yet.
    pub fn load(&self) -> Result<Option<StoredCredential>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConnectivityError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let credential: StoredCredential =
            toml::from_str(&text).map_err(|source| ConnectivityError::Parse {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), server_url = %credential.server_url, "Loaded stored credential");
        Ok(Some(credential))
    }

    /// Like [`load`](Self::load) but a missing or incomplete credential is a
    /// configuration error.
    pub fn load_required(&self) -> Result<StoredCredential> {
        match self.load()? {
            Some(credential) if credential.is_complete() => Ok(credential),
            Some(_) => Err(ConnectivityError::Configuration(format!(
                "Stored credential in {} is missing the server URL or device id",
                self.path.display()
            ))),
            None => Err(ConnectivityError::Configuration(format!(
                "No stored endpoint found at {}",
                self.path.display()
            ))),
        }
    }

    /// Write the credential, creating parent directories as needed.
    pub fn save(&self, credential: &StoredCredential) -> Result<()> {
        let io_error = |source| ConnectivityError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let text = toml::to_string(credential)?;
        std::fs::write(&self.path, text).map_err(io_error)?;

        debug!(path = %self.path.display(), server_url = %credential.server_url, "Saved credential");
        Ok(())
    }
}
