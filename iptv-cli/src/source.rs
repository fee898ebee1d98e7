//! Where import text comes from.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// A source of free-form subscription text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    File(PathBuf),
    Url(String),
    Stdin,
}

impl TextSource {
    /// Pick the source from `--file` / `--url`, falling back to stdin.
    pub fn from_args(file: Option<PathBuf>, url: Option<String>) -> Self {
        match (file, url) {
            (Some(path), _) => TextSource::File(path),
            (None, Some(url)) => TextSource::Url(url),
            (None, None) => TextSource::Stdin,
        }
    }

    /// Read the whole source. Invalid UTF-8 is replaced, never rejected.
    pub async fn read(&self) -> Result<String> {
        let bytes = match self {
            TextSource::File(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            TextSource::Url(url) => fetch(url).await?,
            TextSource::Stdin => {
                let mut bytes = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut bytes)
                    .await
                    .context("Failed to read standard input")?;
                bytes
            }
        };

        debug!(source = %self, bytes = bytes.len(), "Read import text");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl std::fmt::Display for TextSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextSource::File(path) => write!(f, "file {}", path.display()),
            TextSource::Url(url) => write!(f, "page {url}"),
            TextSource::Stdin => write!(f, "stdin"),
        }
    }
}

async fn fetch(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("Page {url} returned an error status"))?;

    let body = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read the body of {url}"))?;
    Ok(body.to_vec())
}
