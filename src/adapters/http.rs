//! HTTP automation driver.
//!
//! The driver is the one long-lived session handle shared by network actions.
//! It presents itself as a regular desktop browser so the far end sees the
//! same client on every request.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_DISPOSITION};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
        }
    }
}

/// Shared HTTP session
#[derive(Debug, Clone)]
pub struct HttpDriver {
    client: reqwest::Client,
    config: DriverConfig,
}

impl Default for HttpDriver {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            config: DriverConfig::default(),
        }
    }
}

impl HttpDriver {
    /// Build a driver with browser-like default headers
    pub fn new(config: DriverConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .context("Invalid Accept-Language header")?,
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Download `url` into the existing directory `dir`, returning the saved
    /// file path
    pub async fn download(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?
            .error_for_status()
            .with_context(|| format!("Download of {} was rejected", url))?;

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .or_else(|| filename_from_url(response.url()))
            .unwrap_or_else(|| "download.bin".to_string());

        let path = dir.join(&file_name);
        let mut file = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?
        {
            written += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(url, path = %path.display(), bytes = written, "Download saved");
        Ok(path)
    }
}

/// File name from a Content-Disposition header.
///
/// The RFC 6266 `filename*=charset'lang'value` form wins over `filename=`.
fn filename_from_disposition(header: &str) -> Option<String> {
    let params: Vec<&str> = header.split(';').map(str::trim).collect();

    let extended = params
        .iter()
        .find_map(|part| part.strip_prefix("filename*="))
        .and_then(|value| value.splitn(3, '\'').nth(2))
        .map(decode);

    let plain = || {
        params
            .iter()
            .find_map(|part| part.strip_prefix("filename="))
            .map(|name| name.trim_matches('"').to_string())
    };

    extended.or_else(plain).as_deref().and_then(sanitize)
}

/// Last non-empty path segment of a URL, percent-decoded
fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|s| !s.is_empty())
        .map(decode)
        .as_deref()
        .and_then(sanitize)
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

fn sanitize(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    Some(name.to_string())
}
