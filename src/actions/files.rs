//! File-oriented actions.
//!
//! Paths either come fixed at construction or are read from a context field
//! written by an earlier action (usually `dir` or `file_path`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::core::{Action, Context, Outcome, Steps};

use super::{LogInfo, DIR_FIELD, FILE_PATH_FIELD, URL_FIELD};

/// Where an action finds its path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSource {
    Fixed(PathBuf),
    Field(String),
}

impl PathSource {
    fn resolve(&self, ctx: &Context) -> Result<PathBuf> {
        match self {
            Self::Fixed(path) => Ok(path.clone()),
            Self::Field(key) => Ok(PathBuf::from(ctx.require_str(key)?)),
        }
    }
}

/// Download the context `url` into the context `dir`, then record `file_path`
#[derive(Debug, Clone)]
pub struct DownloadFile {
    dir: PathSource,
}

impl Default for DownloadFile {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadFile {
    pub fn new() -> Self {
        Self {
            dir: PathSource::Field(DIR_FIELD.to_string()),
        }
    }

    /// Save into a fixed directory instead of the context `dir`
    pub fn into_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: PathSource::Fixed(dir.into()),
        }
    }
}

#[async_trait]
impl Action for DownloadFile {
    fn name(&self) -> &str {
        "download_file"
    }

    async fn execute(&mut self, ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        let url = ctx.require_str(URL_FIELD)?.to_string();
        let dir = self.dir.resolve(ctx)?;

        let path = ctx.driver().download(&url, &dir).await?;
        ctx.logger()
            .info(&format!("File saved to {}", path.display()));

        Ok(Outcome::Extend(json!({
            FILE_PATH_FIELD: path.to_string_lossy(),
        })))
    }
}

/// Remove a file
#[derive(Debug, Clone)]
pub struct DeleteFile {
    path: PathSource,
}

impl DeleteFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: PathSource::Fixed(path.into()),
        }
    }

    /// Delete whatever path the given context field names
    pub fn from_field(key: impl Into<String>) -> Self {
        Self {
            path: PathSource::Field(key.into()),
        }
    }

    /// Delete the last downloaded file
    pub fn downloaded() -> Self {
        Self::from_field(FILE_PATH_FIELD)
    }
}

#[async_trait]
impl Action for DeleteFile {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    async fn execute(&mut self, ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        let path = self.path.resolve(ctx)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete {}", path.display()))?;
        debug!(path = %path.display(), "File deleted");
        Ok(Outcome::Done)
    }
}

/// Poll until a file exists.
///
/// Answers `Retry` while the file is missing, so it stays at the head of
/// the queue and the scheduler's pacing decides the poll interval. With
/// `max_polls` set it gives up with an error instead of polling forever.
#[derive(Debug, Clone)]
pub struct WaitForFile {
    path: PathSource,
    polls: u32,
    max_polls: Option<u32>,
    interval: Option<Duration>,
}

impl WaitForFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: PathSource::Fixed(path.into()),
            polls: 0,
            max_polls: None,
            interval: None,
        }
    }

    pub fn from_field(key: impl Into<String>) -> Self {
        Self {
            path: PathSource::Field(key.into()),
            polls: 0,
            max_polls: None,
            interval: None,
        }
    }

    pub fn max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }
}

#[async_trait]
impl Action for WaitForFile {
    fn name(&self) -> &str {
        "wait_for_file"
    }

    fn post_delay(&self) -> Option<Duration> {
        self.interval
    }

    async fn execute(&mut self, ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        let path = self.path.resolve(ctx)?;
        self.polls += 1;

        let exists = tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check for {}", path.display()))?;
        if exists {
            debug!(path = %path.display(), polls = self.polls, "File appeared");
            return Ok(Outcome::Done);
        }

        if let Some(max) = self.max_polls {
            if self.polls >= max {
                anyhow::bail!(
                    "{} did not appear after {} polls",
                    path.display(),
                    self.polls
                );
            }
        }

        Ok(Outcome::Retry)
    }
}

/// Make sure the context `dir` exists, creating it through pre-steps if not
#[derive(Debug, Clone)]
pub struct EnsureDirectory {
    dir: PathSource,
}

impl Default for EnsureDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsureDirectory {
    pub fn new() -> Self {
        Self {
            dir: PathSource::Field(DIR_FIELD.to_string()),
        }
    }

    pub fn path(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: PathSource::Fixed(dir.into()),
        }
    }
}

#[async_trait]
impl Action for EnsureDirectory {
    fn name(&self) -> &str {
        "ensure_directory"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    async fn execute(&mut self, ctx: &mut Context, steps: &mut Steps) -> Result<Outcome> {
        let dir = self.dir.resolve(ctx)?;

        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => anyhow::bail!("{} exists but is not a directory", dir.display()),
            Err(_) => {
                info!(dir = %dir.display(), "Directory missing, scheduling creation");
                steps.set_pre(vec![
                    Box::new(CreateDirectory::new(&dir)),
                    Box::new(LogInfo::new(format!("Created directory {}", dir.display()))),
                ]);
            }
        }

        Ok(Outcome::Done)
    }
}

/// Create a directory and its parents
#[derive(Debug, Clone)]
pub struct CreateDirectory {
    dir: PathBuf,
}

impl CreateDirectory {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl Action for CreateDirectory {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    async fn execute(&mut self, _ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        Ok(Outcome::Done)
    }
}
