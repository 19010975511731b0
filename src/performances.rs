//! Performances: ready-made action lists and YAML-defined ones.
//!
//! YAML performances list their steps in order, each tagged by action:
//!
//! ```yaml
//! name: fetch-report
//! description: Fetch the nightly report
//! steps:
//!   - extend_context: { url: "https://example.com/report.csv", dir: "/tmp/reports" }
//!   - ensure_directory: {}
//!   - download_file: {}
//!   - notify_info: "Report fetched"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::actions::{
    AdminReport, AttachNotifier, DeleteFile, DownloadFile, EnsureDirectory, ExtendContext, LogInfo,
    NotifyInfo, WaitForFile, DIR_FIELD, FILE_PATH_FIELD, URL_FIELD,
};
use crate::adapters::Notifier;
use crate::core::{BoxedAction, Performance};

/// Download `url` into `dir`
pub fn download(url: &str, dir: &Path) -> Performance {
    Performance::new(
        "download",
        vec![
            Box::new(ExtendContext::new(json!({
                URL_FIELD: url,
                DIR_FIELD: dir.to_string_lossy(),
            }))),
            Box::new(EnsureDirectory::new()),
            Box::new(DownloadFile::new()),
            Box::new(LogInfo::new("File downloaded")),
        ],
    )
}

/// Download `url` into `dir` and report progress to an operator channel
pub fn download_and_report(notifier: Arc<dyn Notifier>, url: &str, dir: &Path) -> Performance {
    let mut actions: Vec<BoxedAction> = vec![
        Box::new(AttachNotifier::new(notifier)),
        Box::new(NotifyInfo::new(format!("Fetching {}", url))),
    ];
    actions.extend(download(url, dir).actions);
    actions.push(Box::new(AdminReport::new([URL_FIELD, FILE_PATH_FIELD])));
    actions.push(Box::new(NotifyInfo::new("File processed successfully")));

    Performance::new("download_and_report", actions)
}

/// A performance definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSpec {
    /// Performance name (used in logs)
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Ordered steps
    pub steps: Vec<ActionSpec>,
}

/// One step of a YAML performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSpec {
    /// Merge a record into the context
    ExtendContext(serde_json::Value),

    /// Log through the context logger
    LogInfo(String),

    /// Message the operator (or log without a notifier)
    NotifyInfo(String),

    /// Send context fields to the administrator (all fields when empty)
    AdminReport {
        #[serde(default)]
        keys: Vec<String>,
    },

    /// Download the context `url`
    DownloadFile {
        #[serde(default)]
        dir: Option<PathBuf>,
    },

    /// Delete a fixed path or, without one, the downloaded file
    DeleteFile {
        #[serde(default)]
        path: Option<PathBuf>,
    },

    /// Poll for a file
    WaitForFile {
        path: PathBuf,
        #[serde(default)]
        max_polls: Option<u32>,
        #[serde(default)]
        interval_ms: Option<u64>,
    },

    /// Make sure a directory exists (context `dir` when no path is given)
    EnsureDirectory {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl ActionSpec {
    /// Instantiate the action
    pub fn build(&self) -> BoxedAction {
        match self {
            Self::ExtendContext(patch) => Box::new(ExtendContext::new(patch.clone())),
            Self::LogInfo(message) => Box::new(LogInfo::new(message.clone())),
            Self::NotifyInfo(message) => Box::new(NotifyInfo::new(message.clone())),
            Self::AdminReport { keys } => Box::new(AdminReport::new(keys.clone())),
            Self::DownloadFile { dir: Some(dir) } => Box::new(DownloadFile::into_dir(dir.clone())),
            Self::DownloadFile { dir: None } => Box::new(DownloadFile::new()),
            Self::DeleteFile { path: Some(path) } => Box::new(DeleteFile::new(path.clone())),
            Self::DeleteFile { path: None } => Box::new(DeleteFile::downloaded()),
            Self::WaitForFile {
                path,
                max_polls,
                interval_ms,
            } => {
                let mut action = WaitForFile::new(path.clone());
                if let Some(max) = max_polls {
                    action = action.max_polls(*max);
                }
                if let Some(ms) = interval_ms {
                    action = action.interval(Duration::from_millis(*ms));
                }
                Box::new(action)
            }
            Self::EnsureDirectory { path: Some(path) } => {
                Box::new(EnsureDirectory::path(path.clone()))
            }
            Self::EnsureDirectory { path: None } => Box::new(EnsureDirectory::new()),
        }
    }
}

impl PerformanceSpec {
    /// Load a performance from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read performance file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a performance from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse performance YAML")
    }

    /// Validate the definition
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Performance name cannot be empty");
        }

        if self.steps.is_empty() {
            anyhow::bail!("Performance must have at least one step");
        }

        for (i, step) in self.steps.iter().enumerate() {
            if let ActionSpec::ExtendContext(patch) = step {
                if !patch.is_object() {
                    anyhow::bail!("Step {} extends the context with a non-record value", i);
                }
            }
        }

        Ok(())
    }

    /// Build a submittable performance
    pub fn build(&self) -> Result<Performance> {
        self.validate()?;
        Ok(Performance::new(
            self.name.clone(),
            self.steps.iter().map(ActionSpec::build).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PERFORMANCE_YAML: &str = r#"
name: fetch
description: Fetch a file and clean up

steps:
  - extend_context:
      url: https://example.com/file.torrent
      dir: /tmp/fetch
  - ensure_directory: {}
  - download_file: {}
  - wait_for_file:
      path: /tmp/fetch/file.torrent
      max_polls: 5
  - log_info: done
  - delete_file: {}
"#;

    #[test]
    fn test_performance_parsing() {
        let spec = PerformanceSpec::from_yaml(TEST_PERFORMANCE_YAML).unwrap();

        assert_eq!(spec.name, "fetch");
        assert_eq!(spec.steps.len(), 6);
        assert_eq!(spec.steps[4], ActionSpec::LogInfo("done".to_string()));
        assert_eq!(
            spec.steps[3],
            ActionSpec::WaitForFile {
                path: PathBuf::from("/tmp/fetch/file.torrent"),
                max_polls: Some(5),
                interval_ms: None,
            }
        );
    }

    #[test]
    fn test_build_preserves_order() {
        let performance = PerformanceSpec::from_yaml(TEST_PERFORMANCE_YAML)
            .unwrap()
            .build()
            .unwrap();

        let names: Vec<&str> = performance.actions.iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec![
                "extend_context",
                "ensure_directory",
                "download_file",
                "wait_for_file",
                "log_info",
                "delete_file"
            ]
        );
    }

    #[test]
    fn test_rejects_non_record_extension() {
        let yaml = r#"
name: bad
steps:
  - extend_context: 42
"#;
        let spec = PerformanceSpec::from_yaml(yaml).unwrap();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_steps() {
        let spec = PerformanceSpec::from_yaml("name: empty\nsteps: []\n").unwrap();
        assert!(spec.build().is_err());
    }

    #[test]
    fn test_admin_report_step() {
        let yaml = r#"
name: report
steps:
  - admin_report:
      keys: [url, file_path]
  - admin_report: {}
"#;
        let spec = PerformanceSpec::from_yaml(yaml).unwrap();
        assert_eq!(
            spec.steps[0],
            ActionSpec::AdminReport {
                keys: vec!["url".to_string(), "file_path".to_string()]
            }
        );
        assert_eq!(spec.steps[1], ActionSpec::AdminReport { keys: vec![] });
        assert_eq!(spec.build().unwrap().actions[0].name(), "admin_report");
    }

    #[test]
    fn test_download_performance_shape() {
        let performance = download("https://example.com/a.txt", Path::new("/tmp/out"));
        let names: Vec<&str> = performance.actions.iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec!["extend_context", "ensure_directory", "download_file", "log_info"]
        );
    }
}
