//! Configuration for stagehand.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (STAGEHAND_HOME, STAGEHAND_DOWNLOADS, STAGEHAND_TELEGRAM_*)
//! 2. Config file (.stagehand/config.yaml)
//! 3. Defaults (~/.stagehand)
//!
//! Config file discovery:
//! - Searches current directory and parents for .stagehand/config.yaml
//! - Relative paths in the config file resolve against the project root
//!   (the directory holding .stagehand/)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::http::DriverConfig;
use crate::adapters::TelegramConfig;
use crate::core::{Pacing, SchedulerConfig, TurnLimits};

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub pacing: Option<Pacing>,
    #[serde(default)]
    pub limits: Option<TurnLimits>,
    #[serde(default)]
    pub driver: Option<DriverConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramFileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory
    pub home: Option<String>,
    /// Default destination for downloads
    pub downloads: Option<String>,
}

/// Telegram section; every field may also come from the environment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramFileConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub admin_id: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Default download directory
    pub downloads: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub pacing: Pacing,
    pub limits: TurnLimits,
    pub driver: DriverConfig,
    /// Present only when token and chat id are both known
    pub telegram: Option<TelegramConfig>,
}

impl ResolvedConfig {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            pacing: self.pacing.clone(),
            limits: self.limits.clone(),
            ..Default::default()
        }
    }
}

/// Find config file by searching the given directory and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".stagehand").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Environment lookup, abstracted so tests don't touch the process env
trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Merge file, environment and defaults
fn resolve(
    config: ConfigFile,
    config_file: Option<PathBuf>,
    default_home: PathBuf,
    env: &dyn Env,
) -> ResolvedConfig {
    // project root is the parent of .stagehand/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let home = env
        .var("STAGEHAND_HOME")
        .map(PathBuf::from)
        .or_else(|| config.paths.home.as_deref().map(|p| resolve_path(&base_dir, p)))
        .unwrap_or(default_home);

    let downloads = env
        .var("STAGEHAND_DOWNLOADS")
        .map(PathBuf::from)
        .or_else(|| {
            config
                .paths
                .downloads
                .as_deref()
                .map(|p| resolve_path(&base_dir, p))
        })
        .unwrap_or_else(|| home.join("downloads"));

    let file_telegram = config.telegram.unwrap_or_default();
    let bot_token = env.var("STAGEHAND_TELEGRAM_TOKEN").or(file_telegram.bot_token);
    let chat_id = env.var("STAGEHAND_TELEGRAM_CHAT_ID").or(file_telegram.chat_id);
    let admin_id = env.var("STAGEHAND_TELEGRAM_ADMIN_ID").or(file_telegram.admin_id);

    let telegram = match (bot_token, chat_id) {
        (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
            bot_token,
            chat_id,
            admin_id,
        }),
        _ => None,
    };

    ResolvedConfig {
        home,
        downloads,
        config_file,
        pacing: config.pacing.unwrap_or_default(),
        limits: config.limits.unwrap_or_default(),
        driver: config.driver.unwrap_or_default(),
        telegram,
    }
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".stagehand");

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let config_file = find_config_file(&cwd);

    let config = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    Ok(resolve(config, config_file, default_home, &ProcessEnv))
}
