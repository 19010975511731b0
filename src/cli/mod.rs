//! Command-line interface for stagehand.
//!
//! Every command builds a scheduler from the resolved configuration,
//! submits one performance and waits for the queue to drain.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::http::HttpDriver;
use crate::adapters::{Notifier, TelegramNotifier};
use crate::config::{self, ResolvedConfig};
use crate::core::{Performance, Scheduler, TracingLogger};
use crate::domain::TurnStatus;
use crate::performances::{self, PerformanceSpec};

/// stagehand - paced action-queue automation
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a file into a directory
    Fetch {
        /// URL to download
        url: String,

        /// Destination directory (defaults to the configured downloads dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Report progress through the configured Telegram chat
        #[arg(long, env = "STAGEHAND_NOTIFY")]
        notify: bool,
    },

    /// Run a performance defined in a YAML file
    Run {
        /// Path to the performance file
        file: PathBuf,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::load_config()?;

        match self.command {
            Commands::Fetch { url, dir, notify } => fetch(&cfg, &url, dir, notify).await,
            Commands::Run { file } => run_file(&cfg, &file).await,
            Commands::Config => {
                show_config(&cfg);
                Ok(())
            }
        }
    }
}

fn build_scheduler(cfg: &ResolvedConfig) -> Result<Scheduler> {
    let driver = HttpDriver::new(cfg.driver.clone())?;
    Ok(Scheduler::new(
        cfg.scheduler_config(),
        driver,
        Arc::new(TracingLogger),
    ))
}

/// Download a single file
async fn fetch(cfg: &ResolvedConfig, url: &str, dir: Option<PathBuf>, notify: bool) -> Result<()> {
    let dir = dir.unwrap_or_else(|| cfg.downloads.clone());

    let performance = if notify {
        let telegram = cfg
            .telegram
            .clone()
            .context("--notify needs STAGEHAND_TELEGRAM_TOKEN and STAGEHAND_TELEGRAM_CHAT_ID")?;
        let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::from_config(telegram));
        performances::download_and_report(notifier, url, &dir)
    } else {
        performances::download(url, &dir)
    };

    perform(cfg, performance).await
}

/// Run a YAML performance
async fn run_file(cfg: &ResolvedConfig, file: &Path) -> Result<()> {
    let performance = PerformanceSpec::from_file(file)?.build()?;
    perform(cfg, performance).await
}

/// Submit, wait for the queue to drain and summarise
async fn perform(cfg: &ResolvedConfig, performance: Performance) -> Result<()> {
    let scheduler = build_scheduler(cfg)?;
    let name = performance.name.clone();
    let id = scheduler.submit(performance);

    scheduler.wait_idle().await;

    let history = scheduler.history();
    let failures: Vec<_> = history
        .iter()
        .filter(|e| e.status == TurnStatus::Failed)
        .collect();

    eprintln!(
        "\n[Performance '{}' ({}) finished after {} turns]",
        name,
        id,
        history.len()
    );

    if let Some(reason) = scheduler.halted() {
        anyhow::bail!("Queue stopped early: {}", reason);
    }

    if !failures.is_empty() {
        for event in &failures {
            eprintln!(
                "  {} failed: {}",
                event.action,
                event.error.as_deref().unwrap_or("unknown error")
            );
        }
        anyhow::bail!("{} action(s) failed", failures.len());
    }

    Ok(())
}

fn show_config(cfg: &ResolvedConfig) {
    println!("stagehand configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Downloads: {}", cfg.downloads.display());
    println!();
    println!("Pacing:");
    println!("  Default post delay: {}ms", cfg.pacing.default_post_delay_ms);
    println!(
        "  Jitter window:      {}..{}ms",
        cfg.pacing.jitter_min_ms, cfg.pacing.jitter_max_ms
    );
    println!();
    println!("Limits:");
    match cfg.limits.max_turns {
        Some(max) => println!("  Max turns per drain: {}", max),
        None => println!("  Max turns per drain: unlimited"),
    }
    println!();
    println!("Driver:");
    println!("  User-Agent:      {}", cfg.driver.user_agent);
    println!("  Accept-Language: {}", cfg.driver.accept_language);
    println!();
    match &cfg.telegram {
        Some(t) => println!(
            "Telegram: chat {} (admin {})",
            t.chat_id,
            t.admin_id.as_deref().unwrap_or(&t.chat_id)
        ),
        None => println!("Telegram: (not configured)"),
    }
}
