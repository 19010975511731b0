//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Error, Result};
use async_trait::async_trait;

use stagehand::adapters::{HttpDriver, Notifier};
use stagehand::core::{Logger, Pacing, Scheduler, SchedulerConfig, TurnLimits};
use stagehand::TurnStatus;

/// Logger that keeps every message
#[derive(Default)]
pub struct RecordingLogger {
    pub infos: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn error(&self, error: &Error) {
        self.errors.lock().unwrap().push(format!("{:#}", error));
    }
}

/// Notifier that keeps every message
#[derive(Default)]
pub struct RecordingNotifier {
    pub infos: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub admin: Mutex<Vec<serde_json::Value>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn info(&self, message: &str) -> Result<()> {
        self.infos.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn error(&self, error: &Error) -> Result<()> {
        self.errors.lock().unwrap().push(error.to_string());
        Ok(())
    }

    async fn admin_info(&self, payload: &serde_json::Value) -> Result<()> {
        self.admin.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Serve every connection with the same raw HTTP response.
///
/// Returns the base URL (`http://127.0.0.1:<port>`).
pub async fn serve_static(headers: &'static str, body: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
                    body.len(),
                    headers,
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

/// Scheduler without pauses and a recording logger
pub fn immediate_scheduler() -> (Scheduler, Arc<RecordingLogger>) {
    scheduler_with(Pacing::immediate(), TurnLimits::unlimited())
}

pub fn scheduler_with(pacing: Pacing, limits: TurnLimits) -> (Scheduler, Arc<RecordingLogger>) {
    let logger = Arc::new(RecordingLogger::default());
    let scheduler = Scheduler::new(
        SchedulerConfig {
            pacing,
            limits,
            ..Default::default()
        },
        HttpDriver::default(),
        logger.clone(),
    );
    (scheduler, logger)
}

/// Action names from the turn history, in order
pub fn history_names(scheduler: &Scheduler) -> Vec<String> {
    scheduler
        .history()
        .into_iter()
        .map(|event| event.action)
        .collect()
}

pub fn history_statuses(scheduler: &Scheduler) -> Vec<TurnStatus> {
    scheduler
        .history()
        .into_iter()
        .map(|event| event.status)
        .collect()
}
