//! Stock Action Integration Tests
//!
//! File, notification and YAML-defined performances run through a real
//! scheduler against a temporary directory.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use stagehand::actions::{
    AdminReport, AttachNotifier, DeleteFile, DownloadFile, EnsureDirectory, ExtendContext, LogInfo,
    NotifyInfo, WaitForFile,
};
use stagehand::core::BoxedAction;
use stagehand::performances;
use stagehand::{PerformanceSpec, TurnStatus};

use common::{
    history_names, history_statuses, immediate_scheduler, serve_static, RecordingNotifier,
};

#[tokio::test]
async fn test_missing_directory_is_created_through_pre_steps() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("a").join("b");
    let (scheduler, logger) = immediate_scheduler();

    scheduler.submit(vec![
        Box::new(ExtendContext::new(json!({ "dir": dir.to_string_lossy() }))) as BoxedAction,
        Box::new(EnsureDirectory::new()),
        Box::new(LogInfo::new("after")),
    ]);
    scheduler.wait_idle().await;

    assert!(dir.is_dir());
    assert_eq!(
        history_names(&scheduler),
        vec![
            "extend_context",
            "ensure_directory",
            "create_directory",
            "log_info",
            "log_info",
            "clean_up_context"
        ]
    );
    assert_eq!(
        logger.infos(),
        vec![format!("Created directory {}", dir.display()), "after".to_string()]
    );
}

#[tokio::test]
async fn test_existing_directory_needs_no_pre_steps() {
    let temp = TempDir::new().unwrap();
    let (scheduler, _) = immediate_scheduler();

    scheduler.submit(vec![
        Box::new(EnsureDirectory::path(temp.path())) as BoxedAction,
        Box::new(LogInfo::new("after")),
    ]);
    scheduler.wait_idle().await;

    assert_eq!(
        history_names(&scheduler),
        vec!["ensure_directory", "log_info", "clean_up_context"]
    );
}

#[tokio::test]
async fn test_ensure_directory_rejects_a_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plain.txt");
    std::fs::write(&file, "x").unwrap();
    let (scheduler, logger) = immediate_scheduler();

    scheduler.submit(vec![Box::new(EnsureDirectory::path(&file)) as BoxedAction]);
    scheduler.wait_idle().await;

    assert_eq!(history_statuses(&scheduler)[0], TurnStatus::Failed);
    assert!(logger.errors()[0].contains("not a directory"));
}

#[tokio::test]
async fn test_wait_for_file_gives_up_after_max_polls() {
    let temp = TempDir::new().unwrap();
    let (scheduler, logger) = immediate_scheduler();

    scheduler.submit(vec![Box::new(
        WaitForFile::new(temp.path().join("never.txt"))
            .max_polls(3)
            .interval(Duration::ZERO),
    ) as BoxedAction]);
    scheduler.wait_idle().await;

    assert_eq!(
        history_statuses(&scheduler),
        vec![
            TurnStatus::Retained,
            TurnStatus::Retained,
            TurnStatus::Failed,
            TurnStatus::Acknowledged,
            TurnStatus::Acknowledged
        ]
    );
    assert!(logger.errors()[0].contains("did not appear after 3 polls"));
}

#[tokio::test]
async fn test_wait_for_existing_file_completes_at_once() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ready.txt");
    std::fs::write(&path, "ready").unwrap();
    let (scheduler, _) = immediate_scheduler();

    scheduler.submit(vec![Box::new(WaitForFile::new(&path).interval(Duration::ZERO)) as BoxedAction]);
    scheduler.wait_idle().await;

    assert_eq!(
        history_statuses(&scheduler),
        vec![TurnStatus::Acknowledged, TurnStatus::Acknowledged]
    );
}

#[tokio::test]
async fn test_delete_downloaded_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("movie.torrent");
    std::fs::write(&path, "d8:announce").unwrap();
    let (scheduler, _) = immediate_scheduler();

    scheduler.submit(vec![
        Box::new(ExtendContext::new(json!({ "file_path": path.to_string_lossy() }))) as BoxedAction,
        Box::new(DeleteFile::downloaded()),
    ]);
    scheduler.wait_idle().await;

    assert!(!path.exists());
    assert!(history_statuses(&scheduler)
        .iter()
        .all(|status| *status == TurnStatus::Acknowledged));
}

#[tokio::test]
async fn test_delete_missing_file_is_recovered() {
    let temp = TempDir::new().unwrap();
    let (scheduler, logger) = immediate_scheduler();

    scheduler.submit(vec![
        Box::new(DeleteFile::new(temp.path().join("gone.txt"))) as BoxedAction,
        Box::new(LogInfo::new("still running")),
    ]);
    scheduler.wait_idle().await;

    assert_eq!(
        history_names(&scheduler),
        vec![
            "delete_file",
            "error_notification",
            "log_info",
            "clean_up_context"
        ]
    );
    assert!(logger.errors()[0].contains("Failed to delete"));
    assert_eq!(logger.infos(), vec!["still running"]);
}

#[tokio::test]
async fn test_download_without_url_fails_the_turn() {
    let temp = TempDir::new().unwrap();
    let (scheduler, logger) = immediate_scheduler();

    scheduler.submit(vec![Box::new(DownloadFile::into_dir(temp.path())) as BoxedAction]);
    scheduler.wait_idle().await;

    assert_eq!(history_statuses(&scheduler)[0], TurnStatus::Failed);
    assert!(logger.errors()[0].contains("'url'"));
}

#[tokio::test]
async fn test_notify_info_falls_back_to_logger() {
    let (scheduler, logger) = immediate_scheduler();

    scheduler.submit(vec![Box::new(NotifyInfo::new("hello")) as BoxedAction]);
    scheduler.wait_idle().await;

    assert_eq!(logger.infos(), vec!["hello"]);
}

#[tokio::test]
async fn test_notifier_does_not_leak_into_next_performance() {
    let (scheduler, logger) = immediate_scheduler();
    let notifier = Arc::new(RecordingNotifier::default());

    scheduler.submit(vec![
        Box::new(AttachNotifier::new(notifier.clone())) as BoxedAction,
        Box::new(NotifyInfo::new("first")),
    ]);
    scheduler.submit(vec![Box::new(NotifyInfo::new("second")) as BoxedAction]);
    scheduler.wait_idle().await;

    assert_eq!(notifier.infos.lock().unwrap().clone(), vec!["first"]);
    assert_eq!(logger.infos(), vec!["second"]);
}

#[tokio::test]
async fn test_yaml_performance_end_to_end() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("out");
    let stale = temp.path().join("stale.txt");
    std::fs::write(&stale, "old").unwrap();

    let yaml = format!(
        r#"
name: tidy
description: Prepare the output directory
steps:
  - extend_context:
      dir: {dir}
  - ensure_directory: {{}}
  - delete_file:
      path: {stale}
  - log_info: tidied
"#,
        dir = dir.display(),
        stale = stale.display()
    );

    let performance = PerformanceSpec::from_yaml(&yaml).unwrap().build().unwrap();
    assert_eq!(performance.name, "tidy");

    let (scheduler, logger) = immediate_scheduler();
    scheduler.submit(performance);
    scheduler.wait_idle().await;

    assert!(dir.is_dir());
    assert!(!stale.exists());
    assert_eq!(logger.infos().last().map(String::as_str), Some("tidied"));
    assert!(logger.errors().is_empty());
    assert_eq!(
        scheduler.context_keys().await,
        vec!["driver", "queue", "logger"]
    );
}

#[tokio::test]
async fn test_wait_for_file_surfaces_io_errors() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plain.txt");
    std::fs::write(&file, "x").unwrap();
    let (scheduler, logger) = immediate_scheduler();

    // a regular file used as a directory is an error, not "not yet"
    scheduler.submit(vec![Box::new(
        WaitForFile::new(file.join("inner.txt")).interval(Duration::ZERO),
    ) as BoxedAction]);
    scheduler.wait_idle().await;

    assert_eq!(
        history_statuses(&scheduler),
        vec![
            TurnStatus::Failed,
            TurnStatus::Acknowledged,
            TurnStatus::Acknowledged
        ]
    );
    assert!(logger.errors()[0].contains("Failed to check for"));
}

#[tokio::test]
async fn test_admin_report_goes_to_notifier() {
    let (scheduler, _) = immediate_scheduler();
    let notifier = Arc::new(RecordingNotifier::default());

    scheduler.submit(vec![
        Box::new(AttachNotifier::new(notifier.clone())) as BoxedAction,
        Box::new(ExtendContext::new(json!({ "url": "https://example.com/a", "dir": "/tmp" }))),
        Box::new(AdminReport::new(["url", "file_path"])),
        Box::new(AdminReport::all()),
    ]);
    scheduler.wait_idle().await;

    assert_eq!(
        notifier.admin.lock().unwrap().clone(),
        vec![
            json!({ "url": "https://example.com/a", "file_path": null }),
            json!({ "url": "https://example.com/a", "dir": "/tmp" }),
        ]
    );
}

#[tokio::test]
async fn test_admin_report_without_notifier_is_logged() {
    let (scheduler, logger) = immediate_scheduler();

    scheduler.submit(vec![
        Box::new(ExtendContext::new(json!({ "x": 1 }))) as BoxedAction,
        Box::new(AdminReport::new(["x"])),
    ]);
    scheduler.wait_idle().await;

    assert_eq!(logger.infos(), vec![r#"{"x":1}"#]);
}

#[tokio::test]
async fn test_download_creates_directory_through_pre_steps() {
    let base = serve_static(
        "Content-Disposition: attachment; filename*=UTF-8''My%20File.txt\r\n",
        "hello",
    )
    .await;
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("new").join("deeper");
    let (scheduler, logger) = immediate_scheduler();

    scheduler.submit(performances::download(&format!("{}/files/ignored.bin", base), &dir));
    scheduler.wait_idle().await;

    assert!(logger.errors().is_empty(), "{:?}", logger.errors());
    assert!(history_names(&scheduler).contains(&"create_directory".to_string()));
    assert_eq!(
        std::fs::read_to_string(dir.join("My File.txt")).unwrap(),
        "hello"
    );
}

#[tokio::test]
async fn test_download_names_file_after_decoded_url() {
    let base = serve_static("", "payload").await;
    let temp = TempDir::new().unwrap();
    let (scheduler, _) = immediate_scheduler();

    scheduler.submit(performances::download(
        &format!("{}/files/My%20Movie.torrent", base),
        temp.path(),
    ));
    scheduler.wait_idle().await;

    assert_eq!(
        std::fs::read_to_string(temp.path().join("My Movie.torrent")).unwrap(),
        "payload"
    );
}

#[tokio::test]
async fn test_download_does_not_create_missing_directory() {
    let base = serve_static("", "payload").await;
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing");
    let (scheduler, logger) = immediate_scheduler();

    scheduler.submit(vec![
        Box::new(ExtendContext::new(json!({ "url": format!("{}/a.txt", base) }))) as BoxedAction,
        Box::new(DownloadFile::into_dir(&missing)),
    ]);
    scheduler.wait_idle().await;

    assert_eq!(history_statuses(&scheduler)[1], TurnStatus::Failed);
    assert!(logger.errors()[0].contains("Failed to create"));
    assert!(!missing.exists());
}
