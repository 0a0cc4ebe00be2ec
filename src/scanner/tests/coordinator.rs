//! Scan strategy, cancellation and cleanup through the coordinator

use super::helpers::{spool_files, test_config, FakeRunner, ScanBehavior};
use crate::scanner::coordinator::ScanCoordinator;
use crate::scanner::error::ScanError;
use crate::scanner::events::ScanEvent;
use crate::scanner::runner::InvocationKind;
use crate::scanner::types::{
    FeedSource, Resolution, ScanRequest, ScanSource, ScannerDescriptor, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn coordinator(dir: &std::path::Path, runner: &Arc<FakeRunner>) -> Arc<ScanCoordinator> {
    Arc::new(ScanCoordinator::with_runner(
        test_config(dir),
        runner.clone(),
    ))
}

fn drain_events(rx: &mut broadcast::Receiver<ScanEvent>) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_feeder_failure_falls_back_to_glass() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        FakeRunner::new()
            .with_devices(&["Canon DR-C225"])
            .with_listing(Transport::Twain, &["Canon DR-C225"])
            .with_listing(Transport::Wia, &["Canon Scanner", "Canon DR-C225"])
            .with_scan(
                FeedSource::Feeder,
                ScanBehavior::Fail {
                    exit_code: 1,
                    stderr: "Feeder Empty".to_string(),
                },
            )
            .with_scan(FeedSource::Glass, ScanBehavior::Pages(2)),
    );
    let coordinator = coordinator(dir.path(), &runner);
    let mut events = coordinator.subscribe();

    let scanners = coordinator.list_scanners().await;
    assert_eq!(
        scanners,
        vec![ScannerDescriptor::new(Transport::Twain, "Canon DR-C225")]
    );

    let request = ScanRequest {
        resolution: Resolution::Mid,
        ..ScanRequest::new(scanners[0].id.clone())
    };
    let images = coordinator.perform_scan(&request).await.unwrap();

    assert_eq!(images.len(), 2);
    assert_eq!(images[0].bytes, b"glass page 1");
    assert_eq!(images[1].bytes, b"glass page 2");
    assert!(images[0].to_data_url().starts_with("data:image/jpeg;base64,"));
    assert_eq!(runner.scanned_feeds(), vec!["feeder", "glass"]);

    let scan = &runner.calls_of(InvocationKind::Scan)[0];
    assert_eq!(scan.arg_value("--driver"), Some("twain"));
    assert_eq!(scan.arg_value("--device"), Some("Canon DR-C225"));
    assert_eq!(scan.arg_value("--dpi"), Some("200"));

    // Initial cleanup plus the kill before the fallback
    assert_eq!(runner.calls_of(InvocationKind::KillVendor).len(), 2);
    assert_eq!(coordinator.registry().process_count(), 0);
    assert_eq!(coordinator.registry().timer_count(), 0);
    assert!(spool_files(coordinator.config()).is_empty());

    let events = drain_events(&mut events);
    assert_eq!(
        events.first(),
        Some(&ScanEvent::SessionStarted {
            scanner_id: "twain:Canon DR-C225".to_string()
        })
    );
    assert!(events.contains(&ScanEvent::AttemptStarted {
        feed: FeedSource::Glass,
        fallback: true
    }));
    assert!(events
        .iter()
        .any(|e| matches!(e, ScanEvent::AttemptFailed { feed: FeedSource::Feeder, .. })));
    assert!(events.contains(&ScanEvent::PageCollected { index: 2, total: 2 }));
    assert_eq!(events.last(), Some(&ScanEvent::Completed { pages: 2 }));
}

#[tokio::test]
async fn test_cancel_during_primary_skips_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        FakeRunner::new()
            .with_scan(FeedSource::Feeder, ScanBehavior::Hang)
            .with_scan(FeedSource::Glass, ScanBehavior::Pages(1)),
    );
    let coordinator = coordinator(dir.path(), &runner);
    let mut events = coordinator.subscribe();

    let scan = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .perform_scan(&ScanRequest::new("twain:Canon DR-C225"))
                .await
        })
    };
    runner.scan_started.notified().await;
    coordinator.cancel_scan().await;

    let result = scan.await.unwrap();
    assert_eq!(result.unwrap_err(), ScanError::Cancelled);
    assert_eq!(runner.scanned_feeds(), vec!["feeder"]);
    assert!(coordinator.is_cancelled());
    assert_eq!(coordinator.registry().process_count(), 0);
    assert_eq!(coordinator.registry().timer_count(), 0);
    // The partial page of the killed attempt is gone
    assert!(spool_files(coordinator.config()).is_empty());
    assert_eq!(drain_events(&mut events).last(), Some(&ScanEvent::Cancelled));
}

#[tokio::test]
async fn test_cancel_during_initial_vendor_kill_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        FakeRunner::new()
            .with_kill_delay(Duration::from_millis(200))
            .with_scan(FeedSource::Feeder, ScanBehavior::Pages(1)),
    );
    let coordinator = coordinator(dir.path(), &runner);
    let mut events = coordinator.subscribe();

    let scan = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .perform_scan(&ScanRequest::new("twain:Canon DR-C225"))
                .await
        })
    };
    runner.kill_started.notified().await;
    coordinator.cancel_scan().await;

    let result = scan.await.unwrap();
    assert_eq!(result.unwrap_err(), ScanError::Cancelled);
    assert!(coordinator.is_cancelled());
    assert!(runner.calls_of(InvocationKind::Scan).is_empty());
    assert_eq!(drain_events(&mut events).last(), Some(&ScanEvent::Cancelled));
}

#[tokio::test]
async fn test_feeder_spawn_error_falls_back_to_glass() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        FakeRunner::new()
            .with_scan(FeedSource::Feeder, ScanBehavior::SpawnError("Access is denied."))
            .with_scan(FeedSource::Glass, ScanBehavior::Pages(1)),
    );
    let coordinator = coordinator(dir.path(), &runner);
    let mut events = coordinator.subscribe();

    let images = coordinator
        .perform_scan(&ScanRequest::new("twain:Canon DR-C225"))
        .await
        .unwrap();

    assert_eq!(images.len(), 1);
    assert_eq!(images[0].bytes, b"glass page 1");
    assert_eq!(runner.scanned_feeds(), vec!["feeder", "glass"]);
    assert_eq!(coordinator.registry().process_count(), 0);
    assert!(spool_files(coordinator.config()).is_empty());
    let tool = coordinator.config().tool_path.display().to_string();
    assert!(drain_events(&mut events).contains(&ScanEvent::AttemptFailed {
        feed: FeedSource::Feeder,
        message: format!("Failed to start '{}': Access is denied.", tool),
    }));
}

#[tokio::test]
async fn test_spawn_errors_on_both_attempts_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        FakeRunner::new()
            .with_scan(FeedSource::Feeder, ScanBehavior::SpawnError("Access is denied."))
            .with_scan(FeedSource::Glass, ScanBehavior::SpawnError("Not enough memory.")),
    );
    let coordinator = coordinator(dir.path(), &runner);

    let error = coordinator
        .perform_scan(&ScanRequest::new("twain:Canon DR-C225"))
        .await
        .unwrap_err();

    let tool = coordinator.config().tool_path.display().to_string();
    assert_eq!(
        error,
        ScanError::AllAttemptsFailed {
            primary: format!("Failed to start '{}': Access is denied.", tool),
            fallback: format!("Failed to start '{}': Not enough memory.", tool),
        }
    );
    assert_eq!(runner.scanned_feeds(), vec!["feeder", "glass"]);
    assert_eq!(coordinator.registry().process_count(), 0);
}

#[tokio::test]
async fn test_new_scan_clears_previous_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::new().with_scan(FeedSource::Glass, ScanBehavior::Pages(1)));
    let coordinator = coordinator(dir.path(), &runner);

    coordinator.cancel_scan().await;
    assert!(coordinator.is_cancelled());

    let request = ScanRequest {
        source: ScanSource::Flatbed,
        ..ScanRequest::new("wia:HP ScanJet Pro 2500 f1")
    };
    let images = coordinator.perform_scan(&request).await.unwrap();
    assert_eq!(images.len(), 1);
    assert!(!coordinator.is_cancelled());
}

#[tokio::test]
async fn test_concurrent_scan_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::new().with_scan(FeedSource::Feeder, ScanBehavior::Hang));
    let coordinator = coordinator(dir.path(), &runner);

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .perform_scan(&ScanRequest::new("twain:Canon DR-C225"))
                .await
        })
    };
    runner.scan_started.notified().await;

    let second = coordinator
        .perform_scan(&ScanRequest::new("twain:Canon DR-C225"))
        .await;
    assert_eq!(second.unwrap_err(), ScanError::Busy);
    // The rejected call must not have cancelled the running one
    assert!(!coordinator.is_cancelled());

    coordinator.cancel_scan().await;
    assert_eq!(first.await.unwrap().unwrap_err(), ScanError::Cancelled);
}

#[tokio::test]
async fn test_sequential_scans_use_distinct_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::new().with_scan(FeedSource::Glass, ScanBehavior::Pages(2)));
    let coordinator = coordinator(dir.path(), &runner);
    let request = ScanRequest {
        source: ScanSource::Flatbed,
        ..ScanRequest::new("twain:Canon LiDE 400")
    };

    // A stray page from some earlier run sitting in the shared directory
    std::fs::create_dir_all(&coordinator.config().temp_dir).unwrap();
    let stray = coordinator.config().temp_dir.join("arcai_1_0_00000000_0001.jpg");
    std::fs::write(&stray, b"stray").unwrap();

    let first = coordinator.perform_scan(&request).await.unwrap();
    let second = coordinator.perform_scan(&request).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    let prefix = |name: &str| name.rsplit_once('_').map(|(p, _)| p.to_string()).unwrap();
    assert_eq!(prefix(&first[0].file_name), prefix(&first[1].file_name));
    assert_ne!(prefix(&first[0].file_name), prefix(&second[0].file_name));
    assert!(first.iter().chain(&second).all(|image| image.bytes != b"stray"));
    assert!(stray.exists());
    assert_eq!(spool_files(coordinator.config()), vec!["arcai_1_0_00000000_0001.jpg"]);
}

#[tokio::test]
async fn test_explicit_feeder_failure_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::new().with_scan(
        FeedSource::Duplex,
        ScanBehavior::Fail {
            exit_code: 2,
            stderr: "Device busy".to_string(),
        },
    ));
    let coordinator = coordinator(dir.path(), &runner);
    let request = ScanRequest {
        source: ScanSource::Feeder,
        double_sided: true,
        ..ScanRequest::new("twain:Canon DR-C225")
    };

    let error = coordinator.perform_scan(&request).await.unwrap_err();
    assert_eq!(
        error,
        ScanError::ToolFailed {
            feed: FeedSource::Duplex,
            code: Some(2),
            diagnostics: "Device busy".to_string(),
        }
    );
    assert_eq!(runner.scanned_feeds(), vec!["duplex"]);
}

#[tokio::test]
async fn test_both_attempts_failing_reports_both_messages() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        FakeRunner::new()
            .with_scan(FeedSource::Feeder, ScanBehavior::Pages(0))
            .with_scan(FeedSource::Glass, ScanBehavior::Timeout),
    );
    let coordinator = coordinator(dir.path(), &runner);
    let mut events = coordinator.subscribe();

    let error = coordinator
        .perform_scan(&ScanRequest::new("twain:Canon DR-C225"))
        .await
        .unwrap_err();
    match &error {
        ScanError::AllAttemptsFailed { primary, fallback } => {
            assert_eq!(primary, "No images produced from feeder");
            assert_eq!(fallback, "Scan on glass timed out after 120s");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(matches!(
        drain_events(&mut events).last(),
        Some(ScanEvent::Failed { .. })
    ));
}

#[tokio::test]
async fn test_missing_tool_fails_before_spawning_scans() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::new());
    let mut config = test_config(dir.path());
    config.tool_path = dir.path().join("missing");
    let coordinator = ScanCoordinator::with_runner(config, runner.clone());

    let error = coordinator
        .perform_scan(&ScanRequest::new("twain:Canon DR-C225"))
        .await
        .unwrap_err();
    assert!(matches!(error, ScanError::ToolNotFound { .. }));
    assert!(runner.calls_of(InvocationKind::Scan).is_empty());
}

#[tokio::test]
async fn test_invalid_scanner_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::new());
    let coordinator = coordinator(dir.path(), &runner);

    let error = coordinator
        .perform_scan(&ScanRequest::new("wia:"))
        .await
        .unwrap_err();
    assert_eq!(
        error,
        ScanError::InvalidScanner {
            scanner_id: "wia:".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_suppressor_runs_only_during_feeder_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        FakeRunner::new()
            .with_dismiss_delay(Duration::from_millis(30))
            .with_scan(
                FeedSource::Feeder,
                ScanBehavior::Slow {
                    pages: 0,
                    delay: Duration::from_secs(2),
                },
            )
            .with_scan(
                FeedSource::Glass,
                ScanBehavior::Slow {
                    pages: 1,
                    delay: Duration::from_secs(2),
                },
            ),
    );
    let coordinator = coordinator(dir.path(), &runner);

    let images = coordinator
        .perform_scan(&ScanRequest::new("twain:Canon DR-C225"))
        .await
        .unwrap();
    assert_eq!(images.len(), 1);

    let dismissals = runner.calls_of(InvocationKind::DismissPopup).len();
    assert!(dismissals >= 2, "{} dismissals", dismissals);
    assert_eq!(runner.max_dismissals_in_flight(), 1);
    assert_eq!(coordinator.registry().timer_count(), 0);

    // Nothing left running once the scan is over
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(runner.calls_of(InvocationKind::DismissPopup).len(), dismissals);
}
