//! Scanner listing through the fake runner

use super::helpers::{test_config, FakeRunner};
use crate::scanner::lister::list_scanners;
use crate::scanner::runner::InvocationKind;
use crate::scanner::types::{ScannerDescriptor, Transport};

#[tokio::test]
async fn test_missing_tool_lists_nothing_without_spawning() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.tool_path = dir.path().join("not-installed");
    let runner = FakeRunner::new()
        .with_devices(&["Canon DR-C225"])
        .with_listing(Transport::Twain, &["Canon DR-C225"]);

    assert!(list_scanners(&runner, &config).await.is_empty());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_ghost_drivers_are_filtered_and_duplicates_collapsed() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = FakeRunner::new()
        .with_devices(&["Canon DR-C225", "USB Composite Device"])
        .with_listing(
            Transport::Twain,
            &["Canon DR-C225", "HP ScanJet Pro 2500 f1", "Error: WIA service stopped"],
        )
        .with_listing(Transport::Wia, &["Canon Scanner", "Canon DR-C225"]);

    let scanners = list_scanners(&runner, &config).await;
    assert_eq!(
        scanners,
        vec![ScannerDescriptor::new(Transport::Twain, "Canon DR-C225")]
    );
    assert_eq!(runner.calls_of(InvocationKind::ListDevices).len(), 2);
    assert_eq!(runner.calls_of(InvocationKind::DeviceQuery).len(), 1);
}

#[tokio::test]
async fn test_probe_failure_shows_everything_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = FakeRunner::new()
        .with_device_query_failure()
        .with_listing(Transport::Twain, &["Ghost Scanner 9000"])
        .with_listing(Transport::Wia, &["Epson Perfection V39"]);

    let scanners = list_scanners(&runner, &config).await;
    assert_eq!(
        scanners,
        vec![
            ScannerDescriptor::new(Transport::Twain, "Ghost Scanner 9000"),
            ScannerDescriptor::new(Transport::Wia, "Epson Perfection V39"),
        ]
    );
}

#[tokio::test]
async fn test_empty_probe_shows_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = FakeRunner::new()
        .with_devices(&[])
        .with_listing(Transport::Twain, &["Ghost Scanner 9000", "Canon Scanner"]);

    assert!(list_scanners(&runner, &config).await.is_empty());
}

#[tokio::test]
async fn test_failing_transport_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = FakeRunner::new()
        .with_devices(&["HP ScanJet Pro 2500 f1"])
        .with_failing_listing(Transport::Twain)
        .with_listing(Transport::Wia, &["HP ScanJet Pro 2500 f1"]);

    let scanners = list_scanners(&runner, &config).await;
    assert_eq!(
        scanners,
        vec![ScannerDescriptor::new(Transport::Wia, "HP ScanJet Pro 2500 f1")]
    );
}

#[tokio::test]
async fn test_listing_is_stable_across_calls() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = FakeRunner::new()
        .with_devices(&["Canon DR-C225", "EPSON Perfection V39"])
        .with_listing(Transport::Twain, &["EPSON Scan", "Canon DR-C225"])
        .with_listing(Transport::Wia, &["EPSON Perfection V39", "Canon Scanner"]);

    let first = list_scanners(&runner, &config).await;
    let second = list_scanners(&runner, &config).await;
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            ScannerDescriptor::new(Transport::Wia, "EPSON Perfection V39"),
            ScannerDescriptor::new(Transport::Twain, "Canon DR-C225"),
        ]
    );
}
