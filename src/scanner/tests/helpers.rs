//! Test helpers for scanner unit tests
//!
//! [`FakeRunner`] stands in for the scan tool and the OS helpers: it answers
//! device queries and list mode from canned data, writes page files to the
//! `-o` pattern of scan invocations and records every call it receives.

use crate::scanner::config::ScannerConfig;
use crate::scanner::runner::{Invocation, InvocationKind, KillSignal, ProcessOutput, ProcessRunner};
use crate::scanner::types::{FeedSource, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// How a simulated scan invocation behaves
#[derive(Debug, Clone)]
pub enum ScanBehavior {
    /// Write this many pages and exit 0
    Pages(usize),
    /// Write nothing and exit with `exit_code`, reporting `stderr`
    Fail { exit_code: i32, stderr: String },
    /// Wait `delay`, then write `pages` pages and exit 0
    Slow { pages: usize, delay: Duration },
    /// Write one partial page and block until killed
    Hang,
    /// Report a timeout
    Timeout,
    /// The tool cannot be started at all
    SpawnError(&'static str),
}

#[derive(Default)]
pub struct FakeRunner {
    devices: Option<Vec<String>>,
    listings: HashMap<&'static str, Vec<String>>,
    failing_listings: Vec<&'static str>,
    scans: HashMap<&'static str, ScanBehavior>,
    dismiss_delay: Duration,
    kill_delay: Duration,
    calls: Mutex<Vec<Invocation>>,
    dismissals_in_flight: AtomicUsize,
    max_dismissals_in_flight: AtomicUsize,
    dismissals: AtomicUsize,
    /// Notified when a scan invocation starts
    pub scan_started: Notify,
    /// Notified when a kill-by-name invocation starts
    pub kill_started: Notify,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            devices: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn with_devices(mut self, devices: &[&str]) -> Self {
        self.devices = Some(devices.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn with_device_query_failure(mut self) -> Self {
        self.devices = None;
        self
    }

    pub fn with_listing(mut self, transport: Transport, names: &[&str]) -> Self {
        self.listings
            .insert(transport.as_str(), names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_failing_listing(mut self, transport: Transport) -> Self {
        self.failing_listings.push(transport.as_str());
        self
    }

    pub fn with_scan(mut self, feed: FeedSource, behavior: ScanBehavior) -> Self {
        self.scans.insert(feed.as_str(), behavior);
        self
    }

    pub fn with_dismiss_delay(mut self, delay: Duration) -> Self {
        self.dismiss_delay = delay;
        self
    }

    pub fn with_kill_delay(mut self, delay: Duration) -> Self {
        self.kill_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: InvocationKind) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|call| call.kind == kind)
            .collect()
    }

    /// `--source` values of all scan invocations, in order
    pub fn scanned_feeds(&self) -> Vec<String> {
        self.calls_of(InvocationKind::Scan)
            .iter()
            .filter_map(|call| call.arg_value("--source").map(str::to_string))
            .collect()
    }

    pub fn dismissals(&self) -> usize {
        self.dismissals.load(Ordering::SeqCst)
    }

    pub fn max_dismissals_in_flight(&self) -> usize {
        self.max_dismissals_in_flight.load(Ordering::SeqCst)
    }

    fn scan_behavior(&self, invocation: &Invocation) -> ScanBehavior {
        let feed = invocation.arg_value("--source").unwrap_or_default();
        self.scans
            .get(feed)
            .cloned()
            .unwrap_or(ScanBehavior::Pages(0))
    }

    async fn scan(&self, invocation: &Invocation, mut kill_signal: KillSignal) -> ProcessOutput {
        let feed = invocation.arg_value("--source").unwrap_or_default();
        let pattern = invocation.arg_value("-o").unwrap_or_default().to_string();
        let behavior = self.scan_behavior(invocation);
        self.scan_started.notify_one();

        match behavior {
            ScanBehavior::Pages(pages) => {
                write_pages(&pattern, feed, pages);
                ProcessOutput::exited(0)
            }
            ScanBehavior::Fail { exit_code, stderr } => ProcessOutput {
                stderr,
                ..ProcessOutput::exited(exit_code)
            },
            ScanBehavior::Slow { pages, delay } => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        write_pages(&pattern, feed, pages);
                        ProcessOutput::exited(0)
                    }
                    _ = kill_signal.fired() => killed(),
                }
            }
            ScanBehavior::Hang => {
                write_pages(&pattern, feed, 1);
                kill_signal.fired().await;
                killed()
            }
            ScanBehavior::Timeout => ProcessOutput {
                timed_out: true,
                ..ProcessOutput::default()
            },
            ScanBehavior::SpawnError(_) => unreachable!("spawn errors are raised by run"),
        }
    }

    async fn dismiss(&self, mut kill_signal: KillSignal) -> ProcessOutput {
        let now = self.dismissals_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_dismissals_in_flight
            .fetch_max(now, Ordering::SeqCst);
        let output = tokio::select! {
            _ = tokio::time::sleep(self.dismiss_delay) => ProcessOutput::exited(1),
            _ = kill_signal.fired() => killed(),
        };
        self.dismissals_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.dismissals.fetch_add(1, Ordering::SeqCst);
        output
    }
}

fn killed() -> ProcessOutput {
    ProcessOutput {
        killed: true,
        ..ProcessOutput::default()
    }
}

fn write_pages(pattern: &str, feed: &str, pages: usize) {
    for page in 1..=pages {
        let path = pattern.replace("$(nnnn)", &format!("{:04}", page));
        std::fs::write(&path, format!("{} page {}", feed, page)).unwrap();
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        kill_signal: KillSignal,
    ) -> std::io::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        match invocation.kind {
            InvocationKind::DeviceQuery => Ok(match &self.devices {
                Some(devices) => ProcessOutput {
                    stdout: devices.join("\n"),
                    ..ProcessOutput::exited(0)
                },
                None => ProcessOutput {
                    stderr: "Get-PnpDevice: access denied".to_string(),
                    ..ProcessOutput::exited(1)
                },
            }),
            InvocationKind::ListDevices => {
                let driver = invocation.arg_value("--driver").unwrap_or_default();
                if self.failing_listings.iter().any(|failing| *failing == driver) {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "driver host crashed",
                    ));
                }
                let names = self.listings.get(driver).cloned().unwrap_or_default();
                Ok(ProcessOutput {
                    stdout: names.join("\r\n"),
                    ..ProcessOutput::exited(0)
                })
            }
            InvocationKind::Scan => match self.scan_behavior(invocation) {
                ScanBehavior::SpawnError(message) => {
                    Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, message))
                }
                _ => Ok(self.scan(invocation, kill_signal).await),
            },
            InvocationKind::DismissPopup => Ok(self.dismiss(kill_signal).await),
            InvocationKind::KillVendor => {
                self.kill_started.notify_one();
                tokio::time::sleep(self.kill_delay).await;
                Ok(ProcessOutput::exited(0))
            }
        }
    }
}

/// Configuration with an existing fake tool and a spool directory inside `dir`
pub fn test_config(dir: &Path) -> ScannerConfig {
    let tool_path = dir.join("naps2");
    std::fs::write(&tool_path, b"").unwrap();
    ScannerConfig {
        tool_path,
        temp_dir: dir.join("spool"),
        vendor_processes: vec!["TWAINDSM.exe".to_string()],
        ..ScannerConfig::default()
    }
}

/// Names of the files left in the spool directory
pub fn spool_files(config: &ScannerConfig) -> Vec<String> {
    match std::fs::read_dir(&config.temp_dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}
