//! Shared helpers for integration tests
//!
//! [`ScriptedRunner`] implements the public `ProcessRunner` seam: it answers
//! the device query and list mode from fixed data and writes page files for
//! scan invocations according to a per-feed script.

#![allow(dead_code)]

use arcai_scan::scanner::api::{
    Invocation, InvocationKind, KillSignal, ProcessOutput, ProcessRunner, ScannerConfig,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScript {
    /// Write pages and exit 0
    Pages(usize),
    /// Exit 0 without output, as an empty feeder does
    Empty,
    /// Block until killed
    Hang,
}

#[derive(Default)]
pub struct ScriptedRunner {
    pub connected: Vec<String>,
    pub listings: HashMap<String, Vec<String>>,
    pub feeds: HashMap<String, FeedScript>,
    pub invocations: Mutex<Vec<Invocation>>,
    pub scan_started: Notify,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(mut self, names: &[&str]) -> Self {
        self.connected = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn listing(mut self, driver: &str, names: &[&str]) -> Self {
        self.listings.insert(
            driver.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    pub fn feed(mut self, source: &str, script: FeedScript) -> Self {
        self.feeds.insert(source.to_string(), script);
        self
    }

    pub fn kinds(&self) -> Vec<InvocationKind> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|invocation| invocation.kind)
            .collect()
    }

    /// `--source` of every scan invocation, in order
    pub fn sources(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|invocation| invocation.kind == InvocationKind::Scan)
            .filter_map(|invocation| invocation.arg_value("--source").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        mut kill_signal: KillSignal,
    ) -> std::io::Result<ProcessOutput> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let output = match invocation.kind {
            InvocationKind::DeviceQuery => ProcessOutput {
                stdout: self.connected.join("\n"),
                ..ProcessOutput::exited(0)
            },
            InvocationKind::ListDevices => {
                let driver = invocation.arg_value("--driver").unwrap_or_default();
                ProcessOutput {
                    stdout: self
                        .listings
                        .get(driver)
                        .cloned()
                        .unwrap_or_default()
                        .join("\n"),
                    ..ProcessOutput::exited(0)
                }
            }
            InvocationKind::Scan => {
                self.scan_started.notify_one();
                let source = invocation.arg_value("--source").unwrap_or_default();
                let pattern = invocation.arg_value("-o").unwrap_or_default();
                match self.feeds.get(source).copied().unwrap_or(FeedScript::Empty) {
                    FeedScript::Pages(count) => {
                        for page in 1..=count {
                            let path = pattern.replace("$(nnnn)", &format!("{:04}", page));
                            std::fs::write(path, format!("{} {}", source, page))?;
                        }
                        ProcessOutput::exited(0)
                    }
                    FeedScript::Empty => ProcessOutput::exited(0),
                    FeedScript::Hang => {
                        kill_signal.fired().await;
                        ProcessOutput {
                            killed: true,
                            ..ProcessOutput::default()
                        }
                    }
                }
            }
            InvocationKind::DismissPopup => ProcessOutput::exited(1),
            InvocationKind::KillVendor => ProcessOutput::exited(0),
        };
        Ok(output)
    }
}

/// Config whose tool path exists and whose spool lives under `dir`
pub fn config_in(dir: &Path) -> ScannerConfig {
    let tool_path = dir.join("naps2.console");
    std::fs::write(&tool_path, b"").unwrap();
    ScannerConfig {
        tool_path,
        temp_dir: dir.join("spool"),
        ..ScannerConfig::default()
    }
}

pub fn spool_is_empty(config: &ScannerConfig) -> bool {
    std::fs::read_dir(&config.temp_dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}
