//! Scan Coordinator
//!
//! Owns the process registry and drives the scan strategy: feeder first with
//! popup suppression, glass as fallback, cleanup before every scan and on
//! cancellation. One coordinator is meant to live for the whole process and
//! can be shared behind an `Arc`.

use crate::core::cleanup::Cleanup;
use crate::scanner::commands;
use crate::scanner::config::ScannerConfig;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::events::{ScanEvent, EVENT_CHANNEL_CAPACITY};
use crate::scanner::lister;
use crate::scanner::registry::ProcessRegistry;
use crate::scanner::runner::{KillSignal, ProcessRunner, TokioProcessRunner};
use crate::scanner::session::{ScanTarget, SessionExecutor};
use crate::scanner::strategy::{PlannedAttempt, ScanPlan};
use crate::scanner::types::{ScanImage, ScanRequest, ScannerDescriptor, Transport};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Caller-facing entry point of the scanner subsystem
pub struct ScanCoordinator {
    config: Arc<ScannerConfig>,
    runner: Arc<dyn ProcessRunner>,
    registry: Arc<ProcessRegistry>,
    executor: SessionExecutor,
    events: broadcast::Sender<ScanEvent>,
    scan_lock: Mutex<()>,
}

impl std::fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

impl ScanCoordinator {
    /// Coordinator spawning real processes
    pub fn new(config: ScannerConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioProcessRunner))
    }

    /// Coordinator using `runner` for every external command
    pub fn with_runner(config: ScannerConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(ProcessRegistry::new());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let executor = SessionExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&runner),
            Arc::clone(&config),
            events.clone(),
        );
        Self {
            config,
            runner,
            registry,
            executor,
            events,
            scan_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    pub fn is_cancelled(&self) -> bool {
        self.registry.is_cancelled()
    }

    /// Receive progress events of subsequent scans
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ScanEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Scanners currently usable, deduplicated across transports
    pub async fn list_scanners(&self) -> Vec<ScannerDescriptor> {
        lister::list_scanners(&*self.runner, &self.config).await
    }

    /// Acquire pages for `request`.
    ///
    /// Fails with [`ScanError::Busy`] while another scan runs on this
    /// coordinator and with [`ScanError::Cancelled`] when
    /// [`cancel_scan`](Self::cancel_scan) interrupts it.
    pub async fn perform_scan(&self, request: &ScanRequest) -> ScanResult<Vec<ScanImage>> {
        let _scan = self.scan_lock.try_lock().map_err(|_| ScanError::Busy)?;

        // Reset right after the drain so a cancel arriving later stays set
        self.registry.cleanup();
        self.registry.reset_cancellation();
        self.emit(ScanEvent::SessionStarted {
            scanner_id: request.scanner_id.clone(),
        });

        let result = self.run_plan(request).await;
        match &result {
            Ok(images) => {
                log::info!("Scan finished with {} page(s)", images.len());
                self.emit(ScanEvent::Completed {
                    pages: images.len(),
                });
            }
            Err(ScanError::Cancelled) => {
                log::info!("Scan cancelled");
                self.emit(ScanEvent::Cancelled);
            }
            Err(e) => {
                log::error!("Scan failed: {}", e);
                self.emit(ScanEvent::Failed {
                    message: e.to_string(),
                });
            }
        }
        result
    }

    async fn run_plan(&self, request: &ScanRequest) -> ScanResult<Vec<ScanImage>> {
        self.kill_vendor_processes().await;
        if self.registry.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        if !self.config.tool_available().await {
            return Err(ScanError::ToolNotFound {
                path: self.config.tool_path.clone(),
            });
        }
        let target = resolve_target(request)?;
        let plan = ScanPlan::resolve(request);

        let primary_error = match self.attempt(&target, plan.primary, false).await {
            Ok(images) => return Ok(images),
            Err(e) => e,
        };
        if primary_error.is_cancelled() || self.registry.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let Some(fallback) = plan.fallback else {
            return Err(primary_error);
        };

        // The failed feeder attempt may leave the driver wedged
        self.kill_vendor_processes().await;
        if self.registry.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        match self.attempt(&target, fallback, true).await {
            Ok(images) => Ok(images),
            Err(e) if e.is_cancelled() || self.registry.is_cancelled() => Err(ScanError::Cancelled),
            Err(e) => Err(ScanError::AllAttemptsFailed {
                primary: primary_error.to_string(),
                fallback: e.to_string(),
            }),
        }
    }

    async fn attempt(
        &self,
        target: &ScanTarget,
        attempt: PlannedAttempt,
        fallback: bool,
    ) -> ScanResult<Vec<ScanImage>> {
        self.emit(ScanEvent::AttemptStarted {
            feed: attempt.feed,
            fallback,
        });
        let result = self.executor.run_attempt(target, attempt).await;
        if let Err(e) = &result {
            if !e.is_cancelled() {
                log::warn!("Attempt on {} failed: {}", attempt.feed, e);
                self.emit(ScanEvent::AttemptFailed {
                    feed: attempt.feed,
                    message: e.to_string(),
                });
            }
        }
        result
    }

    /// Abort the scan in progress, if any
    pub async fn cancel_scan(&self) {
        log::info!("Cancelling scan");
        self.cleanup().await;
    }

    /// Reclaim every tracked process and timer, then kill stray vendor
    /// executables by name. Idempotent.
    pub async fn cleanup(&self) {
        self.registry.cleanup();
        self.kill_vendor_processes().await;
    }

    async fn kill_vendor_processes(&self) {
        let targets = self.config.kill_targets();
        if targets.is_empty() {
            return;
        }
        let invocation = commands::kill_by_name(&self.config, &targets);
        match self.runner.run(&invocation, KillSignal::never()).await {
            Ok(output) => log::debug!(
                "Kill-by-name for {:?} exited with {:?}",
                targets,
                output.exit_code
            ),
            Err(e) => log::debug!("Kill-by-name could not run: {}", e),
        }
    }
}

fn resolve_target(request: &ScanRequest) -> ScanResult<ScanTarget> {
    let (transport, device_name) = Transport::parse_id(request.scanner_id.trim());
    let device_name = device_name.trim();
    if device_name.is_empty() {
        return Err(ScanError::InvalidScanner {
            scanner_id: request.scanner_id.clone(),
        });
    }
    Ok(ScanTarget {
        transport,
        device_name: device_name.to_string(),
        resolution: request.resolution,
        page_size: request.page_size,
    })
}
