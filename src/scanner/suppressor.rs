//! Popup Suppressor
//!
//! Vendor TWAIN drivers open modal "Paper Empty" style dialogs when the
//! feeder runs dry and then block until someone presses Enter. While a
//! feeder attempt runs, the suppressor repeatedly looks for those windows
//! and dismisses them.
//!
//! Each cycle awaits the dismissal helper to completion before sleeping, so
//! a slow helper stretches the cycle instead of piling up processes.

use crate::scanner::commands;
use crate::scanner::config::ScannerConfig;
use crate::scanner::registry::ProcessRegistry;
use crate::scanner::runner::{Invocation, ProcessRunner};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Lifecycle of a suppressor task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SuppressorState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl SuppressorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SuppressorState::Idle,
            1 => SuppressorState::Running,
            2 => SuppressorState::Stopping,
            _ => SuppressorState::Stopped,
        }
    }
}

struct Shared {
    state: AtomicU8,
    cycles: AtomicU64,
    wake: Notify,
}

impl Shared {
    fn state(&self) -> SuppressorState {
        SuppressorState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: SuppressorState, to: SuppressorState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set(&self, state: SuppressorState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Background popup dismissal loop, not yet started
pub struct PopupSuppressor {
    registry: Arc<ProcessRegistry>,
    runner: Arc<dyn ProcessRunner>,
    dismissals: Vec<Invocation>,
    interval: Duration,
}

impl PopupSuppressor {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        runner: Arc<dyn ProcessRunner>,
        config: &ScannerConfig,
    ) -> Self {
        let dismissals = config
            .popup_titles
            .iter()
            .map(|title| commands::dismiss_popup(config, title))
            .collect();
        Self {
            registry,
            runner,
            dismissals,
            interval: config.popup_interval,
        }
    }

    /// Spawn the dismissal loop and register it as a pending timer
    pub fn start(self) -> SuppressorHandle {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(SuppressorState::Idle as u8),
            cycles: AtomicU64::new(0),
            wake: Notify::new(),
        });

        if self.dismissals.is_empty() {
            log::debug!("No popup titles configured, suppressor not started");
            shared.set(SuppressorState::Stopped);
            return SuppressorHandle {
                shared,
                registry: self.registry,
                timer_id: None,
                task: None,
            };
        }

        let registry = Arc::clone(&self.registry);
        let task = tokio::spawn(run_cycles(self, Arc::clone(&shared)));
        let timer_id = registry.register_timer(task.abort_handle());
        if timer_id.is_none() {
            log::debug!("Cancellation pending, suppressor aborted at start");
            shared.set(SuppressorState::Stopped);
        }

        SuppressorHandle {
            shared,
            registry,
            timer_id,
            task: Some(task),
        }
    }
}

async fn run_cycles(suppressor: PopupSuppressor, shared: Arc<Shared>) {
    if !shared.transition(SuppressorState::Idle, SuppressorState::Running) {
        shared.set(SuppressorState::Stopped);
        return;
    }
    log::debug!("Popup suppressor running every {:?}", suppressor.interval);

    loop {
        for invocation in &suppressor.dismissals {
            if shared.state() != SuppressorState::Running {
                break;
            }
            match suppressor
                .registry
                .run_tracked(&*suppressor.runner, invocation)
                .await
            {
                Ok(output) if !output.success() => {
                    log::trace!("No popup dismissed (exit {:?})", output.exit_code);
                }
                Ok(_) => log::debug!("Dismissal helper succeeded"),
                Err(e) if e.is_cancelled() => break,
                Err(e) => log::debug!("Dismissal helper failed: {}", e),
            }
        }
        shared.cycles.fetch_add(1, Ordering::AcqRel);

        if suppressor.registry.is_cancelled() || shared.state() != SuppressorState::Running {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(suppressor.interval) => {}
            _ = shared.wake.notified() => {}
        }
        if suppressor.registry.is_cancelled() || shared.state() != SuppressorState::Running {
            break;
        }
    }

    shared.set(SuppressorState::Stopped);
    log::debug!(
        "Popup suppressor stopped after {} cycle(s)",
        shared.cycles.load(Ordering::Acquire)
    );
}

/// Control handle of a started suppressor; dropping it stops the loop
pub struct SuppressorHandle {
    shared: Arc<Shared>,
    registry: Arc<ProcessRegistry>,
    timer_id: Option<u64>,
    task: Option<JoinHandle<()>>,
}

impl SuppressorHandle {
    /// Prevent further cycles; an in-flight dismissal completes on its own
    pub fn stop(&mut self) {
        let stopping = self
            .shared
            .transition(SuppressorState::Idle, SuppressorState::Stopping)
            || self
                .shared
                .transition(SuppressorState::Running, SuppressorState::Stopping);
        if stopping {
            self.shared.wake.notify_one();
        }
        if let Some(id) = self.timer_id.take() {
            self.registry.deregister_timer(id);
        }
    }

    pub fn state(&self) -> SuppressorState {
        let state = self.shared.state();
        let finished = self.task.as_ref().map_or(true, JoinHandle::is_finished);
        if finished {
            SuppressorState::Stopped
        } else {
            state
        }
    }

    /// Completed dismissal cycles
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Acquire)
    }

    /// Stop and wait for the loop to exit
    pub async fn stop_and_wait(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    log::warn!("Popup suppressor task failed: {}", e);
                }
            }
        }
    }
}

impl Drop for SuppressorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SuppressorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressorHandle")
            .field("state", &self.state())
            .field("cycles", &self.cycles())
            .finish()
    }
}
