//! Process Registry
//!
//! Tracks every child process and pending timer spawned on behalf of a scan
//! session so they can be reclaimed in bulk, together with the cancellation
//! flag observed by all in-flight work.
//!
//! Registration and draining both happen under the same lock and the flag is
//! checked while holding it, so once [`ProcessRegistry::drain`] returns no
//! late callback can add an entry until the flag is explicitly reset.

use crate::core::cleanup::Cleanup;
use crate::core::sync::handle_mutex_poison;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::runner::{Invocation, KillSignal, ProcessOutput, ProcessRunner};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

struct TrackedProcess {
    label: String,
    kill_tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct Entries {
    processes: HashMap<u64, TrackedProcess>,
    timers: HashMap<u64, AbortHandle>,
}

/// Outcome of a drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processes_signalled: usize,
    pub timers_aborted: usize,
}

/// Live child processes, pending timers and the cancellation flag
#[derive(Default)]
pub struct ProcessRegistry {
    entries: Mutex<Entries>,
    next_id: AtomicU64,
    cancelled: AtomicBool,
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("processes", &self.process_count())
            .field("timers", &self.timer_count())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clear the cancellation flag for a fresh, user-initiated scan
    pub fn reset_cancellation(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    pub fn process_count(&self) -> usize {
        self.entries
            .lock()
            .map(|e| e.processes.len())
            .unwrap_or_default()
    }

    pub fn timer_count(&self) -> usize {
        self.entries
            .lock()
            .map(|e| e.timers.len())
            .unwrap_or_default()
    }

    fn lock(&self) -> ScanResult<std::sync::MutexGuard<'_, Entries>> {
        handle_mutex_poison(self.entries.lock(), |message| ScanError::Configuration {
            message,
        })
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a process about to be spawned.
    ///
    /// Fails with [`ScanError::Cancelled`] while the flag is set.
    pub fn register_process(&self, label: &str) -> ScanResult<(u64, KillSignal)> {
        let mut entries = self.lock()?;
        if self.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let id = self.allocate_id();
        let (kill_tx, kill_rx) = oneshot::channel();
        entries.processes.insert(
            id,
            TrackedProcess {
                label: label.to_string(),
                kill_tx,
            },
        );
        log::trace!("Registered process {} ({})", id, label);
        Ok((id, KillSignal::new(kill_rx)))
    }

    pub fn deregister_process(&self, id: u64) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.processes.remove(&id);
        }
    }

    /// Register a pending timer task; cleanup aborts it.
    ///
    /// Returns `None` (and aborts the task) while the flag is set.
    pub fn register_timer(&self, handle: AbortHandle) -> Option<u64> {
        let Ok(mut entries) = self.entries.lock() else {
            handle.abort();
            return None;
        };
        if self.is_cancelled() {
            handle.abort();
            return None;
        }
        let id = self.allocate_id();
        entries.timers.insert(id, handle);
        Some(id)
    }

    pub fn deregister_timer(&self, id: u64) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.timers.remove(&id);
        }
    }

    /// Run `invocation` as a tracked process.
    ///
    /// The process is registered before it is spawned and deregistered once
    /// it has exited, whatever the outcome.
    pub async fn run_tracked(
        &self,
        runner: &dyn ProcessRunner,
        invocation: &Invocation,
    ) -> ScanResult<ProcessOutput> {
        let label = invocation.program_name();
        let (id, kill_signal) = self.register_process(&label)?;
        let result = runner.run(invocation, kill_signal).await;
        self.deregister_process(id);
        result.map_err(|e| ScanError::Spawn {
            program: invocation.program.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Set the cancellation flag, abort all timers, signal all processes and
    /// empty both sets.
    pub fn drain(&self) -> DrainReport {
        self.cancelled.store(true, Ordering::Release);
        let (processes, timers) = match self.entries.lock() {
            Ok(mut entries) => (
                std::mem::take(&mut entries.processes),
                std::mem::take(&mut entries.timers),
            ),
            Err(poisoned) => {
                let mut entries = poisoned.into_inner();
                (
                    std::mem::take(&mut entries.processes),
                    std::mem::take(&mut entries.timers),
                )
            }
        };

        let report = DrainReport {
            processes_signalled: processes.len(),
            timers_aborted: timers.len(),
        };
        for (_, timer) in timers {
            timer.abort();
        }
        for (id, process) in processes {
            log::debug!("Terminating tracked process {} ({})", id, process.label);
            let _ = process.kill_tx.send(());
        }
        report
    }
}

impl Cleanup for ProcessRegistry {
    fn cleanup(&self) {
        let report = self.drain();
        if report != DrainReport::default() {
            log::info!(
                "Reclaimed {} process(es) and {} timer(s)",
                report.processes_signalled,
                report.timers_aborted
            );
        }
    }
}
