//! Signal-driven shutdown notification
//!
//! The first interrupt/terminate signal is broadcast to subscribers so a
//! running scan can be cancelled cleanly; a second one exits immediately
//! with status 130.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Exit status used when the user interrupts the program
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Broadcasts shutdown requests to interested tasks
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    requested: Arc<AtomicBool>,
    signals_seen: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            requested: Arc::new(AtomicBool::new(false)),
            signals_seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        self.requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Record one received signal; returns true for a repeated signal
    fn on_signal(&self) -> bool {
        let previous = self.signals_seen.fetch_add(1, Ordering::AcqRel);
        self.trigger_shutdown();
        previous >= 1
    }

    /// Spawn signal listeners on the current runtime
    pub fn install_signal_handlers(&self) {
        #[cfg(unix)]
        {
            // SAFETY: restoring the default disposition has no memory effects
            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            use tokio::signal::unix::{signal, SignalKind};
            for kind in [
                SignalKind::interrupt(),
                SignalKind::terminate(),
                SignalKind::hangup(),
            ] {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    let Ok(mut stream) = signal(kind) else {
                        log::debug!("Cannot listen for signal {:?}", kind);
                        return;
                    };
                    while stream.recv().await.is_some() {
                        if coordinator.on_signal() {
                            log::warn!("Second signal received, exiting");
                            std::process::exit(INTERRUPTED_EXIT_CODE);
                        }
                        log::info!("Shutdown requested, press Ctrl-C again to force exit");
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if coordinator.on_signal() {
                        log::warn!("Second Ctrl-C received, exiting");
                        std::process::exit(INTERRUPTED_EXIT_CODE);
                    }
                }
            });
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
