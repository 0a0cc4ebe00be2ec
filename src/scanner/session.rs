//! Scan Session Executor
//!
//! One [`ScanSession`] per attempt: a unique file prefix inside the shared
//! temp directory, so concurrent or leftover files from other sessions are
//! never picked up. [`SessionExecutor::run_attempt`] drives the scan tool for
//! a single feed source and turns its output files into [`ScanImage`]s.

use crate::scanner::commands::{self, ScanArguments};
use crate::scanner::config::ScannerConfig;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::events::ScanEvent;
use crate::scanner::registry::ProcessRegistry;
use crate::scanner::runner::ProcessRunner;
use crate::scanner::strategy::PlannedAttempt;
use crate::scanner::suppressor::PopupSuppressor;
use crate::scanner::types::{PageSize, Resolution, ScanImage, Transport};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Output files of one attempt, identified by a unique prefix
#[derive(Debug)]
pub struct ScanSession {
    dir: PathBuf,
    prefix: String,
}

impl ScanSession {
    /// Create a session in `dir`, creating the directory when missing
    pub async fn create(dir: &Path, sequence: u64) -> ScanResult<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ScanError::io(&format!("creating {}", dir.display()), e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: session_prefix(sequence),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Output pattern handed to the tool, e.g. `<dir>/<prefix>_$(nnnn).jpg`
    pub fn output_pattern(&self, placeholder: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.jpg", self.prefix, placeholder))
    }

    fn owns(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }

    /// Files written for this session, in page order
    pub async fn collect_files(&self) -> ScanResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| ScanError::io(&format!("reading {}", self.dir.display()), e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScanError::io(&format!("reading {}", self.dir.display()), e))?
        {
            let name = entry.file_name();
            if self.owns(&name.to_string_lossy()) {
                files.push(entry.path());
            }
        }
        // The page placeholder is zero padded, so name order is page order
        files.sort();
        Ok(files)
    }

    /// Read every session file into memory, deleting each after reading
    pub async fn take_images<F>(&self, mut on_page: F) -> ScanResult<Vec<ScanImage>>
    where
        F: FnMut(usize, usize),
    {
        let files = self.collect_files().await?;
        let total = files.len();
        let mut images = Vec::with_capacity(total);

        for (index, path) in files.iter().enumerate() {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| ScanError::io(&format!("reading {}", path.display()), e))?;
            if let Err(e) = tokio::fs::remove_file(path).await {
                log::warn!("Failed to delete {}: {}", path.display(), e);
            }
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            images.push(ScanImage::new(file_name, bytes));
            on_page(index + 1, total);
        }
        Ok(images)
    }

    /// Delete every file still carrying this session's prefix
    fn remove_leftovers(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            if self.owns(&entry.file_name().to_string_lossy()) {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => log::warn!("Failed to delete {}: {}", entry.path().display(), e),
                }
            }
        }
        removed
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        let removed = self.remove_leftovers();
        if removed > 0 {
            log::debug!("Removed {} leftover file(s) of {}", removed, self.prefix);
        }
    }
}

/// `arcai_<unix-millis>_<sequence>_<random-hex>`
fn session_prefix(sequence: u64) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let nonce: u32 = rand::rng().random();
    format!("arcai_{}_{}_{:08x}", millis, sequence, nonce)
}

/// Device and image settings shared by all attempts of one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub transport: Transport,
    pub device_name: String,
    pub resolution: Resolution,
    pub page_size: PageSize,
}

/// Runs single scan attempts on behalf of the coordinator
pub struct SessionExecutor {
    registry: Arc<ProcessRegistry>,
    runner: Arc<dyn ProcessRunner>,
    config: Arc<ScannerConfig>,
    events: broadcast::Sender<ScanEvent>,
    sequence: AtomicU64,
}

impl SessionExecutor {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        runner: Arc<dyn ProcessRunner>,
        config: Arc<ScannerConfig>,
        events: broadcast::Sender<ScanEvent>,
    ) -> Self {
        Self {
            registry,
            runner,
            config,
            events,
            sequence: AtomicU64::new(0),
        }
    }

    /// Scan from one feed source
    pub async fn run_attempt(
        &self,
        target: &ScanTarget,
        attempt: PlannedAttempt,
    ) -> ScanResult<Vec<ScanImage>> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let session = ScanSession::create(&self.config.temp_dir, sequence).await?;
        log::debug!(
            "Attempt {} on {} via {} ({})",
            sequence,
            attempt.feed,
            target.transport,
            session.prefix()
        );

        // Dropping the handle stops the suppressor on every exit path
        let mut suppressor = attempt.suppress_popups.then(|| {
            PopupSuppressor::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.runner),
                &self.config,
            )
            .start()
        });

        let pattern = session.output_pattern(&self.config.page_placeholder);
        let invocation = commands::scan(
            &self.config,
            &ScanArguments {
                output_pattern: &pattern,
                feed: attempt.feed,
                transport: target.transport,
                device_name: &target.device_name,
                resolution: target.resolution,
                page_size: target.page_size,
            },
        );
        let output = self.registry.run_tracked(&*self.runner, &invocation).await?;

        if let Some(handle) = suppressor.as_mut() {
            handle.stop();
        }

        if output.killed || self.registry.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        if output.timed_out {
            return Err(ScanError::TimedOut {
                feed: attempt.feed,
                after: self.config.attempt_timeout,
            });
        }

        let diagnostics = output.diagnostics();
        if output.exit_code != Some(0) && !diagnostics.is_empty() {
            return Err(ScanError::ToolFailed {
                feed: attempt.feed,
                code: output.exit_code,
                diagnostics,
            });
        }

        let images = session
            .take_images(|index, total| {
                let _ = self.events.send(ScanEvent::PageCollected { index, total });
            })
            .await?;
        if images.is_empty() {
            return Err(ScanError::NoImagesProduced {
                feed: attempt.feed,
                diagnostics,
            });
        }

        log::info!("Collected {} page(s) from {}", images.len(), attempt.feed);
        Ok(images)
    }
}
