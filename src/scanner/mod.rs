//! Scanner Component
//!
//! Drives an external console scanning tool to acquire page images from
//! TWAIN/WIA devices. The tool offers no graceful cancellation and its
//! drivers like to open blocking vendor dialogs, so this module tracks every
//! process it spawns and keeps a popup suppressor running during feeder scans.
//!
//! ## Components
//!
//! - **ProcessRunner**: spawning seam; tests inject fakes
//! - **ScannerLister**: connected-device filtering and cross-transport dedup
//! - **ProcessRegistry**: tracked processes, pending timers, cancellation flag
//! - **PopupSuppressor**: self-throttling dialog dismissal loop
//! - **SessionExecutor**: one attempt per feed source with isolated temp files
//! - **ScanCoordinator**: feeder-then-glass strategy, cleanup and cancellation

pub mod api;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod devices;
pub mod error;
pub mod events;
pub mod lister;
pub mod registry;
pub mod runner;
pub mod session;
pub mod strategy;
pub mod suppressor;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{ScanError, ScanResult};
