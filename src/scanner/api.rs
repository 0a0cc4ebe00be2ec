//! Scanner API
//!
//! Public surface of the scanner subsystem. Callers outside this module
//! import from here rather than from the individual component modules.

// Entry point
pub use crate::scanner::coordinator::ScanCoordinator;

// Configuration
pub use crate::scanner::config::ScannerConfig;

// Error handling
pub use crate::scanner::error::{ScanError, ScanResult};

// Progress reporting
pub use crate::scanner::events::ScanEvent;

// Process spawning seam
pub use crate::scanner::runner::{
    Invocation, InvocationKind, KillSignal, OutputMode, ProcessOutput, ProcessRunner,
    TokioProcessRunner,
};

// Diagnostics
pub use crate::scanner::registry::{DrainReport, ProcessRegistry};
pub use crate::scanner::suppressor::{PopupSuppressor, SuppressorHandle, SuppressorState};

// Core data types
pub use crate::scanner::types::{
    FeedSource, PageSize, Resolution, ScanImage, ScanRequest, ScanSource, ScannerDescriptor,
    Transport,
};
