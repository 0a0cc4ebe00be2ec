//! Scan progress events

use crate::scanner::types::FeedSource;
use serde::Serialize;

/// Capacity of the coordinator's event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Progress of a `perform_scan` call, broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ScanEvent {
    SessionStarted { scanner_id: String },
    AttemptStarted { feed: FeedSource, fallback: bool },
    AttemptFailed { feed: FeedSource, message: String },
    PageCollected { index: usize, total: usize },
    Completed { pages: usize },
    Failed { message: String },
    Cancelled,
}

impl ScanEvent {
    /// Whether this event ends a scan
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanEvent::Completed { .. } | ScanEvent::Failed { .. } | ScanEvent::Cancelled
        )
    }
}
