//! Scan strategy resolution
//!
//! Maps a request's source preference onto an ordered list of attempts.

use crate::scanner::types::{FeedSource, ScanRequest, ScanSource};

/// One planned attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedAttempt {
    pub feed: FeedSource,
    pub suppress_popups: bool,
}

/// Primary attempt plus optional fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPlan {
    pub primary: PlannedAttempt,
    pub fallback: Option<PlannedAttempt>,
}

impl ScanPlan {
    /// - `auto`: feeder (duplex when double-sided) with popup suppression,
    ///   then glass without it
    /// - `feeder`: feeder only, popup suppression on
    /// - `flatbed`: glass only
    pub fn resolve(request: &ScanRequest) -> Self {
        let feeder = if request.double_sided {
            FeedSource::Duplex
        } else {
            FeedSource::Feeder
        };
        let glass = PlannedAttempt {
            feed: FeedSource::Glass,
            suppress_popups: false,
        };

        match request.source {
            ScanSource::Auto => ScanPlan {
                primary: PlannedAttempt {
                    feed: feeder,
                    suppress_popups: true,
                },
                fallback: Some(glass),
            },
            ScanSource::Feeder => ScanPlan {
                primary: PlannedAttempt {
                    feed: feeder,
                    suppress_popups: true,
                },
                fallback: None,
            },
            ScanSource::Flatbed => ScanPlan {
                primary: glass,
                fallback: None,
            },
        }
    }
}
