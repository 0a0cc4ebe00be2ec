//! Scanner Error Types

use crate::scanner::types::FeedSource;
use std::path::PathBuf;
use std::time::Duration;

/// Scanner error types
///
/// Every failure inside a scan attempt is converted into one of these
/// variants; the `Display` text is the message surfaced to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    /// The external scan tool is not installed where it is expected
    #[error("Scan tool not found at {}", path.display())]
    ToolNotFound { path: PathBuf },

    /// The tool exited without writing any page
    #[error("No images produced from {feed}{}", diagnostics_suffix(diagnostics))]
    NoImagesProduced { feed: FeedSource, diagnostics: String },

    /// The tool exited with a non-zero code and reported why
    #[error("Scan tool failed on {feed} (exit code {code:?}): {diagnostics}")]
    ToolFailed {
        feed: FeedSource,
        code: Option<i32>,
        diagnostics: String,
    },

    /// The attempt exceeded its wall-clock limit
    #[error("Scan on {feed} timed out after {}s", after.as_secs())]
    TimedOut { feed: FeedSource, after: Duration },

    /// The user cancelled the scan
    #[error("Scan cancelled")]
    Cancelled,

    /// The OS refused to start a process
    #[error("Failed to start '{program}': {message}")]
    Spawn { program: String, message: String },

    /// Another scan is already running on this coordinator
    #[error("A scan is already in progress")]
    Busy,

    /// The scanner id cannot be used for scanning
    #[error("Invalid scanner id '{scanner_id}'")]
    InvalidScanner { scanner_id: String },

    /// Both the primary and the fallback attempt failed
    #[error("Primary scan failed: {primary}; fallback scan failed: {fallback}")]
    AllAttemptsFailed { primary: String, fallback: String },

    /// IO operation failed
    #[error("IO error: {message}")]
    Io { message: String },

    /// Invalid configuration or internal state
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

fn diagnostics_suffix(diagnostics: &str) -> String {
    if diagnostics.trim().is_empty() {
        String::new()
    } else {
        format!(": {}", diagnostics.trim())
    }
}

impl ScanError {
    /// True when the failure was caused by user cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanError::Cancelled)
    }

    pub(crate) fn io(context: &str, error: std::io::Error) -> Self {
        ScanError::Io {
            message: format!("{}: {}", context, error),
        }
    }
}

impl crate::core::error_handling::ContextualError for ScanError {
    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            ScanError::ToolNotFound { .. }
                | ScanError::Configuration { .. }
                | ScanError::InvalidScanner { .. }
                | ScanError::Busy
                | ScanError::Cancelled
        )
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ScanError::ToolNotFound { .. } => {
                Some("Scan tool is not installed; set tool-path in the configuration file")
            }
            ScanError::Configuration { message } => Some(message),
            ScanError::InvalidScanner { .. } => {
                Some("Unknown scanner id; run the list command to see available scanners")
            }
            ScanError::Busy => Some("A scan is already in progress"),
            ScanError::Cancelled => Some("Scan cancelled"),
            _ => None,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error_handling::ContextualError;

    #[test]
    fn test_no_images_message_includes_diagnostics() {
        let error = ScanError::NoImagesProduced {
            feed: FeedSource::Feeder,
            diagnostics: "  Feeder empty\n".to_string(),
        };
        assert_eq!(error.to_string(), "No images produced from feeder: Feeder empty");

        let bare = ScanError::NoImagesProduced {
            feed: FeedSource::Glass,
            diagnostics: String::new(),
        };
        assert_eq!(bare.to_string(), "No images produced from glass");
    }

    #[test]
    fn test_cancelled_is_distinct() {
        assert!(ScanError::Cancelled.is_cancelled());
        assert!(!ScanError::Busy.is_cancelled());
        assert_eq!(ScanError::Cancelled.to_string(), "Scan cancelled");
    }

    #[test]
    fn test_user_actionable_errors_carry_messages() {
        let config_error = ScanError::Configuration {
            message: "jpeg-quality must be between 1 and 100".to_string(),
        };
        assert!(config_error.is_user_actionable());
        assert_eq!(
            config_error.user_message(),
            Some("jpeg-quality must be between 1 and 100")
        );

        let system_error = ScanError::Io {
            message: "disk full".to_string(),
        };
        assert!(!system_error.is_user_actionable());
        assert_eq!(system_error.user_message(), None);
    }
}
