//! Validation of configuration and CLI values
//!
//! Used both by clap value parsers and by the TOML loader, so every
//! validator takes the raw value and returns the typed one.

use crate::core::error_handling::ContextualError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ContextualError for ValidationError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        Some(&self.message)
    }
}

/// Longest accepted timeout for any external command
const MAX_TIMEOUT_SECS: u64 = 60 * 60;

/// Validate positive integer value
pub fn validate_positive_int(value: &str) -> Result<u64, ValidationError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ValidationError::new("Value must be greater than 0")),
        Ok(n) => Ok(n),
        Err(_) => Err(ValidationError::new(format!(
            "'{}' is not a valid positive integer",
            value
        ))),
    }
}

/// Timeout in whole seconds, 1 s to 1 h
pub fn validate_timeout_secs(seconds: i64) -> Result<Duration, ValidationError> {
    if seconds <= 0 || seconds as u64 > MAX_TIMEOUT_SECS {
        return Err(ValidationError::new(format!(
            "Timeout must be between 1 and {} seconds, got {}",
            MAX_TIMEOUT_SECS, seconds
        )));
    }
    Ok(Duration::from_secs(seconds as u64))
}

/// clap value parser for `--timeout`
pub fn parse_timeout_arg(value: &str) -> Result<Duration, String> {
    let seconds = validate_positive_int(value).map_err(|e| e.to_string())?;
    validate_timeout_secs(seconds.min(i64::MAX as u64) as i64).map_err(|e| e.to_string())
}

/// JPEG quality 1..=100
pub fn validate_jpeg_quality(quality: i64) -> Result<u8, ValidationError> {
    if (1..=100).contains(&quality) {
        Ok(quality as u8)
    } else {
        Err(ValidationError::new(format!(
            "JPEG quality must be between 1 and 100, got {}",
            quality
        )))
    }
}

/// Popup dismissal interval, 10 ms to 10 s
pub fn validate_popup_interval_ms(millis: i64) -> Result<Duration, ValidationError> {
    if (10..=10_000).contains(&millis) {
        Ok(Duration::from_millis(millis as u64))
    } else {
        Err(ValidationError::new(format!(
            "Popup interval must be between 10 and 10000 ms, got {}",
            millis
        )))
    }
}

/// The page placeholder is substituted by the tool; it must survive in a file name
pub fn validate_page_placeholder(placeholder: &str) -> Result<String, ValidationError> {
    if placeholder.trim().is_empty() {
        return Err(ValidationError::new("Page placeholder cannot be empty"));
    }
    if placeholder.contains('/') || placeholder.contains('\\') {
        return Err(ValidationError::new(
            "Page placeholder cannot contain path separators",
        ));
    }
    Ok(placeholder.to_string())
}

/// Non-empty list entries, trimmed
pub fn validate_names(what: &str, names: &[String]) -> Result<Vec<String>, ValidationError> {
    names
        .iter()
        .map(|name| {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                Err(ValidationError::new(format!("{} cannot contain empty entries", what)))
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}
