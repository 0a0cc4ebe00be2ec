//! TOML configuration file loading
//!
//! Settings are layered: built-in defaults, then the configuration file,
//! then command-line options. An explicitly named file must exist; the
//! default file (`<config dir>/Arcai/arcai-scan.toml`) is optional.

use super::args::Args;
use crate::core::logging::{adjust_level, LogFormat, LoggingSettings};
use crate::core::validation::{
    validate_jpeg_quality, validate_names, validate_page_placeholder,
    validate_popup_interval_ms, validate_timeout_secs, ValidationError,
};
use crate::scanner::api::ScannerConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", path.display())]
    Missing { path: PathBuf },

    #[error("Error reading configuration file {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Error parsing configuration file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value for '{key}': {source}")]
    Invalid {
        key: String,
        #[source]
        source: ValidationError,
    },

    #[error("'{key}' must be {expected}")]
    WrongType { key: String, expected: &'static str },
}

/// Everything the application needs after configuration is resolved
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub scanner: ScannerConfig,
    pub logging: LoggingSettings,
    /// Colour preference from file or command line, `None` means auto
    pub color: Option<bool>,
    /// File the settings were read from, if any
    pub source: Option<PathBuf>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("Arcai").join("arcai-scan.toml"))
}

/// Locate the file to load: `explicit` must exist, the default may not
pub async fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    match explicit {
        Some(path) => {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                Ok(Some(path.to_path_buf()))
            } else {
                Err(ConfigError::Missing {
                    path: path.to_path_buf(),
                })
            }
        }
        None => match default_config_path() {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => Ok(Some(path)),
            _ => Ok(None),
        },
    }
}

pub async fn read_config_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    toml::from_str::<toml::Table>(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Resolve the final settings for `args`
pub async fn resolve_settings(args: &Args) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();
    if let Some(path) = locate_config_file(args.config_file.as_deref()).await? {
        let table = read_config_table(&path).await?;
        apply_toml_values(&mut settings, &table)?;
        settings.source = Some(path);
    }
    apply_cli_overrides(&mut settings, args);
    Ok(settings)
}

fn invalid(key: &str) -> impl FnOnce(ValidationError) -> ConfigError + '_ {
    move |source| ConfigError::Invalid {
        key: key.to_string(),
        source,
    }
}

fn string_field<'a>(config: &'a toml::Table, key: &str) -> Result<Option<&'a str>, ConfigError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value.as_str().map(Some).ok_or(ConfigError::WrongType {
            key: key.to_string(),
            expected: "a string",
        }),
    }
}

fn integer_field(config: &toml::Table, key: &str) -> Result<Option<i64>, ConfigError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value.as_integer().map(Some).ok_or(ConfigError::WrongType {
            key: key.to_string(),
            expected: "an integer",
        }),
    }
}

/// Accepts both `key = "one"` and `key = ["one", "two"]`
fn string_array_field(config: &toml::Table, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
    let Some(value) = config.get(key) else {
        return Ok(None);
    };
    let wrong_type = || ConfigError::WrongType {
        key: key.to_string(),
        expected: "a string or an array of strings",
    };
    if let Some(single) = value.as_str() {
        return Ok(Some(vec![single.to_string()]));
    }
    let items = value.as_array().ok_or_else(wrong_type)?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(wrong_type))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn timeout_field(
    config: &toml::Table,
    key: &str,
    target: &mut std::time::Duration,
) -> Result<(), ConfigError> {
    if let Some(seconds) = integer_field(config, key)? {
        *target = validate_timeout_secs(seconds).map_err(invalid(key))?;
    }
    Ok(())
}

/// Apply TOML configuration values over `settings`
pub fn apply_toml_values(settings: &mut Settings, config: &toml::Table) -> Result<(), ConfigError> {
    let scanner = &mut settings.scanner;

    if let Some(path) = string_field(config, "tool-path")? {
        scanner.tool_path = PathBuf::from(path);
    }
    if let Some(path) = string_field(config, "temp-dir")? {
        scanner.temp_dir = PathBuf::from(path);
    }
    if let Some(quality) = integer_field(config, "jpeg-quality")? {
        scanner.jpeg_quality = validate_jpeg_quality(quality).map_err(invalid("jpeg-quality"))?;
    }
    if let Some(placeholder) = string_field(config, "page-placeholder")? {
        scanner.page_placeholder =
            validate_page_placeholder(placeholder).map_err(invalid("page-placeholder"))?;
    }
    if let Some(marker) = string_field(config, "error-marker")? {
        scanner.error_marker = marker.to_string();
    }

    timeout_field(config, "attempt-timeout", &mut scanner.attempt_timeout)?;
    timeout_field(config, "list-timeout", &mut scanner.list_timeout)?;
    timeout_field(config, "device-query-timeout", &mut scanner.device_query_timeout)?;
    timeout_field(config, "dismiss-timeout", &mut scanner.dismiss_timeout)?;
    timeout_field(config, "kill-timeout", &mut scanner.kill_timeout)?;

    // An empty list is allowed and turns popup dismissal off
    if let Some(titles) = string_array_field(config, "popup-titles")? {
        scanner.popup_titles = validate_names("popup-titles", &titles).map_err(invalid("popup-titles"))?;
    }
    if let Some(millis) = integer_field(config, "popup-interval-ms")? {
        scanner.popup_interval =
            validate_popup_interval_ms(millis).map_err(invalid("popup-interval-ms"))?;
    }
    if let Some(names) = string_array_field(config, "vendor-processes")? {
        scanner.vendor_processes =
            validate_names("vendor-processes", &names).map_err(invalid("vendor-processes"))?;
    }

    if let Some(level) = string_field(config, "log-level")? {
        settings.logging.level = level.to_string();
    }
    if let Some(format) = string_field(config, "log-format")? {
        settings.logging.format = format
            .parse::<LogFormat>()
            .map_err(|e| invalid("log-format")(ValidationError::new(e)))?;
    }
    if let Some(file) = string_field(config, "log-file")? {
        settings.logging.file = (!file.eq_ignore_ascii_case("none")).then(|| file.to_string());
    }
    if let Some(value) = config.get("color") {
        settings.color = Some(value.as_bool().ok_or(ConfigError::WrongType {
            key: "color".to_string(),
            expected: "true or false",
        })?);
    }

    Ok(())
}

/// Command-line options take precedence over file values
pub fn apply_cli_overrides(settings: &mut Settings, args: &Args) {
    if let Some(tool) = &args.tool {
        settings.scanner.tool_path = tool.clone();
    }
    if let Some(dir) = &args.temp_dir {
        settings.scanner.temp_dir = dir.clone();
    }
    if let Some(timeout) = args.timeout {
        settings.scanner.attempt_timeout = timeout;
    }

    if let Some(level) = &args.log_level {
        settings.logging.level = level.clone();
    }
    settings.logging.level = adjust_level(&settings.logging.level, args.verbose, args.quiet);
    if let Some(format) = args.log_format.as_deref().and_then(|f| f.parse::<LogFormat>().ok()) {
        settings.logging.format = format;
    }
    if args.log_file_disabled() {
        settings.logging.file = None;
    } else if let Some(file) = &args.log_file {
        settings.logging.file = Some(file.to_string_lossy().into_owned());
    }
    if let Some(color) = args.color_override() {
        settings.color = Some(color);
    }
}
