//! Logging backend setup
//!
//! `log` macros everywhere, `flexi_logger` as the backend. Three line
//! formats are available:
//!
//! - `text`: `2025-01-01 10:00:00.123 INF message`
//! - `ext`: text plus the emitting source location (`scanner/session.rs:42`)
//! - `json`: one compact object per line with the same fields

use std::str::FromStr;
use std::sync::{Mutex, OnceLock};
use thiserror::Error;

static LOGGER_HANDLE: OnceLock<Mutex<flexi_logger::LoggerHandle>> = OnceLock::new();

const CRATE_TARGET_PREFIX: &str = "arcai_scan::";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level '{level}': {reason}")]
    InvalidLevel { level: String, reason: String },

    #[error("Cannot log to '{path}': {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("Logger could not be started: {reason}")]
    StartFailed { reason: String },

    #[error("Logger has not been initialised")]
    NotInitialised,
}

/// Line format of log records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Ext,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "ext" => Ok(LogFormat::Ext),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "Unknown log format '{}' (expected text, ext or json)",
                other
            )),
        }
    }
}

/// Resolved logging options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<String>,
    pub color: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
            color: false,
        }
    }
}

/// Start the global logger.
///
/// Format and destination are fixed by the first call in a process; later
/// calls only change the level.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
    use flexi_logger::{FileSpec, Logger};

    if LOGGER_HANDLE.get().is_some() {
        return set_log_level(&settings.level);
    }

    let mut logger =
        Logger::try_with_str(&settings.level).map_err(|e| LoggingError::InvalidLevel {
            level: settings.level.clone(),
            reason: e.to_string(),
        })?;

    // Colour only makes sense on a terminal, never in a file
    let color = settings.color && settings.file.is_none();
    logger = match (settings.format, color) {
        (LogFormat::Json, _) => logger.format(json_format),
        (LogFormat::Ext, true) => logger.format(extended_color_format),
        (LogFormat::Ext, false) => logger.format(extended_format),
        (LogFormat::Text, true) => logger.format(text_color_format),
        (LogFormat::Text, false) => logger.format(text_format),
    };

    if let Some(path) = &settings.file {
        let spec = FileSpec::try_from(std::path::Path::new(path)).map_err(|e| {
            LoggingError::InvalidFile {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
        logger = logger.log_to_file(spec);
    }

    let handle = logger.start().map_err(|e| LoggingError::StartFailed {
        reason: e.to_string(),
    })?;
    let _ = LOGGER_HANDLE.set(Mutex::new(handle));
    Ok(())
}

/// Change the active log level at runtime.
///
/// Format and destination are fixed once the logger started.
pub fn set_log_level(level: &str) -> Result<(), LoggingError> {
    let handle = LOGGER_HANDLE.get().ok_or(LoggingError::NotInitialised)?;
    let mut handle = handle.lock().map_err(|_| LoggingError::StartFailed {
        reason: "logger handle lock poisoned".to_string(),
    })?;
    handle
        .parse_and_push_temp_spec(level)
        .map_err(|e| LoggingError::InvalidLevel {
            level: level.to_string(),
            reason: e.to_string(),
        })
}

/// Level name after applying `-v`/`-q` counts to `base`
pub fn adjust_level(base: &str, verbose: u8, quiet: u8) -> String {
    const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
    let Some(index) = LEVELS.iter().position(|l| l.eq_ignore_ascii_case(base)) else {
        return base.to_string();
    };
    let adjusted = (index as i32 + verbose as i32 - quiet as i32).clamp(0, LEVELS.len() as i32 - 1);
    LEVELS[adjusted as usize].to_string()
}

fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

fn colored_level_tag(level: log::Level) -> colored::ColoredString {
    use colored::Colorize;
    let tag = level_tag(level);
    match level {
        log::Level::Error => tag.red().bold(),
        log::Level::Warn => tag.yellow(),
        log::Level::Info => tag.green(),
        log::Level::Debug => tag.blue(),
        log::Level::Trace => tag.magenta(),
    }
}

fn timestamp(now: &mut flexi_logger::DeferredNow) -> String {
    now.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn text_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        timestamp(now),
        level_tag(record.level()),
        record.args()
    )
}

fn text_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;
    write!(
        w,
        "{} {} {}",
        timestamp(now).dimmed(),
        colored_level_tag(record.level()),
        record.args()
    )
}

fn extended_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        timestamp(now),
        level_tag(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn extended_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;
    write!(
        w,
        "{} {} {} ({})",
        timestamp(now).dimmed(),
        colored_level_tag(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line()).dimmed()
    )
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let line = serde_json::json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_tag(record.level()),
        "message": record.args().to_string(),
        "target": format_target_as_path(record.target(), record.line()),
    });
    match serde_json::to_string(&line) {
        Ok(json) => w.write_all(json.as_bytes()),
        Err(_) => w.write_all(b"{\"error\":\"unserializable log record\"}"),
    }
}

/// `arcai_scan::scanner::session` at line 42 becomes `scanner/session.rs:42`
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path = match target.strip_prefix(CRATE_TARGET_PREFIX) {
        Some(module) => module.replace("::", "/") + ".rs",
        None => target.replace("::", "/"),
    };
    match line {
        Some(line) => format!("{}:{}", path, line),
        None => path,
    }
}
