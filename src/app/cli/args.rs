//! Command-line arguments
//!
//! Global options control configuration, logging and the scan tool; the
//! subcommand selects what to do. Anything left unset here falls back to
//! the configuration file and then to built-in defaults.

use crate::core::validation::parse_timeout_arg;
use crate::core::version;
use crate::scanner::api::{PageSize, Resolution, ScanRequest, ScanSource};
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "arcai-scan")]
#[command(about = "Document scanning through an external scan tool")]
#[command(version = version::version(), long_version = version::long_version())]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        global = true,
        value_parser = ["trace", "debug", "info", "warn", "error", "off"]
    )]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(
        short = 'o',
        long = "log-format",
        value_name = "FORMAT",
        global = true,
        value_parser = ["text", "ext", "json"]
    )]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to log to stderr)
    #[arg(short = 'f', long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Force coloured output
    #[arg(long = "color", global = true, overrides_with = "no_color")]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color", global = true, overrides_with = "color")]
    pub no_color: bool,

    /// More log output (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less log output (repeatable)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Path of the scan tool executable
    #[arg(long = "tool", value_name = "PATH", global = true)]
    pub tool: Option<PathBuf>,

    /// Directory for temporary scan output
    #[arg(long = "temp-dir", value_name = "DIR", global = true)]
    pub temp_dir: Option<PathBuf>,

    /// Per-attempt scan timeout in seconds
    #[arg(long = "timeout", value_name = "SECONDS", global = true, value_parser = parse_timeout_arg)]
    pub timeout: Option<Duration>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List connected scanners
    List(ListArgs),
    /// Scan pages from a scanner
    Scan(ScanArgs),
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
pub struct ListArgs {
    /// Print the list as JSON
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
pub struct ScanArgs {
    /// Scanner id as printed by `list`
    #[arg(short = 's', long = "scanner", value_name = "ID")]
    pub scanner: String,

    /// Resolution: low, mid or high
    #[arg(short = 'r', long = "resolution", default_value = "mid")]
    pub resolution: Resolution,

    /// Paper source: auto, feeder or flatbed
    #[arg(short = 'S', long = "source", default_value = "auto")]
    pub source: ScanSource,

    /// Page size: a4, a5 or auto
    #[arg(short = 'p', long = "page-size", default_value = "auto")]
    pub page_size: PageSize,

    /// Scan both sides when using the feeder
    #[arg(short = 'd', long = "double-sided")]
    pub double_sided: bool,

    /// Directory the pages are written to
    #[arg(short = 'O', long = "output-dir", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Print pages as JSON data URLs instead of writing files
    #[arg(long = "json", conflicts_with = "output_dir")]
    pub json: bool,
}

impl ScanArgs {
    pub fn to_request(&self) -> ScanRequest {
        ScanRequest {
            resolution: self.resolution,
            double_sided: self.double_sided,
            source: self.source,
            page_size: self.page_size,
            ..ScanRequest::new(self.scanner.trim())
        }
    }
}

impl Args {
    /// Colour preference from the command line, `None` when not given
    pub fn color_override(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Whether `--log-file none` asked to disable file logging
    pub fn log_file_disabled(&self) -> bool {
        self.log_file
            .as_deref()
            .is_some_and(|p| p.as_os_str().eq_ignore_ascii_case("none"))
    }
}
