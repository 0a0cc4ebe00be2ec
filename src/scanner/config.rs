//! Scanner configuration model and defaults

use std::path::PathBuf;
use std::time::Duration;

/// Settings for the scanner orchestration subsystem
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    /// Path to the external console scan tool
    pub tool_path: PathBuf,
    /// Shared directory the tool writes page images into
    pub temp_dir: PathBuf,
    /// JPEG quality passed to the tool
    pub jpeg_quality: u8,
    /// Page-index placeholder understood by the tool in output patterns
    pub page_placeholder: String,
    /// Lines from list mode starting with this marker are tool errors
    pub error_marker: String,
    /// Wall-clock limit for one scan attempt
    pub attempt_timeout: Duration,
    /// Wall-clock limit for one list-mode invocation
    pub list_timeout: Duration,
    /// Wall-clock limit for the connected-device query
    pub device_query_timeout: Duration,
    /// Wall-clock limit for one popup dismissal helper
    pub dismiss_timeout: Duration,
    /// Wall-clock limit for the kill-by-name command
    pub kill_timeout: Duration,
    /// Window titles of the vendor dialogs to dismiss
    pub popup_titles: Vec<String>,
    /// Delay between two popup dismissal cycles
    pub popup_interval: Duration,
    /// Executables terminated by name during cleanup
    pub vendor_processes: Vec<String>,
    /// Upper bound on diagnostic output kept from a scan attempt
    pub diagnostics_limit: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tool_path: default_tool_path(),
            temp_dir: std::env::temp_dir().join("arcai-scan"),
            jpeg_quality: 85,
            page_placeholder: "$(nnnn)".to_string(),
            error_marker: "Error".to_string(),
            attempt_timeout: Duration::from_secs(120),
            list_timeout: Duration::from_secs(30),
            device_query_timeout: Duration::from_secs(15),
            dismiss_timeout: Duration::from_secs(5),
            kill_timeout: Duration::from_secs(10),
            popup_titles: vec!["Paper Empty".to_string(), "Feeder Empty".to_string()],
            popup_interval: Duration::from_millis(100),
            vendor_processes: default_vendor_processes(),
            diagnostics_limit: 16 * 1024,
        }
    }
}

impl ScannerConfig {
    /// Whether the scan tool exists at the configured path
    pub async fn tool_available(&self) -> bool {
        tokio::fs::try_exists(&self.tool_path).await.unwrap_or(false)
    }

    /// Name of the tool executable, used for kill-by-name
    pub fn tool_image_name(&self) -> Option<String> {
        self.tool_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
    }

    /// Executables to terminate by name: vendor helpers plus the tool itself
    pub fn kill_targets(&self) -> Vec<String> {
        let mut targets = self.vendor_processes.clone();
        if let Some(tool) = self.tool_image_name() {
            if !targets.iter().any(|t| t.eq_ignore_ascii_case(&tool)) {
                targets.push(tool);
            }
        }
        targets
    }
}

#[cfg(windows)]
fn default_tool_path() -> PathBuf {
    PathBuf::from(r"C:\Program Files\NAPS2\NAPS2.Console.exe")
}

#[cfg(not(windows))]
fn default_tool_path() -> PathBuf {
    PathBuf::from("/usr/bin/naps2")
}

#[cfg(windows)]
fn default_vendor_processes() -> Vec<String> {
    vec!["NAPS2.Worker.exe".to_string(), "TWAINDSM.exe".to_string()]
}

#[cfg(not(windows))]
fn default_vendor_processes() -> Vec<String> {
    Vec::new()
}
