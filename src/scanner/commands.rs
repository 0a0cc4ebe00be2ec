//! Command builders for the external executables
//!
//! Scan tool invocations are platform independent; the device query, popup
//! dismissal and kill-by-name helpers differ between Windows and Unix.

use crate::scanner::config::ScannerConfig;
use crate::scanner::runner::{Invocation, InvocationKind, OutputMode};
use crate::scanner::types::{FeedSource, PageSize, Resolution, Transport};
use std::path::Path;

/// Scan tool in list mode for one transport
pub fn list_devices(config: &ScannerConfig, transport: Transport) -> Invocation {
    Invocation::new(InvocationKind::ListDevices, &config.tool_path)
        .args(["--listdevices", "--driver", transport.as_str()])
        .timeout(config.list_timeout)
}

/// Device-specific settings of one scan attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanArguments<'a> {
    pub output_pattern: &'a Path,
    pub feed: FeedSource,
    pub transport: Transport,
    pub device_name: &'a str,
    pub resolution: Resolution,
    pub page_size: PageSize,
}

/// Scan tool in scan mode
pub fn scan(config: &ScannerConfig, scan: &ScanArguments<'_>) -> Invocation {
    let mut invocation = Invocation::new(InvocationKind::Scan, &config.tool_path)
        .arg("-o")
        .arg(scan.output_pattern.to_string_lossy())
        .args(["--source", scan.feed.as_str()])
        .args(["--driver", scan.transport.as_str()])
        .arg("--device")
        .arg(scan.device_name)
        .arg("--dpi")
        .arg(scan.resolution.dpi().to_string())
        .arg("--jpegquality")
        .arg(config.jpeg_quality.to_string());
    if let Some(size) = scan.page_size.tool_arg() {
        invocation = invocation.args(["--pagesize", size]);
    }
    invocation
        .arg("-f")
        .timeout(config.attempt_timeout)
        .output(OutputMode::Diagnostics {
            limit: config.diagnostics_limit,
        })
}

/// Query for connected imaging devices, one friendly name per line
#[cfg(windows)]
pub fn device_query(config: &ScannerConfig) -> Invocation {
    Invocation::new(InvocationKind::DeviceQuery, "powershell.exe")
        .args(["-NoProfile", "-NonInteractive", "-Command"])
        .arg(
            "Get-PnpDevice -Class Image,Camera -PresentOnly -ErrorAction SilentlyContinue \
             | Select-Object -ExpandProperty FriendlyName",
        )
        .timeout(config.device_query_timeout)
}

/// Query for connected imaging devices, one friendly name per line
#[cfg(not(windows))]
pub fn device_query(config: &ScannerConfig) -> Invocation {
    Invocation::new(InvocationKind::DeviceQuery, "/bin/sh")
        .arg("-c")
        .arg(
            "command -v lsusb >/dev/null 2>&1 || exit 127; \
             lsusb | sed -E 's/^.*ID [0-9a-fA-F]{4}:[0-9a-fA-F]{4} ?//'",
        )
        .timeout(config.device_query_timeout)
}

/// Locate a window by title and send it a single Enter keystroke
#[cfg(windows)]
pub fn dismiss_popup(config: &ScannerConfig, title: &str) -> Invocation {
    let script = format!(
        "$w = New-Object -ComObject WScript.Shell; if ($w.AppActivate('{}')) {{ $w.SendKeys('{{ENTER}}') }}",
        title.replace('\'', "''")
    );
    Invocation::new(InvocationKind::DismissPopup, "powershell.exe")
        .args(["-NoProfile", "-NonInteractive", "-Command"])
        .arg(script)
        .timeout(config.dismiss_timeout)
}

/// Locate a window by title and send it a single Enter keystroke
#[cfg(not(windows))]
pub fn dismiss_popup(config: &ScannerConfig, title: &str) -> Invocation {
    Invocation::new(InvocationKind::DismissPopup, "xdotool")
        .args(["search", "--name", title, "key", "--window", "%@", "Return"])
        .timeout(config.dismiss_timeout)
}

/// Best-effort termination of executables by image name
#[cfg(windows)]
pub fn kill_by_name(config: &ScannerConfig, names: &[String]) -> Invocation {
    let mut invocation = Invocation::new(InvocationKind::KillVendor, "taskkill.exe").args(["/F", "/T"]);
    for name in names {
        invocation = invocation.arg("/IM").arg(name.as_str());
    }
    invocation.timeout(config.kill_timeout)
}

/// Best-effort termination of executables by image name
#[cfg(not(windows))]
pub fn kill_by_name(config: &ScannerConfig, names: &[String]) -> Invocation {
    let pattern = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    Invocation::new(InvocationKind::KillVendor, "pkill")
        .args(["-TERM", "-x"])
        .arg(format!("^({})$", pattern))
        .timeout(config.kill_timeout)
}
