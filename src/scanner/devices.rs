//! Device Enumerator
//!
//! Lists the imaging devices the OS currently sees as connected. Used only
//! as a filter oracle by the scanner lister.

use crate::scanner::commands;
use crate::scanner::config::ScannerConfig;
use crate::scanner::runner::{KillSignal, ProcessRunner};

/// Result of the connected-device probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectedDevices {
    /// The probe ran; the list may be empty
    Known(Vec<String>),
    /// The probe itself failed, connectivity is unknown
    Unknown,
}

impl ConnectedDevices {
    pub fn is_known(&self) -> bool {
        matches!(self, ConnectedDevices::Known(_))
    }
}

/// Run the OS device query.
///
/// An empty answer is a valid "nothing connected"; failing to run the query
/// is reported as [`ConnectedDevices::Unknown`].
pub async fn list_connected_devices(
    runner: &dyn ProcessRunner,
    config: &ScannerConfig,
) -> ConnectedDevices {
    let invocation = commands::device_query(config);
    let output = match runner.run(&invocation, KillSignal::never()).await {
        Ok(output) => output,
        Err(e) => {
            log::debug!("Device query could not be started: {}", e);
            return ConnectedDevices::Unknown;
        }
    };

    if !output.success() {
        log::debug!(
            "Device query failed (exit {:?}, timed out: {}): {}",
            output.exit_code,
            output.timed_out,
            output.stderr.trim()
        );
        return ConnectedDevices::Unknown;
    }

    let devices: Vec<String> = output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    log::debug!("Connected imaging devices: {:?}", devices);
    ConnectedDevices::Known(devices)
}
