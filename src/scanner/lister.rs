//! Scanner Lister
//!
//! Queries the scan tool for devices on both transports, drops ghost driver
//! entries using the connected-device probe and collapses the duplicates the
//! tool reports for one physical device (one entry per driver shim).

use crate::scanner::commands;
use crate::scanner::config::ScannerConfig;
use crate::scanner::devices::{list_connected_devices, ConnectedDevices};
use crate::scanner::runner::{KillSignal, ProcessRunner};
use crate::scanner::types::{ScannerDescriptor, Transport};
use strum::IntoEnumIterator;

/// Last words that mark a name as a generic manufacturer entry
const GENERIC_SUFFIXES: &[&str] = &["scanner", "scanners", "scan", "series"];

/// List scanners usable right now, preferred transport first.
///
/// Never fails: a missing tool or a failing list invocation yields fewer (or
/// no) entries, which is the normal idle state.
pub async fn list_scanners(
    runner: &dyn ProcessRunner,
    config: &ScannerConfig,
) -> Vec<ScannerDescriptor> {
    if !config.tool_available().await {
        log::warn!(
            "Scan tool not found at {}, no scanners available",
            config.tool_path.display()
        );
        return Vec::new();
    }

    let connected = list_connected_devices(runner, config).await;
    if !connected.is_known() {
        log::info!("Connected-device probe failed, showing all reported scanners");
    }

    let mut scanners = Vec::new();
    for transport in Transport::iter() {
        let names = list_transport(runner, config, transport).await;
        let candidates: Vec<String> = names
            .into_iter()
            .filter(|name| {
                let keep = is_connected(name, &connected);
                if !keep {
                    log::debug!("Dropping disconnected {} entry '{}'", transport, name);
                }
                keep
            })
            .collect();
        merge_candidates(&mut scanners, transport, candidates);
    }

    log::info!("Found {} scanner(s)", scanners.len());
    scanners
}

async fn list_transport(
    runner: &dyn ProcessRunner,
    config: &ScannerConfig,
    transport: Transport,
) -> Vec<String> {
    let invocation = commands::list_devices(config, transport);
    match runner.run(&invocation, KillSignal::never()).await {
        Ok(output) if output.timed_out => {
            log::warn!("Listing {} devices timed out", transport);
            Vec::new()
        }
        Ok(output) => parse_device_list(&output.stdout, &config.error_marker),
        Err(e) => {
            log::warn!("Failed to list {} devices: {}", transport, e);
            Vec::new()
        }
    }
}

/// One device name per line; blank lines and tool error lines are skipped
pub fn parse_device_list(stdout: &str, error_marker: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| error_marker.is_empty() || !line.starts_with(error_marker))
        .map(str::to_string)
        .collect()
}

/// Lowercase with collapsed whitespace
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// First word of the name, lowercase, without trailing punctuation
pub fn manufacturer_token(name: &str) -> Option<String> {
    name.split_whitespace()
        .next()
        .map(|word| {
            word.trim_end_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
}

pub fn has_model_number(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_digit())
}

/// A name without a model number ending in a generic suffix, e.g. "Canon Scanner"
pub fn is_generic(name: &str) -> bool {
    if has_model_number(name) {
        return false;
    }
    let normalized = normalize_name(name);
    normalized
        .rsplit(' ')
        .next()
        .is_some_and(|last| GENERIC_SUFFIXES.contains(&last))
}

/// Whether a reported name belongs to a connected device
pub fn is_connected(name: &str, connected: &ConnectedDevices) -> bool {
    let devices = match connected {
        ConnectedDevices::Unknown => return true,
        ConnectedDevices::Known(devices) if devices.is_empty() => return false,
        ConnectedDevices::Known(devices) => devices,
    };

    let candidate = normalize_name(name);
    let substring_match = devices.iter().any(|device| {
        let device = normalize_name(device);
        !device.is_empty() && (device.contains(&candidate) || candidate.contains(&device))
    });
    if substring_match {
        return true;
    }

    is_generic(name)
        && manufacturer_token(name).is_some_and(|maker| {
            devices
                .iter()
                .any(|device| manufacturer_token(device).as_deref() == Some(maker.as_str()))
        })
}

enum Overlap {
    /// Same device already kept in an equal or more specific form
    Redundant,
    /// Same device kept only in its generic form at this index
    Upgrade(usize),
    None,
}

fn find_overlap(kept: &[ScannerDescriptor], name: &str) -> Overlap {
    let normalized = normalize_name(name);
    let maker = manufacturer_token(name);
    let candidate_generic = is_generic(name);

    for (index, existing) in kept.iter().enumerate() {
        let existing_name = &existing.display_name;
        if normalize_name(existing_name) == normalized {
            return Overlap::Redundant;
        }
        if maker.is_none() || manufacturer_token(existing_name) != maker {
            continue;
        }
        let existing_generic = is_generic(existing_name);
        if candidate_generic && has_model_number(existing_name) {
            return Overlap::Redundant;
        }
        if existing_generic && has_model_number(name) {
            return Overlap::Upgrade(index);
        }
    }
    Overlap::None
}

/// Add `names` reported on `transport` to `kept`, preferring model-numbered
/// entries over generic ones and preserving discovery order.
pub fn merge_candidates(kept: &mut Vec<ScannerDescriptor>, transport: Transport, names: Vec<String>) {
    for name in names {
        match find_overlap(kept, &name) {
            Overlap::Redundant => {
                log::debug!("Skipping duplicate {} entry '{}'", transport, name);
            }
            Overlap::Upgrade(index) => {
                log::debug!(
                    "Replacing generic '{}' with '{}'",
                    kept[index].display_name,
                    name
                );
                kept[index] = ScannerDescriptor::new(transport, &name);
            }
            Overlap::None => kept.push(ScannerDescriptor::new(transport, &name)),
        }
    }
}
