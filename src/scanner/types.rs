//! Scanner Data Types
//!
//! Descriptors, requests and results exchanged between the scanner
//! orchestration components and their callers.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Device-access protocol used to talk to a scanner.
///
/// Variants are declared in discovery order, preferred first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumIter, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Transport {
    /// Legacy TWAIN drivers (preferred)
    Twain,
    /// Windows Image Acquisition (fallback)
    Wia,
}

impl Transport {
    /// Driver name as understood by the scan tool
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// Build a transport-prefixed scanner id
    pub fn scanner_id(&self, device_name: &str) -> String {
        format!("{}:{}", self.as_str(), device_name)
    }

    /// Split a scanner id into its transport and device name.
    ///
    /// Ids without a recognised prefix are treated as TWAIN device names.
    pub fn parse_id(scanner_id: &str) -> (Transport, &str) {
        if let Some((prefix, name)) = scanner_id.split_once(':') {
            if let Ok(transport) = prefix.parse::<Transport>() {
                return (transport, name);
            }
        }
        (Transport::Twain, scanner_id)
    }
}

/// A scanner reported by the listing tool and kept by the lister
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerDescriptor {
    pub id: String,
    pub display_name: String,
}

impl ScannerDescriptor {
    pub fn new(transport: Transport, device_name: &str) -> Self {
        Self {
            id: transport.scanner_id(device_name),
            display_name: device_name.to_string(),
        }
    }

    pub fn transport(&self) -> Transport {
        Transport::parse_id(&self.id).0
    }
}

/// Requested scan resolution
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Resolution {
    Low,
    #[default]
    Mid,
    High,
}

impl Resolution {
    pub fn dpi(&self) -> u32 {
        match self {
            Resolution::Low => 150,
            Resolution::Mid => 200,
            Resolution::High => 300,
        }
    }
}

/// Requested paper source
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScanSource {
    /// Feeder first, flatbed as fallback
    #[default]
    Auto,
    Feeder,
    Flatbed,
}

/// Requested page size
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PageSize {
    A4,
    A5,
    #[default]
    Auto,
}

impl PageSize {
    /// Tool argument for this size, `None` lets the driver decide
    pub fn tool_arg(&self) -> Option<&'static str> {
        match self {
            PageSize::A4 => Some("a4"),
            PageSize::A5 => Some("a5"),
            PageSize::Auto => None,
        }
    }
}

/// Hardware source passed to the scan tool for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeedSource {
    /// Automatic document feeder, single-sided
    Feeder,
    /// Automatic document feeder, double-sided
    Duplex,
    /// Flatbed glass
    Glass,
}

impl FeedSource {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

/// Parameters of one user-initiated scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub scanner_id: String,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default)]
    pub source: ScanSource,
    #[serde(default)]
    pub page_size: PageSize,
}

impl ScanRequest {
    pub fn new(scanner_id: impl Into<String>) -> Self {
        Self {
            scanner_id: scanner_id.into(),
            resolution: Resolution::default(),
            double_sided: false,
            source: ScanSource::default(),
            page_size: PageSize::default(),
        }
    }
}

/// One scanned page held in memory
#[derive(Clone, PartialEq, Eq)]
pub struct ScanImage {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ScanImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_type_for(&file_name);
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    /// Encode as a `data:` URL for transport to the UI layer
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ScanImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn mime_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}
