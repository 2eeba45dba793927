//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Storage selection and write gate
    #[serde(default)]
    pub storage: RawStorageConfig,

    /// Remote list store settings (required when storage kind is remote)
    #[serde(default)]
    pub remote: Option<RawRemoteConfig>,
}

/// Which Port implementation backs the attendance records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// In-memory demo store
    #[default]
    Local,
    /// Remote list store over HTTP
    Remote,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Local => write!(f, "local"),
            StorageKind::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "demo" => Ok(StorageKind::Local),
            "remote" | "sharepoint" => Ok(StorageKind::Remote),
            other => Err(format!("Unknown storage kind: {}", other)),
        }
    }
}

/// Storage-level settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawStorageConfig {
    #[serde(default)]
    pub kind: StorageKind,

    /// When false every write entry point is a no-op
    #[serde(default = "default_true")]
    pub writes_enabled: bool,
}

impl Default for RawStorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            writes_enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Remote list store settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRemoteConfig {
    /// Site base URL, e.g. `https://example.sharepoint.com/sites/care`
    #[serde(default)]
    pub site_url: String,

    /// Title of the attendance list
    pub list_title: Option<String>,

    /// Default page size (`top`) for range listings
    pub page_size: Option<u32>,

    /// Maximum number of pages a range listing may fetch
    pub max_pages: Option<u32>,

    /// HTTP request timeout
    pub timeout_secs: Option<u64>,
}
