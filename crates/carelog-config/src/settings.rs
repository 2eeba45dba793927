//! Validated settings

use crate::schema::{RawConfig, RawRemoteConfig, RawStorageConfig, StorageKind};
use std::time::Duration;

/// Default list title for attendance records
pub const DEFAULT_LIST_TITLE: &str = "Staff_Attendance";

/// Default page size for range listings
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Default page cap for range listings
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Default HTTP timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Validated settings ready for wiring adapters
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub storage: StorageSettings,

    /// Present whenever a `[remote]` table was given
    pub remote: Option<RemoteSettings>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            storage: StorageSettings::from_raw(raw.storage),
            remote: raw.remote.map(RemoteSettings::from_raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSettings {
    pub kind: StorageKind,
    pub writes_enabled: bool,
}

impl StorageSettings {
    fn from_raw(raw: RawStorageConfig) -> Self {
        Self {
            kind: raw.kind,
            writes_enabled: raw.writes_enabled,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            writes_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub site_url: String,
    pub list_title: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub timeout: Duration,
}

impl RemoteSettings {
    fn from_raw(raw: RawRemoteConfig) -> Self {
        Self {
            site_url: raw.site_url.trim_end_matches('/').to_string(),
            list_title: raw
                .list_title
                .unwrap_or_else(|| DEFAULT_LIST_TITLE.to_string()),
            page_size: raw.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            max_pages: raw.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            timeout: raw
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}
