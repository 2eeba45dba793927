//! Configuration parsing and validation for carelog
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Storage selection (`local` in-memory or `remote` list store)
//! - A global write gate
//! - Remote list settings (site, list title, paging caps)

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    let settings = Settings::from_raw(raw);
    tracing::debug!(
        storage = %settings.storage.kind,
        writes_enabled = settings.storage.writes_enabled,
        "Configuration parsed"
    );
    Ok(settings)
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            config_version = 1
        "#;

        let settings = parse_config(config).unwrap();
        assert_eq!(settings.storage.kind, StorageKind::Local);
        assert!(settings.storage.writes_enabled);
        assert!(settings.remote.is_none());
    }

    #[test]
    fn parse_remote_config() {
        let config = r#"
            config_version = 1

            [storage]
            kind = "remote"
            writes_enabled = false

            [remote]
            site_url = "https://example.sharepoint.com/sites/care"
            page_size = 100
        "#;

        let settings = parse_config(config).unwrap();
        assert_eq!(settings.storage.kind, StorageKind::Remote);
        assert!(!settings.storage.writes_enabled);

        let remote = settings.remote.unwrap();
        assert_eq!(remote.list_title, DEFAULT_LIST_TITLE);
        assert_eq!(remote.page_size, 100);
        assert_eq!(remote.max_pages, DEFAULT_MAX_PAGES);
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_remote_without_site() {
        let config = r#"
            config_version = 1

            [storage]
            kind = "remote"
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn reject_unknown_storage_kind() {
        let config = r#"
            config_version = 1

            [storage]
            kind = "sqlite"
        "#;

        assert!(matches!(parse_config(config), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config_version = 1").unwrap();
        writeln!(file, "[storage]").unwrap();
        writeln!(file, "kind = \"local\"").unwrap();

        let settings = load_config(file.path()).unwrap();
        assert_eq!(settings.storage.kind, StorageKind::Local);
    }

    #[test]
    fn load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }
}
