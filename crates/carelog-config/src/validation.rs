//! Configuration validation

use crate::schema::{RawConfig, RawRemoteConfig, StorageKind};
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Storage kind 'remote' requires a [remote] table")]
    MissingRemoteSection,

    #[error("Remote {field}: {message}")]
    RemoteError { field: &'static str, message: String },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    match (&config.storage.kind, &config.remote) {
        (StorageKind::Remote, None) => errors.push(ValidationError::MissingRemoteSection),
        (_, Some(remote)) => errors.extend(validate_remote(remote)),
        (StorageKind::Local, None) => {}
    }

    errors
}

fn validate_remote(remote: &RawRemoteConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let url = remote.site_url.trim();
    if url.is_empty() {
        errors.push(ValidationError::RemoteError {
            field: "site_url",
            message: "cannot be empty".into(),
        });
    } else if !(url.starts_with("https://") || url.starts_with("http://")) {
        errors.push(ValidationError::RemoteError {
            field: "site_url",
            message: format!("'{}' must start with http:// or https://", url),
        });
    }

    if let Some(title) = &remote.list_title
        && title.trim().is_empty()
    {
        errors.push(ValidationError::RemoteError {
            field: "list_title",
            message: "cannot be empty".into(),
        });
    }

    if remote.page_size == Some(0) {
        errors.push(ValidationError::RemoteError {
            field: "page_size",
            message: "must be greater than 0".into(),
        });
    }

    if remote.max_pages == Some(0) {
        errors.push(ValidationError::RemoteError {
            field: "max_pages",
            message: "must be greater than 0".into(),
        });
    }

    if remote.timeout_secs == Some(0) {
        errors.push(ValidationError::RemoteError {
            field: "timeout_secs",
            message: "must be greater than 0".into(),
        });
    }

    errors
}
