//! Store error taxonomy

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::ListError;

/// Classified failure kind, independent of which adapter produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// 401/403: stop writing through this adapter
    Forbidden,
    /// 412: someone else modified the record first
    Conflict,
    /// 400/422: rejected payload or query (also the schema-fallback trigger)
    Validation,
    NotFound,
    Unknown,
}

impl ErrorKind {
    /// Short user-facing hint for this kind of failure
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorKind::Forbidden => "権限がありません。閲覧のみ可能です。",
            ErrorKind::Conflict => "他の利用者が先に更新しました。再読み込みしてください。",
            ErrorKind::Validation => "入力内容または条件を確認してください。",
            ErrorKind::NotFound => "対象の記録が見つかりません。",
            ErrorKind::Unknown => "通信に失敗しました。時間をおいて再試行してください。",
        }
    }

    /// Map an HTTP status to a kind
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Forbidden,
            412 => ErrorKind::Conflict,
            400 | 422 => ErrorKind::Validation,
            404 => ErrorKind::NotFound,
            _ => ErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "notFound",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Unknown {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Summary of a fan-out where some writes did not land
    #[error("{failed} of {total} writes failed, {rejected} aborted")]
    Aggregate {
        total: usize,
        failed: usize,
        rejected: usize,
        kind: ErrorKind,
    },
}

impl StoreError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown {
            message: msg.into(),
            source: None,
        }
    }

    /// Build an error of the given kind with a plain message
    pub fn from_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        match kind {
            ErrorKind::Forbidden => Self::forbidden(msg),
            ErrorKind::Conflict => Self::conflict(msg),
            ErrorKind::Validation => Self::validation(msg),
            ErrorKind::NotFound => Self::not_found(msg),
            ErrorKind::Unknown => Self::unknown(msg),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Forbidden(_) => ErrorKind::Forbidden,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Unknown { .. } => ErrorKind::Unknown,
            StoreError::Aggregate { kind, .. } => *kind,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl From<ListError> for StoreError {
    fn from(e: ListError) -> Self {
        let message = e.to_string();
        match e.status().map(ErrorKind::from_status) {
            Some(ErrorKind::Forbidden) => StoreError::Forbidden(message),
            Some(ErrorKind::Conflict) => StoreError::Conflict(message),
            Some(ErrorKind::Validation) => StoreError::Validation(message),
            Some(ErrorKind::NotFound) => StoreError::NotFound(message),
            Some(ErrorKind::Unknown) | None => StoreError::Unknown {
                message,
                source: Some(Box::new(e)),
            },
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn classifies_http_statuses() {
        let cases = [
            (401, ErrorKind::Forbidden),
            (403, ErrorKind::Forbidden),
            (412, ErrorKind::Conflict),
            (400, ErrorKind::Validation),
            (422, ErrorKind::Validation),
            (404, ErrorKind::NotFound),
            (500, ErrorKind::Unknown),
            (503, ErrorKind::Unknown),
        ];
        for (status, kind) in cases {
            let err = StoreError::from(ListError::http(status, "boom"));
            assert_eq!(err.kind(), kind, "status {}", status);
        }
    }

    #[test]
    fn unknown_keeps_the_cause() {
        let err = StoreError::from(ListError::Transport("connection reset".into()));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn aggregate_reports_its_kind() {
        let err = StoreError::Aggregate {
            total: 5,
            failed: 2,
            rejected: 1,
            kind: ErrorKind::Conflict,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "2 of 5 writes failed, 1 aborted");
    }

    #[test]
    fn every_kind_has_a_hint() {
        for kind in [
            ErrorKind::Forbidden,
            ErrorKind::Conflict,
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::Unknown,
        ] {
            assert!(!kind.hint().is_empty());
            assert_eq!(StoreError::from_kind(kind, "x").kind(), kind);
        }
    }
}
