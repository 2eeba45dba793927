//! Strongly-typed identifiers for carelog

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::{format_date, parse_date};

/// Identifier of a staff member on the roster
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffId(String);

impl StaffId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StaffId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StaffId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Separator between date and staff id in the textual record key
pub const RECORD_KEY_SEPARATOR: char = '#';

/// Natural key of an attendance record: one record per `(date, staff)`.
///
/// Renders as `{YYYY-MM-DD}#{staffId}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub date: NaiveDate,
    pub staff_id: StaffId,
}

impl RecordKey {
    pub fn new(date: NaiveDate, staff_id: impl Into<StaffId>) -> Self {
        Self {
            date,
            staff_id: staff_id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            format_date(self.date),
            RECORD_KEY_SEPARATOR,
            self.staff_id
        )
    }
}

/// Errors from parsing a textual record key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("Record key '{0}' has no '#' separator")]
    MissingSeparator(String),

    #[error("Record key '{0}' has an invalid date")]
    InvalidDate(String),

    #[error("Record key '{0}' has an empty staff id")]
    EmptyStaffId(String),
}

impl FromStr for RecordKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date, staff) = s
            .split_once(RECORD_KEY_SEPARATOR)
            .ok_or_else(|| KeyParseError::MissingSeparator(s.to_string()))?;
        let date = parse_date(date).ok_or_else(|| KeyParseError::InvalidDate(s.to_string()))?;
        if staff.is_empty() {
            return Err(KeyParseError::EmptyStaffId(s.to_string()));
        }
        Ok(Self::new(date, staff))
    }
}
