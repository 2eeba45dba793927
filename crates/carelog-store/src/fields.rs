//! Wire mapping between attendance records and remote list items

use carelog_util::{RecordKey, StaffId, format_date, parse_date};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{AttendanceRecord, AttendanceStatus, ListItem};

pub const FIELD_ID: &str = "Id";
pub const FIELD_KEY: &str = "Title";
pub const FIELD_STAFF_ID: &str = "StaffId";
pub const FIELD_RECORD_DATE: &str = "RecordDate";
pub const FIELD_STATUS: &str = "Status";
pub const FIELD_IS_FINALIZED: &str = "IsFinalized";
pub const FIELD_FINALIZED_AT: &str = "FinalizedAt";
pub const FIELD_FINALIZED_BY: &str = "FinalizedBy";
pub const FIELD_CHECK_IN_AT: &str = "CheckInAt";
pub const FIELD_CHECK_OUT_AT: &str = "CheckOutAt";
pub const FIELD_LATE_MINUTES: &str = "LateMinutes";
pub const FIELD_NOTE: &str = "Note";

/// Columns added by the audit migration; older lists lack them
pub const AUDIT_FIELDS: [&str; 2] = [FIELD_FINALIZED_AT, FIELD_FINALIZED_BY];

/// Field set for stores that predate the audit columns
pub const NARROW_SELECT: &[&str] = &[
    FIELD_ID,
    FIELD_KEY,
    FIELD_STAFF_ID,
    FIELD_RECORD_DATE,
    FIELD_STATUS,
    FIELD_IS_FINALIZED,
    FIELD_CHECK_IN_AT,
    FIELD_CHECK_OUT_AT,
    FIELD_LATE_MINUTES,
    FIELD_NOTE,
];

/// Full field set including the audit columns
pub const WIDE_SELECT: &[&str] = &[
    FIELD_ID,
    FIELD_KEY,
    FIELD_STAFF_ID,
    FIELD_RECORD_DATE,
    FIELD_STATUS,
    FIELD_IS_FINALIZED,
    FIELD_CHECK_IN_AT,
    FIELD_CHECK_OUT_AT,
    FIELD_LATE_MINUTES,
    FIELD_NOTE,
    FIELD_FINALIZED_AT,
    FIELD_FINALIZED_BY,
];

/// Quote a string literal for an OData filter
pub fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn key_filter(key: &RecordKey) -> String {
    format!("{} eq {}", FIELD_KEY, odata_literal(&key.to_string()))
}

pub fn date_filter(date: chrono::NaiveDate) -> String {
    format!("{} eq {}", FIELD_RECORD_DATE, odata_literal(&format_date(date)))
}

pub fn range_filter(from: chrono::NaiveDate, to: chrono::NaiveDate) -> String {
    format!(
        "{field} ge {} and {field} le {}",
        odata_literal(&format_date(from)),
        odata_literal(&format_date(to)),
        field = FIELD_RECORD_DATE,
    )
}

fn timestamp(value: Option<DateTime<Utc>>) -> Value {
    value
        .map(|dt| Value::String(dt.to_rfc3339()))
        .unwrap_or(Value::Null)
}

/// Build the write payload. Audit columns are only included when asked for,
/// so the same record can be written to a list that lacks them.
pub fn record_to_payload(record: &AttendanceRecord, include_audit: bool) -> ListItem {
    let mut item = ListItem::new();
    item.insert(FIELD_KEY.into(), Value::String(record.key().to_string()));
    item.insert(FIELD_STAFF_ID.into(), Value::String(record.staff_id.to_string()));
    item.insert(
        FIELD_RECORD_DATE.into(),
        Value::String(format_date(record.record_date)),
    );
    item.insert(FIELD_STATUS.into(), Value::String(record.status.as_str().into()));
    item.insert(FIELD_IS_FINALIZED.into(), Value::Bool(record.is_finalized));
    item.insert(FIELD_CHECK_IN_AT.into(), timestamp(record.check_in_at));
    item.insert(FIELD_CHECK_OUT_AT.into(), timestamp(record.check_out_at));
    item.insert(
        FIELD_LATE_MINUTES.into(),
        record.late_minutes.map(Value::from).unwrap_or(Value::Null),
    );
    item.insert(
        FIELD_NOTE.into(),
        record
            .note
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );

    if include_audit {
        item.insert(FIELD_FINALIZED_AT.into(), timestamp(record.finalized_at));
        item.insert(
            FIELD_FINALIZED_BY.into(),
            record
                .finalized_by
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
    }

    item
}

fn str_field<'a>(item: &'a ListItem, field: &str) -> Option<&'a str> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn timestamp_field(item: &ListItem, field: &str) -> Option<DateTime<Utc>> {
    str_field(item, field)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn bool_field(item: &ListItem, field: &str) -> bool {
    match item.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "True" | "1" | "Yes"),
        _ => false,
    }
}

fn minutes_field(item: &ListItem, field: &str) -> Option<u32> {
    let value = item.get(field)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
        .and_then(|m| u32::try_from(m).ok())
}

/// Item id used for conditional update/delete
pub fn item_id(item: &ListItem) -> Option<i64> {
    match item.get(FIELD_ID)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Decode one list item. Staff id and date fall back to the `Title` key when
/// their own columns are blank.
pub fn record_from_item(item: &ListItem) -> Result<AttendanceRecord, String> {
    let key: Option<RecordKey> = str_field(item, FIELD_KEY).and_then(|k| k.parse().ok());

    let staff_id = str_field(item, FIELD_STAFF_ID)
        .map(StaffId::from)
        .or_else(|| key.as_ref().map(|k| k.staff_id.clone()))
        .ok_or_else(|| "missing staff id".to_string())?;

    let record_date = str_field(item, FIELD_RECORD_DATE)
        .and_then(parse_date)
        .or_else(|| key.as_ref().map(|k| k.date))
        .ok_or_else(|| "missing or invalid record date".to_string())?;

    let status = str_field(item, FIELD_STATUS)
        .ok_or_else(|| "missing status".to_string())?
        .parse::<AttendanceStatus>()?;

    Ok(AttendanceRecord {
        staff_id,
        record_date,
        status,
        is_finalized: bool_field(item, FIELD_IS_FINALIZED),
        finalized_at: timestamp_field(item, FIELD_FINALIZED_AT),
        finalized_by: str_field(item, FIELD_FINALIZED_BY).map(str::to_string),
        check_in_at: timestamp_field(item, FIELD_CHECK_IN_AT),
        check_out_at: timestamp_field(item, FIELD_CHECK_OUT_AT),
        late_minutes: minutes_field(item, FIELD_LATE_MINUTES),
        note: item
            .get(FIELD_NOTE)
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}
