//! Attendance record model

use carelog_util::{RecordKey, StaffId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Attendance status stored on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(alias = "出勤")]
    OnDuty,
    #[serde(alias = "欠勤")]
    Absent,
    #[serde(alias = "外出中")]
    OutOnErrand,
}

impl AttendanceStatus {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::OnDuty => "OnDuty",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::OutOnErrand => "OutOnErrand",
        }
    }

    /// Label shown on the floor
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::OnDuty => "出勤",
            AttendanceStatus::Absent => "欠勤",
            AttendanceStatus::OutOnErrand => "外出中",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OnDuty" | "onDuty" | "on_duty" | "出勤" => Ok(AttendanceStatus::OnDuty),
            "Absent" | "absent" | "欠勤" => Ok(AttendanceStatus::Absent),
            "OutOnErrand" | "outOnErrand" | "out_on_errand" | "外出中" => {
                Ok(AttendanceStatus::OutOnErrand)
            }
            other => Err(format!("Unknown attendance status: {}", other)),
        }
    }
}

/// One staff member's attendance for one day.
///
/// `(record_date, staff_id)` is the natural key; at most one record per key
/// exists in a store. The finalization fields describe the whole day but only
/// the day's representative record carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub staff_id: StaffId,
    pub record_date: NaiveDate,
    pub status: AttendanceStatus,

    #[serde(default)]
    pub is_finalized: bool,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finalized_by: Option<String>,

    #[serde(default)]
    pub check_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check_out_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub late_minutes: Option<u32>,
    #[serde(default)]
    pub note: Option<String>,
}

impl AttendanceRecord {
    pub fn new(staff_id: impl Into<StaffId>, record_date: NaiveDate, status: AttendanceStatus) -> Self {
        Self {
            staff_id: staff_id.into(),
            record_date,
            status,
            is_finalized: false,
            finalized_at: None,
            finalized_by: None,
            check_in_at: None,
            check_out_at: None,
            late_minutes: None,
            note: None,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.record_date, self.staff_id.clone())
    }

    /// Mark this record as carrying the day's finalization
    pub fn mark_finalized(&mut self, at: DateTime<Utc>, by: impl Into<String>) {
        self.is_finalized = true;
        self.finalized_at = Some(at);
        self.finalized_by = Some(by.into());
    }

    pub fn clear_finalization(&mut self) {
        self.is_finalized = false;
        self.finalized_at = None;
        self.finalized_by = None;
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_check_in(mut self, at: DateTime<Utc>) -> Self {
        self.check_in_at = Some(at);
        self
    }
}

/// Per-status head count for one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCounts {
    pub on_duty: usize,
    pub out: usize,
    pub absent: usize,
    pub total: usize,
}

impl DayCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> Self {
        records
            .into_iter()
            .fold(DayCounts::default(), |mut counts, record| {
                match record.status {
                    AttendanceStatus::OnDuty => counts.on_duty += 1,
                    AttendanceStatus::OutOnErrand => counts.out += 1,
                    AttendanceStatus::Absent => counts.absent += 1,
                }
                counts.total += 1;
                counts
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    #[test]
    fn status_parses_wire_and_labels() {
        assert_eq!("OnDuty".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::OnDuty);
        assert_eq!("欠勤".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Absent);
        assert_eq!("外出中".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::OutOnErrand);
        assert!("Late".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn record_json_uses_camel_case() {
        let record = AttendanceRecord::new("S001", day(), AttendanceStatus::Absent).with_note("通院");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["staffId"], "S001");
        assert_eq!(json["recordDate"], "2025-04-01");
        assert_eq!(json["status"], "Absent");
        assert_eq!(json["isFinalized"], false);
        assert_eq!(json["note"], "通院");
    }

    #[test]
    fn record_accepts_japanese_status_on_read() {
        let record: AttendanceRecord = serde_json::from_value(serde_json::json!({
            "staffId": "S002",
            "recordDate": "2025-04-01",
            "status": "出勤"
        }))
        .unwrap();
        assert_eq!(record.status, AttendanceStatus::OnDuty);
        assert!(!record.is_finalized);
    }

    #[test]
    fn finalization_marks_and_clears() {
        let mut record = AttendanceRecord::new("S001", day(), AttendanceStatus::OnDuty);
        record.mark_finalized(Utc::now(), "manager");
        assert!(record.is_finalized);
        assert_eq!(record.finalized_by.as_deref(), Some("manager"));

        record.clear_finalization();
        assert!(!record.is_finalized);
        assert!(record.finalized_at.is_none());
        assert!(record.finalized_by.is_none());
    }

    #[test]
    fn tally_counts_each_status() {
        let records = vec![
            AttendanceRecord::new("S001", day(), AttendanceStatus::OnDuty),
            AttendanceRecord::new("S002", day(), AttendanceStatus::OnDuty),
            AttendanceRecord::new("S003", day(), AttendanceStatus::Absent),
            AttendanceRecord::new("S004", day(), AttendanceStatus::OutOnErrand),
        ];
        let counts = DayCounts::tally(&records);
        assert_eq!(
            counts,
            DayCounts {
                on_duty: 2,
                out: 1,
                absent: 1,
                total: 4
            }
        );
    }
}
