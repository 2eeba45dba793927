//! Staff roster joined with a day's attendance records

use carelog_store::{AttendanceRecord, AttendanceStatus};
use carelog_util::StaffId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A staff member on the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub staff_id: StaffId,
    pub name: String,
}

impl StaffMember {
    pub fn new(staff_id: impl Into<StaffId>, name: impl Into<String>) -> Self {
        Self {
            staff_id: staff_id.into(),
            name: name.into(),
        }
    }
}

/// Row status. `Unfilled` exists only here and is never written to a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowStatus {
    Unfilled,
    Absent,
    OnDuty,
    OutOnErrand,
}

impl RowStatus {
    /// Rows needing attention sort first
    fn rank(&self) -> u8 {
        match self {
            RowStatus::Unfilled => 0,
            RowStatus::Absent => 1,
            RowStatus::OnDuty => 2,
            RowStatus::OutOnErrand => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RowStatus::Unfilled => "未入力",
            RowStatus::Absent => AttendanceStatus::Absent.label(),
            RowStatus::OnDuty => AttendanceStatus::OnDuty.label(),
            RowStatus::OutOnErrand => AttendanceStatus::OutOnErrand.label(),
        }
    }
}

impl From<AttendanceStatus> for RowStatus {
    fn from(status: AttendanceStatus) -> Self {
        match status {
            AttendanceStatus::OnDuty => RowStatus::OnDuty,
            AttendanceStatus::Absent => RowStatus::Absent,
            AttendanceStatus::OutOnErrand => RowStatus::OutOnErrand,
        }
    }
}

/// One roster entry with its record for the day, if any
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub staff_id: StaffId,
    pub name: String,
    pub status: RowStatus,
    /// Display label for `status`
    pub status_label: &'static str,
    pub record: Option<AttendanceRecord>,
}

/// Left outer join of the roster against one day's records.
///
/// Every staff member appears exactly once; records for staff not on the
/// roster are dropped. Sorted by status (unfilled, absent, on duty, out),
/// then staff id.
pub fn build_staff_attendance_rows(staff: &[StaffMember], records: &[AttendanceRecord]) -> Vec<AttendanceRow> {
    let mut by_staff: HashMap<&StaffId, &AttendanceRecord> = HashMap::new();
    for record in records {
        by_staff.entry(&record.staff_id).or_insert(record);
    }

    let mut seen = std::collections::HashSet::new();
    let mut rows: Vec<AttendanceRow> = staff
        .iter()
        .filter(|member| seen.insert(&member.staff_id))
        .map(|member| {
            let record = by_staff.get(&member.staff_id).map(|r| (*r).clone());
            let status = record
                .as_ref()
                .map(|r| RowStatus::from(r.status))
                .unwrap_or(RowStatus::Unfilled);
            AttendanceRow {
                staff_id: member.staff_id.clone(),
                name: member.name.clone(),
                status,
                status_label: status.label(),
                record,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.status
            .rank()
            .cmp(&b.status.rank())
            .then_with(|| a.staff_id.cmp(&b.staff_id))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    fn summary(rows: &[AttendanceRow]) -> Vec<(&str, RowStatus)> {
        rows.iter().map(|r| (r.staff_id.as_str(), r.status)).collect()
    }

    #[test]
    fn no_records_means_all_unfilled() {
        let staff = vec![StaffMember::new("S2", "Suzuki"), StaffMember::new("S1", "Sato")];
        let rows = build_staff_attendance_rows(&staff, &[]);
        assert_eq!(
            summary(&rows),
            vec![("S1", RowStatus::Unfilled), ("S2", RowStatus::Unfilled)]
        );
        assert!(rows.iter().all(|r| r.record.is_none()));
    }

    #[test]
    fn unfilled_sorts_before_absent() {
        let staff = vec![StaffMember::new("S001", "Sato"), StaffMember::new("S002", "Suzuki")];
        let records = vec![AttendanceRecord::new("S002", day(), AttendanceStatus::Absent)];

        let rows = build_staff_attendance_rows(&staff, &records);
        assert_eq!(
            summary(&rows),
            vec![("S001", RowStatus::Unfilled), ("S002", RowStatus::Absent)]
        );
        assert_eq!(rows[1].name, "Suzuki");
        assert_eq!(rows[0].status_label, "未入力");
        assert_eq!(rows[1].status_label, AttendanceStatus::Absent.label());
    }

    #[test]
    fn full_status_ordering() {
        let staff: Vec<StaffMember> = ["S1", "S2", "S3", "S4", "S5"]
            .iter()
            .map(|id| StaffMember::new(*id, *id))
            .collect();
        let records = vec![
            AttendanceRecord::new("S1", day(), AttendanceStatus::OutOnErrand),
            AttendanceRecord::new("S2", day(), AttendanceStatus::OnDuty),
            AttendanceRecord::new("S3", day(), AttendanceStatus::Absent),
            AttendanceRecord::new("S5", day(), AttendanceStatus::OnDuty),
        ];

        let rows = build_staff_attendance_rows(&staff, &records);
        assert_eq!(
            summary(&rows),
            vec![
                ("S4", RowStatus::Unfilled),
                ("S3", RowStatus::Absent),
                ("S2", RowStatus::OnDuty),
                ("S5", RowStatus::OnDuty),
                ("S1", RowStatus::OutOnErrand),
            ]
        );
    }

    #[test]
    fn records_off_roster_are_dropped() {
        let staff = vec![StaffMember::new("S001", "Sato")];
        let records = vec![
            AttendanceRecord::new("S001", day(), AttendanceStatus::OnDuty),
            AttendanceRecord::new("S999", day(), AttendanceStatus::Absent),
        ];

        let rows = build_staff_attendance_rows(&staff, &records);
        assert_eq!(summary(&rows), vec![("S001", RowStatus::OnDuty)]);
    }

    #[test]
    fn duplicate_roster_entries_appear_once() {
        let staff = vec![StaffMember::new("S001", "Sato"), StaffMember::new("S001", "Sato")];
        let rows = build_staff_attendance_rows(&staff, &[]);
        assert_eq!(rows.len(), 1);
    }
}
