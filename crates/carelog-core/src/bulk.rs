//! Bulk apply: one edit to many staff for one day

use carelog_store::{AttendanceRecord, AttendanceStatus, AttendanceStore, StoreResult};
use carelog_util::StaffId;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{SettleSummary, settle_upserts};

/// Edit applied to every selected staff member.
///
/// `status` and `check_in_at` always overwrite (including clearing the
/// check-in). `note` only overwrites when it holds non-blank text; otherwise
/// each record keeps its existing note.
#[derive(Debug, Clone)]
pub struct BulkEdit {
    pub staff_ids: Vec<StaffId>,
    pub status: AttendanceStatus,
    pub check_in_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl BulkEdit {
    pub fn new(staff_ids: impl IntoIterator<Item = impl Into<StaffId>>, status: AttendanceStatus) -> Self {
        Self {
            staff_ids: staff_ids.into_iter().map(Into::into).collect(),
            status,
            check_in_at: None,
            note: None,
        }
    }

    pub fn check_in_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.check_in_at = at;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// The note to write, if the caller supplied a non-blank one
    fn note_override(&self) -> Option<&str> {
        self.note.as_deref().filter(|n| !n.trim().is_empty())
    }

    /// Merge this edit into the existing record (or a fresh one)
    pub fn merge(&self, date: NaiveDate, staff_id: &StaffId, existing: Option<AttendanceRecord>) -> AttendanceRecord {
        let mut record =
            existing.unwrap_or_else(|| AttendanceRecord::new(staff_id.clone(), date, self.status));
        record.status = self.status;
        record.check_in_at = self.check_in_at;
        if let Some(note) = self.note_override() {
            record.note = Some(note.to_string());
        }
        record
    }
}

/// Result of a bulk apply
#[derive(Debug)]
pub struct BulkReport {
    pub summary: SettleSummary,
}

impl BulkReport {
    /// At least one record was written
    pub fn any_written(&self) -> bool {
        self.summary.written > 0
    }

    /// Single summary error with counts, or Ok if every write landed
    pub fn into_result(self) -> StoreResult<()> {
        match self.summary.into_aggregate_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Apply `edit` to every selected staff member's record for `date`.
///
/// Fails early only when the day cannot be read; write failures are
/// collected into the report.
pub async fn apply_bulk(
    store: &Arc<dyn AttendanceStore>,
    date: NaiveDate,
    edit: &BulkEdit,
) -> StoreResult<BulkReport> {
    let selected: BTreeSet<&StaffId> = edit.staff_ids.iter().collect();
    if selected.is_empty() {
        debug!(date = %date, "Bulk apply with empty selection");
        return Ok(BulkReport {
            summary: SettleSummary::default(),
        });
    }

    let mut existing: HashMap<StaffId, AttendanceRecord> = store
        .list_by_date(date)
        .await?
        .into_iter()
        .map(|r| (r.staff_id.clone(), r))
        .collect();

    let updates: Vec<AttendanceRecord> = selected
        .iter()
        .map(|staff_id| edit.merge(date, staff_id, existing.remove(*staff_id)))
        .collect();

    let summary = SettleSummary::from_settled(settle_upserts(store, updates).await);
    info!(
        date = %date,
        status = %edit.status,
        total = summary.total,
        written = summary.written,
        failed = summary.failed,
        rejected = summary.rejected,
        "Bulk apply finished"
    );

    Ok(BulkReport { summary })
}
