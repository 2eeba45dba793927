//! Day finalize / unfinalize protocol
//!
//! "Day finalized" belongs to the set of a day's records, but the store has
//! no day-level entity. The record with the lexicographically smallest staff
//! id is the day's representative and is the only one that carries
//! `is_finalized`, `finalized_at` and `finalized_by`. A day without records
//! has no representative and cannot be finalized.
//!
//! Writes for one day fan out concurrently and are not atomic: a failure can
//! leave some records updated. Re-running the same call converges. Concurrent
//! finalize and unfinalize for the same day are not serialized here; the last
//! write to the representative wins.

use carelog_store::{AttendanceRecord, AttendanceStore, StoreError, StoreResult};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{SettleSummary, settle_upserts};

/// The record that carries the day's finalization
pub fn elect_representative(records: &[AttendanceRecord]) -> Option<&AttendanceRecord> {
    records.iter().min_by(|a, b| a.staff_id.cmp(&b.staff_id))
}

/// Finalize `date`: the representative gets fresh finalization metadata,
/// every other record of the day is cleared.
pub async fn finalize_day(
    store: &Arc<dyn AttendanceStore>,
    date: NaiveDate,
    finalized_by: &str,
) -> StoreResult<()> {
    let records = store.list_by_date(date).await?;
    let Some(representative) = elect_representative(&records).map(|r| r.staff_id.clone()) else {
        return Err(StoreError::not_found(format!(
            "no attendance records for {}; nothing to finalize",
            date
        )));
    };

    let at = carelog_util::now_utc();
    let updates: Vec<AttendanceRecord> = records
        .into_iter()
        .map(|mut record| {
            if record.staff_id == representative {
                record.mark_finalized(at, finalized_by);
            } else {
                record.clear_finalization();
            }
            record
        })
        .collect();
    let count = updates.len();

    let summary = SettleSummary::from_settled(settle_upserts(store, updates).await);
    if let Some(e) = summary.into_first_error() {
        return Err(e);
    }

    info!(
        date = %date,
        representative = %representative,
        finalized_by,
        records = count,
        "Day finalized"
    );
    Ok(())
}

/// Clear finalization from every record of `date` that carries it.
/// A day with nothing finalized is a successful no-op.
pub async fn unfinalize_day(store: &Arc<dyn AttendanceStore>, date: NaiveDate) -> StoreResult<()> {
    let records = store.list_by_date(date).await?;
    let updates: Vec<AttendanceRecord> = records
        .into_iter()
        .filter(|r| r.is_finalized)
        .map(|mut record| {
            record.clear_finalization();
            record
        })
        .collect();

    if updates.is_empty() {
        debug!(date = %date, "Day not finalized, nothing to clear");
        return Ok(());
    }
    let count = updates.len();

    let summary = SettleSummary::from_settled(settle_upserts(store, updates).await);
    if let Some(e) = summary.into_first_error() {
        return Err(e);
    }

    info!(date = %date, cleared = count, "Day unfinalized");
    Ok(())
}

/// Whether any record of `date` is finalized. Always read fresh.
pub async fn is_day_finalized(store: &Arc<dyn AttendanceStore>, date: NaiveDate) -> StoreResult<bool> {
    let records = store.list_by_date(date).await?;
    Ok(records.iter().any(|r| r.is_finalized))
}
