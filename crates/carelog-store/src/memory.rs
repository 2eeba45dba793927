//! In-memory store implementation

use async_trait::async_trait;
use carelog_util::{RecordKey, StaffId, format_date};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::{AttendanceRecord, AttendanceStore, ErrorKind, StoreError, StoreResult};

/// In-memory attendance store for demos and tests.
///
/// Records are keyed by `{date}_{staffId}`, which keeps one record per
/// natural key and iterates in date-then-staff order.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, AttendanceRecord>>,
    write_failures: Mutex<HashMap<StaffId, ErrorKind>>,
    write_panics: Mutex<HashSet<StaffId>>,
    upserts: AtomicUsize,
}

fn map_key(date: NaiveDate, staff_id: &StaffId) -> String {
    format!("{}_{}", format_date(date), staff_id)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn parse_key(key: &str) -> StoreResult<RecordKey> {
    key.parse::<RecordKey>()
        .map_err(|e| StoreError::validation(e.to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = AttendanceRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = lock(&store.records);
            for record in records {
                map.insert(map_key(record.record_date, &record.staff_id), record);
            }
        }
        store
    }

    /// Every stored record, in date-then-staff order
    pub fn snapshot(&self) -> Vec<AttendanceRecord> {
        lock(&self.records).values().cloned().collect()
    }

    /// Number of upsert calls seen, including failed ones
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Make writes for `staff_id` fail with `kind` until cleared
    pub fn fail_writes_for(&self, staff_id: impl Into<StaffId>, kind: ErrorKind) {
        lock(&self.write_failures).insert(staff_id.into(), kind);
    }

    /// Make writes for `staff_id` panic, as a crashed task would
    pub fn panic_on_write_for(&self, staff_id: impl Into<StaffId>) {
        lock(&self.write_panics).insert(staff_id.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.write_failures).clear();
        lock(&self.write_panics).clear();
    }

    fn check_scripted_failure(&self, staff_id: &StaffId) -> StoreResult<()> {
        if lock(&self.write_panics).contains(staff_id) {
            panic!("scripted write panic for {}", staff_id);
        }
        match lock(&self.write_failures).get(staff_id) {
            Some(kind) => Err(StoreError::from_kind(
                *kind,
                format!("scripted {} failure for {}", kind, staff_id),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn upsert(&self, record: &AttendanceRecord) -> StoreResult<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check_scripted_failure(&record.staff_id)?;

        let key = map_key(record.record_date, &record.staff_id);
        lock(&self.records).insert(key.clone(), record.clone());

        debug!(key = %key, status = %record.status, "Record upserted");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let parsed = parse_key(key)?;
        self.check_scripted_failure(&parsed.staff_id)?;

        match lock(&self.records).remove(&map_key(parsed.date, &parsed.staff_id)) {
            Some(_) => {
                debug!(key, "Record removed");
                Ok(())
            }
            None => Err(StoreError::not_found(key)),
        }
    }

    async fn get_by_key(&self, key: &str) -> StoreResult<Option<AttendanceRecord>> {
        let Ok(parsed) = parse_key(key) else {
            debug!(key, "Malformed key, treating as a miss");
            return Ok(None);
        };
        Ok(lock(&self.records)
            .get(&map_key(parsed.date, &parsed.staff_id))
            .cloned())
    }

    async fn list_by_date(&self, date: NaiveDate) -> StoreResult<Vec<AttendanceRecord>> {
        Ok(lock(&self.records)
            .values()
            .filter(|r| r.record_date == date)
            .cloned()
            .collect())
    }

    async fn list_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        top: u32,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        if from > to {
            return Err(StoreError::validation(format!(
                "range start {} is after end {}",
                from, to
            )));
        }
        if top == 0 {
            return Err(StoreError::validation("top must be greater than 0"));
        }

        Ok(lock(&self.records)
            .values()
            .filter(|r| r.record_date >= from && r.record_date <= to)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttendanceStatus, DayCounts};
    use tokio_util::sync::CancellationToken;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    #[tokio::test]
    async fn upsert_keeps_one_record_per_key() {
        let store = MemoryStore::new();
        store
            .upsert(&AttendanceRecord::new("S001", day(1), AttendanceStatus::OnDuty))
            .await
            .unwrap();
        store
            .upsert(&AttendanceRecord::new("S001", day(1), AttendanceStatus::Absent))
            .await
            .unwrap();

        let records = store.list_by_date(day(1)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Absent);
    }

    #[tokio::test]
    async fn get_by_key_misses_with_none() {
        let store = MemoryStore::new();
        assert!(store.get_by_key("2025-04-01#S001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_reports_not_found() {
        let store = MemoryStore::with_records([AttendanceRecord::new(
            "S001",
            day(1),
            AttendanceStatus::OnDuty,
        )]);

        store.remove("2025-04-01#S001").await.unwrap();
        let err = store.remove("2025-04-01#S001").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn malformed_key_misses_on_get_but_fails_remove() {
        let store = MemoryStore::new();
        assert!(store.get_by_key("nonsense").await.unwrap().is_none());
        let err = store.remove("nonsense").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn range_is_inclusive_and_ordered() {
        let store = MemoryStore::with_records([
            AttendanceRecord::new("S002", day(3), AttendanceStatus::OnDuty),
            AttendanceRecord::new("S001", day(3), AttendanceStatus::OnDuty),
            AttendanceRecord::new("S001", day(1), AttendanceStatus::OnDuty),
            AttendanceRecord::new("S001", day(5), AttendanceStatus::OnDuty),
        ]);

        let records = store.list_by_date_range(day(1), day(3), 200).await.unwrap();
        let keys: Vec<String> = records.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(keys, vec!["2025-04-01#S001", "2025-04-03#S001", "2025-04-03#S002"]);
    }

    #[tokio::test]
    async fn inverted_range_is_validation() {
        let store = MemoryStore::new();
        let err = store.list_by_date_range(day(3), day(1), 200).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn count_by_date_tallies() {
        let store = MemoryStore::with_records([
            AttendanceRecord::new("S001", day(1), AttendanceStatus::OnDuty),
            AttendanceRecord::new("S002", day(1), AttendanceStatus::Absent),
            AttendanceRecord::new("S003", day(2), AttendanceStatus::Absent),
        ]);

        let counts = store.count_by_date(day(1)).await.unwrap();
        assert_eq!(
            counts,
            DayCounts {
                on_duty: 1,
                out: 0,
                absent: 1,
                total: 2
            }
        );
    }

    #[tokio::test]
    async fn cancelled_listing_is_empty_success() {
        let store = MemoryStore::with_records([AttendanceRecord::new(
            "S001",
            day(1),
            AttendanceStatus::OnDuty,
        )]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let records = store.list_by_date_cancellable(day(1), &cancel).await.unwrap();
        assert!(records.is_empty());

        let records = store
            .list_by_date_range_cancellable(day(1), day(2), 200, &cancel)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn scripted_failure_applies_to_one_staff() {
        let store = MemoryStore::new();
        store.fail_writes_for("S002", ErrorKind::Conflict);

        store
            .upsert(&AttendanceRecord::new("S001", day(1), AttendanceStatus::OnDuty))
            .await
            .unwrap();
        let err = store
            .upsert(&AttendanceRecord::new("S002", day(1), AttendanceStatus::OnDuty))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.upsert_count(), 2);

        store.clear_failures();
        store
            .upsert(&AttendanceRecord::new("S002", day(1), AttendanceStatus::OnDuty))
            .await
            .unwrap();
        assert_eq!(store.snapshot().len(), 2);
    }
}
