//! Concurrent write fan-out
//!
//! Every record gets its own task; nothing short-circuits on the first
//! failure. A task that panics is reported separately from one that returned
//! an error, so callers can tell a crashed write from a refused one.

use carelog_store::{AttendanceRecord, AttendanceStore, ErrorKind, StoreError};
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;

/// Outcome of one write in a fan-out
#[derive(Debug)]
pub enum Settled {
    Written,
    /// The store returned an error
    Failed(StoreError),
    /// The write task itself died (panicked or was cancelled)
    Rejected(String),
}

/// Upsert every record concurrently; results come back in input order.
pub async fn settle_upserts(
    store: &Arc<dyn AttendanceStore>,
    records: impl IntoIterator<Item = AttendanceRecord>,
) -> Vec<Settled> {
    let handles: Vec<_> = records
        .into_iter()
        .map(|record| {
            let store = Arc::clone(store);
            tokio::spawn(async move { store.upsert(&record).await })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| match joined {
            Ok(Ok(())) => Settled::Written,
            Ok(Err(e)) => Settled::Failed(e),
            Err(join_error) => Settled::Rejected(join_error.to_string()),
        })
        .collect()
}

/// Counts and first failures of a settled fan-out
#[derive(Debug, Default)]
pub struct SettleSummary {
    pub total: usize,
    pub written: usize,
    pub failed: usize,
    pub rejected: usize,
    first_rejection: Option<String>,
    first_failure: Option<StoreError>,
}

impl SettleSummary {
    pub fn from_settled(settled: Vec<Settled>) -> Self {
        let mut summary = SettleSummary {
            total: settled.len(),
            ..Default::default()
        };
        for outcome in settled {
            match outcome {
                Settled::Written => summary.written += 1,
                Settled::Failed(e) => {
                    summary.failed += 1;
                    summary.first_failure.get_or_insert(e);
                }
                Settled::Rejected(reason) => {
                    summary.rejected += 1;
                    summary.first_rejection.get_or_insert(reason);
                }
            }
        }
        summary
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.rejected == 0
    }

    /// Kind of the first store error, if any write failed that way
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.first_failure.as_ref().map(StoreError::kind)
    }

    /// The error to surface: a rejection wins over a returned error
    pub fn into_first_error(self) -> Option<StoreError> {
        if let Some(reason) = self.first_rejection {
            return Some(StoreError::unknown(format!("write task aborted: {}", reason)));
        }
        self.first_failure
    }

    /// One summary error listing counts, or `None` if every write landed
    pub fn into_aggregate_error(self) -> Option<StoreError> {
        if self.is_clean() {
            return None;
        }
        warn!(
            total = self.total,
            failed = self.failed,
            rejected = self.rejected,
            "Fan-out finished with failures"
        );
        Some(StoreError::Aggregate {
            total: self.total,
            failed: self.failed,
            rejected: self.rejected,
            kind: self.failure_kind().unwrap_or(ErrorKind::Unknown),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelog_store::{AttendanceStatus, MemoryStore};
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    fn records(ids: &[&str]) -> Vec<AttendanceRecord> {
        ids.iter()
            .map(|id| AttendanceRecord::new(*id, day(), AttendanceStatus::OnDuty))
            .collect()
    }

    #[tokio::test]
    async fn every_record_gets_its_attempt() {
        let memory = Arc::new(MemoryStore::new());
        memory.fail_writes_for("S001", ErrorKind::Conflict);
        let store: Arc<dyn AttendanceStore> = memory.clone();

        let settled = settle_upserts(&store, records(&["S001", "S002", "S003"])).await;
        assert!(matches!(settled[0], Settled::Failed(_)));
        assert!(matches!(settled[1], Settled::Written));
        assert!(matches!(settled[2], Settled::Written));
        assert_eq!(memory.upsert_count(), 3);
        assert_eq!(memory.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn panicked_write_is_rejected_and_wins() {
        let memory = Arc::new(MemoryStore::new());
        memory.fail_writes_for("S001", ErrorKind::Conflict);
        memory.panic_on_write_for("S003");
        let store: Arc<dyn AttendanceStore> = memory.clone();

        let settled = settle_upserts(&store, records(&["S001", "S002", "S003"])).await;
        let summary = SettleSummary::from_settled(settled);
        assert_eq!((summary.written, summary.failed, summary.rejected), (1, 1, 1));

        let err = summary.into_first_error().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.to_string().contains("aborted"));
    }

    #[tokio::test]
    async fn aggregate_error_carries_counts() {
        let memory = Arc::new(MemoryStore::new());
        memory.fail_writes_for("S002", ErrorKind::Forbidden);
        let store: Arc<dyn AttendanceStore> = memory;

        let settled = settle_upserts(&store, records(&["S001", "S002"])).await;
        let err = SettleSummary::from_settled(settled)
            .into_aggregate_error()
            .unwrap();
        assert!(matches!(
            err,
            StoreError::Aggregate {
                total: 2,
                failed: 1,
                rejected: 0,
                kind: ErrorKind::Forbidden
            }
        ));
    }

    #[test]
    fn clean_summary_has_no_error() {
        let summary = SettleSummary::from_settled(vec![Settled::Written, Settled::Written]);
        assert!(summary.is_clean());
        assert!(summary.into_aggregate_error().is_none());
    }
}
