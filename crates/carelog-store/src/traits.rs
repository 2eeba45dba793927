//! Store trait definitions

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::{AttendanceRecord, DayCounts, StoreResult};

/// Default page size for range listings
pub const DEFAULT_RANGE_TOP: u32 = 200;

/// Storage-agnostic attendance port.
///
/// Expected failures come back as `Err(StoreError)`; implementations must not
/// panic for them. Every method may be called concurrently. Implementations
/// hold no cross-call data state (a cached client handle is fine).
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Create or update the record for `record.key()`
    async fn upsert(&self, record: &AttendanceRecord) -> StoreResult<()>;

    /// Delete by textual key `{date}#{staffId}`; `NotFound` on miss
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Look up by textual key; `Ok(None)` on miss
    async fn get_by_key(&self, key: &str) -> StoreResult<Option<AttendanceRecord>>;

    /// All records for one day
    async fn list_by_date(&self, date: NaiveDate) -> StoreResult<Vec<AttendanceRecord>>;

    /// All records with `from <= date <= to`, ordered by date then staff
    async fn list_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        top: u32,
    ) -> StoreResult<Vec<AttendanceRecord>>;

    /// Head count per status for one day
    async fn count_by_date(&self, date: NaiveDate) -> StoreResult<DayCounts> {
        let records = self.list_by_date(date).await?;
        Ok(DayCounts::tally(&records))
    }

    /// `list_by_date` that resolves to an empty list once `cancel` fires
    async fn list_by_date_cancellable(
        &self,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(Vec::new()),
            result = self.list_by_date(date) => result,
        }
    }

    /// `list_by_date_range` that resolves to an empty list once `cancel` fires
    async fn list_by_date_range_cancellable(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        top: u32,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(Vec::new()),
            result = self.list_by_date_range(from, to, top) => result,
        }
    }
}
