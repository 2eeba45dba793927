//! Remote list-store adapter
//!
//! Consistency comes entirely from per-item entity tags: an update is only
//! applied if the item still carries the tag we read. Lists created before
//! the audit migration lack `FinalizedAt`/`FinalizedBy`; every read and
//! write falls back to the narrow field set when the store rejects the wide
//! one with a validation-class error.

use async_trait::async_trait;
use carelog_util::RecordKey;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fields::{
    NARROW_SELECT, WIDE_SELECT, date_filter, item_id, key_filter, range_filter,
    record_from_item, record_to_payload, FIELD_RECORD_DATE, FIELD_STAFF_ID,
};
use crate::{
    AttendanceRecord, AttendanceStore, ListClient, ListItem, ListQuery, StoreError, StoreResult,
};

/// Default page cap for range listings
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Page size used for single-day listings
const DAY_PAGE_SIZE: u32 = 500;

/// `If-Match` value when no entity tag is known
const ANY_ETAG: &str = "*";

/// Attendance store backed by a remote list
pub struct RemoteStore {
    client: Arc<dyn ListClient>,
    list_title: String,
    max_pages: u32,
}

impl RemoteStore {
    pub fn new(client: Arc<dyn ListClient>, list_title: impl Into<String>) -> Self {
        Self {
            client,
            list_title: list_title.into(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn list_title(&self) -> &str {
        &self.list_title
    }

    /// Run a query with the wide field set, retrying with the narrow one if
    /// the store rejects the audit columns.
    async fn query_with_fallback(&self, op: &'static str, query: ListQuery) -> StoreResult<Vec<ListItem>> {
        let wide = ListQuery {
            select: WIDE_SELECT.to_vec(),
            ..query
        };

        match self.client.get_items_by_filter(&self.list_title, &wide).await {
            Ok(items) => Ok(items),
            Err(e) if e.is_validation() => {
                warn!(
                    op,
                    list = %self.list_title,
                    error = %e,
                    "Wide field set rejected, retrying without audit fields"
                );
                let narrow = ListQuery {
                    select: NARROW_SELECT.to_vec(),
                    ..wide
                };
                self.client
                    .get_items_by_filter(&self.list_title, &narrow)
                    .await
                    .map_err(StoreError::from)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Decode items. One unreadable row fails the whole listing.
    fn decode(&self, op: &'static str, items: Vec<ListItem>) -> StoreResult<Vec<AttendanceRecord>> {
        let mut records = Vec::with_capacity(items.len());
        let mut unreadable = Vec::new();

        for item in &items {
            match record_from_item(item) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    let id = item_id(item);
                    warn!(op, list = %self.list_title, id = ?id, reason, "Unreadable item");
                    unreadable.push(match id {
                        Some(id) => format!("{} ({})", id, reason),
                        None => format!("? ({})", reason),
                    });
                }
            }
        }

        if !unreadable.is_empty() {
            return Err(StoreError::unknown(format!(
                "{} returned {} unreadable item(s): {}",
                op,
                unreadable.len(),
                unreadable.join(", ")
            )));
        }
        Ok(records)
    }

    /// A result that fills every allowed page may have been cut short
    fn check_ceiling(&self, op: &'static str, count: usize, ceiling: usize, scope: String) -> StoreResult<()> {
        if count < ceiling {
            return Ok(());
        }
        warn!(op, list = %self.list_title, scope = %scope, count, ceiling, "Listing hit the page cap");
        Err(StoreError::validation(format!(
            "{} returned {} or more records; narrow the date range",
            scope, ceiling
        )))
    }

    async fn find_by_key(&self, key: &RecordKey) -> StoreResult<Option<ListItem>> {
        let query = ListQuery::new(&[], key_filter(key)).top(1);
        let items = self.query_with_fallback("find_by_key", query).await?;
        Ok(items.into_iter().next())
    }

    async fn current_etag(&self, id: i64) -> StoreResult<Option<String>> {
        let fetched = self.client.get_item_with_etag(&self.list_title, id).await?;
        Ok(fetched.and_then(|f| f.etag))
    }

    /// One lookup-then-write pass
    async fn upsert_once(&self, record: &AttendanceRecord, include_audit: bool) -> StoreResult<()> {
        let key = record.key();
        let payload = record_to_payload(record, include_audit);

        match self.find_by_key(&key).await? {
            Some(existing) => {
                let id = item_id(&existing).ok_or_else(|| {
                    StoreError::unknown(format!("item for {} has no id", key))
                })?;
                let etag = self.current_etag(id).await?;
                let if_match = etag.as_deref().unwrap_or(ANY_ETAG);
                self.client
                    .update_item(&self.list_title, id, &payload, if_match)
                    .await?;
                debug!(key = %key, id, if_match, include_audit, "Record updated");
            }
            None => {
                self.client.add_item(&self.list_title, &payload).await?;
                debug!(key = %key, include_audit, "Record created");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for RemoteStore {
    async fn upsert(&self, record: &AttendanceRecord) -> StoreResult<()> {
        match self.upsert_once(record, true).await {
            Err(e) if e.is_validation() => {
                warn!(
                    key = %record.key(),
                    error = %e,
                    "Write rejected, retrying without audit fields"
                );
                self.upsert_once(record, false).await
            }
            other => other,
        }
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let parsed: RecordKey = key
            .parse()
            .map_err(|e: carelog_util::KeyParseError| StoreError::validation(e.to_string()))?;

        let existing = self
            .find_by_key(&parsed)
            .await?
            .ok_or_else(|| StoreError::not_found(key))?;
        let id = item_id(&existing)
            .ok_or_else(|| StoreError::unknown(format!("item for {} has no id", key)))?;

        let etag = self.current_etag(id).await?;
        self.client
            .delete_item(&self.list_title, id, etag.as_deref().unwrap_or(ANY_ETAG))
            .await?;

        debug!(key, id, "Record removed");
        Ok(())
    }

    async fn get_by_key(&self, key: &str) -> StoreResult<Option<AttendanceRecord>> {
        let Ok(parsed) = key.parse::<RecordKey>() else {
            debug!(key, "Malformed key, treating as a miss");
            return Ok(None);
        };

        let Some(item) = self.find_by_key(&parsed).await? else {
            return Ok(None);
        };
        record_from_item(&item)
            .map(Some)
            .map_err(|reason| StoreError::unknown(format!("unreadable item for {}: {}", key, reason)))
    }

    async fn list_by_date(&self, date: NaiveDate) -> StoreResult<Vec<AttendanceRecord>> {
        let query = ListQuery::new(&[], date_filter(date))
            .order_by(format!("{} asc", FIELD_STAFF_ID))
            .top(DAY_PAGE_SIZE)
            .max_pages(self.max_pages);
        let ceiling = query.ceiling().unwrap_or(usize::MAX);

        let items = self.query_with_fallback("list_by_date", query).await?;
        self.check_ceiling("list_by_date", items.len(), ceiling, date.to_string())?;
        let records = self.decode("list_by_date", items)?;
        debug!(date = %date, count = records.len(), "Listed records for day");
        Ok(records)
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

        let query = ListQuery::new(&[], range_filter(from, to))
            .order_by(format!("{} asc,{} asc", FIELD_RECORD_DATE, FIELD_STAFF_ID))
            .top(top)
            .max_pages(self.max_pages);
        let ceiling = query.ceiling().unwrap_or(usize::MAX);

        let items = self.query_with_fallback("list_by_date_range", query).await?;

        self.check_ceiling(
            "list_by_date_range",
            items.len(),
            ceiling,
            format!("{} to {}", from, to),
        )?;
        self.decode("list_by_date_range", items)
    }
}
