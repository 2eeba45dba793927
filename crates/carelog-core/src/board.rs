//! Read/write façade for one day's attendance
//!
//! `AttendanceBoard` owns the visible record set for a single date. Every
//! write goes through it: the saving counter is raised for the duration of
//! the write, and a successful write is always followed by a reload so the
//! visible list reflects the store rather than the optimistic local value.

use carelog_store::{AttendanceRecord, AttendanceStore, ErrorKind, StoreError, StoreResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    AttendanceRow, BulkEdit, StaffMember, apply_bulk, build_staff_attendance_rows, finalize_day, is_day_finalized,
    unfinalize_day,
};

/// Receives board events. Injected per board; there is no global notifier.
pub trait BoardListener: Send + Sync {
    /// A store call failed; `hint` is the user-facing message for `kind`
    fn on_error(&self, _kind: ErrorKind, _hint: &str) {}

    /// A write landed and the board has reloaded
    fn on_saved(&self, _date: NaiveDate) {}
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl BoardListener for NoopListener {}

/// Whether a write was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Saved,
    /// Writes are disabled by configuration, or the board is read-only
    Skipped,
}

/// Last classified error shown by the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardError {
    pub kind: ErrorKind,
    pub hint: String,
}

/// Point-in-time view of a board
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub date: NaiveDate,
    pub items: Vec<AttendanceRecord>,
    pub is_loading: bool,
    pub is_saving: bool,
    pub read_only: bool,
    pub writes_enabled: bool,
    pub error: Option<BoardError>,
}

#[derive(Debug, Default)]
struct BoardState {
    items: Vec<AttendanceRecord>,
    /// Generation of the reload whose outcome is on display
    shown_generation: u64,
    read_only: bool,
    error: Option<BoardError>,
}

/// Holds an in-flight counter up for as long as it lives
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One day's records plus loading/saving/error state
pub struct AttendanceBoard {
    store: Arc<dyn AttendanceStore>,
    date: NaiveDate,
    writes_enabled: bool,
    state: RwLock<BoardState>,
    writes_in_flight: AtomicUsize,
    loads_in_flight: AtomicUsize,
    /// Last reload generation handed out
    issued_generation: AtomicU64,
    listener: Arc<dyn BoardListener>,
}

impl AttendanceBoard {
    /// `writes_enabled` is read once here and never re-evaluated
    pub fn new(store: Arc<dyn AttendanceStore>, date: NaiveDate, writes_enabled: bool) -> Self {
        Self {
            store,
            date,
            writes_enabled,
            state: RwLock::new(BoardState::default()),
            writes_in_flight: AtomicUsize::new(0),
            loads_in_flight: AtomicUsize::new(0),
            issued_generation: AtomicU64::new(0),
            listener: Arc::new(NoopListener),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn BoardListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn writes_enabled(&self) -> bool {
        self.writes_enabled
    }

    pub async fn items(&self) -> Vec<AttendanceRecord> {
        self.state.read().await.items.clone()
    }

    /// True while at least one write is in flight
    pub fn is_saving(&self) -> bool {
        self.writes_in_flight.load(Ordering::SeqCst) > 0
    }

    /// True while at least one reload is in flight
    pub fn is_loading(&self) -> bool {
        self.loads_in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn is_read_only(&self) -> bool {
        self.state.read().await.read_only
    }

    pub async fn error(&self) -> Option<BoardError> {
        self.state.read().await.error.clone()
    }

    pub async fn snapshot(&self) -> BoardSnapshot {
        let state = self.state.read().await;
        BoardSnapshot {
            date: self.date,
            items: state.items.clone(),
            is_loading: self.is_loading(),
            is_saving: self.is_saving(),
            read_only: state.read_only,
            writes_enabled: self.writes_enabled,
            error: state.error.clone(),
        }
    }

    /// Roster rows for the currently loaded records
    pub async fn rows(&self, roster: &[StaffMember]) -> Vec<AttendanceRow> {
        let state = self.state.read().await;
        build_staff_attendance_rows(roster, &state.items)
    }

    /// Fetch the day again. Failures are recorded on the board, never returned.
    ///
    /// Overlapping reloads may finish in any order; only an outcome newer
    /// than the one on display is applied.
    pub async fn reload(&self) {
        let _loading = InFlightGuard::enter(&self.loads_in_flight);
        let generation = self.issued_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self.store.list_by_date(self.date).await;

        let mut state = self.state.write().await;
        if generation <= state.shown_generation {
            debug!(date = %self.date, generation, shown = state.shown_generation, "Discarding stale reload");
            return;
        }
        state.shown_generation = generation;

        match result {
            Ok(items) => {
                debug!(date = %self.date, generation, count = items.len(), "Board reloaded");
                state.items = items;
                state.error = None;
            }
            Err(e) => {
                self.note_error(&mut state, &e);
                drop(state);
                self.listener.on_error(e.kind(), e.kind().hint());
            }
        }
    }

    /// Write one record, then reload
    pub async fn upsert_one(&self, record: &AttendanceRecord) -> StoreResult<WriteOutcome> {
        if !self.accepts_writes().await {
            return Ok(WriteOutcome::Skipped);
        }
        let _saving = InFlightGuard::enter(&self.writes_in_flight);

        let result = self.store.upsert(record).await;
        self.finish_write(result, "upsert").await
    }

    /// Delete one record by key string, then reload
    pub async fn remove(&self, key: &str) -> StoreResult<WriteOutcome> {
        if !self.accepts_writes().await {
            return Ok(WriteOutcome::Skipped);
        }
        let _saving = InFlightGuard::enter(&self.writes_in_flight);

        let result = self.store.remove(key).await;
        self.finish_write(result, "remove").await
    }

    pub async fn finalize(&self, finalized_by: &str) -> StoreResult<WriteOutcome> {
        if !self.accepts_writes().await {
            return Ok(WriteOutcome::Skipped);
        }
        let _saving = InFlightGuard::enter(&self.writes_in_flight);

        let result = finalize_day(&self.store, self.date, finalized_by).await;
        self.finish_write(result, "finalize").await
    }

    pub async fn unfinalize(&self) -> StoreResult<WriteOutcome> {
        if !self.accepts_writes().await {
            return Ok(WriteOutcome::Skipped);
        }
        let _saving = InFlightGuard::enter(&self.writes_in_flight);

        let result = unfinalize_day(&self.store, self.date).await;
        self.finish_write(result, "unfinalize").await
    }

    /// Read straight from the store, not from the loaded items
    pub async fn is_finalized(&self) -> StoreResult<bool> {
        match is_day_finalized(&self.store, self.date).await {
            Ok(finalized) => Ok(finalized),
            Err(e) => {
                self.record_error(&e).await;
                Err(e)
            }
        }
    }

    /// Apply one edit to many staff. Reloads if any write landed, even when
    /// others failed; the failures come back as one summary error.
    pub async fn apply_bulk(&self, edit: &BulkEdit) -> StoreResult<WriteOutcome> {
        if !self.accepts_writes().await {
            return Ok(WriteOutcome::Skipped);
        }
        let _saving = InFlightGuard::enter(&self.writes_in_flight);

        let report = match apply_bulk(&self.store, self.date, edit).await {
            Ok(report) => report,
            Err(e) => {
                self.record_error(&e).await;
                return Err(e);
            }
        };

        if report.any_written() {
            self.reload().await;
        }
        if let Err(e) = report.into_result() {
            self.record_error(&e).await;
            return Err(e);
        }

        self.listener.on_saved(self.date);
        Ok(WriteOutcome::Saved)
    }

    async fn accepts_writes(&self) -> bool {
        if !self.writes_enabled {
            debug!(date = %self.date, "Writes disabled by configuration, skipping");
            return false;
        }
        if self.state.read().await.read_only {
            debug!(date = %self.date, "Board is read-only, skipping write");
            return false;
        }
        true
    }

    async fn finish_write(&self, result: StoreResult<()>, op: &'static str) -> StoreResult<WriteOutcome> {
        match result {
            Ok(()) => {
                self.reload().await;
                info!(date = %self.date, op, "Board write saved");
                self.listener.on_saved(self.date);
                Ok(WriteOutcome::Saved)
            }
            Err(e) => {
                self.record_error(&e).await;
                Err(e)
            }
        }
    }

    async fn record_error(&self, e: &StoreError) {
        self.note_error(&mut *self.state.write().await, e);
        self.listener.on_error(e.kind(), e.kind().hint());
    }

    fn note_error(&self, state: &mut BoardState, e: &StoreError) {
        let kind = e.kind();
        warn!(date = %self.date, kind = %kind, error = %e, "Board store call failed");

        if kind == ErrorKind::Forbidden && !state.read_only {
            info!(date = %self.date, "Store refused access, board is now read-only");
            state.read_only = true;
        }
        state.error = Some(BoardError {
            kind,
            hint: kind.hint().to_string(),
        });
    }
}
