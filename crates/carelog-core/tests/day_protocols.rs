//! Day protocols run against both store adapters

use std::sync::Arc;

use carelog_core::{
    AttendanceBoard, BulkEdit, StaffMember, WriteOutcome, apply_bulk, build_staff_attendance_rows, finalize_day,
    is_day_finalized, unfinalize_day,
};
use carelog_store::{
    AttendanceRecord, AttendanceStatus, AttendanceStore, ErrorKind, ListClient, MemoryStore, MockListClient, MockOp,
    RemoteStore,
};
use chrono::NaiveDate;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
}

fn remote(client: &Arc<MockListClient>) -> Arc<dyn AttendanceStore> {
    let client: Arc<dyn ListClient> = client.clone();
    Arc::new(RemoteStore::new(client, "Staff_Attendance"))
}

async fn seeded(store: &Arc<dyn AttendanceStore>) {
    for (id, status) in [
        ("S003", AttendanceStatus::OnDuty),
        ("S001", AttendanceStatus::Absent),
        ("S002", AttendanceStatus::OutOnErrand),
    ] {
        store.upsert(&AttendanceRecord::new(id, day(), status)).await.unwrap();
    }
}

fn finalized_ids(records: &[AttendanceRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.is_finalized)
        .map(|r| r.staff_id.to_string())
        .collect()
}

#[tokio::test]
async fn one_record_per_key_across_repeated_upserts() {
    let client = Arc::new(MockListClient::new());
    let store = remote(&client);

    for status in [AttendanceStatus::OnDuty, AttendanceStatus::OutOnErrand, AttendanceStatus::Absent] {
        store.upsert(&AttendanceRecord::new("S001", day(), status)).await.unwrap();
    }

    let records = store.list_by_date(day()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AttendanceStatus::Absent);
    assert_eq!(client.call_count(MockOp::Add), 1);
}

#[tokio::test]
async fn finalize_leaves_exactly_one_representative_remote() {
    let client = Arc::new(MockListClient::new());
    let store = remote(&client);
    seeded(&store).await;

    finalize_day(&store, day(), "manager").await.unwrap();

    let records = store.list_by_date(day()).await.unwrap();
    assert_eq!(finalized_ids(&records), vec!["S001".to_string()]);
    let rep = records.iter().find(|r| r.is_finalized).unwrap();
    assert_eq!(rep.finalized_by.as_deref(), Some("manager"));
    assert!(rep.finalized_at.is_some());
    assert!(is_day_finalized(&store, day()).await.unwrap());
}

#[tokio::test]
async fn finalize_refuses_a_day_with_an_unreadable_row() {
    let client = Arc::new(MockListClient::new());
    let store = remote(&client);
    client.insert_raw(
        serde_json::json!({
            "Title": "2025-04-01#S000",
            "StaffId": "S000",
            "RecordDate": "2025-04-01",
            "Status": "外出",
            "IsFinalized": true
        })
        .as_object()
        .cloned()
        .unwrap(),
    );
    store
        .upsert(&AttendanceRecord::new("S001", day(), AttendanceStatus::OnDuty))
        .await
        .unwrap();
    let adds = client.call_count(MockOp::Add);

    let err = finalize_day(&store, day(), "manager").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    let err = unfinalize_day(&store, day()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);

    // Nothing was written: S000 keeps its flag, S001 stays unflagged
    assert_eq!(client.call_count(MockOp::Update), 0);
    assert_eq!(client.call_count(MockOp::Add), adds);
    let flags: Vec<(String, bool)> = client
        .items()
        .iter()
        .map(|item| (item["StaffId"].as_str().unwrap().to_string(), item["IsFinalized"] == true))
        .collect();
    assert_eq!(flags, vec![("S000".to_string(), true), ("S001".to_string(), false)]);
}

#[tokio::test]
async fn unfinalize_twice_is_harmless() {
    let store: Arc<dyn AttendanceStore> = Arc::new(MemoryStore::new());
    seeded(&store).await;
    finalize_day(&store, day(), "manager").await.unwrap();

    unfinalize_day(&store, day()).await.unwrap();
    unfinalize_day(&store, day()).await.unwrap();

    let records = store.list_by_date(day()).await.unwrap();
    assert!(finalized_ids(&records).is_empty());
    assert!(records.iter().all(|r| r.finalized_at.is_none() && r.finalized_by.is_none()));
}

#[tokio::test]
async fn finalize_on_legacy_list_falls_back_to_narrow_schema() {
    let client = Arc::new(MockListClient::legacy());
    let store = remote(&client);
    seeded(&store).await;

    finalize_day(&store, day(), "manager").await.unwrap();

    // The flag lands; the audit columns do not exist on this list
    let records = store.list_by_date(day()).await.unwrap();
    assert_eq!(finalized_ids(&records), vec!["S001".to_string()]);
    assert!(records.iter().all(|r| r.finalized_by.is_none()));
    assert!(is_day_finalized(&store, day()).await.unwrap());
}

#[tokio::test]
async fn list_migrated_mid_session_picks_up_audit_fields() {
    let client = Arc::new(MockListClient::legacy());
    let store = remote(&client);
    seeded(&store).await;

    client.set_legacy_schema(false);
    finalize_day(&store, day(), "manager").await.unwrap();

    let rep = store.get_by_key("2025-04-01#S001").await.unwrap().unwrap();
    assert!(rep.is_finalized);
    assert_eq!(rep.finalized_by.as_deref(), Some("manager"));
}

#[tokio::test]
async fn bulk_then_rows_reflect_store() {
    let store: Arc<dyn AttendanceStore> = Arc::new(MemoryStore::new());
    store
        .upsert(&AttendanceRecord::new("S003", day(), AttendanceStatus::OnDuty).with_note("早番"))
        .await
        .unwrap();

    let edit = BulkEdit::new(["S002", "S003"], AttendanceStatus::Absent);
    let report = apply_bulk(&store, day(), &edit).await.unwrap();
    assert_eq!(report.summary.written, 2);
    report.into_result().unwrap();

    let roster = vec![
        StaffMember::new("S001", "Sato"),
        StaffMember::new("S002", "Suzuki"),
        StaffMember::new("S003", "Takahashi"),
    ];
    let records = store.list_by_date(day()).await.unwrap();
    let rows = build_staff_attendance_rows(&roster, &records);

    let ids: Vec<&str> = rows.iter().map(|r| r.staff_id.as_str()).collect();
    assert_eq!(ids, vec!["S001", "S002", "S003"]);
    let s3 = rows[2].record.as_ref().unwrap();
    assert_eq!(s3.status, AttendanceStatus::Absent);
    assert_eq!(s3.note.as_deref(), Some("早番"));
}

#[tokio::test]
async fn board_over_remote_store_surfaces_conflict() {
    let client = Arc::new(MockListClient::new());
    let store = remote(&client);
    seeded(&store).await;

    let board = AttendanceBoard::new(store, day(), true);
    board.reload().await;
    assert_eq!(board.items().await.len(), 3);

    client.fail_next(MockOp::Update, carelog_store::ListError::http(412, "etag mismatch"));
    let mut record = board.items().await.remove(0);
    record.status = AttendanceStatus::OnDuty;
    let err = board.upsert_one(&record).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(board.error().await.unwrap().kind, ErrorKind::Conflict);

    // A later write that lands clears the error via reload
    assert_eq!(board.upsert_one(&record).await.unwrap(), WriteOutcome::Saved);
    assert!(board.error().await.is_none());
    assert!(!board.is_read_only().await);
}
