//! Integration tests for `SqliteStore` behind the engine, against an
//! in-memory database.

use std::sync::Arc;

use chrono::NaiveDate;
use poc_core::{
  Engine, ErrorKind, ProjectPhaseKey, RecognitionType,
  lifecycle::{PocReport, RedistributionStatus},
  record::{EffectiveCompletion, NewCompletionDate, PocInput},
};
use uuid::Uuid;

use crate::SqliteStore;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn key() -> ProjectPhaseKey { ProjectPhaseKey::new("ACME", "Tower", "P1") }

fn cutoff() -> NaiveDate { d(2025, 3, 31) }

async fn engine() -> Engine<SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  store.register_key(key()).await.unwrap();
  Engine::new(Arc::new(store)).with_today(d(2025, 4, 15))
}

fn entry(kind: RecognitionType, date: NaiveDate) -> NewCompletionDate {
  NewCompletionDate {
    key:             key(),
    completion_type: kind,
    completion_date: date,
  }
}

/// Projected completion at 2025-06-30 with 2025-04 = 50 and 2025-05 = 100.
async fn seeded() -> Engine<SqliteStore> {
  let e = engine().await;
  e.append_completion_date(key(), RecognitionType::Projected, d(2025, 6, 30), "alice")
    .await
    .unwrap();
  e.upsert_poc(key(), 2025, 4, 50.0, cutoff(), "alice").await.unwrap();
  e.upsert_poc(key(), 2025, 5, 100.0, cutoff(), "alice").await.unwrap();
  e
}

// ─── Completion ledger ───────────────────────────────────────────────────────

#[tokio::test]
async fn effective_date_is_none_without_history() {
  let e = engine().await;
  assert_eq!(e.get_effective_completion_date(&key()).await.unwrap(), None);
  assert!(e.completion_history(&key()).await.unwrap().is_empty());
}

#[tokio::test]
async fn latest_entry_of_a_type_wins() {
  let e = engine().await;
  e.append_completion_date(key(), RecognitionType::Projected, d(2025, 6, 30), "alice")
    .await
    .unwrap();
  e.append_completion_date(key(), RecognitionType::Projected, d(2025, 9, 30), "bob")
    .await
    .unwrap();

  let effective = e.get_effective_completion_date(&key()).await.unwrap();
  assert_eq!(
    effective,
    Some(EffectiveCompletion {
      completion_type: RecognitionType::Projected,
      completion_date: d(2025, 9, 30),
    })
  );

  let history = e.completion_history(&key()).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].completion_date, d(2025, 9, 30), "newest first");
  assert_eq!(history[0].created_by, "bob");
}

#[tokio::test]
async fn actual_takes_precedence_over_later_projected() {
  let e = engine().await;
  e.append_completion_date(key(), RecognitionType::Actual, d(2025, 3, 31), "alice")
    .await
    .unwrap();
  e.append_completion_date(key(), RecognitionType::Projected, d(2025, 12, 31), "bob")
    .await
    .unwrap();

  let effective = e.get_effective_completion_date(&key()).await.unwrap().unwrap();
  assert_eq!(effective.completion_type, RecognitionType::Actual);
  assert_eq!(effective.completion_date, d(2025, 3, 31));
}

#[tokio::test]
async fn append_rejects_non_month_end_and_temporal_violations() {
  let e = engine().await;

  let err = e
    .append_completion_date(key(), RecognitionType::Actual, d(2025, 3, 30), "alice")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  let err = e
    .append_completion_date(key(), RecognitionType::Actual, d(2025, 6, 30), "alice")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  let err = e
    .append_completion_date(key(), RecognitionType::Projected, d(2025, 3, 31), "alice")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  assert!(e.completion_history(&key()).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_key_is_a_reference_error() {
  let e = engine().await;
  let stranger = ProjectPhaseKey::new("ACME", "Nowhere", "");

  let err = e
    .append_completion_date(stranger.clone(), RecognitionType::Actual, d(2025, 3, 31), "alice")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Reference);

  let err = e
    .upsert_poc(stranger, 2025, 3, 10.0, cutoff(), "alice")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Reference);
}

#[tokio::test]
async fn single_append_is_refused_when_it_would_invalidate_records() {
  let e = seeded().await;

  let err = e
    .append_completion_date(key(), RecognitionType::Actual, d(2025, 3, 31), "bob")
    .await
    .unwrap_err();
  match err {
    poc_core::Error::Conflict { current, .. } => {
      assert_eq!(current.len(), 1);
      assert_eq!(current[0].records.len(), 2);
    }
    other => panic!("expected conflict, got {other:?}"),
  }

  // Nothing was written.
  assert_eq!(e.completion_history(&key()).await.unwrap().len(), 1);
  assert_eq!(e.list_poc(&key(), false).await.unwrap().len(), 2);
  assert!(e.pending_redistributions(None).await.unwrap().is_empty());
}

// ─── POC values ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_completion_after_actual_date_is_rejected() {
  let e = engine().await;
  e.append_completion_date(key(), RecognitionType::Actual, d(2025, 3, 31), "alice")
    .await
    .unwrap();

  let err = e
    .upsert_poc(key(), 2025, 4, 100.0, cutoff(), "alice")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);
  assert!(e.list_poc(&key(), true).await.unwrap().is_empty());
}

#[tokio::test]
async fn upsert_without_completion_date_is_rejected() {
  let e = engine().await;
  let err = e
    .upsert_poc(key(), 2025, 6, 30.0, d(2025, 5, 31), "alice")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);
  assert!(err.to_string().contains("completion date first"));
}

#[tokio::test]
async fn upsert_classifies_against_cutoff() {
  let e = engine().await;
  e.append_completion_date(key(), RecognitionType::Projected, d(2025, 12, 31), "alice")
    .await
    .unwrap();

  let march = e.upsert_poc(key(), 2025, 3, 20.0, cutoff(), "alice").await.unwrap();
  let april = e.upsert_poc(key(), 2025, 4, 30.0, cutoff(), "alice").await.unwrap();
  assert_eq!(march.recognition, RecognitionType::Actual);
  assert_eq!(april.recognition, RecognitionType::Projected);
}

#[tokio::test]
async fn upsert_updates_the_active_record_in_place() {
  let e = seeded().await;

  let first = e.upsert_poc(key(), 2025, 4, 60.0, cutoff(), "bob").await.unwrap();
  let second = e.upsert_poc(key(), 2025, 4, 60.0, cutoff(), "bob").await.unwrap();
  assert_eq!(first.record_id, second.record_id);
  assert_eq!(second.value, 60.0);
  assert_eq!(second.created_by, "alice");
  assert_eq!(second.updated_by, "bob");

  let all = e.list_poc(&key(), true).await.unwrap();
  assert_eq!(all.len(), 2, "no duplicate rows for the same period");
}

#[tokio::test]
async fn upsert_accepts_mid_month_cutoff() {
  let e = seeded().await;

  let april = e
    .upsert_poc(key(), 2025, 4, 60.0, d(2025, 4, 15), "alice")
    .await
    .unwrap();
  assert_eq!(april.recognition, RecognitionType::Actual);

  let may = e
    .upsert_poc(key(), 2025, 5, 100.0, d(2025, 4, 15), "alice")
    .await
    .unwrap();
  assert_eq!(may.recognition, RecognitionType::Projected);
}

#[tokio::test]
async fn upsert_rejects_out_of_range_values() {
  let e = seeded().await;

  let err = e
    .upsert_poc(key(), 2025, 4, 100.5, cutoff(), "alice")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  let err = e
    .upsert_poc(key(), 2025, 13, 10.0, cutoff(), "alice")
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn batch_reports_row_errors_and_applies_good_rows_in_order() {
  let e = seeded().await;
  let rows = vec![
    PocInput { key: key(), year: 2025, month: 6, value: 40.0 },
    PocInput { key: key(), year: 2025, month: 13, value: 10.0 },
    PocInput {
      key:   ProjectPhaseKey::new("ACME", "Nowhere", ""),
      year:  2025,
      month: 6,
      value: 10.0,
    },
    PocInput { key: key(), year: 2025, month: 7, value: 100.0 },
    PocInput { key: key(), year: 2025, month: 6, value: 45.0 },
  ];

  let report = e.upsert_poc_batch(rows, cutoff(), "carol").await.unwrap();
  assert_eq!(report.processed_count, 5);
  assert_eq!(report.succeeded_count, 2);

  let kinds: Vec<(usize, ErrorKind)> =
    report.errors.iter().map(|e| (e.index, e.kind)).collect();
  assert_eq!(
    kinds,
    vec![
      (1, ErrorKind::Validation),
      (2, ErrorKind::Reference),
      (3, ErrorKind::Precondition),
    ]
  );

  // Row 4 saw row 0 and updated it.
  assert_eq!(report.items[0].record_id, report.items[1].record_id);
  let june: Vec<_> = e
    .list_poc(&key(), true)
    .await
    .unwrap()
    .into_iter()
    .filter(|r| r.period.month == 6)
    .collect();
  assert_eq!(june.len(), 1);
  assert_eq!(june[0].value, 45.0);
}

// ─── Conflict detection and resolution ───────────────────────────────────────

#[tokio::test]
async fn moving_the_date_earlier_deactivates_and_queues_redistribution() {
  let e = seeded().await;
  let proposed = vec![entry(RecognitionType::Actual, d(2025, 3, 31))];

  let check = e.check_conflicts(proposed.clone()).await.unwrap();
  assert!(check.errors.is_empty());
  assert_eq!(check.conflicts.len(), 1);
  let descriptor = &check.conflicts[0];
  assert_eq!(descriptor.key, key());
  let mut months: Vec<u32> = descriptor.records.iter().map(|r| r.month).collect();
  months.sort_unstable();
  assert_eq!(months, vec![4, 5]);

  let report = e
    .resolve_and_commit(proposed, check.conflicts, "bob")
    .await
    .unwrap();
  assert_eq!(report.succeeded_count, 1);
  assert_eq!(report.outcome.inserted_count, 1);
  assert_eq!(report.outcome.deactivated_count, 2);

  let effective = e.get_effective_completion_date(&key()).await.unwrap().unwrap();
  assert_eq!(effective.completion_type, RecognitionType::Actual);
  assert_eq!(effective.completion_date, d(2025, 3, 31));

  assert!(e.list_poc(&key(), false).await.unwrap().is_empty());

  let pending = e.pending_redistributions(Some(key())).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].orphaned_total, 150.0);
  assert_eq!(pending[0].new_completion_date, d(2025, 3, 31));
  assert_eq!(pending[0].old_completion_date, d(2025, 6, 30));
  assert_eq!(pending[0].created_by, "bob");
}

#[tokio::test]
async fn check_conflicts_writes_nothing() {
  let e = seeded().await;
  let proposed = vec![entry(RecognitionType::Actual, d(2025, 3, 31))];

  let first = e.check_conflicts(proposed.clone()).await.unwrap();
  let second = e.check_conflicts(proposed).await.unwrap();

  let ids = |c: &poc_core::report::ConflictCheck| -> Vec<Uuid> {
    c.conflicts.iter().flat_map(|desc| desc.records.iter().map(|r| r.record_id)).collect()
  };
  assert_eq!(ids(&first), ids(&second));
  assert_eq!(e.completion_history(&key()).await.unwrap().len(), 1);
  assert_eq!(e.list_poc(&key(), false).await.unwrap().len(), 2);
  assert!(e.pending_redistributions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_confirmation_is_rejected_with_no_partial_effect() {
  let e = seeded().await;
  let proposed = vec![entry(RecognitionType::Actual, d(2025, 3, 31))];
  let check = e.check_conflicts(proposed.clone()).await.unwrap();

  // Another writer adds a record the caller never confirmed.
  e.upsert_poc(key(), 2025, 6, 20.0, cutoff(), "mallory").await.unwrap();

  let err = e
    .resolve_and_commit(proposed, check.conflicts, "bob")
    .await
    .unwrap_err();
  match err {
    poc_core::Error::Conflict { current, .. } => {
      assert_eq!(current.len(), 1);
      assert_eq!(current[0].records.len(), 3);
    }
    other => panic!("expected conflict, got {other:?}"),
  }

  assert_eq!(e.completion_history(&key()).await.unwrap().len(), 1);
  assert_eq!(e.list_poc(&key(), false).await.unwrap().len(), 3);
  assert!(e.pending_redistributions(None).await.unwrap().is_empty());
  let effective = e.get_effective_completion_date(&key()).await.unwrap().unwrap();
  assert_eq!(effective.completion_date, d(2025, 6, 30));
}

#[tokio::test]
async fn moving_the_date_later_commits_without_confirmation() {
  let e = seeded().await;
  let proposed = vec![entry(RecognitionType::Projected, d(2025, 9, 30))];

  let check = e.check_conflicts(proposed.clone()).await.unwrap();
  assert!(check.conflicts.is_empty());

  let report = e.resolve_and_commit(proposed, Vec::new(), "bob").await.unwrap();
  assert_eq!(report.outcome.deactivated_count, 0);
  assert!(report.outcome.per_key[0].redistributions.is_empty());
  assert_eq!(e.list_poc(&key(), false).await.unwrap().len(), 2);
}

#[tokio::test]
async fn commit_reports_invalid_entries_and_applies_the_rest() {
  let e = seeded().await;
  let proposed = vec![
    entry(RecognitionType::Projected, d(2025, 9, 15)),
    entry(RecognitionType::Projected, d(2025, 9, 30)),
    NewCompletionDate {
      key:             ProjectPhaseKey::new("ACME", "Nowhere", ""),
      completion_type: RecognitionType::Projected,
      completion_date: d(2025, 9, 30),
    },
  ];

  let report = e.resolve_and_commit(proposed, Vec::new(), "bob").await.unwrap();
  assert_eq!(report.processed_count, 3);
  assert_eq!(report.succeeded_count, 1);
  let kinds: Vec<(usize, ErrorKind)> =
    report.errors.iter().map(|e| (e.index, e.kind)).collect();
  assert_eq!(kinds, vec![(0, ErrorKind::Validation), (2, ErrorKind::Reference)]);

  let effective = e.get_effective_completion_date(&key()).await.unwrap().unwrap();
  assert_eq!(effective.completion_date, d(2025, 9, 30));
}

#[tokio::test]
async fn later_entries_in_a_batch_see_earlier_ones() {
  let e = seeded().await;
  let proposed = vec![
    entry(RecognitionType::Projected, d(2025, 9, 30)),
    entry(RecognitionType::Projected, d(2025, 4, 30)),
  ];

  let check = e.check_conflicts(proposed.clone()).await.unwrap();
  assert_eq!(check.conflicts.len(), 1);
  let months: Vec<u32> = check.conflicts[0].records.iter().map(|r| r.month).collect();
  assert_eq!(months, vec![5]);

  let report = e.resolve_and_commit(proposed, check.conflicts, "bob").await.unwrap();
  assert_eq!(report.outcome.inserted_count, 2);
  let pending = &report.outcome.per_key[0].redistributions;
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].orphaned_total, 100.0);
  assert_eq!(pending[0].old_completion_date, d(2025, 9, 30));
}

#[tokio::test]
async fn deactivated_records_keep_their_audit_trail() {
  let e = seeded().await;
  let proposed = vec![entry(RecognitionType::Actual, d(2025, 3, 31))];
  let check = e.check_conflicts(proposed.clone()).await.unwrap();
  e.resolve_and_commit(proposed, check.conflicts, "bob").await.unwrap();

  let all = e.list_poc(&key(), true).await.unwrap();
  assert_eq!(all.len(), 2);
  for record in &all {
    match &record.status {
      poc_core::lifecycle::RecordStatus::Deleted { by, reason, .. } => {
        assert_eq!(by, "bob");
        assert!(reason.contains("2025-03-31"));
      }
      other => panic!("expected deleted record, got {other:?}"),
    }
    assert_eq!(record.created_by, "alice");
  }

  // A new value for the same period is a fresh row; the old one stays.
  e.upsert_poc(key(), 2025, 3, 100.0, cutoff(), "bob").await.unwrap();
  assert_eq!(e.list_poc(&key(), true).await.unwrap().len(), 3);
  assert_eq!(e.list_poc(&key(), false).await.unwrap().len(), 1);
}

/// Asserts no active 100% record sits after the effective completion month.
async fn assert_no_full_completion_after_effective(e: &Engine<SqliteStore>) {
  let active = e.list_poc(&key(), false).await.unwrap();
  let Some(effective) = e.get_effective_completion_date(&key()).await.unwrap() else {
    assert!(active.is_empty());
    return;
  };
  for record in active.iter().filter(|r| r.value == 100.0) {
    assert!(
      !record.period.is_after(effective.completion_date),
      "{} is 100% after {}",
      record.period,
      effective.completion_date
    );
  }
}

#[tokio::test]
async fn mixed_writes_never_leave_full_completion_after_effective_date() {
  enum Step {
    Upsert(i32, u32, f64),
    Commit(RecognitionType, NaiveDate),
  }
  use Step::*;

  let steps = [
    Upsert(2025, 4, 20.0),
    Commit(RecognitionType::Projected, d(2025, 9, 30)),
    Upsert(2025, 6, 60.0),
    Upsert(2025, 8, 100.0),
    Upsert(2025, 10, 100.0),
    Commit(RecognitionType::Projected, d(2025, 7, 31)),
    Upsert(2025, 7, 100.0),
    Upsert(2025, 8, 100.0),
    Commit(RecognitionType::Projected, d(2025, 12, 31)),
    Upsert(2025, 11, 100.0),
    Upsert(2025, 12, 100.0),
    Commit(RecognitionType::Actual, d(2025, 2, 28)),
    Upsert(2025, 2, 100.0),
    Upsert(2025, 3, 100.0),
    Commit(RecognitionType::Projected, d(2025, 11, 30)),
    Upsert(2025, 3, 100.0),
    Commit(RecognitionType::Actual, d(2025, 3, 31)),
    Upsert(2025, 3, 100.0),
    Upsert(2025, 4, 100.0),
    Upsert(2025, 1, 40.0),
  ];

  let e = engine().await;
  for step in steps {
    match step {
      Upsert(year, month, value) => {
        if let Err(err) = e.upsert_poc(key(), year, month, value, cutoff(), "alice").await {
          assert_eq!(err.kind(), ErrorKind::Precondition);
        }
      }
      Commit(kind, date) => {
        let proposed = vec![entry(kind, date)];
        let check = e.check_conflicts(proposed.clone()).await.unwrap();
        assert!(check.errors.is_empty());
        let report = e
          .resolve_and_commit(proposed, check.conflicts, "bob")
          .await
          .unwrap();
        assert_eq!(report.outcome.inserted_count, 1);
      }
    }
    assert_no_full_completion_after_effective(&e).await;
  }

  let effective = e.get_effective_completion_date(&key()).await.unwrap().unwrap();
  assert_eq!(effective.completion_date, d(2025, 3, 31));
  let full: Vec<_> = e
    .list_poc(&key(), false)
    .await
    .unwrap()
    .into_iter()
    .filter(|r| r.value == 100.0)
    .map(|r| (r.period.year, r.period.month))
    .collect();
  assert_eq!(full, vec![(2025, 2), (2025, 3)]);
}

// ─── Redistribution ──────────────────────────────────────────────────────────

#[tokio::test]
async fn report_is_blocked_until_redistribution_is_resolved() {
  let e = seeded().await;

  match e.poc_report(&key()).await.unwrap() {
    PocReport::Records { records } => assert_eq!(records.len(), 2),
    other => panic!("expected records, got {other:?}"),
  }

  let proposed = vec![entry(RecognitionType::Actual, d(2025, 3, 31))];
  let check = e.check_conflicts(proposed.clone()).await.unwrap();
  e.resolve_and_commit(proposed, check.conflicts, "bob").await.unwrap();

  let pending = match e.poc_report(&key()).await.unwrap() {
    PocReport::RedistributionPending { pending } => pending,
    other => panic!("expected pending redistribution, got {other:?}"),
  };
  let id = pending[0].redistribution_id;

  e.upsert_poc(key(), 2025, 3, 100.0, cutoff(), "bob").await.unwrap();
  let resolved = e.resolve_redistribution(id, "bob").await.unwrap();
  assert_eq!(resolved.status, RedistributionStatus::Resolved);
  assert_eq!(resolved.resolved_by.as_deref(), Some("bob"));
  assert!(resolved.resolved_at.is_some());

  match e.poc_report(&key()).await.unwrap() {
    PocReport::Records { records } => assert_eq!(records.len(), 1),
    other => panic!("expected records, got {other:?}"),
  }

  let err = e.resolve_redistribution(id, "bob").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);

  let err = e.resolve_redistribution(Uuid::new_v4(), "bob").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn closed_store_reports_storage_unavailable() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  store.register_key(key()).await.unwrap();
  let e = Engine::new(Arc::new(store.clone())).with_today(d(2025, 4, 15));

  store.close().await.unwrap();

  let err = e.get_effective_completion_date(&key()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn register_key_is_idempotent() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  assert!(store.register_key(key()).await.unwrap());
  assert!(!store.register_key(key()).await.unwrap());
}
