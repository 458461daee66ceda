//! Record types: POC values and completion-date ledger rows.
//!
//! Completion-date rows are immutable once written; a change of completion
//! date is always a new row. POC records are updated in place while active and
//! soft-deleted (never removed) when a completion date change invalidates them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  key::ProjectPhaseKey,
  lifecycle::RecordStatus,
  period::{Period, RecognitionType},
};

// ─── POC values ──────────────────────────────────────────────────────────────

/// A percentage-of-completion value for one key and calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PocRecord {
  pub record_id:   Uuid,
  pub key:         ProjectPhaseKey,
  pub period:      Period,
  pub value:       f64,
  /// Derived from the cutoff date at the last write; never set directly.
  #[serde(rename = "type")]
  pub recognition: RecognitionType,
  pub created_at:  DateTime<Utc>,
  pub created_by:  String,
  pub updated_at:  DateTime<Utc>,
  pub updated_by:  String,
  pub status:      RecordStatus,
}

impl PocRecord {
  pub fn is_active(&self) -> bool { self.status.is_active() }
}

/// A typed POC row handed over by the ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PocInput {
  #[serde(flatten)]
  pub key:   ProjectPhaseKey,
  pub year:  i32,
  pub month: u32,
  pub value: f64,
}

/// A validated, classified POC write passed from the engine to the store.
#[derive(Debug, Clone)]
pub struct PocWrite {
  pub key:         ProjectPhaseKey,
  pub period:      Period,
  pub value:       f64,
  pub recognition: RecognitionType,
}

// ─── Completion-date ledger ──────────────────────────────────────────────────

/// One immutable assertion of a completion date for a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionDateRecord {
  pub record_id:       Uuid,
  pub key:             ProjectPhaseKey,
  #[serde(rename = "type")]
  pub completion_type: RecognitionType,
  pub completion_date: NaiveDate,
  /// Server-assigned; decides which row is effective.
  pub created_at:      DateTime<Utc>,
  pub created_by:      String,
}

/// A proposed completion date, as produced by ingestion or direct entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompletionDate {
  #[serde(flatten)]
  pub key:             ProjectPhaseKey,
  #[serde(rename = "type")]
  pub completion_type: RecognitionType,
  pub completion_date: NaiveDate,
}

/// The currently authoritative completion date for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveCompletion {
  #[serde(rename = "type")]
  pub completion_type: RecognitionType,
  pub completion_date: NaiveDate,
}

impl EffectiveCompletion {
  /// Pick the effective date from a key's ledger rows, given in insertion
  /// order. The newest row per type wins (later rows win `created_at` ties);
  /// an Actual date takes precedence over a Projected one.
  pub fn select<'a>(
    history: impl IntoIterator<Item = &'a CompletionDateRecord>,
  ) -> Option<Self> {
    let mut actual: Option<&CompletionDateRecord> = None;
    let mut projected: Option<&CompletionDateRecord> = None;

    for row in history {
      let slot = match row.completion_type {
        RecognitionType::Actual => &mut actual,
        RecognitionType::Projected => &mut projected,
      };
      if slot.is_none_or(|current| row.created_at >= current.created_at) {
        *slot = Some(row);
      }
    }

    actual.or(projected).map(|row| Self {
      completion_type: row.completion_type,
      completion_date: row.completion_date,
    })
  }
}
