//! Lifecycle of POC records and the artefacts a completion-date change
//! produces: conflicts, soft deletes, and pending redistributions.
//!
//! A POC record is `Active` from its first upsert until a completion-date
//! commit deactivates it. Deactivation is terminal; the row stays queryable
//! with its deletion metadata.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{
  key::ProjectPhaseKey,
  period::{Period, RecognitionType},
  record::{CompletionDateRecord, EffectiveCompletion, PocRecord},
};

// ─── Record status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
  Active,
  Deleted {
    at:     DateTime<Utc>,
    by:     String,
    reason: String,
  },
}

impl RecordStatus {
  pub fn is_active(&self) -> bool { matches!(self, Self::Active) }
}

// ─── Conflicts ───────────────────────────────────────────────────────────────

/// An active POC record that a proposed completion date would invalidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingRecord {
  pub record_id:   Uuid,
  pub year:        i32,
  pub month:       u32,
  pub value:       f64,
  #[serde(rename = "type")]
  pub recognition: RecognitionType,
}

impl ConflictingRecord {
  pub fn period(&self) -> Period {
    Period {
      year:  self.year,
      month: self.month,
    }
  }
}

impl From<&PocRecord> for ConflictingRecord {
  fn from(r: &PocRecord) -> Self {
    Self {
      record_id:   r.record_id,
      year:        r.period.year,
      month:       r.period.month,
      value:       r.value,
      recognition: r.recognition,
    }
  }
}

/// All records of one key that the proposed completion dates would
/// invalidate, with a sentence suitable for a confirmation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictDescriptor {
  pub key:            ProjectPhaseKey,
  pub description:    String,
  pub new_completion: EffectiveCompletion,
  pub records:        Vec<ConflictingRecord>,
}

// ─── Redistribution ──────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RedistributionStatus {
  PendingManualEntry,
  Resolved,
}

/// Percentage mass left without a destination period after a key's effective
/// completion date moved earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRedistribution {
  pub redistribution_id:   Uuid,
  pub key:                 ProjectPhaseKey,
  pub orphaned_total:      f64,
  pub new_completion_date: NaiveDate,
  pub old_completion_date: NaiveDate,
  pub created_at:          DateTime<Utc>,
  pub created_by:          String,
  pub status:              RedistributionStatus,
  pub resolved_at:         Option<DateTime<Utc>>,
  pub resolved_by:         Option<String>,
}

impl PendingRedistribution {
  pub fn is_pending(&self) -> bool {
    self.status == RedistributionStatus::PendingManualEntry
  }
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// What the reporting query returns for a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PocReport {
  Records { records: Vec<PocRecord> },
  /// The key's data is known-incomplete until someone re-enters POC values
  /// consistent with the new completion date.
  RedistributionPending { pending: Vec<PendingRedistribution> },
}

// ─── Commit outcome ──────────────────────────────────────────────────────────

/// What a completion-date commit did to one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBreakdown {
  pub key:             ProjectPhaseKey,
  pub inserted:        Vec<CompletionDateRecord>,
  pub deactivated:     Vec<ConflictingRecord>,
  pub previous:        Option<EffectiveCompletion>,
  pub effective:       Option<EffectiveCompletion>,
  pub redistributions: Vec<PendingRedistribution>,
}

impl KeyBreakdown {
  pub fn new(key: ProjectPhaseKey, previous: Option<EffectiveCompletion>) -> Self {
    Self {
      key,
      inserted: Vec::new(),
      deactivated: Vec::new(),
      previous,
      effective: previous,
      redistributions: Vec::new(),
    }
  }
}

/// Result of an atomic completion-date commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitOutcome {
  pub inserted_count:    usize,
  pub deactivated_count: usize,
  pub per_key:           Vec<KeyBreakdown>,
}

impl CommitOutcome {
  pub fn from_breakdown(per_key: Vec<KeyBreakdown>) -> Self {
    Self {
      inserted_count: per_key.iter().map(|k| k.inserted.len()).sum(),
      deactivated_count: per_key.iter().map(|k| k.deactivated.len()).sum(),
      per_key,
    }
  }

  /// Conflict descriptors equivalent to what this commit deactivated.
  pub fn conflicts(&self) -> Vec<ConflictDescriptor> {
    self
      .per_key
      .iter()
      .filter(|k| !k.deactivated.is_empty())
      .filter_map(|k| {
        let new_completion = k.effective?;
        Some(ConflictDescriptor {
          key: k.key.clone(),
          description: describe_conflict(&k.key, &new_completion, &k.deactivated),
          new_completion,
          records: k.deactivated.clone(),
        })
      })
      .collect()
  }
}

/// Human-readable summary used in confirmation prompts.
pub fn describe_conflict(
  key: &ProjectPhaseKey,
  completion: &EffectiveCompletion,
  records: &[ConflictingRecord],
) -> String {
  let periods = records
    .iter()
    .map(|r| format!("{} ({}%)", r.period(), r.value))
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "{key}: {} completion date {} would leave {} POC record(s) after completion: {periods}",
    completion.completion_type,
    completion.completion_date,
    records.len(),
  )
}

/// Reason stored on a soft-deleted record.
pub fn deletion_reason(
  key: &ProjectPhaseKey,
  completion: &EffectiveCompletion,
  period: Period,
) -> String {
  format!(
    "{key}: {} completion date changed to {}; period {period} falls after it",
    completion.completion_type, completion.completion_date,
  )
}
