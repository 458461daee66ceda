//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that text ordering matches time ordering. Calendar dates are
//! `YYYY-MM-DD`. UUIDs are hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use poc_core::{
  key::ProjectPhaseKey,
  lifecycle::{PendingRedistribution, RecordStatus, RedistributionStatus},
  period::{Period, RecognitionType},
  record::{CompletionDateRecord, PocRecord},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn decode_recognition(s: &str) -> Result<RecognitionType> {
  s.parse()
    .map_err(|_| Error::DateParse(format!("unknown recognition type: {s:?}")))
}

pub fn decode_redistribution_status(s: &str) -> Result<RedistributionStatus> {
  s.parse()
    .map_err(|_| Error::DateParse(format!("unknown redistribution status: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const POC_COLUMNS: &str = "record_id, company, project, phase, year, month,
  value, recognition, active, created_at, created_by, updated_at, updated_by,
  deleted_at, deleted_by, deletion_reason";

/// Raw values read directly from a `poc_records` row.
pub struct RawPocRecord {
  pub record_id:       String,
  pub company:         String,
  pub project:         String,
  pub phase:           String,
  pub year:            i32,
  pub month:           u32,
  pub value:           f64,
  pub recognition:     String,
  pub active:          bool,
  pub created_at:      String,
  pub created_by:      String,
  pub updated_at:      String,
  pub updated_by:      String,
  pub deleted_at:      Option<String>,
  pub deleted_by:      Option<String>,
  pub deletion_reason: Option<String>,
}

impl RawPocRecord {
  /// Map a row selected with [`POC_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:       row.get(0)?,
      company:         row.get(1)?,
      project:         row.get(2)?,
      phase:           row.get(3)?,
      year:            row.get(4)?,
      month:           row.get(5)?,
      value:           row.get(6)?,
      recognition:     row.get(7)?,
      active:          row.get(8)?,
      created_at:      row.get(9)?,
      created_by:      row.get(10)?,
      updated_at:      row.get(11)?,
      updated_by:      row.get(12)?,
      deleted_at:      row.get(13)?,
      deleted_by:      row.get(14)?,
      deletion_reason: row.get(15)?,
    })
  }

  pub fn into_record(self) -> Result<PocRecord> {
    let status = if self.active {
      RecordStatus::Active
    } else {
      let at = self
        .deleted_at
        .as_deref()
        .ok_or_else(|| Error::DateParse("inactive record without deleted_at".into()))?;
      RecordStatus::Deleted {
        at:     decode_dt(at)?,
        by:     self.deleted_by.unwrap_or_default(),
        reason: self.deletion_reason.unwrap_or_default(),
      }
    };

    Ok(PocRecord {
      record_id: decode_uuid(&self.record_id)?,
      key: ProjectPhaseKey::new(self.company, self.project, self.phase),
      period: Period {
        year:  self.year,
        month: self.month,
      },
      value: self.value,
      recognition: decode_recognition(&self.recognition)?,
      created_at: decode_dt(&self.created_at)?,
      created_by: self.created_by,
      updated_at: decode_dt(&self.updated_at)?,
      updated_by: self.updated_by,
      status,
    })
  }
}

pub const COMPLETION_COLUMNS: &str = "record_id, company, project, phase,
  completion_type, completion_date, created_at, created_by";

/// Raw strings read directly from a `completion_dates` row.
pub struct RawCompletionDate {
  pub record_id:       String,
  pub company:         String,
  pub project:         String,
  pub phase:           String,
  pub completion_type: String,
  pub completion_date: String,
  pub created_at:      String,
  pub created_by:      String,
}

impl RawCompletionDate {
  /// Map a row selected with [`COMPLETION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:       row.get(0)?,
      company:         row.get(1)?,
      project:         row.get(2)?,
      phase:           row.get(3)?,
      completion_type: row.get(4)?,
      completion_date: row.get(5)?,
      created_at:      row.get(6)?,
      created_by:      row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<CompletionDateRecord> {
    Ok(CompletionDateRecord {
      record_id:       decode_uuid(&self.record_id)?,
      key:             ProjectPhaseKey::new(self.company, self.project, self.phase),
      completion_type: decode_recognition(&self.completion_type)?,
      completion_date: decode_date(&self.completion_date)?,
      created_at:      decode_dt(&self.created_at)?,
      created_by:      self.created_by,
    })
  }
}

pub const REDISTRIBUTION_COLUMNS: &str = "redistribution_id, company, project,
  phase, orphaned_total, new_completion_date, old_completion_date, created_at,
  created_by, status, resolved_at, resolved_by";

/// Raw values read directly from a `pending_redistributions` row.
pub struct RawRedistribution {
  pub redistribution_id:   String,
  pub company:             String,
  pub project:             String,
  pub phase:               String,
  pub orphaned_total:      f64,
  pub new_completion_date: String,
  pub old_completion_date: String,
  pub created_at:          String,
  pub created_by:          String,
  pub status:              String,
  pub resolved_at:         Option<String>,
  pub resolved_by:         Option<String>,
}

impl RawRedistribution {
  /// Map a row selected with [`REDISTRIBUTION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      redistribution_id:   row.get(0)?,
      company:             row.get(1)?,
      project:             row.get(2)?,
      phase:               row.get(3)?,
      orphaned_total:      row.get(4)?,
      new_completion_date: row.get(5)?,
      old_completion_date: row.get(6)?,
      created_at:          row.get(7)?,
      created_by:          row.get(8)?,
      status:              row.get(9)?,
      resolved_at:         row.get(10)?,
      resolved_by:         row.get(11)?,
    })
  }

  pub fn into_redistribution(self) -> Result<PendingRedistribution> {
    Ok(PendingRedistribution {
      redistribution_id:   decode_uuid(&self.redistribution_id)?,
      key:                 ProjectPhaseKey::new(self.company, self.project, self.phase),
      orphaned_total:      self.orphaned_total,
      new_completion_date: decode_date(&self.new_completion_date)?,
      old_completion_date: decode_date(&self.old_completion_date)?,
      created_at:          decode_dt(&self.created_at)?,
      created_by:          self.created_by,
      status:              decode_redistribution_status(&self.status)?,
      resolved_at:         self.resolved_at.as_deref().map(decode_dt).transpose()?,
      resolved_by:         self.resolved_by,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_sortable() {
    let a = Utc.with_ymd_and_hms(2025, 3, 31, 9, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn dates_roundtrip_and_reject_impossible_days() {
    let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    assert_eq!(encode_date(d), "2024-02-29");
    assert_eq!(decode_date("2024-02-29").unwrap(), d);
    assert!(decode_date("2023-02-29").is_err());
  }
}
