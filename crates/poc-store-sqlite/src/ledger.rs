//! Completion-date ledger queries and the conflict planner.
//!
//! Everything here runs synchronously on a connection (or an open
//! transaction, which derefs to one) inside a `tokio_rusqlite` call.

use chrono::{DateTime, Utc};
use poc_core::{
  key::ProjectPhaseKey,
  lifecycle::{ConflictingRecord, KeyBreakdown, deletion_reason},
  record::{CompletionDateRecord, EffectiveCompletion, NewCompletionDate},
  rules,
};
use rusqlite::Connection;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{COMPLETION_COLUMNS, RawCompletionDate, encode_date, encode_dt, encode_uuid},
  poc, redistribution,
};

/// Ledger rows for `key`, oldest first unless `newest_first`.
pub fn history(
  conn: &Connection,
  key: &ProjectPhaseKey,
  newest_first: bool,
) -> Result<Vec<CompletionDateRecord>> {
  let order = if newest_first { "DESC" } else { "ASC" };
  let sql = format!(
    "SELECT {COMPLETION_COLUMNS} FROM completion_dates
     WHERE company = ?1 AND project = ?2 AND phase = ?3
     ORDER BY created_at {order}, rowid {order}"
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(
      rusqlite::params![key.company, key.project, key.phase],
      RawCompletionDate::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws.into_iter().map(RawCompletionDate::into_record).collect()
}

pub fn effective(
  conn: &Connection,
  key: &ProjectPhaseKey,
) -> Result<Option<EffectiveCompletion>> {
  Ok(EffectiveCompletion::select(&history(conn, key, false)?))
}

pub fn insert(
  conn: &Connection,
  entry: &NewCompletionDate,
  actor: &str,
  now: DateTime<Utc>,
) -> Result<CompletionDateRecord> {
  let record = CompletionDateRecord {
    record_id:       Uuid::new_v4(),
    key:             entry.key.clone(),
    completion_type: entry.completion_type,
    completion_date: entry.completion_date,
    created_at:      now,
    created_by:      actor.to_owned(),
  };

  conn.execute(
    "INSERT INTO completion_dates (
       record_id, company, project, phase,
       completion_type, completion_date, created_at, created_by
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    rusqlite::params![
      encode_uuid(record.record_id),
      record.key.company,
      record.key.project,
      record.key.phase,
      record.completion_type.as_str(),
      encode_date(record.completion_date),
      encode_dt(record.created_at),
      record.created_by,
    ],
  )?;

  Ok(record)
}

/// Apply `entries` in input order: append each ledger row, soft-delete the
/// active records the new effective date invalidates, and record orphaned
/// mass when the date moved earlier. Later entries see earlier ones.
///
/// The caller owns the transaction. Committing it persists the plan; dropping
/// it turns the same work into a dry run.
pub fn apply_entries(
  conn: &Connection,
  entries: &[NewCompletionDate],
  actor: &str,
  now: DateTime<Utc>,
) -> Result<Vec<KeyBreakdown>> {
  let mut per_key: Vec<KeyBreakdown> = Vec::new();

  for entry in entries {
    let previous = effective(conn, &entry.key)?;
    let row = insert(conn, entry, actor, now)?;
    let next = effective(conn, &entry.key)?.ok_or_else(|| {
      Error::Core(poc_core::Error::Storage(format!(
        "completion date for {} not visible after insert",
        entry.key
      )))
    })?;

    let conflicting: Vec<ConflictingRecord> = poc::active_for_key(conn, &entry.key)?
      .iter()
      .filter(|r| rules::conflicts_with(r.period, r.value, previous.as_ref(), &next))
      .map(ConflictingRecord::from)
      .collect();

    for record in &conflicting {
      let reason = deletion_reason(&entry.key, &next, record.period());
      poc::deactivate(conn, record.record_id, actor, now, &reason)?;
    }

    let slot = match per_key.iter().position(|k| k.key == entry.key) {
      Some(i) => i,
      None => {
        per_key.push(KeyBreakdown::new(entry.key.clone(), previous));
        per_key.len() - 1
      }
    };
    let breakdown = &mut per_key[slot];

    if let Some((new_date, old_date)) = rules::moved_earlier(previous, Some(next)) {
      let orphaned: Vec<&ConflictingRecord> =
        rules::orphaned(&conflicting, new_date, old_date).collect();
      if !orphaned.is_empty() {
        let total = orphaned.iter().map(|r| r.value).sum();
        let pending = redistribution::insert(
          conn, &entry.key, total, new_date, old_date, actor, now,
        )?;
        breakdown.redistributions.push(pending);
      }
    }

    breakdown.inserted.push(row);
    breakdown.deactivated.extend(conflicting);
    breakdown.effective = Some(next);
  }

  Ok(per_key)
}
