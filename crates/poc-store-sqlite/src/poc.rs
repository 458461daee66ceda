//! POC record queries and the single-row upsert.

use chrono::{DateTime, Utc};
use poc_core::{
  key::ProjectPhaseKey,
  period::Period,
  record::{PocRecord, PocWrite},
  rules,
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{POC_COLUMNS, RawPocRecord, encode_dt, encode_uuid},
  ledger,
};

fn query_records(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<PocRecord>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(params, RawPocRecord::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawPocRecord::into_record).collect()
}

/// Active records for `key`, ordered by period.
pub fn active_for_key(conn: &Connection, key: &ProjectPhaseKey) -> Result<Vec<PocRecord>> {
  list(conn, key, false)
}

pub fn list(
  conn: &Connection,
  key: &ProjectPhaseKey,
  include_inactive: bool,
) -> Result<Vec<PocRecord>> {
  let filter = if include_inactive { "" } else { "AND active = 1" };
  let sql = format!(
    "SELECT {POC_COLUMNS} FROM poc_records
     WHERE company = ?1 AND project = ?2 AND phase = ?3 {filter}
     ORDER BY year, month, active DESC, updated_at"
  );
  query_records(conn, &sql, rusqlite::params![key.company, key.project, key.phase])
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<PocRecord>> {
  let sql = format!("SELECT {POC_COLUMNS} FROM poc_records WHERE record_id = ?1");
  let raw = conn
    .query_row(&sql, rusqlite::params![encode_uuid(id)], RawPocRecord::from_row)
    .optional()?;
  raw.map(RawPocRecord::into_record).transpose()
}

fn active_id_at(
  conn: &Connection,
  key: &ProjectPhaseKey,
  period: Period,
) -> Result<Option<String>> {
  Ok(
    conn
      .query_row(
        "SELECT record_id FROM poc_records
         WHERE company = ?1 AND project = ?2 AND phase = ?3
           AND year = ?4 AND month = ?5 AND active = 1",
        rusqlite::params![key.company, key.project, key.phase, period.year, period.month],
        |r| r.get(0),
      )
      .optional()?,
  )
}

/// Soft-delete one active record. Deleted rows are never touched again.
pub fn deactivate(
  conn: &Connection,
  id: Uuid,
  actor: &str,
  now: DateTime<Utc>,
  reason: &str,
) -> Result<()> {
  conn.execute(
    "UPDATE poc_records
     SET active = 0, deleted_at = ?2, deleted_by = ?3, deletion_reason = ?4
     WHERE record_id = ?1 AND active = 1",
    rusqlite::params![encode_uuid(id), encode_dt(now), actor, reason],
  )?;
  Ok(())
}

/// Check the completion-date preconditions against current state, then
/// update the active record for the period in place or insert a new one.
pub fn upsert_one(
  conn: &Connection,
  write: &PocWrite,
  actor: &str,
  now: DateTime<Utc>,
) -> Result<PocRecord> {
  let effective = rules::require_completion(&write.key, ledger::effective(conn, &write.key)?)?;
  rules::check_full_completion(write.period, write.value, &effective)?;

  let now_str = encode_dt(now);
  let id_str = match active_id_at(conn, &write.key, write.period)? {
    Some(id_str) => {
      conn.execute(
        "UPDATE poc_records
         SET value = ?2, recognition = ?3, updated_at = ?4, updated_by = ?5
         WHERE record_id = ?1 AND active = 1",
        rusqlite::params![id_str, write.value, write.recognition.as_str(), now_str, actor],
      )?;
      id_str
    }
    None => {
      let id_str = encode_uuid(Uuid::new_v4());
      conn.execute(
        "INSERT INTO poc_records (
           record_id, company, project, phase, year, month, value, recognition,
           active, created_at, created_by, updated_at, updated_by
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?9, ?10)",
        rusqlite::params![
          id_str,
          write.key.company,
          write.key.project,
          write.key.phase,
          write.period.year,
          write.period.month,
          write.value,
          write.recognition.as_str(),
          now_str,
          actor,
        ],
      )?;
      id_str
    }
  };

  let id = Uuid::parse_str(&id_str)?;
  get(conn, id)?
    .ok_or_else(|| Error::Core(poc_core::Error::Storage(format!("POC record {id} vanished"))))
}
