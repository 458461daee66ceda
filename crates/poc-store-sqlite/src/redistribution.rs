//! Pending redistribution queries.

use chrono::{DateTime, NaiveDate, Utc};
use poc_core::{
  key::ProjectPhaseKey,
  lifecycle::{PendingRedistribution, RedistributionStatus},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{REDISTRIBUTION_COLUMNS, RawRedistribution, encode_date, encode_dt, encode_uuid},
};

pub fn insert(
  conn: &Connection,
  key: &ProjectPhaseKey,
  orphaned_total: f64,
  new_completion_date: NaiveDate,
  old_completion_date: NaiveDate,
  actor: &str,
  now: DateTime<Utc>,
) -> Result<PendingRedistribution> {
  let entry = PendingRedistribution {
    redistribution_id: Uuid::new_v4(),
    key: key.clone(),
    orphaned_total,
    new_completion_date,
    old_completion_date,
    created_at: now,
    created_by: actor.to_owned(),
    status: RedistributionStatus::PendingManualEntry,
    resolved_at: None,
    resolved_by: None,
  };

  let status: &'static str = entry.status.into();
  conn.execute(
    "INSERT INTO pending_redistributions (
       redistribution_id, company, project, phase, orphaned_total,
       new_completion_date, old_completion_date, created_at, created_by, status
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      encode_uuid(entry.redistribution_id),
      key.company,
      key.project,
      key.phase,
      orphaned_total,
      encode_date(new_completion_date),
      encode_date(old_completion_date),
      encode_dt(now),
      actor,
      status,
    ],
  )?;

  Ok(entry)
}

/// Unresolved entries, oldest first, optionally for one key.
pub fn pending(
  conn: &Connection,
  key: Option<&ProjectPhaseKey>,
) -> Result<Vec<PendingRedistribution>> {
  let raws = match key {
    Some(key) => {
      let sql = format!(
        "SELECT {REDISTRIBUTION_COLUMNS} FROM pending_redistributions
         WHERE status = 'pending_manual_entry'
           AND company = ?1 AND project = ?2 AND phase = ?3
         ORDER BY created_at, rowid"
      );
      let mut stmt = conn.prepare(&sql)?;
      stmt
        .query_map(
          rusqlite::params![key.company, key.project, key.phase],
          RawRedistribution::from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?
    }
    None => {
      let sql = format!(
        "SELECT {REDISTRIBUTION_COLUMNS} FROM pending_redistributions
         WHERE status = 'pending_manual_entry'
         ORDER BY company, project, phase, created_at, rowid"
      );
      let mut stmt = conn.prepare(&sql)?;
      stmt
        .query_map([], RawRedistribution::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?
    }
  };

  raws.into_iter().map(RawRedistribution::into_redistribution).collect()
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<PendingRedistribution>> {
  let sql = format!(
    "SELECT {REDISTRIBUTION_COLUMNS} FROM pending_redistributions
     WHERE redistribution_id = ?1"
  );
  let raw = conn
    .query_row(&sql, rusqlite::params![encode_uuid(id)], RawRedistribution::from_row)
    .optional()?;
  raw.map(RawRedistribution::into_redistribution).transpose()
}

/// Flip a pending entry to `resolved`. Resolution is one-way.
pub fn resolve(
  conn: &Connection,
  id: Uuid,
  actor: &str,
  now: DateTime<Utc>,
) -> Result<PendingRedistribution> {
  let current = get(conn, id)?.ok_or(Error::RedistributionNotFound(id))?;
  if !current.is_pending() {
    return Err(Error::AlreadyResolved(id));
  }

  let status: &'static str = RedistributionStatus::Resolved.into();
  conn.execute(
    "UPDATE pending_redistributions
     SET status = ?2, resolved_at = ?3, resolved_by = ?4
     WHERE redistribution_id = ?1",
    rusqlite::params![encode_uuid(id), status, encode_dt(now), actor],
  )?;

  get(conn, id)?.ok_or(Error::RedistributionNotFound(id))
}
