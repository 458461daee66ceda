//! [`SqliteStore`]: the SQLite implementation of [`PocStore`] and
//! [`KeyRegistry`].

use std::{collections::BTreeSet, path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, Transaction, TransactionBehavior};
use uuid::Uuid;

use poc_core::{
  key::ProjectPhaseKey,
  lifecycle::{CommitOutcome, ConflictDescriptor, PendingRedistribution},
  record::{
    CompletionDateRecord, EffectiveCompletion, NewCompletionDate, PocRecord,
    PocWrite,
  },
  store::{KeyRegistry, PocStore},
};

use crate::{Error, Result, ledger, poc, redistribution, schema::SCHEMA};

/// Upper bound on how long a statement waits for another writer's lock
/// before failing with a concurrency error.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A POC store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT).await
  }

  pub async fn open_with_timeout(
    path: impl AsRef<Path>,
    busy_timeout: Duration,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema(busy_timeout).await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema(DEFAULT_BUSY_TIMEOUT).await?;
    Ok(store)
  }

  async fn init_schema(&self, busy_timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Shut the connection down. Clones of this store see `Storage` errors
  /// afterwards.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  /// Add `key` to the allow-list. Returns `false` if it was already present.
  pub async fn register_key(&self, key: ProjectPhaseKey) -> Result<bool> {
    self
      .write(move |tx, _now| {
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO project_phases (company, project, phase)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![key.company, key.project, key.phase],
        )?;
        Ok(inserted == 1)
      })
      .await
  }

  /// Run `f` on the connection without a transaction.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside a `BEGIN IMMEDIATE` transaction, committing only if it
  /// succeeds. Any error rolls the whole unit back.
  ///
  /// `f` receives the write timestamp, read once the write lock is held so
  /// stamps follow apply order.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Transaction<'_>, DateTime<Utc>) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&mut tx, Utc::now()) {
          Ok(value) => {
            tx.commit()?;
            Ok(Ok(value))
          }
          Err(e) => Ok(Err(e)),
        }
      })
      .await?
  }

  /// Like [`Self::write`] but always rolls back: a dry run.
  async fn dry_run<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Transaction<'_>, DateTime<Utc>) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&mut tx, Utc::now());
        tx.rollback()?;
        Ok(result)
      })
      .await?
  }
}

/// `(record id, value bits)` for every record named in `conflicts`.
fn conflict_set(conflicts: &[ConflictDescriptor]) -> BTreeSet<(Uuid, u64)> {
  conflicts
    .iter()
    .flat_map(|c| c.records.iter())
    .map(|r| (r.record_id, r.value.to_bits()))
    .collect()
}

// ─── KeyRegistry impl ────────────────────────────────────────────────────────

impl KeyRegistry for SqliteStore {
  type Error = Error;

  async fn key_exists<'a>(&'a self, key: &'a ProjectPhaseKey) -> Result<bool> {
    let key = key.clone();
    self
      .read(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM project_phases
               WHERE company = ?1 AND project = ?2 AND phase = ?3",
              rusqlite::params![key.company, key.project, key.phase],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await
  }
}

// ─── PocStore impl ───────────────────────────────────────────────────────────

impl PocStore for SqliteStore {
  type Error = Error;

  // ── Completion ledger ─────────────────────────────────────────────────────

  async fn append_completion_date(
    &self,
    entry: NewCompletionDate,
    actor: String,
  ) -> Result<CompletionDateRecord> {
    self
      .write(move |tx, now| {
        let per_key = ledger::apply_entries(tx, std::slice::from_ref(&entry), &actor, now)?;
        let outcome = CommitOutcome::from_breakdown(per_key);
        let conflicts = outcome.conflicts();
        if !conflicts.is_empty() {
          return Err(Error::Core(poc_core::Error::Conflict {
            message: format!(
              "completion date for {} invalidates active POC records; confirm them first",
              entry.key
            ),
            current: conflicts,
          }));
        }
        outcome
          .per_key
          .into_iter()
          .flat_map(|k| k.inserted)
          .next()
          .ok_or_else(|| {
            Error::Core(poc_core::Error::Storage("ledger insert produced no row".into()))
          })
      })
      .await
  }

  async fn completion_history(
    &self,
    key: ProjectPhaseKey,
  ) -> Result<Vec<CompletionDateRecord>> {
    self.read(move |conn| ledger::history(conn, &key, true)).await
  }

  async fn effective_completion(
    &self,
    key: ProjectPhaseKey,
  ) -> Result<Option<EffectiveCompletion>> {
    self.read(move |conn| ledger::effective(conn, &key)).await
  }

  // ── Conflicts ─────────────────────────────────────────────────────────────

  async fn find_conflicts(
    &self,
    entries: Vec<NewCompletionDate>,
  ) -> Result<Vec<ConflictDescriptor>> {
    self
      .dry_run(move |tx, now| {
        let per_key = ledger::apply_entries(tx, &entries, "dry-run", now)?;
        Ok(CommitOutcome::from_breakdown(per_key).conflicts())
      })
      .await
  }

  async fn commit_completion_dates(
    &self,
    entries: Vec<NewCompletionDate>,
    confirmed: Vec<ConflictDescriptor>,
    actor: String,
  ) -> Result<CommitOutcome> {
    self
      .write(move |tx, now| {
        let per_key = ledger::apply_entries(tx, &entries, &actor, now)?;
        let outcome = CommitOutcome::from_breakdown(per_key);
        let live = outcome.conflicts();

        if conflict_set(&live) != conflict_set(&confirmed) {
          tracing::warn!(
            confirmed = confirmed.iter().map(|c| c.records.len()).sum::<usize>(),
            live = outcome.deactivated_count,
            "confirmed conflicts are stale; rolling back commit"
          );
          return Err(Error::Core(poc_core::Error::Conflict {
            message: "confirmed conflicts do not match the current active records".into(),
            current: live,
          }));
        }

        Ok(outcome)
      })
      .await
  }

  // ── POC values ────────────────────────────────────────────────────────────

  async fn upsert_poc_batch(
    &self,
    rows: Vec<PocWrite>,
    actor: String,
  ) -> Result<Vec<Result<PocRecord, poc_core::Error>>> {
    self
      .write(move |tx, now| {
        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
          // A rejected row rolls back to its savepoint only.
          let sp = tx.savepoint()?;
          match poc::upsert_one(&sp, row, &actor, now) {
            Ok(record) => {
              sp.commit()?;
              results.push(Ok(record));
            }
            Err(Error::Core(e)) if e.is_row_level() => results.push(Err(e)),
            Err(e) => return Err(e),
          }
        }
        Ok(results)
      })
      .await
  }

  async fn list_poc(
    &self,
    key: ProjectPhaseKey,
    include_inactive: bool,
  ) -> Result<Vec<PocRecord>> {
    self
      .read(move |conn| poc::list(conn, &key, include_inactive))
      .await
  }

  // ── Redistribution ────────────────────────────────────────────────────────

  async fn pending_redistributions(
    &self,
    key: Option<ProjectPhaseKey>,
  ) -> Result<Vec<PendingRedistribution>> {
    self
      .read(move |conn| redistribution::pending(conn, key.as_ref()))
      .await
  }

  async fn resolve_redistribution(
    &self,
    id: Uuid,
    actor: String,
  ) -> Result<PendingRedistribution> {
    self
      .write(move |tx, now| redistribution::resolve(tx, id, &actor, now))
      .await
  }
}
