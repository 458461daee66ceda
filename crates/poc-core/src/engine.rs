//! [`Engine`], the single entry point through which callers read and write
//! POC data and completion dates.
//!
//! The engine screens inbound rows (dates, values, key validity), classifies
//! periods, and hands validated work to the injected [`PocStore`], which
//! enforces the stateful invariants inside its transactions. Row-level
//! problems are collected per batch; storage failures abort the call.

use std::{collections::HashMap, sync::Arc};

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  Error, Result, audit,
  key::ProjectPhaseKey,
  lifecycle::{ConflictDescriptor, PendingRedistribution, PocReport},
  period::{
    Period, RecognitionType, classify, validate_completion_entry,
  },
  record::{
    CompletionDateRecord, EffectiveCompletion, NewCompletionDate, PocInput,
    PocRecord, PocWrite,
  },
  report::{BatchReport, CommitReport, ConflictCheck, RowError},
  rules,
  store::{KeyRegistry, PocStore},
};

/// Fronts a storage backend with validation, classification and auditing.
///
/// Cloning is cheap; the store is shared.
pub struct Engine<S> {
  store: Arc<S>,
  today: Option<NaiveDate>,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      today: self.today,
    }
  }
}

/// Lift a backend error into the shared taxonomy.
fn lift<E: Into<Error>>(e: E) -> Error { e.into() }

/// Per-call memo of key lookups so a batch consults the registry once per
/// key.
type KeyCache = HashMap<ProjectPhaseKey, bool>;

impl<S> Engine<S>
where
  S: PocStore + KeyRegistry,
{
  pub fn new(store: Arc<S>) -> Self { Self { store, today: None } }

  /// Pin "today" for the Actual/Projected completion-date rule. Defaults to
  /// the current UTC date.
  pub fn with_today(mut self, today: NaiveDate) -> Self {
    self.today = Some(today);
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// The date completion entries are validated against.
  pub fn today(&self) -> NaiveDate {
    self.today.unwrap_or_else(|| Utc::now().date_naive())
  }

  // ── Key validity ──────────────────────────────────────────────────────

  pub async fn key_exists(&self, key: &ProjectPhaseKey) -> Result<bool> {
    KeyRegistry::key_exists(self.store.as_ref(), key)
      .await
      .map_err(lift)
  }

  async fn require_key(&self, key: &ProjectPhaseKey, cache: &mut KeyCache) -> Result<()> {
    let exists = match cache.get(key) {
      Some(&exists) => exists,
      None => {
        let exists = self.key_exists(key).await?;
        cache.insert(key.clone(), exists);
        exists
      }
    };
    if exists {
      Ok(())
    } else {
      Err(Error::Reference(key.clone()))
    }
  }

  /// Split completion entries into those fit to commit and row errors.
  async fn screen_completion_entries(
    &self,
    entries: Vec<NewCompletionDate>,
  ) -> Result<(Vec<NewCompletionDate>, Vec<RowError>)> {
    let today = self.today();
    let mut cache = KeyCache::new();
    let mut accepted = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();

    for (index, entry) in entries.into_iter().enumerate() {
      let screened = match validate_completion_entry(
        entry.completion_date,
        entry.completion_type,
        today,
      ) {
        Ok(()) => self.require_key(&entry.key, &mut cache).await,
        Err(e) => Err(e),
      };
      match screened {
        Ok(()) => accepted.push(entry),
        Err(e) if e.is_row_level() => errors.push(RowError::new(index, &e)),
        Err(e) => return Err(e),
      }
    }

    Ok((accepted, errors))
  }

  // ── Completion ledger ─────────────────────────────────────────────────

  /// Append a single completion date. Refused with a conflict error if it
  /// would invalidate active records; use [`Self::check_conflicts`] and
  /// [`Self::resolve_and_commit`] for those.
  pub async fn append_completion_date(
    &self,
    key: ProjectPhaseKey,
    completion_type: RecognitionType,
    completion_date: NaiveDate,
    actor: &str,
  ) -> Result<CompletionDateRecord> {
    validate_completion_entry(completion_date, completion_type, self.today())?;
    self.require_key(&key, &mut KeyCache::new()).await?;

    let entry = NewCompletionDate {
      key,
      completion_type,
      completion_date,
    };
    let record = self
      .store
      .append_completion_date(entry, actor.to_owned())
      .await
      .map_err(lift)?;
    audit::completion_date_appended(&record);
    Ok(record)
  }

  pub async fn get_effective_completion_date(
    &self,
    key: &ProjectPhaseKey,
  ) -> Result<Option<EffectiveCompletion>> {
    self
      .store
      .effective_completion(key.clone())
      .await
      .map_err(lift)
  }

  pub async fn completion_history(
    &self,
    key: &ProjectPhaseKey,
  ) -> Result<Vec<CompletionDateRecord>> {
    self
      .store
      .completion_history(key.clone())
      .await
      .map_err(lift)
  }

  // ── Conflicts ─────────────────────────────────────────────────────────

  /// Side-effect-free preview of what committing `entries` would deactivate.
  pub async fn check_conflicts(
    &self,
    entries: Vec<NewCompletionDate>,
  ) -> Result<ConflictCheck> {
    let (accepted, errors) = self.screen_completion_entries(entries).await?;
    let conflicts = if accepted.is_empty() {
      Vec::new()
    } else {
      self
        .store
        .find_conflicts(accepted)
        .await
        .map_err(lift)?
    };
    Ok(ConflictCheck { conflicts, errors })
  }

  /// Commit `entries`, deactivating exactly the records in `confirmed`.
  ///
  /// `confirmed` must match the live conflict set at commit time; a stale
  /// confirmation fails with [`Error::Conflict`] and writes nothing.
  pub async fn resolve_and_commit(
    &self,
    entries: Vec<NewCompletionDate>,
    confirmed: Vec<ConflictDescriptor>,
    actor: &str,
  ) -> Result<CommitReport> {
    let processed_count = entries.len();
    let (accepted, errors) = self.screen_completion_entries(entries).await?;
    let succeeded_count = accepted.len();

    let outcome = if accepted.is_empty() {
      Default::default()
    } else {
      let outcome = self
        .store
        .commit_completion_dates(accepted, confirmed, actor.to_owned())
        .await
        .map_err(lift)?;
      audit::commit_applied(&outcome, actor);
      outcome
    };

    Ok(CommitReport {
      processed_count,
      succeeded_count,
      errors,
      outcome,
    })
  }

  // ── POC values ────────────────────────────────────────────────────────

  async fn prepare_poc_row(
    &self,
    row: PocInput,
    cutoff: NaiveDate,
    cache: &mut KeyCache,
  ) -> Result<PocWrite> {
    let period = Period::new(row.year, row.month)?;
    rules::validate_value(row.value)?;
    self.require_key(&row.key, cache).await?;
    Ok(PocWrite {
      key: row.key,
      period,
      value: row.value,
      recognition: classify(period.year, period.month, cutoff),
    })
  }

  /// Write one POC value, returning the record's new state.
  pub async fn upsert_poc(
    &self,
    key: ProjectPhaseKey,
    year: i32,
    month: u32,
    value: f64,
    cutoff: NaiveDate,
    actor: &str,
  ) -> Result<PocRecord> {
    let write = self
      .prepare_poc_row(PocInput { key, year, month, value }, cutoff, &mut KeyCache::new())
      .await?;

    let record = self
      .store
      .upsert_poc_batch(vec![write], actor.to_owned())
      .await
      .map_err(lift)?
      .into_iter()
      .next()
      .ok_or_else(|| Error::Storage("store returned no result for upsert".into()))??;

    audit::poc_upserted(&record);
    Ok(record)
  }

  /// Write a batch of POC values in input order. Bad rows are reported and
  /// skipped; a storage failure aborts the batch with no partial effect.
  pub async fn upsert_poc_batch(
    &self,
    rows: Vec<PocInput>,
    cutoff: NaiveDate,
    actor: &str,
  ) -> Result<BatchReport<PocRecord>> {
    let processed_count = rows.len();
    let mut cache = KeyCache::new();
    let mut writes = Vec::with_capacity(rows.len());
    let mut indices = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (index, row) in rows.into_iter().enumerate() {
      match self.prepare_poc_row(row, cutoff, &mut cache).await {
        Ok(write) => {
          writes.push(write);
          indices.push(index);
        }
        Err(e) if e.is_row_level() => errors.push(RowError::new(index, &e)),
        Err(e) => return Err(e),
      }
    }

    let results = if writes.is_empty() {
      Vec::new()
    } else {
      self
        .store
        .upsert_poc_batch(writes, actor.to_owned())
        .await
        .map_err(lift)?
    };

    let mut records = Vec::with_capacity(results.len());
    for (index, result) in indices.into_iter().zip(results) {
      match result {
        Ok(record) => {
          audit::poc_upserted(&record);
          records.push(record);
        }
        Err(e) => errors.push(RowError::new(index, &e)),
      }
    }

    Ok(BatchReport::new(processed_count, records, errors))
  }

  pub async fn list_poc(
    &self,
    key: &ProjectPhaseKey,
    include_inactive: bool,
  ) -> Result<Vec<PocRecord>> {
    self
      .store
      .list_poc(key.clone(), include_inactive)
      .await
      .map_err(lift)
  }

  /// Active POC rows for `key`, unless a redistribution is pending for it.
  pub async fn poc_report(&self, key: &ProjectPhaseKey) -> Result<PocReport> {
    let pending = self.pending_redistributions(Some(key.clone())).await?;
    if !pending.is_empty() {
      return Ok(PocReport::RedistributionPending { pending });
    }
    let records = self.list_poc(key, false).await?;
    Ok(PocReport::Records { records })
  }

  // ── Redistribution ────────────────────────────────────────────────────

  pub async fn pending_redistributions(
    &self,
    key: Option<ProjectPhaseKey>,
  ) -> Result<Vec<PendingRedistribution>> {
    self
      .store
      .pending_redistributions(key)
      .await
      .map_err(lift)
  }

  pub async fn resolve_redistribution(
    &self,
    id: Uuid,
    actor: &str,
  ) -> Result<PendingRedistribution> {
    let entry = self
      .store
      .resolve_redistribution(id, actor.to_owned())
      .await
      .map_err(lift)?;
    audit::redistribution_resolved(&entry);
    Ok(entry)
  }
}
