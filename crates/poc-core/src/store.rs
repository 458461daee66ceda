//! The storage port and key-validity collaborator.
//!
//! Backends (e.g. `poc-store-sqlite`) implement both traits; the
//! [`Engine`](crate::Engine) is constructed over an implementation and never
//! touches global state.
//!
//! Every mutating method is one all-or-nothing transaction. Rule checks that
//! depend on stored state (effective completion date, live conflict set) are
//! evaluated inside that transaction using [`crate::rules`].

use std::future::Future;

use uuid::Uuid;

use crate::{
  key::ProjectPhaseKey,
  lifecycle::{CommitOutcome, ConflictDescriptor, PendingRedistribution},
  record::{
    CompletionDateRecord, EffectiveCompletion, NewCompletionDate, PocRecord,
    PocWrite,
  },
};

/// Read-only allow-list of valid project-phase keys.
pub trait KeyRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  fn key_exists<'a>(
    &'a self,
    key: &'a ProjectPhaseKey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

/// Abstraction over the POC / completion-date / redistribution tables.
///
/// `Self::Error` converts into [`crate::Error`] so callers see the shared
/// taxonomy (`Concurrency` for lost races, `Storage` for an unreachable
/// backend).
pub trait PocStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Completion ledger ─────────────────────────────────────────────────

  /// Append one ledger row. Fails with [`crate::Error::Conflict`] if the new
  /// effective date would invalidate active POC records; those must go
  /// through [`PocStore::commit_completion_dates`] with confirmation.
  fn append_completion_date(
    &self,
    entry: NewCompletionDate,
    actor: String,
  ) -> impl Future<Output = Result<CompletionDateRecord, Self::Error>> + Send + '_;

  /// All ledger rows for a key, newest first.
  fn completion_history(
    &self,
    key: ProjectPhaseKey,
  ) -> impl Future<Output = Result<Vec<CompletionDateRecord>, Self::Error>> + Send + '_;

  fn effective_completion(
    &self,
    key: ProjectPhaseKey,
  ) -> impl Future<Output = Result<Option<EffectiveCompletion>, Self::Error>>
  + Send
  + '_;

  // ── Conflict detection and resolution ─────────────────────────────────

  /// Dry run: apply `entries` in order as if committed and report the
  /// active records they would invalidate. Writes nothing.
  fn find_conflicts(
    &self,
    entries: Vec<NewCompletionDate>,
  ) -> impl Future<Output = Result<Vec<ConflictDescriptor>, Self::Error>> + Send + '_;

  /// Atomically deactivate conflicting records, append `entries`, and record
  /// any orphaned percentage mass. The live conflict set is recomputed inside
  /// the transaction and must equal `confirmed`, otherwise nothing is
  /// written and [`crate::Error::Conflict`] carries the current set.
  fn commit_completion_dates(
    &self,
    entries: Vec<NewCompletionDate>,
    confirmed: Vec<ConflictDescriptor>,
    actor: String,
  ) -> impl Future<Output = Result<CommitOutcome, Self::Error>> + Send + '_;

  // ── POC values ────────────────────────────────────────────────────────

  /// Upsert rows in order within one transaction. Each row either succeeds
  /// or yields a row-level [`crate::Error`]; later rows observe earlier
  /// accepted rows. A storage failure aborts the whole batch.
  fn upsert_poc_batch(
    &self,
    rows: Vec<PocWrite>,
    actor: String,
  ) -> impl Future<Output = Result<Vec<Result<PocRecord, crate::Error>>, Self::Error>>
  + Send
  + '_;

  /// POC rows for a key ordered by period; deactivated rows only when
  /// `include_inactive` is set.
  fn list_poc(
    &self,
    key: ProjectPhaseKey,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<PocRecord>, Self::Error>> + Send + '_;

  // ── Redistribution ────────────────────────────────────────────────────

  /// Unresolved redistributions, optionally restricted to one key.
  fn pending_redistributions(
    &self,
    key: Option<ProjectPhaseKey>,
  ) -> impl Future<Output = Result<Vec<PendingRedistribution>, Self::Error>> + Send + '_;

  /// Mark a redistribution resolved after manual re-entry.
  fn resolve_redistribution(
    &self,
    id: Uuid,
    actor: String,
  ) -> impl Future<Output = Result<PendingRedistribution, Self::Error>> + Send + '_;
}
