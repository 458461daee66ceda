//! Structured audit events, emitted on the `poc::audit` tracing target.
//!
//! The sink (formatting, files, rotation) belongs to whoever installs the
//! subscriber.

use crate::{
  lifecycle::{CommitOutcome, PendingRedistribution},
  record::{CompletionDateRecord, PocRecord},
};

pub const TARGET: &str = "poc::audit";

pub fn completion_date_appended(record: &CompletionDateRecord) {
  tracing::info!(
    target: TARGET,
    event = "completion_date_appended",
    key = %record.key,
    completion_type = %record.completion_type,
    completion_date = %record.completion_date,
    record_id = %record.record_id,
    actor = %record.created_by,
  );
}

pub fn poc_upserted(record: &PocRecord) {
  tracing::info!(
    target: TARGET,
    event = "poc_upserted",
    key = %record.key,
    period = %record.period,
    value = record.value,
    recognition = %record.recognition,
    record_id = %record.record_id,
    actor = %record.updated_by,
  );
}

pub fn redistribution_created(entry: &PendingRedistribution) {
  tracing::warn!(
    target: TARGET,
    event = "redistribution_created",
    key = %entry.key,
    orphaned_total = entry.orphaned_total,
    new_completion_date = %entry.new_completion_date,
    old_completion_date = %entry.old_completion_date,
    redistribution_id = %entry.redistribution_id,
    actor = %entry.created_by,
  );
}

pub fn redistribution_resolved(entry: &PendingRedistribution) {
  tracing::info!(
    target: TARGET,
    event = "redistribution_resolved",
    key = %entry.key,
    redistribution_id = %entry.redistribution_id,
    actor = entry.resolved_by.as_deref().unwrap_or_default(),
  );
}

/// One `completion_date_appended` per ledger row, one `record_deactivated`
/// per soft-deleted record, one `redistribution_created` per new entry.
pub fn commit_applied(outcome: &CommitOutcome, actor: &str) {
  for key in &outcome.per_key {
    for row in &key.inserted {
      completion_date_appended(row);
    }
    for record in &key.deactivated {
      tracing::info!(
        target: TARGET,
        event = "record_deactivated",
        key = %key.key,
        period = %record.period(),
        value = record.value,
        record_id = %record.record_id,
        actor,
      );
    }
    for entry in &key.redistributions {
      redistribution_created(entry);
    }
  }
}
