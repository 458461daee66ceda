//! Batch reporting types.

use serde::{Deserialize, Serialize};

use crate::{
  Error, ErrorKind,
  lifecycle::{CommitOutcome, ConflictDescriptor},
};

/// A row rejected by validation, key lookup, or a precondition. Index is the
/// row's position in the caller's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
  pub index:   usize,
  pub kind:    ErrorKind,
  pub message: String,
}

impl RowError {
  pub fn new(index: usize, error: &Error) -> Self {
    Self {
      index,
      kind: error.kind(),
      message: error.to_string(),
    }
  }
}

/// `{processed_count, succeeded_count, errors[]}` plus the accepted items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport<T> {
  pub processed_count: usize,
  pub succeeded_count: usize,
  pub errors:          Vec<RowError>,
  pub items:           Vec<T>,
}

impl<T> BatchReport<T> {
  pub fn new(processed_count: usize, items: Vec<T>, mut errors: Vec<RowError>) -> Self {
    errors.sort_by_key(|e| e.index);
    Self {
      processed_count,
      succeeded_count: items.len(),
      errors,
      items,
    }
  }
}

/// Result of a dry-run conflict check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheck {
  pub conflicts: Vec<ConflictDescriptor>,
  /// Entries that would be rejected at commit time.
  pub errors:    Vec<RowError>,
}

/// Result of `resolve_and_commit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReport {
  pub processed_count: usize,
  pub succeeded_count: usize,
  pub errors:          Vec<RowError>,
  #[serde(flatten)]
  pub outcome:         CommitOutcome,
}
