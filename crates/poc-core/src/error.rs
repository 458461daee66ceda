//! Error types for `poc-core`.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use thiserror::Error;

use crate::{key::ProjectPhaseKey, lifecycle::ConflictDescriptor};

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or out-of-range input: bad date, non-month-end date, value
  /// outside `[0, 100]`, Actual/Projected temporal rule violated.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("unknown project/phase: {0}")]
  Reference(ProjectPhaseKey),

  #[error("precondition failed: {0}")]
  Precondition(String),

  /// The live conflict set differs from what the caller confirmed.
  #[error("conflict: {message}")]
  Conflict {
    message: String,
    current: Vec<ConflictDescriptor>,
  },

  /// Transaction lost to a concurrent writer. Safe to retry.
  #[error("concurrent write: {0}")]
  Concurrency(String),

  #[error("storage unavailable: {0}")]
  Storage(String),
}

/// Serialisable discriminant of [`Error`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  Validation,
  Reference,
  Precondition,
  Conflict,
  Concurrency,
  Storage,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) => ErrorKind::Validation,
      Self::Reference(_) => ErrorKind::Reference,
      Self::Precondition(_) => ErrorKind::Precondition,
      Self::Conflict { .. } => ErrorKind::Conflict,
      Self::Concurrency(_) => ErrorKind::Concurrency,
      Self::Storage(_) => ErrorKind::Storage,
    }
  }

  /// Row-level errors are collected per batch row; anything else aborts the
  /// whole operation.
  pub fn is_row_level(&self) -> bool {
    matches!(
      self,
      Self::Validation(_) | Self::Reference(_) | Self::Precondition(_)
    )
  }

  pub fn is_retryable(&self) -> bool { matches!(self, Self::Concurrency(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
