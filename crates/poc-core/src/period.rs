//! Reporting periods, Actual/Projected classification, and completion-date
//! validation. Everything here is pure.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{Error, Result};

// ─── Recognition type ────────────────────────────────────────────────────────

/// Whether a period (or a completion date) is elapsed or forecast.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecognitionType {
  Actual,
  Projected,
}

impl RecognitionType {
  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Period ──────────────────────────────────────────────────────────────────

/// A calendar month. Ordering is lexicographic on `(year, month)`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Period {
  pub year:  i32,
  pub month: u32,
}

impl Period {
  /// Build a period, rejecting months outside `1..=12`.
  pub fn new(year: i32, month: u32) -> Result<Self> {
    if !(1..=12).contains(&month) {
      return Err(Error::Validation(format!(
        "month must be between 1 and 12, got {month}"
      )));
    }
    Ok(Self { year, month })
  }

  /// The period a date falls in.
  pub fn of(date: NaiveDate) -> Self {
    Self {
      year:  date.year(),
      month: date.month(),
    }
  }

  /// True if this period lies strictly after the month containing `date`.
  pub fn is_after(self, date: NaiveDate) -> bool { self > Self::of(date) }
}

impl fmt::Display for Period {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

// ─── Classifier ──────────────────────────────────────────────────────────────

/// `Actual` iff `(year, month) <= (cutoff.year, cutoff.month)`.
pub fn classify(year: i32, month: u32, cutoff: NaiveDate) -> RecognitionType {
  if (year, month) <= (cutoff.year(), cutoff.month()) {
    RecognitionType::Actual
  } else {
    RecognitionType::Projected
  }
}

// ─── Date validation ─────────────────────────────────────────────────────────

/// True iff the following day is the first of a month.
pub fn is_month_end(date: NaiveDate) -> bool {
  date.succ_opt().is_none_or(|next| next.day() == 1)
}

/// Outcome of [`validate_completion_date`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCheck {
  pub valid:  bool,
  pub reason: Option<String>,
}

impl DateCheck {
  fn ok() -> Self {
    Self {
      valid:  true,
      reason: None,
    }
  }

  fn rejected(reason: String) -> Self {
    Self {
      valid:  false,
      reason: Some(reason),
    }
  }

  /// Convert a failed check into [`Error::Validation`].
  pub fn into_result(self) -> Result<()> {
    match self.reason {
      Some(reason) if !self.valid => Err(Error::Validation(reason)),
      _ => Ok(()),
    }
  }
}

/// Actual completion dates must not be in the future; projected ones must be.
pub fn validate_completion_date(
  date: NaiveDate,
  kind: RecognitionType,
  today: NaiveDate,
) -> DateCheck {
  match kind {
    RecognitionType::Actual if date > today => DateCheck::rejected(format!(
      "actual completion date {date} is after today ({today})"
    )),
    RecognitionType::Projected if date <= today => DateCheck::rejected(format!(
      "projected completion date {date} must be after today ({today})"
    )),
    _ => DateCheck::ok(),
  }
}

/// Full check applied to an inbound completion-date entry: month end plus the
/// Actual/Projected temporal rule.
pub fn validate_completion_entry(
  date: NaiveDate,
  kind: RecognitionType,
  today: NaiveDate,
) -> Result<()> {
  if !is_month_end(date) {
    return Err(Error::Validation(format!(
      "completion date {date} is not the last day of its month"
    )));
  }
  validate_completion_date(date, kind, today).into_result()
}
