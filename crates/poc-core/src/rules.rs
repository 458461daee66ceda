//! Consistency rules shared by the engine and storage backends.
//!
//! Backends evaluate these inside their write transactions so the checks see
//! the same state the write commits against.

use chrono::NaiveDate;

use crate::{
  Error, Result,
  key::ProjectPhaseKey,
  lifecycle::ConflictingRecord,
  period::Period,
  record::EffectiveCompletion,
};

pub const FULL_COMPLETION: f64 = 100.0;

pub fn validate_value(value: f64) -> Result<()> {
  if value.is_finite() && (0.0..=FULL_COMPLETION).contains(&value) {
    Ok(())
  } else {
    Err(Error::Validation(format!(
      "POC value must be between 0 and 100, got {value}"
    )))
  }
}

pub fn is_full(value: f64) -> bool { value >= FULL_COMPLETION }

/// A POC write needs a completion date on record for its key.
pub fn require_completion(
  key: &ProjectPhaseKey,
  effective: Option<EffectiveCompletion>,
) -> Result<EffectiveCompletion> {
  effective.ok_or_else(|| {
    Error::Precondition(format!(
      "POC requires a completion date first; none recorded for {key}"
    ))
  })
}

/// 100% may only be recorded up to and including the completion month.
pub fn check_full_completion(
  period: Period,
  value: f64,
  effective: &EffectiveCompletion,
) -> Result<()> {
  if is_full(value) && period.is_after(effective.completion_date) {
    return Err(Error::Precondition(format!(
      "100% POC for {period} is after the {} completion date {}",
      effective.completion_type, effective.completion_date,
    )));
  }
  Ok(())
}

/// Whether an active record becomes inconsistent when the effective
/// completion date changes from `previous` to `next`.
///
/// A record after `next` conflicts if it holds 100%, or if it sat inside the
/// previously completed window (on or before the `previous` month) and is now
/// cut out of it. Records that were already after `previous` and hold less
/// than 100% are left alone.
pub fn conflicts_with(
  period: Period,
  value: f64,
  previous: Option<&EffectiveCompletion>,
  next: &EffectiveCompletion,
) -> bool {
  if !period.is_after(next.completion_date) {
    return false;
  }
  is_full(value) || previous.is_some_and(|p| !period.is_after(p.completion_date))
}

/// `Some((new, old))` when the effective completion date moved earlier.
pub fn moved_earlier(
  previous: Option<EffectiveCompletion>,
  next: Option<EffectiveCompletion>,
) -> Option<(NaiveDate, NaiveDate)> {
  match (previous, next) {
    (Some(prev), Some(next)) if next.completion_date < prev.completion_date => {
      Some((next.completion_date, prev.completion_date))
    }
    _ => None,
  }
}

/// Non-zero records whose periods fall after `new_date` and no later than
/// the month of `old_date`; their values have no destination period.
pub fn orphaned<'a>(
  records: &'a [ConflictingRecord],
  new_date: NaiveDate,
  old_date: NaiveDate,
) -> impl Iterator<Item = &'a ConflictingRecord> + 'a {
  records.iter().filter(move |r| {
    r.value > 0.0 && r.period().is_after(new_date) && !r.period().is_after(old_date)
  })
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;
  use crate::period::RecognitionType;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn actual(date: NaiveDate) -> EffectiveCompletion {
    EffectiveCompletion {
      completion_type: RecognitionType::Actual,
      completion_date: date,
    }
  }

  fn conflicting(year: i32, month: u32, value: f64) -> ConflictingRecord {
    ConflictingRecord {
      record_id: Uuid::new_v4(),
      year,
      month,
      value,
      recognition: RecognitionType::Projected,
    }
  }

  #[test]
  fn value_range_is_inclusive() {
    validate_value(0.0).unwrap();
    validate_value(100.0).unwrap();
    validate_value(42.5).unwrap();
    assert!(validate_value(-0.1).is_err());
    assert!(validate_value(100.01).is_err());
    assert!(validate_value(f64::NAN).is_err());
  }

  #[test]
  fn missing_completion_is_a_precondition_error() {
    let key = ProjectPhaseKey::new("ACME", "Tower", "");
    let err = require_completion(&key, None).unwrap_err();
    assert!(matches!(err, Error::Precondition(msg) if msg.contains("completion date first")));
  }

  #[test]
  fn full_completion_after_completion_month_is_rejected() {
    let eff = actual(d(2025, 3, 31));
    check_full_completion(Period { year: 2025, month: 3 }, 100.0, &eff).unwrap();
    check_full_completion(Period { year: 2025, month: 4 }, 99.0, &eff).unwrap();
    let err =
      check_full_completion(Period { year: 2025, month: 4 }, 100.0, &eff).unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));
  }

  #[test]
  fn conflicts_cover_full_values_and_the_cut_window() {
    let prev = actual(d(2025, 6, 30));
    let next = actual(d(2025, 3, 31));
    let p = |m| Period { year: 2025, month: m };

    assert!(!conflicts_with(p(3), 100.0, Some(&prev), &next));
    assert!(conflicts_with(p(4), 50.0, Some(&prev), &next));
    assert!(conflicts_with(p(6), 10.0, Some(&prev), &next));
    assert!(!conflicts_with(p(7), 10.0, Some(&prev), &next));
    assert!(conflicts_with(p(7), 100.0, Some(&prev), &next));
    assert!(!conflicts_with(p(4), 50.0, None, &next));
    assert!(conflicts_with(p(4), 100.0, None, &next));
  }

  #[test]
  fn moved_earlier_only_when_date_decreases() {
    let old = actual(d(2025, 6, 30));
    let new = actual(d(2025, 3, 31));
    assert_eq!(moved_earlier(Some(old), Some(new)), Some((d(2025, 3, 31), d(2025, 6, 30))));
    assert_eq!(moved_earlier(Some(new), Some(old)), None);
    assert_eq!(moved_earlier(None, Some(new)), None);
  }

  #[test]
  fn orphaned_window_is_after_new_through_old_month() {
    let records = [
      conflicting(2025, 4, 20.0),
      conflicting(2025, 5, 0.0),
      conflicting(2025, 6, 30.0),
      conflicting(2025, 7, 10.0),
    ];
    let total: f64 = orphaned(&records, d(2025, 3, 31), d(2025, 6, 30))
      .map(|r| r.value)
      .sum();
    assert_eq!(total, 50.0);
  }
}
