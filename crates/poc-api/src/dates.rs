//! Pure date helpers: classification, month-end checks, and completion-date
//! validation.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/classify` | `?year&month&cutoff` |
//! | `GET`  | `/month-end` | `?date` |
//! | `POST` | `/completion-dates/validate` | Body: [`ValidateBody`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::NaiveDate;
use poc_core::{
  DateCheck, Engine, RecognitionType, classify, is_month_end,
  store::{KeyRegistry, PocStore},
  validate_completion_date,
};
use serde::{Deserialize, Serialize};

// ─── Classify ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClassifyParams {
  pub year:   i32,
  pub month:  u32,
  pub cutoff: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
  #[serde(rename = "type")]
  pub recognition: RecognitionType,
}

/// `GET /classify?year=2025&month=4&cutoff=2025-03-31`
pub async fn classify_period(
  Query(params): Query<ClassifyParams>,
) -> Json<ClassifyResponse> {
  Json(ClassifyResponse {
    recognition: classify(params.year, params.month, params.cutoff),
  })
}

// ─── Month end ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MonthEndParams {
  pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct MonthEndResponse {
  pub date:      NaiveDate,
  pub month_end: bool,
}

/// `GET /month-end?date=2024-02-29`. Impossible dates fail extraction.
pub async fn month_end(Query(params): Query<MonthEndParams>) -> Json<MonthEndResponse> {
  Json(MonthEndResponse {
    date:      params.date,
    month_end: is_month_end(params.date),
  })
}

// ─── Validate ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ValidateBody {
  pub date:  NaiveDate,
  #[serde(rename = "type")]
  pub kind:  RecognitionType,
  /// Defaults to the server's notion of today.
  pub today: Option<NaiveDate>,
}

/// `POST /completion-dates/validate`. Always 200; the verdict is in the body.
pub async fn validate<S>(
  State(engine): State<Arc<Engine<S>>>,
  Json(body): Json<ValidateBody>,
) -> Json<DateCheck>
where
  S: PocStore + KeyRegistry + 'static,
{
  let today = body.today.unwrap_or_else(|| engine.today());
  Json(validate_completion_date(body.date, body.kind, today))
}
