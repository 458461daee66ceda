//! Handlers for `/poc` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/poc` | `?company&project[&phase][&include_inactive]` |
//! | `POST` | `/poc` | Body: [`UpsertBody`]; per-row errors in the report |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::NaiveDate;
use poc_core::{
  Engine, ProjectPhaseKey,
  lifecycle::PocReport,
  record::{PocInput, PocRecord},
  report::BatchReport,
  store::{KeyRegistry, PocStore},
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportParams {
  pub company:          String,
  pub project:          String,
  #[serde(default)]
  pub phase:            String,
  /// Return every row, deactivated ones included, and skip the redistribution
  /// gate. Default `false`.
  #[serde(default)]
  pub include_inactive: bool,
}

/// `GET /poc?company=..&project=..`
///
/// Active rows, or `redistribution_pending` while orphaned mass awaits
/// manual re-entry.
pub async fn report<S>(
  State(engine): State<Arc<Engine<S>>>,
  Query(params): Query<ReportParams>,
) -> Result<Json<PocReport>, ApiError>
where
  S: PocStore + KeyRegistry + 'static,
{
  let key = ProjectPhaseKey::new(params.company, params.project, params.phase);
  let report = if params.include_inactive {
    PocReport::Records {
      records: engine.list_poc(&key, true).await?,
    }
  } else {
    engine.poc_report(&key).await?
  };
  Ok(Json(report))
}

// ─── Upsert ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
  pub rows:   Vec<PocInput>,
  pub cutoff: NaiveDate,
  pub actor:  String,
}

/// `POST /poc`
pub async fn upsert<S>(
  State(engine): State<Arc<Engine<S>>>,
  Json(body): Json<UpsertBody>,
) -> Result<Json<BatchReport<PocRecord>>, ApiError>
where
  S: PocStore + KeyRegistry + 'static,
{
  let report = engine
    .upsert_poc_batch(body.rows, body.cutoff, &body.actor)
    .await?;
  Ok(Json(report))
}
