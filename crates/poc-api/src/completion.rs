//! Handlers for `/completion-dates` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/completion-dates` | `?company&project[&phase]`; effective date + history |
//! | `POST` | `/completion-dates` | Body: [`AppendBody`]; 201, or 409 if records would be invalidated |
//! | `POST` | `/completion-dates/check` | Body: [`CheckBody`]; dry run |
//! | `POST` | `/completion-dates/commit` | Body: [`CommitBody`]; 409 on a stale confirmation |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use poc_core::{
  Engine, ProjectPhaseKey,
  lifecycle::ConflictDescriptor,
  record::{CompletionDateRecord, EffectiveCompletion, NewCompletionDate},
  report::{CommitReport, ConflictCheck},
  store::{KeyRegistry, PocStore},
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, params::KeyParams};

// ─── Read ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CompletionView {
  pub key:       ProjectPhaseKey,
  pub effective: Option<EffectiveCompletion>,
  /// Newest first.
  pub history:   Vec<CompletionDateRecord>,
}

/// `GET /completion-dates?company=..&project=..[&phase=..]`
pub async fn show<S>(
  State(engine): State<Arc<Engine<S>>>,
  Query(params): Query<KeyParams>,
) -> Result<Json<CompletionView>, ApiError>
where
  S: PocStore + KeyRegistry + 'static,
{
  let key = ProjectPhaseKey::from(params);
  let effective = engine.get_effective_completion_date(&key).await?;
  let history = engine.completion_history(&key).await?;
  Ok(Json(CompletionView {
    key,
    effective,
    history,
  }))
}

// ─── Append ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AppendBody {
  #[serde(flatten)]
  pub entry: NewCompletionDate,
  pub actor: String,
}

/// `POST /completion-dates`. Returns 201 + the ledger row.
pub async fn append<S>(
  State(engine): State<Arc<Engine<S>>>,
  Json(body): Json<AppendBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PocStore + KeyRegistry + 'static,
{
  let NewCompletionDate {
    key,
    completion_type,
    completion_date,
  } = body.entry;
  let record = engine
    .append_completion_date(key, completion_type, completion_date, &body.actor)
    .await?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Check ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CheckBody {
  pub entries: Vec<NewCompletionDate>,
}

/// `POST /completion-dates/check`
pub async fn check<S>(
  State(engine): State<Arc<Engine<S>>>,
  Json(body): Json<CheckBody>,
) -> Result<Json<ConflictCheck>, ApiError>
where
  S: PocStore + KeyRegistry + 'static,
{
  Ok(Json(engine.check_conflicts(body.entries).await?))
}

// ─── Commit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CommitBody {
  pub entries:   Vec<NewCompletionDate>,
  /// The conflicts returned by `/completion-dates/check`, echoed back as
  /// confirmation. Empty when the check found none.
  #[serde(default)]
  pub confirmed: Vec<ConflictDescriptor>,
  pub actor:     String,
}

/// `POST /completion-dates/commit`
pub async fn commit<S>(
  State(engine): State<Arc<Engine<S>>>,
  Json(body): Json<CommitBody>,
) -> Result<Json<CommitReport>, ApiError>
where
  S: PocStore + KeyRegistry + 'static,
{
  let report = engine
    .resolve_and_commit(body.entries, body.confirmed, &body.actor)
    .await?;
  Ok(Json(report))
}
