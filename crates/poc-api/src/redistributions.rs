//! Handlers for `/redistributions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/redistributions` | Optional `?company&project[&phase]` filter |
//! | `POST` | `/redistributions/{id}/resolve` | Body: `{"actor":"..."}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use poc_core::{
  Engine,
  lifecycle::PendingRedistribution,
  store::{KeyRegistry, PocStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, params::KeyFilter};

/// `GET /redistributions[?company=..&project=..]`
pub async fn list<S>(
  State(engine): State<Arc<Engine<S>>>,
  Query(filter): Query<KeyFilter>,
) -> Result<Json<Vec<PendingRedistribution>>, ApiError>
where
  S: PocStore + KeyRegistry + 'static,
{
  let pending = engine.pending_redistributions(filter.into_key()?).await?;
  Ok(Json(pending))
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
  pub actor: String,
}

/// `POST /redistributions/{id}/resolve`
pub async fn resolve<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ResolveBody>,
) -> Result<Json<PendingRedistribution>, ApiError>
where
  S: PocStore + KeyRegistry + 'static,
{
  Ok(Json(engine.resolve_redistribution(id, &body.actor).await?))
}
