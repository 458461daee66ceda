//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use poc_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Engine(#[from] poc_core::Error),
}

fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::Validation => StatusCode::BAD_REQUEST,
    ErrorKind::Reference => StatusCode::NOT_FOUND,
    ErrorKind::Precondition => StatusCode::UNPROCESSABLE_ENTITY,
    ErrorKind::Conflict | ErrorKind::Concurrency => StatusCode::CONFLICT,
    ErrorKind::Storage => StatusCode::SERVICE_UNAVAILABLE,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::BadRequest(m) => (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": m, "kind": ErrorKind::Validation })),
      )
        .into_response(),
      ApiError::Engine(e) => {
        let kind = e.kind();
        let status = status_for(kind);
        if status.is_server_error() {
          tracing::error!(error = %e, "request failed");
        }
        let body = match &e {
          poc_core::Error::Conflict { current, .. } => json!({
            "error": e.to_string(),
            "kind": kind,
            "conflicts": current,
          }),
          _ => json!({ "error": e.to_string(), "kind": kind }),
        };
        (status, Json(body)).into_response()
      }
    }
  }
}
