//! Query-string shapes shared by several handlers.

use poc_core::ProjectPhaseKey;
use serde::Deserialize;

use crate::error::ApiError;

/// `?company=..&project=..[&phase=..]`
#[derive(Debug, Deserialize)]
pub struct KeyParams {
  pub company: String,
  pub project: String,
  #[serde(default)]
  pub phase:   String,
}

impl From<KeyParams> for ProjectPhaseKey {
  fn from(p: KeyParams) -> Self { ProjectPhaseKey::new(p.company, p.project, p.phase) }
}

/// Like [`KeyParams`] but every field optional; used for filters.
#[derive(Debug, Default, Deserialize)]
pub struct KeyFilter {
  pub company: Option<String>,
  pub project: Option<String>,
  pub phase:   Option<String>,
}

impl KeyFilter {
  /// `None` when no filter was given. A partial key is rejected.
  pub fn into_key(self) -> Result<Option<ProjectPhaseKey>, ApiError> {
    match (self.company, self.project, self.phase) {
      (None, None, None) => Ok(None),
      (Some(company), Some(project), phase) => Ok(Some(ProjectPhaseKey::new(
        company,
        project,
        phase.unwrap_or_default(),
      ))),
      _ => Err(ApiError::BadRequest(
        "filter needs both company and project".into(),
      )),
    }
  }
}
