//! Project-phase key: the grouping every ledger row and POC value hangs off.
//!
//! Whether a key is valid is decided by the
//! [`KeyRegistry`](crate::store::KeyRegistry) collaborator, not here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(company, project, phase)`. An empty `phase` means "no sub-phase".
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProjectPhaseKey {
  pub company: String,
  pub project: String,
  #[serde(default)]
  pub phase:   String,
}

impl ProjectPhaseKey {
  pub fn new(
    company: impl Into<String>,
    project: impl Into<String>,
    phase: impl Into<String>,
  ) -> Self {
    Self {
      company: company.into(),
      project: project.into(),
      phase:   phase.into(),
    }
  }

  pub fn has_phase(&self) -> bool { !self.phase.is_empty() }
}

impl fmt::Display for ProjectPhaseKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.has_phase() {
      write!(f, "{}/{}/{}", self.company, self.project, self.phase)
    } else {
      write!(f, "{}/{}", self.company, self.project)
    }
  }
}
