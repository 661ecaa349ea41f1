//! Decision — an append-only record of a question answered during a
//! session: what was asked, what was chosen, and why.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UnixMillis;

/// The default `decision_type` when the caller does not supply one.
pub const DEFAULT_DECISION_TYPE: &str = "implementation";

/// A recorded decision row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
  pub id:            i64,
  pub session_id:    Uuid,
  pub step_id:       Option<i64>,
  pub feature_name:  Option<String>,
  pub timestamp:     UnixMillis,
  pub decision_type: String,
  pub question:      String,
  pub choice:        String,
  /// Rejected alternatives, order preserved.
  pub alternatives:  Option<Vec<String>>,
  pub rationale:     Option<String>,
  pub impact:        Option<String>,
}

/// Input for [`JourneyStore::record_decision`](crate::store::JourneyStore).
#[derive(Debug, Clone)]
pub struct NewDecision {
  pub session_id:    Uuid,
  pub question:      String,
  pub choice:        String,
  pub decision_type: String,
  pub step_id:       Option<i64>,
  pub feature_name:  Option<String>,
  pub alternatives:  Option<Vec<String>>,
  pub rationale:     Option<String>,
  pub impact:        Option<String>,
}

impl NewDecision {
  pub fn new(
    session_id: Uuid,
    question: impl Into<String>,
    choice: impl Into<String>,
  ) -> Self {
    Self {
      session_id,
      question: question.into(),
      choice: choice.into(),
      decision_type: DEFAULT_DECISION_TYPE.to_owned(),
      step_id: None,
      feature_name: None,
      alternatives: None,
      rationale: None,
      impact: None,
    }
  }
}
