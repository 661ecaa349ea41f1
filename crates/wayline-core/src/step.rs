//! Step — one atomic recorded action within a session.
//!
//! Steps are strictly append-only. Within a session, `step_number` runs
//! contiguously from 1 with no gaps or repeats; assignment is the store's
//! responsibility and happens inside the insert transaction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UnixMillis;

/// The step type counted by `end_session` as an agent spawn.
pub const STEP_TYPE_AGENT_SPAWN: &str = "agent_spawn";

/// A recorded step row.
///
/// `step_type` is an open vocabulary; well-known values include
/// `agent_spawn`, `file_modify`, `decision`, and `command`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
  pub id:             i64,
  pub session_id:     Uuid,
  pub step_number:    i64,
  pub step_type:      String,
  pub timestamp:      UnixMillis,
  pub agent_name:     Option<String>,
  pub agent_model:    Option<String>,
  pub pipeline_stage: Option<i64>,
  pub action:         String,
  pub target:         Option<String>,
  pub result:         Option<String>,
  /// File-path lists round-trip exactly: order preserved, no deduplication.
  pub files_created:  Option<Vec<String>>,
  pub files_modified: Option<Vec<String>>,
  pub files_deleted:  Option<Vec<String>>,
  pub context:        Option<String>,
}

/// Input for [`JourneyStore::record_step`](crate::store::JourneyStore).
/// `step_number` and `timestamp` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewStep {
  pub session_id:     Uuid,
  pub step_type:      String,
  pub action:         String,
  pub agent_name:     Option<String>,
  pub agent_model:    Option<String>,
  pub pipeline_stage: Option<i64>,
  pub target:         Option<String>,
  pub result:         Option<String>,
  pub files_created:  Option<Vec<String>>,
  pub files_modified: Option<Vec<String>>,
  pub files_deleted:  Option<Vec<String>>,
  pub context:        Option<String>,
}

impl NewStep {
  pub fn new(
    session_id: Uuid,
    step_type: impl Into<String>,
    action: impl Into<String>,
  ) -> Self {
    Self {
      session_id,
      step_type: step_type.into(),
      action: action.into(),
      agent_name: None,
      agent_model: None,
      pipeline_stage: None,
      target: None,
      result: None,
      files_created: None,
      files_modified: None,
      files_deleted: None,
      context: None,
    }
  }
}
