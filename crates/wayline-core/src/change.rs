//! FileChange — an append-only record of one file touched during a session,
//! optionally linked to the step that produced it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UnixMillis;

/// A recorded file-change row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
  pub id:            i64,
  pub session_id:    Uuid,
  pub step_id:       Option<i64>,
  pub timestamp:     UnixMillis,
  pub file_path:     String,
  /// Open vocabulary: `created`, `modified`, `deleted`, `renamed`, ...
  pub change_type:   String,
  /// Previous path when `change_type` is a rename.
  pub old_path:      Option<String>,
  pub description:   Option<String>,
  pub lines_added:   Option<i64>,
  pub lines_removed: Option<i64>,
}

/// Input for [`JourneyStore::record_file_change`](crate::store::JourneyStore).
#[derive(Debug, Clone)]
pub struct NewFileChange {
  pub session_id:    Uuid,
  pub file_path:     String,
  pub change_type:   String,
  pub step_id:       Option<i64>,
  pub old_path:      Option<String>,
  pub description:   Option<String>,
  pub lines_added:   Option<i64>,
  pub lines_removed: Option<i64>,
}

impl NewFileChange {
  pub fn new(
    session_id: Uuid,
    file_path: impl Into<String>,
    change_type: impl Into<String>,
  ) -> Self {
    Self {
      session_id,
      file_path: file_path.into(),
      change_type: change_type.into(),
      step_id: None,
      old_path: None,
      description: None,
      lines_added: None,
      lines_removed: None,
    }
  }
}
