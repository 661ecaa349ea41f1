//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are epoch-millisecond INTEGERs. List-valued fields (file
//! paths, decision alternatives) are compact JSON arrays and round-trip
//! exactly — order preserved, no deduplication. UUIDs are stored as
//! hyphenated lowercase strings.

use rusqlite::Row;
use uuid::Uuid;
use wayline_core::{
  UnixMillis,
  change::FileChange,
  decision::Decision,
  feature::{Feature, STAGE_COUNT, Stage},
  session::{Session, SessionStatus},
  step::Step,
};

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── SessionStatus ───────────────────────────────────────────────────────────

pub fn decode_session_status(s: &str) -> Result<SessionStatus> {
  SessionStatus::parse(s)
    .ok_or_else(|| Error::Decode(format!("unknown session status: {s:?}")))
}

// ─── Stage ───────────────────────────────────────────────────────────────────

pub fn decode_stage(n: i64) -> Result<Stage> { Ok(Stage::new(n)?) }

// ─── JSON lists ──────────────────────────────────────────────────────────────

pub fn encode_list(list: Option<&Vec<String>>) -> Result<Option<String>> {
  list.map(|l| serde_json::to_string(l)).transpose().map_err(Error::Json)
}

pub fn decode_list(s: Option<&str>) -> Result<Option<Vec<String>>> {
  s.map(serde_json::from_str).transpose().map_err(Error::Json)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `sessions` row.
pub struct RawSession {
  pub id:                   i64,
  pub session_id:           String,
  pub project:              String,
  pub feature_name:         Option<String>,
  pub initial_request:      Option<String>,
  pub started_at:           UnixMillis,
  pub ended_at:             Option<UnixMillis>,
  pub status:               String,
  pub summary:              Option<String>,
  pub total_steps:          i64,
  pub total_agents_spawned: i64,
}

impl RawSession {
  /// Column order must match the SELECT lists in `store.rs`.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                   row.get(0)?,
      session_id:           row.get(1)?,
      project:              row.get(2)?,
      feature_name:         row.get(3)?,
      initial_request:      row.get(4)?,
      started_at:           row.get(5)?,
      ended_at:             row.get(6)?,
      status:               row.get(7)?,
      summary:              row.get(8)?,
      total_steps:          row.get(9)?,
      total_agents_spawned: row.get(10)?,
    })
  }

  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      id:                   self.id,
      session_id:           decode_uuid(&self.session_id)?,
      project:              self.project,
      feature_name:         self.feature_name,
      initial_request:      self.initial_request,
      started_at:           self.started_at,
      ended_at:             self.ended_at,
      status:               decode_session_status(&self.status)?,
      summary:              self.summary,
      total_steps:          self.total_steps,
      total_agents_spawned: self.total_agents_spawned,
    })
  }
}

/// Raw values read directly from a `steps` row.
pub struct RawStep {
  pub id:             i64,
  pub session_id:     String,
  pub step_number:    i64,
  pub step_type:      String,
  pub timestamp:      UnixMillis,
  pub agent_name:     Option<String>,
  pub agent_model:    Option<String>,
  pub pipeline_stage: Option<i64>,
  pub action:         String,
  pub target:         Option<String>,
  pub result:         Option<String>,
  pub files_created:  Option<String>,
  pub files_modified: Option<String>,
  pub files_deleted:  Option<String>,
  pub context:        Option<String>,
}

impl RawStep {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      session_id:     row.get(1)?,
      step_number:    row.get(2)?,
      step_type:      row.get(3)?,
      timestamp:      row.get(4)?,
      agent_name:     row.get(5)?,
      agent_model:    row.get(6)?,
      pipeline_stage: row.get(7)?,
      action:         row.get(8)?,
      target:         row.get(9)?,
      result:         row.get(10)?,
      files_created:  row.get(11)?,
      files_modified: row.get(12)?,
      files_deleted:  row.get(13)?,
      context:        row.get(14)?,
    })
  }

  pub fn into_step(self) -> Result<Step> {
    Ok(Step {
      id:             self.id,
      session_id:     decode_uuid(&self.session_id)?,
      step_number:    self.step_number,
      step_type:      self.step_type,
      timestamp:      self.timestamp,
      agent_name:     self.agent_name,
      agent_model:    self.agent_model,
      pipeline_stage: self.pipeline_stage,
      action:         self.action,
      target:         self.target,
      result:         self.result,
      files_created:  decode_list(self.files_created.as_deref())?,
      files_modified: decode_list(self.files_modified.as_deref())?,
      files_deleted:  decode_list(self.files_deleted.as_deref())?,
      context:        self.context,
    })
  }
}

/// Raw values read directly from a `features` row. The nine
/// stage-completion columns land in a fixed array, indexed by stage.
pub struct RawFeature {
  pub id:               i64,
  pub feature_name:     String,
  pub project:          String,
  pub created_at:       UnixMillis,
  pub updated_at:       UnixMillis,
  pub current_stage:    i64,
  pub status:           String,
  pub description:      Option<String>,
  pub stages_completed: [Option<UnixMillis>; STAGE_COUNT],
}

impl RawFeature {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let mut stages_completed = [None; STAGE_COUNT];
    for (offset, slot) in stages_completed.iter_mut().enumerate() {
      *slot = row.get(8 + offset)?;
    }
    Ok(Self {
      id:            row.get(0)?,
      feature_name:  row.get(1)?,
      project:       row.get(2)?,
      created_at:    row.get(3)?,
      updated_at:    row.get(4)?,
      current_stage: row.get(5)?,
      status:        row.get(6)?,
      description:   row.get(7)?,
      stages_completed,
    })
  }

  pub fn into_feature(self) -> Result<Feature> {
    Ok(Feature {
      id:               self.id,
      feature_name:     self.feature_name,
      project:          self.project,
      created_at:       self.created_at,
      updated_at:       self.updated_at,
      current_stage:    decode_stage(self.current_stage)?,
      status:           self.status,
      description:      self.description,
      stages_completed: self.stages_completed,
    })
  }
}

/// Raw values read directly from a `file_changes` row.
pub struct RawFileChange {
  pub id:            i64,
  pub session_id:    String,
  pub step_id:       Option<i64>,
  pub timestamp:     UnixMillis,
  pub file_path:     String,
  pub change_type:   String,
  pub old_path:      Option<String>,
  pub description:   Option<String>,
  pub lines_added:   Option<i64>,
  pub lines_removed: Option<i64>,
}

impl RawFileChange {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      session_id:    row.get(1)?,
      step_id:       row.get(2)?,
      timestamp:     row.get(3)?,
      file_path:     row.get(4)?,
      change_type:   row.get(5)?,
      old_path:      row.get(6)?,
      description:   row.get(7)?,
      lines_added:   row.get(8)?,
      lines_removed: row.get(9)?,
    })
  }

  pub fn into_file_change(self) -> Result<FileChange> {
    Ok(FileChange {
      id:            self.id,
      session_id:    decode_uuid(&self.session_id)?,
      step_id:       self.step_id,
      timestamp:     self.timestamp,
      file_path:     self.file_path,
      change_type:   self.change_type,
      old_path:      self.old_path,
      description:   self.description,
      lines_added:   self.lines_added,
      lines_removed: self.lines_removed,
    })
  }
}

/// Raw values read directly from a `decisions` row.
pub struct RawDecision {
  pub id:            i64,
  pub session_id:    String,
  pub step_id:       Option<i64>,
  pub feature_name:  Option<String>,
  pub timestamp:     UnixMillis,
  pub decision_type: String,
  pub question:      String,
  pub choice:        String,
  pub alternatives:  Option<String>,
  pub rationale:     Option<String>,
  pub impact:        Option<String>,
}

impl RawDecision {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      session_id:    row.get(1)?,
      step_id:       row.get(2)?,
      feature_name:  row.get(3)?,
      timestamp:     row.get(4)?,
      decision_type: row.get(5)?,
      question:      row.get(6)?,
      choice:        row.get(7)?,
      alternatives:  row.get(8)?,
      rationale:     row.get(9)?,
      impact:        row.get(10)?,
    })
  }

  pub fn into_decision(self) -> Result<Decision> {
    Ok(Decision {
      id:            self.id,
      session_id:    decode_uuid(&self.session_id)?,
      step_id:       self.step_id,
      feature_name:  self.feature_name,
      timestamp:     self.timestamp,
      decision_type: self.decision_type,
      question:      self.question,
      choice:        self.choice,
      alternatives:  decode_list(self.alternatives.as_deref())?,
      rationale:     self.rationale,
      impact:        self.impact,
    })
  }
}
