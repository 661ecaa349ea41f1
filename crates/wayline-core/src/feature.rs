//! Feature — a tracked unit of work progressing through the fixed
//! nine-stage pipeline.
//!
//! Features are upserted by their globally unique name. Stage-completion
//! timestamps are a fixed enumeration of nine slots, one per stage; the
//! slot for stage N is selected by matching N against a closed list, never
//! by building a column name from a number.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, UnixMillis};

/// Number of pipeline stages (0 through 8).
pub const STAGE_COUNT: usize = 9;

// ─── Stage ───────────────────────────────────────────────────────────────────

/// One of the nine fixed pipeline stages, guaranteed in range 0..=8.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "i64", try_from = "i64")]
pub struct Stage(u8);

impl Stage {
  /// Validate a raw stage number. Out-of-range values are rejected, not
  /// clamped.
  pub fn new(n: i64) -> Result<Self> {
    if (0..STAGE_COUNT as i64).contains(&n) {
      Ok(Self(n as u8))
    } else {
      Err(Error::StageOutOfRange(n))
    }
  }

  pub fn index(self) -> u8 { self.0 }

  /// The stage after this one, or `None` at the final stage.
  pub fn next(self) -> Option<Self> {
    (self.0 < 8).then(|| Self(self.0 + 1))
  }

  /// Human-readable stage name.
  pub fn name(self) -> &'static str {
    match self.0 {
      0 => "Research",
      1 => "PRD Creation",
      2 => "PRD Review",
      3 => "Tech Spec",
      4 => "PM Spec Review",
      5 => "SA Spec Review",
      6 => "Test Plan",
      7 => "Implementation",
      8 => "Code Review",
      _ => unreachable!("Stage is validated on construction"),
    }
  }

  /// Label of the agent responsible for this stage.
  pub fn agent(self) -> &'static str {
    match self.0 {
      0 => "Metis",
      1 => "Athena",
      2 => "Athena",
      3 => "Hephaestus",
      4 => "Athena",
      5 => "Apollo",
      6 => "Artemis",
      7 => "Ares",
      8 => "Hermes",
      _ => unreachable!("Stage is validated on construction"),
    }
  }
}

impl Default for Stage {
  /// Stage 0 (Research) — the entry point of the pipeline.
  fn default() -> Self { Self(0) }
}

impl TryFrom<i64> for Stage {
  type Error = Error;

  fn try_from(n: i64) -> Result<Self> { Self::new(n) }
}

impl From<Stage> for i64 {
  fn from(stage: Stage) -> i64 { i64::from(stage.0) }
}

impl std::fmt::Display for Stage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

// ─── Feature ─────────────────────────────────────────────────────────────────

/// A recorded feature row.
///
/// `status` is an open vocabulary; well-known values are `in_progress` and
/// `completed`, and the recall layer keys its recommendation off those two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
  pub id:               i64,
  pub feature_name:     String,
  pub project:          String,
  pub created_at:       UnixMillis,
  pub updated_at:       UnixMillis,
  pub current_stage:    Stage,
  pub status:           String,
  pub description:      Option<String>,
  /// Completion timestamp per stage, indexed by stage number.
  pub stages_completed: [Option<UnixMillis>; STAGE_COUNT],
}

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

/// Input for [`JourneyStore::upsert_feature`](crate::store::JourneyStore).
///
/// On first write the unset fields default (`current_stage = 0`,
/// `status = "in_progress"`); on subsequent writes only the supplied fields
/// are applied, and a supplied `current_stage` also stamps the matching
/// stage-completion slot.
#[derive(Debug, Clone)]
pub struct UpsertFeature {
  pub feature_name:  String,
  pub project:       String,
  pub current_stage: Option<Stage>,
  pub status:        Option<String>,
  pub description:   Option<String>,
}

impl UpsertFeature {
  pub fn new(
    feature_name: impl Into<String>,
    project: impl Into<String>,
  ) -> Self {
    Self {
      feature_name:  feature_name.into(),
      project:       project.into(),
      current_stage: None,
      status:        None,
      description:   None,
    }
  }
}
