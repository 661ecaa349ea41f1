//! Session — one bounded unit of tracked work on a project/feature.
//!
//! A session is created `active` and mutated exactly once, on end: the end
//! call stamps `ended_at`, the final status, an optional summary, and a
//! snapshot of the step/agent counts as of that moment. Sessions are never
//! deleted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UnixMillis;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
  Active,
  Completed,
  Abandoned,
}

impl SessionStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Completed => "completed",
      Self::Abandoned => "abandoned",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "active" => Some(Self::Active),
      "completed" => Some(Self::Completed),
      "abandoned" => Some(Self::Abandoned),
      _ => None,
    }
  }
}

/// A recorded session row.
///
/// `total_steps` and `total_agents_spawned` are zero while the session is
/// active; they become meaningful only after the session is ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub id:                   i64,
  pub session_id:           Uuid,
  pub project:              String,
  pub feature_name:         Option<String>,
  pub initial_request:      Option<String>,
  pub started_at:           UnixMillis,
  pub ended_at:             Option<UnixMillis>,
  pub status:               SessionStatus,
  pub summary:              Option<String>,
  pub total_steps:          i64,
  pub total_agents_spawned: i64,
}

/// Input for [`JourneyStore::start_session`](crate::store::JourneyStore).
#[derive(Debug, Clone)]
pub struct NewSession {
  pub project:         String,
  pub feature_name:    Option<String>,
  pub initial_request: Option<String>,
}

impl NewSession {
  pub fn new(project: impl Into<String>) -> Self {
    Self {
      project:         project.into(),
      feature_name:    None,
      initial_request: None,
    }
  }
}
