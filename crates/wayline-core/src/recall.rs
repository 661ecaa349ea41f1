//! Recall and summary read models — never stored, always derived.
//!
//! The store fetches the raw rows (last session, linked feature, recent
//! steps, last decision); everything derived from them — next stage,
//! recommendation, display strings — is computed here so it stays pure and
//! testable without a database.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
  UnixMillis,
  decision::Decision,
  feature::{Feature, STATUS_COMPLETED, STATUS_IN_PROGRESS, Stage},
  session::{Session, SessionStatus},
  step::Step,
};

/// How many steps the project-mode recall view carries.
pub const RECALL_STEP_COUNT: usize = 5;

/// How many sessions the global-mode recall view carries.
pub const RECALL_GLOBAL_SESSION_COUNT: usize = 10;

// ─── Recall views ────────────────────────────────────────────────────────────

/// The "what was happening last" view, in one of two shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RecallView {
  /// Recent sessions across all projects, newest first.
  Global { sessions: Vec<SessionDigest> },
  /// The single most recent session, fully annotated.
  Project(ProjectRecall),
}

/// One line of the global recall list: a session plus its linked feature's
/// progress, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDigest {
  pub session_id:     Uuid,
  pub project:        String,
  pub feature_name:   Option<String>,
  pub status:         SessionStatus,
  pub started_at:     UnixMillis,
  pub ended_at:       Option<UnixMillis>,
  pub current_stage:  Option<Stage>,
  pub feature_status: Option<String>,
}

impl SessionDigest {
  pub fn derive(session: Session, feature: Option<&Feature>) -> Self {
    Self {
      session_id:     session.session_id,
      project:        session.project,
      feature_name:   session.feature_name,
      status:         session.status,
      started_at:     session.started_at,
      ended_at:       session.ended_at,
      current_stage:  feature.map(|f| f.current_stage),
      feature_status: feature.map(|f| f.status.clone()),
    }
  }
}

/// The project-mode recall view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecall {
  pub session_id:      Uuid,
  pub project:         String,
  pub feature_name:    Option<String>,
  /// Stage 0 when no feature is linked.
  pub current_stage:   Stage,
  pub stage_name:      String,
  /// `None` once the final stage is reached.
  pub next_stage:      Option<Stage>,
  pub next_stage_name: Option<String>,
  pub next_agent:      Option<String>,
  pub started_at:      UnixMillis,
  pub ended_at:        Option<UnixMillis>,
  pub status:          SessionStatus,
  pub feature_status:  Option<String>,
  /// The most recent steps rendered as display strings, oldest first.
  pub last_actions:    Vec<String>,
  pub last_decision:   Option<Decision>,
  pub recommendation:  Option<String>,
  pub total_steps:     i64,
  pub total_agents:    i64,
}

impl ProjectRecall {
  /// Assemble the view from fetched rows.
  ///
  /// `recent_steps` is expected newest-first (as the store reads it) and is
  /// re-ordered oldest-first for display.
  pub fn derive(
    session: Session,
    feature: Option<Feature>,
    mut recent_steps: Vec<Step>,
    last_decision: Option<Decision>,
  ) -> Self {
    recent_steps.reverse();

    let current_stage = feature
      .as_ref()
      .map(|f| f.current_stage)
      .unwrap_or_default();
    let next_stage = current_stage.next();

    let last_actions = recent_steps
      .iter()
      .map(|step| match step.agent_name.as_deref() {
        Some(agent) if !agent.is_empty() => {
          format!("{}: {}", capitalize(agent), step.action)
        }
        _ => step.action.clone(),
      })
      .collect();

    let recommendation = match feature.as_ref().map(|f| f.status.as_str()) {
      Some(STATUS_IN_PROGRESS) => next_stage.map(|next| {
        format!(
          "Continue with Stage {next} ({} - {})?",
          next.agent(),
          next.name()
        )
      }),
      Some(STATUS_COMPLETED) => {
        Some("Feature completed! Start a new feature to continue.".to_owned())
      }
      _ => None,
    };

    Self {
      session_id: session.session_id,
      project: session.project,
      feature_name: session.feature_name,
      current_stage,
      stage_name: current_stage.name().to_owned(),
      next_stage,
      next_stage_name: next_stage.map(|s| s.name().to_owned()),
      next_agent: next_stage.map(|s| s.agent().to_owned()),
      started_at: session.started_at,
      ended_at: session.ended_at,
      status: session.status,
      feature_status: feature.map(|f| f.status),
      last_actions,
      last_decision,
      recommendation,
      total_steps: session.total_steps,
      total_agents: session.total_agents_spawned,
    }
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first
      .to_uppercase()
      .chain(chars.flat_map(char::to_lowercase))
      .collect(),
    None => String::new(),
  }
}

// ─── Text rendering ──────────────────────────────────────────────────────────

impl RecallView {
  /// Render the fixed-layout text report. `now` is the reference point for
  /// relative times.
  pub fn to_text(&self, now: UnixMillis) -> String {
    match self {
      Self::Global { sessions } => global_text(sessions, now),
      Self::Project(recall) => project_text(recall, now),
    }
  }
}

fn global_text(sessions: &[SessionDigest], now: UnixMillis) -> String {
  let mut lines = vec![
    "WAYLINE RECALL (Global)".to_owned(),
    "=".repeat(50),
    String::new(),
    "Recent sessions across all projects:".to_owned(),
    String::new(),
  ];

  for (i, digest) in sessions.iter().enumerate() {
    let stage = digest
      .current_stage
      .map(|s| format!("Stage {s}/8"))
      .unwrap_or_default();
    let status = digest
      .feature_status
      .as_deref()
      .unwrap_or(digest.status.as_str());
    let feature = digest.feature_name.as_deref().unwrap_or("(no feature)");
    lines.push(format!(
      "{}. {}/{} - {} {} - {}",
      i + 1,
      digest.project,
      feature,
      stage,
      status,
      format_time_ago(now, digest.started_at),
    ));
  }

  lines.push(String::new());
  lines.push("Run `wayline last-session <project>` for details.".to_owned());
  lines.join("\n")
}

fn project_text(recall: &ProjectRecall, now: UnixMillis) -> String {
  let mut lines = vec![
    "WAYLINE RECALL".to_owned(),
    "=".repeat(50),
    String::new(),
    format!(
      "Feature: {}",
      recall.feature_name.as_deref().unwrap_or("(none)")
    ),
    format!("Stage: {}/8 ({})", recall.current_stage, recall.stage_name),
    format!(
      "Status: {}",
      recall
        .feature_status
        .as_deref()
        .unwrap_or(recall.status.as_str())
    ),
    format!("Last active: {}", format_time_ago(now, recall.started_at)),
    String::new(),
  ];

  if !recall.last_actions.is_empty() {
    lines.push("Last actions:".to_owned());
    let skip = recall.last_actions.len().saturating_sub(3);
    for action in &recall.last_actions[skip..] {
      lines.push(format!("  - {action}"));
    }
    lines.push(String::new());
  }

  if let Some(decision) = &recall.last_decision {
    lines.push(format!("Last decision: {}", decision.question));
    lines.push(format!("  Choice: {}", decision.choice));
    lines.push(String::new());
  }

  let current = i64::from(recall.current_stage.index());
  let boxes: Vec<String> = (1..=8)
    .map(|i| {
      if i < current {
        format!("[{i}]OK")
      } else if i == current {
        format!("[{i}]>>")
      } else {
        format!("[{i}]..")
      }
    })
    .collect();
  lines.push(format!("Pipeline: {}", boxes.join(" -> ")));
  lines.push(String::new());

  if let Some(recommendation) = &recall.recommendation {
    lines.push(format!("Recommendation: {recommendation}"));
  }

  lines.join("\n")
}

// ─── Relative time ───────────────────────────────────────────────────────────

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Bucket elapsed time into a coarse "N units ago" string. Units are always
/// floored to integers.
pub fn format_time_ago(now: UnixMillis, then: UnixMillis) -> String {
  let elapsed = now - then;

  if elapsed < MINUTE_MS {
    "just now".to_owned()
  } else if elapsed < HOUR_MS {
    format!("{} minutes ago", elapsed / MINUTE_MS)
  } else if elapsed < DAY_MS {
    format!("{} hours ago", elapsed / HOUR_MS)
  } else if elapsed < WEEK_MS {
    format!("{} days ago", elapsed / DAY_MS)
  } else {
    format!("{} weeks ago", elapsed / WEEK_MS)
  }
}

// ─── Journey summary ─────────────────────────────────────────────────────────

/// Aggregate counters over sessions started within a trailing window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTotals {
  pub total:        i64,
  pub completed:    i64,
  pub total_steps:  i64,
  pub total_agents: i64,
}

/// Aggregate counters over features created within a trailing window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureTotals {
  pub total:     i64,
  pub completed: i64,
  /// `None` when no features fall inside the window.
  pub average_stage: Option<f64>,
}

/// Spawn count for one agent, from `agent_spawn` steps only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentUsage {
  pub agent_name: String,
  pub count:      i64,
}

/// A decision reduced to the fields the summary shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionDigest {
  pub question:      String,
  pub choice:        String,
  pub decision_type: String,
}

/// The trailing-window journey summary. Counts are zero — never absent —
/// when nothing matches the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneySummary {
  pub period_days:      i64,
  pub project:          Option<String>,
  pub sessions:         SessionTotals,
  pub features:         FeatureTotals,
  /// Ordered by spawn count, descending.
  pub agent_usage:      Vec<AgentUsage>,
  pub file_changes:     BTreeMap<String, i64>,
  /// The 10 most recent decisions in the window, newest first.
  pub recent_decisions: Vec<DecisionDigest>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
