//! [`SqliteStore`] — the SQLite implementation of [`JourneyStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use wayline_core::{
  Error as CoreError, now_ms,
  change::{FileChange, NewFileChange},
  decision::{Decision, NewDecision},
  feature::{Feature, STATUS_IN_PROGRESS, Stage, UpsertFeature},
  recall::{
    AgentUsage, DecisionDigest, FeatureTotals, JourneySummary, ProjectRecall,
    RECALL_GLOBAL_SESSION_COUNT, RECALL_STEP_COUNT, RecallView,
    SessionDigest, SessionTotals,
  },
  session::{NewSession, Session, SessionStatus},
  step::{NewStep, STEP_TYPE_AGENT_SPAWN, Step},
  store::JourneyStore,
};

use crate::{
  Error, Result,
  encode::{
    RawDecision, RawFeature, RawFileChange, RawSession, RawStep, encode_list,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Column lists ────────────────────────────────────────────────────────────
// Order must match the `from_row` constructors in `encode.rs`.

const SESSION_COLUMNS: &str = "id, session_id, project, feature_name, \
   initial_request, started_at, ended_at, status, summary, total_steps, \
   total_agents_spawned";

const STEP_COLUMNS: &str = "id, session_id, step_number, step_type, \
   timestamp, agent_name, agent_model, pipeline_stage, action, target, \
   result, files_created, files_modified, files_deleted, context";

const FEATURE_COLUMNS: &str = "id, feature_name, project, created_at, \
   updated_at, current_stage, status, description, stage_0_completed, \
   stage_1_completed, stage_2_completed, stage_3_completed, \
   stage_4_completed, stage_5_completed, stage_6_completed, \
   stage_7_completed, stage_8_completed";

const CHANGE_COLUMNS: &str = "id, session_id, step_id, timestamp, \
   file_path, change_type, old_path, description, lines_added, \
   lines_removed";

const DECISION_COLUMNS: &str = "id, session_id, step_id, feature_name, \
   timestamp, decision_type, question, choice, alternatives, rationale, \
   impact";

/// How many decisions the journey summary carries.
const SUMMARY_DECISION_LIMIT: i64 = 10;

/// The UPDATE stamping one stage-completion slot. A closed nine-arm match —
/// no identifier is ever built from the stage number.
fn stage_completed_update(stage: Stage) -> &'static str {
  match stage.index() {
    0 => "UPDATE features SET stage_0_completed = ?1 WHERE feature_name = ?2",
    1 => "UPDATE features SET stage_1_completed = ?1 WHERE feature_name = ?2",
    2 => "UPDATE features SET stage_2_completed = ?1 WHERE feature_name = ?2",
    3 => "UPDATE features SET stage_3_completed = ?1 WHERE feature_name = ?2",
    4 => "UPDATE features SET stage_4_completed = ?1 WHERE feature_name = ?2",
    5 => "UPDATE features SET stage_5_completed = ?1 WHERE feature_name = ?2",
    6 => "UPDATE features SET stage_6_completed = ?1 WHERE feature_name = ?2",
    7 => "UPDATE features SET stage_7_completed = ?1 WHERE feature_name = ?2",
    8 => "UPDATE features SET stage_8_completed = ?1 WHERE feature_name = ?2",
    _ => unreachable!("Stage is validated on construction"),
  }
}

// ─── Row-existence helpers (used inside transactions) ────────────────────────

fn session_exists(
  conn: &rusqlite::Connection,
  session_id: &str,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sessions WHERE session_id = ?1",
        rusqlite::params![session_id],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn feature_exists(
  conn: &rusqlite::Connection,
  feature_name: &str,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM features WHERE feature_name = ?1",
        rusqlite::params![feature_name],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

// ─── Closure outcomes ────────────────────────────────────────────────────────
// Precondition failures detected inside a transaction are reported through
// these instead of error types, then mapped to domain errors outside the
// `conn.call` boundary.

enum EndOutcome {
  Missing,
  AlreadyEnded,
  Ended,
}

enum AppendOutcome {
  NoSession,
  NoFeature,
  Inserted(i64),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Wayline journey ledger backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("schema applied");
    Ok(())
  }

  async fn fetch_session(&self, session_id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(session_id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"
              ),
              rusqlite::params![id_str],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn fetch_feature(&self, feature_name: &str) -> Result<Option<Feature>> {
    let name = feature_name.to_owned();

    let raw: Option<RawFeature> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {FEATURE_COLUMNS} FROM features WHERE feature_name = ?1"
              ),
              rusqlite::params![name],
              RawFeature::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFeature::into_feature).transpose()
  }
}

// ─── JourneyStore impl ───────────────────────────────────────────────────────

impl JourneyStore for SqliteStore {
  type Error = Error;

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn start_session(&self, input: NewSession) -> Result<Session> {
    let session = Session {
      id:                   0,
      session_id:           Uuid::new_v4(),
      project:              input.project,
      feature_name:         input.feature_name,
      initial_request:      input.initial_request,
      started_at:           now_ms(),
      ended_at:             None,
      status:               SessionStatus::Active,
      summary:              None,
      total_steps:          0,
      total_agents_spawned: 0,
    };

    let id_str = encode_uuid(session.session_id);
    let project = session.project.clone();
    let feature_name = session.feature_name.clone();
    let initial_request = session.initial_request.clone();
    let started_at = session.started_at;

    let row_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (session_id, project, feature_name,
             initial_request, started_at, status)
           VALUES (?1, ?2, ?3, ?4, ?5, 'active')",
          rusqlite::params![
            id_str,
            project,
            feature_name,
            initial_request,
            started_at,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    tracing::debug!(session_id = %session.session_id, project = %session.project, "session started");
    Ok(Session { id: row_id, ..session })
  }

  async fn end_session(
    &self,
    session_id: Uuid,
    summary: Option<String>,
    status: SessionStatus,
  ) -> Result<Session> {
    let id_str = encode_uuid(session_id);
    let status_str = status.as_str();
    let ended_at = now_ms();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
          .query_row(
            "SELECT status FROM sessions WHERE session_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;

        match current.as_deref() {
          None => Ok(EndOutcome::Missing),
          Some(s) if s != "active" => Ok(EndOutcome::AlreadyEnded),
          Some(_) => {
            // Snapshot the counts as of this moment; they are never
            // recomputed afterwards.
            let (total_steps, agents): (i64, i64) = tx.query_row(
              "SELECT COUNT(*),
                      COUNT(CASE WHEN step_type = ?1 THEN 1 END)
               FROM steps WHERE session_id = ?2",
              rusqlite::params![STEP_TYPE_AGENT_SPAWN, id_str],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            tx.execute(
              "UPDATE sessions
               SET ended_at = ?1, status = ?2, summary = ?3,
                   total_steps = ?4, total_agents_spawned = ?5
               WHERE session_id = ?6",
              rusqlite::params![
                ended_at,
                status_str,
                summary,
                total_steps,
                agents,
                id_str,
              ],
            )?;

            tx.commit()?;
            Ok(EndOutcome::Ended)
          }
        }
      })
      .await?;

    match outcome {
      EndOutcome::Missing => {
        Err(CoreError::SessionNotFound(session_id).into())
      }
      EndOutcome::AlreadyEnded => {
        Err(CoreError::SessionAlreadyEnded(session_id).into())
      }
      EndOutcome::Ended => {
        tracing::debug!(%session_id, status = status_str, "session ended");
        self
          .fetch_session(session_id)
          .await?
          .ok_or_else(|| CoreError::SessionNotFound(session_id).into())
      }
    }
  }

  async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
    self.fetch_session(session_id).await
  }

  async fn get_active_session(
    &self,
    project: Option<&str>,
  ) -> Result<Option<Session>> {
    let project = project.map(str::to_owned);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status = 'active'
                   AND (?1 IS NULL OR project = ?1)
                 ORDER BY started_at DESC, id DESC
                 LIMIT 1"
              ),
              rusqlite::params![project],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn recent_sessions(
    &self,
    project: Option<&str>,
    days: i64,
    limit: usize,
  ) -> Result<Vec<Session>> {
    let project = project.map(str::to_owned);
    let cutoff = now_ms() - days * 86_400_000;
    let limit = limit as i64;

    let raws: Vec<RawSession> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SESSION_COLUMNS} FROM sessions
           WHERE started_at > ?1
             AND (?2 IS NULL OR project = ?2)
           ORDER BY started_at DESC, id DESC
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![cutoff, project, limit],
            RawSession::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::into_session).collect()
  }

  // ── Steps — append-only writes ────────────────────────────────────────────

  async fn record_step(&self, input: NewStep) -> Result<Step> {
    let id_str = encode_uuid(input.session_id);
    let timestamp = now_ms();

    let files_created = encode_list(input.files_created.as_ref())?;
    let files_modified = encode_list(input.files_modified.as_ref())?;
    let files_deleted = encode_list(input.files_deleted.as_ref())?;

    let step_type = input.step_type.clone();
    let action = input.action.clone();
    let agent_name = input.agent_name.clone();
    let agent_model = input.agent_model.clone();
    let pipeline_stage = input.pipeline_stage;
    let target = input.target.clone();
    let result = input.result.clone();
    let context = input.context.clone();
    let session_str = id_str.clone();

    let inserted: Option<(i64, i64)> = self
      .conn
      .call(move |conn| {
        // Number assignment and insert share one immediate transaction so
        // concurrent writers to the same session cannot duplicate numbers.
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !session_exists(&tx, &session_str)? {
          return Ok(None);
        }

        let step_number: i64 = tx.query_row(
          "SELECT COALESCE(MAX(step_number), 0) + 1 FROM steps
           WHERE session_id = ?1",
          rusqlite::params![session_str],
          |row| row.get(0),
        )?;

        tx.execute(
          "INSERT INTO steps (
             session_id, step_number, step_type, timestamp,
             agent_name, agent_model, pipeline_stage,
             action, target, result,
             files_created, files_modified, files_deleted, context
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
          rusqlite::params![
            session_str,
            step_number,
            step_type,
            timestamp,
            agent_name,
            agent_model,
            pipeline_stage,
            action,
            target,
            result,
            files_created,
            files_modified,
            files_deleted,
            context,
          ],
        )?;

        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some((id, step_number)))
      })
      .await?;

    let Some((id, step_number)) = inserted else {
      return Err(CoreError::SessionNotFound(input.session_id).into());
    };

    tracing::debug!(session_id = %input.session_id, step_number, "step recorded");
    Ok(Step {
      id,
      session_id: input.session_id,
      step_number,
      step_type: input.step_type,
      timestamp,
      agent_name: input.agent_name,
      agent_model: input.agent_model,
      pipeline_stage: input.pipeline_stage,
      action: input.action,
      target: input.target,
      result: input.result,
      files_created: input.files_created,
      files_modified: input.files_modified,
      files_deleted: input.files_deleted,
      context: input.context,
    })
  }

  async fn session_steps(&self, session_id: Uuid) -> Result<Vec<Step>> {
    let id_str = encode_uuid(session_id);

    let raws: Vec<RawStep> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STEP_COLUMNS} FROM steps
           WHERE session_id = ?1
           ORDER BY step_number ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawStep::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStep::into_step).collect()
  }

  // ── Features ──────────────────────────────────────────────────────────────

  async fn upsert_feature(&self, input: UpsertFeature) -> Result<Feature> {
    let now = now_ms();
    let name = input.feature_name.clone();
    let project = input.project.clone();
    let stage = input.current_stage;
    let stage_num: Option<i64> = stage.map(i64::from);
    let status = input.status.clone();
    let description = input.description.clone();

    self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if feature_exists(&tx, &name)? {
          // Apply only the supplied fields; `updated_at` always moves.
          tx.execute(
            "UPDATE features
             SET updated_at = ?1,
                 current_stage = COALESCE(?2, current_stage),
                 status = COALESCE(?3, status),
                 description = COALESCE(?4, description)
             WHERE feature_name = ?5",
            rusqlite::params![now, stage_num, status, description, name],
          )?;
          if let Some(stage) = stage {
            tx.execute(
              stage_completed_update(stage),
              rusqlite::params![now, name],
            )?;
          }
        } else {
          tx.execute(
            "INSERT INTO features (
               feature_name, project, created_at, updated_at,
               current_stage, status, description
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
              name,
              project,
              now,
              now,
              stage_num.unwrap_or(0),
              status.as_deref().unwrap_or(STATUS_IN_PROGRESS),
              description,
            ],
          )?;
        }

        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(feature = %input.feature_name, "feature upserted");
    self
      .fetch_feature(&input.feature_name)
      .await?
      .ok_or_else(|| CoreError::FeatureNotFound(input.feature_name).into())
  }

  async fn mark_stage_complete(
    &self,
    feature_name: &str,
    stage: Stage,
  ) -> Result<Feature> {
    let now = now_ms();
    let name = feature_name.to_owned();
    let stage_num = i64::from(stage);

    let found = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !feature_exists(&tx, &name)? {
          return Ok(false);
        }

        tx.execute(
          "UPDATE features SET current_stage = ?1, updated_at = ?2
           WHERE feature_name = ?3",
          rusqlite::params![stage_num, now, name],
        )?;
        tx.execute(
          stage_completed_update(stage),
          rusqlite::params![now, name],
        )?;

        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(CoreError::FeatureNotFound(feature_name.to_owned()).into());
    }

    tracing::debug!(feature = feature_name, stage = %stage, "stage marked complete");
    self
      .fetch_feature(feature_name)
      .await?
      .ok_or_else(|| CoreError::FeatureNotFound(feature_name.to_owned()).into())
  }

  async fn get_feature(&self, feature_name: &str) -> Result<Option<Feature>> {
    self.fetch_feature(feature_name).await
  }

  // ── File changes & decisions — append-only writes ─────────────────────────

  async fn record_file_change(
    &self,
    input: NewFileChange,
  ) -> Result<FileChange> {
    let id_str = encode_uuid(input.session_id);
    let timestamp = now_ms();

    let file_path = input.file_path.clone();
    let change_type = input.change_type.clone();
    let step_id = input.step_id;
    let old_path = input.old_path.clone();
    let description = input.description.clone();
    let lines_added = input.lines_added;
    let lines_removed = input.lines_removed;

    let inserted: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !session_exists(&tx, &id_str)? {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO file_changes (
             session_id, step_id, timestamp, file_path, change_type,
             old_path, description, lines_added, lines_removed
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            step_id,
            timestamp,
            file_path,
            change_type,
            old_path,
            description,
            lines_added,
            lines_removed,
          ],
        )?;

        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some(id))
      })
      .await?;

    let Some(id) = inserted else {
      return Err(CoreError::SessionNotFound(input.session_id).into());
    };

    Ok(FileChange {
      id,
      session_id: input.session_id,
      step_id: input.step_id,
      timestamp,
      file_path: input.file_path,
      change_type: input.change_type,
      old_path: input.old_path,
      description: input.description,
      lines_added: input.lines_added,
      lines_removed: input.lines_removed,
    })
  }

  async fn recent_file_changes(
    &self,
    days: i64,
    limit: usize,
  ) -> Result<Vec<FileChange>> {
    let cutoff = now_ms() - days * 86_400_000;
    let limit = limit as i64;

    let raws: Vec<RawFileChange> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHANGE_COLUMNS} FROM file_changes
           WHERE timestamp > ?1
           ORDER BY timestamp DESC, id DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![cutoff, limit],
            RawFileChange::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawFileChange::into_file_change)
      .collect()
  }

  async fn record_decision(&self, input: NewDecision) -> Result<Decision> {
    let id_str = encode_uuid(input.session_id);
    let timestamp = now_ms();
    let alternatives = encode_list(input.alternatives.as_ref())?;

    let step_id = input.step_id;
    let feature_name = input.feature_name.clone();
    let decision_type = input.decision_type.clone();
    let question = input.question.clone();
    let choice = input.choice.clone();
    let rationale = input.rationale.clone();
    let impact = input.impact.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !session_exists(&tx, &id_str)? {
          return Ok(AppendOutcome::NoSession);
        }
        if let Some(name) = &feature_name
          && !feature_exists(&tx, name)?
        {
          return Ok(AppendOutcome::NoFeature);
        }

        tx.execute(
          "INSERT INTO decisions (
             session_id, step_id, feature_name, timestamp,
             decision_type, question, choice, alternatives, rationale, impact
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str,
            step_id,
            feature_name,
            timestamp,
            decision_type,
            question,
            choice,
            alternatives,
            rationale,
            impact,
          ],
        )?;

        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(AppendOutcome::Inserted(id))
      })
      .await?;

    let id = match outcome {
      AppendOutcome::NoSession => {
        return Err(CoreError::SessionNotFound(input.session_id).into());
      }
      AppendOutcome::NoFeature => {
        // feature_name was present, or we would not be here
        let name = input.feature_name.unwrap_or_default();
        return Err(CoreError::FeatureNotFound(name).into());
      }
      AppendOutcome::Inserted(id) => id,
    };

    Ok(Decision {
      id,
      session_id: input.session_id,
      step_id: input.step_id,
      feature_name: input.feature_name,
      timestamp,
      decision_type: input.decision_type,
      question: input.question,
      choice: input.choice,
      alternatives: input.alternatives,
      rationale: input.rationale,
      impact: input.impact,
    })
  }

  async fn feature_decisions(
    &self,
    feature_name: &str,
  ) -> Result<Vec<Decision>> {
    let name = feature_name.to_owned();

    let raws: Vec<RawDecision> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DECISION_COLUMNS} FROM decisions
           WHERE feature_name = ?1
           ORDER BY timestamp ASC, id ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![name], RawDecision::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDecision::into_decision).collect()
  }

  // ── Recall & summary ──────────────────────────────────────────────────────

  async fn last_session_info(
    &self,
    project: Option<&str>,
    global_mode: bool,
  ) -> Result<Option<RecallView>> {
    if global_mode {
      let limit = RECALL_GLOBAL_SESSION_COUNT as i64;

      let rows: Vec<(RawSession, Option<RawFeature>)> = self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             ORDER BY started_at DESC, id DESC
             LIMIT ?1"
          ))?;
          let sessions = stmt
            .query_map(rusqlite::params![limit], RawSession::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

          let mut rows = Vec::with_capacity(sessions.len());
          for session in sessions {
            let feature = match &session.feature_name {
              Some(name) => conn
                .query_row(
                  &format!(
                    "SELECT {FEATURE_COLUMNS} FROM features
                     WHERE feature_name = ?1"
                  ),
                  rusqlite::params![name],
                  RawFeature::from_row,
                )
                .optional()?,
              None => None,
            };
            rows.push((session, feature));
          }
          Ok(rows)
        })
        .await?;

      if rows.is_empty() {
        return Ok(None);
      }

      let mut sessions = Vec::with_capacity(rows.len());
      for (raw_session, raw_feature) in rows {
        let session = raw_session.into_session()?;
        let feature =
          raw_feature.map(RawFeature::into_feature).transpose()?;
        sessions.push(SessionDigest::derive(session, feature.as_ref()));
      }
      return Ok(Some(RecallView::Global { sessions }));
    }

    // Project mode.
    let project = project.map(str::to_owned);
    let step_limit = RECALL_STEP_COUNT as i64;

    type ProjectRows =
      Option<(RawSession, Option<RawFeature>, Vec<RawStep>, Option<RawDecision>)>;

    let rows: ProjectRows = self
      .conn
      .call(move |conn| {
        let session: Option<RawSession> = conn
          .query_row(
            &format!(
              "SELECT {SESSION_COLUMNS} FROM sessions
               WHERE (?1 IS NULL OR project = ?1)
               ORDER BY started_at DESC, id DESC
               LIMIT 1"
            ),
            rusqlite::params![project],
            RawSession::from_row,
          )
          .optional()?;

        let Some(session) = session else {
          return Ok(None);
        };

        let feature = match &session.feature_name {
          Some(name) => conn
            .query_row(
              &format!(
                "SELECT {FEATURE_COLUMNS} FROM features
                 WHERE feature_name = ?1"
              ),
              rusqlite::params![name],
              RawFeature::from_row,
            )
            .optional()?,
          None => None,
        };

        // Newest first; the recall view re-orders for display.
        let mut stmt = conn.prepare(&format!(
          "SELECT {STEP_COLUMNS} FROM steps
           WHERE session_id = ?1
           ORDER BY step_number DESC
           LIMIT ?2"
        ))?;
        let steps = stmt
          .query_map(
            rusqlite::params![session.session_id, step_limit],
            RawStep::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let decision: Option<RawDecision> = conn
          .query_row(
            &format!(
              "SELECT {DECISION_COLUMNS} FROM decisions
               WHERE session_id = ?1
               ORDER BY timestamp DESC, id DESC
               LIMIT 1"
            ),
            rusqlite::params![session.session_id],
            RawDecision::from_row,
          )
          .optional()?;

        Ok(Some((session, feature, steps, decision)))
      })
      .await?;

    let Some((raw_session, raw_feature, raw_steps, raw_decision)) = rows
    else {
      return Ok(None);
    };

    let session = raw_session.into_session()?;
    let feature = raw_feature.map(RawFeature::into_feature).transpose()?;
    let steps = raw_steps
      .into_iter()
      .map(RawStep::into_step)
      .collect::<Result<Vec<_>>>()?;
    let decision =
      raw_decision.map(RawDecision::into_decision).transpose()?;

    Ok(Some(RecallView::Project(ProjectRecall::derive(
      session, feature, steps, decision,
    ))))
  }

  async fn journey_summary(
    &self,
    project: Option<&str>,
    days: i64,
  ) -> Result<JourneySummary> {
    let project = project.map(str::to_owned);
    let cutoff = now_ms() - days * 86_400_000;
    let result_project = project.clone();

    let summary = self
      .conn
      .call(move |conn| {
        let sessions = conn.query_row(
          "SELECT COUNT(*),
                  COUNT(CASE WHEN status = 'completed' THEN 1 END),
                  COALESCE(SUM(total_steps), 0),
                  COALESCE(SUM(total_agents_spawned), 0)
           FROM sessions
           WHERE started_at > ?1 AND (?2 IS NULL OR project = ?2)",
          rusqlite::params![cutoff, project],
          |row| {
            Ok(SessionTotals {
              total:        row.get(0)?,
              completed:    row.get(1)?,
              total_steps:  row.get(2)?,
              total_agents: row.get(3)?,
            })
          },
        )?;

        let features = conn.query_row(
          "SELECT COUNT(*),
                  COUNT(CASE WHEN status = 'completed' THEN 1 END),
                  AVG(current_stage)
           FROM features
           WHERE created_at > ?1 AND (?2 IS NULL OR project = ?2)",
          rusqlite::params![cutoff, project],
          |row| {
            Ok(FeatureTotals {
              total:         row.get(0)?,
              completed:     row.get(1)?,
              average_stage: row.get(2)?,
            })
          },
        )?;

        let mut stmt = conn.prepare(
          "SELECT COALESCE(s.agent_name, '(unnamed)'), COUNT(*) AS count
           FROM steps s
           JOIN sessions sess ON sess.session_id = s.session_id
           WHERE s.step_type = ?3
             AND s.timestamp > ?1
             AND (?2 IS NULL OR sess.project = ?2)
           GROUP BY s.agent_name
           ORDER BY count DESC, s.agent_name ASC",
        )?;
        let agent_usage = stmt
          .query_map(
            rusqlite::params![cutoff, project, STEP_TYPE_AGENT_SPAWN],
            |row| {
              Ok(AgentUsage { agent_name: row.get(0)?, count: row.get(1)? })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT fc.change_type, COUNT(*)
           FROM file_changes fc
           JOIN sessions sess ON sess.session_id = fc.session_id
           WHERE fc.timestamp > ?1 AND (?2 IS NULL OR sess.project = ?2)
           GROUP BY fc.change_type",
        )?;
        let file_changes = stmt
          .query_map(rusqlite::params![cutoff, project], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
          })?
          .collect::<rusqlite::Result<std::collections::BTreeMap<_, _>>>()?;

        let mut stmt = conn.prepare(
          "SELECT d.question, d.choice, d.decision_type
           FROM decisions d
           JOIN sessions sess ON sess.session_id = d.session_id
           WHERE d.timestamp > ?1 AND (?2 IS NULL OR sess.project = ?2)
           ORDER BY d.timestamp DESC, d.id DESC
           LIMIT ?3",
        )?;
        let recent_decisions = stmt
          .query_map(
            rusqlite::params![cutoff, project, SUMMARY_DECISION_LIMIT],
            |row| {
              Ok(DecisionDigest {
                question:      row.get(0)?,
                choice:        row.get(1)?,
                decision_type: row.get(2)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(JourneySummary {
          period_days: days,
          project: None, // filled in below, outside the closure
          sessions,
          features,
          agent_usage,
          file_changes,
          recent_decisions,
        })
      })
      .await?;

    Ok(JourneySummary { project: result_project, ..summary })
  }

  // ── Search ────────────────────────────────────────────────────────────────

  async fn search_steps(&self, query: &str, limit: usize) -> Result<Vec<Step>> {
    let query = query.to_owned();
    let limit = limit as i64;

    let raws: Vec<RawStep> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT s.id, s.session_id, s.step_number, s.step_type,
                  s.timestamp, s.agent_name, s.agent_model, s.pipeline_stage,
                  s.action, s.target, s.result, s.files_created,
                  s.files_modified, s.files_deleted, s.context
           FROM steps s
           JOIN steps_fts fts ON fts.rowid = s.id
           WHERE steps_fts MATCH ?1
           ORDER BY s.timestamp DESC, s.id DESC
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![query, limit], RawStep::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStep::into_step).collect()
  }

  async fn search_decisions(
    &self,
    query: &str,
    limit: usize,
  ) -> Result<Vec<Decision>> {
    let query = query.to_owned();
    let limit = limit as i64;

    let raws: Vec<RawDecision> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT d.id, d.session_id, d.step_id, d.feature_name,
                  d.timestamp, d.decision_type, d.question, d.choice,
                  d.alternatives, d.rationale, d.impact
           FROM decisions d
           JOIN decisions_fts fts ON fts.rowid = d.id
           WHERE decisions_fts MATCH ?1
           ORDER BY d.timestamp DESC, d.id DESC
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![query, limit], RawDecision::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDecision::into_decision).collect()
  }
}
