//! Command handlers: map parsed arguments onto [`JourneyStore`] calls and
//! emit the resulting records as JSON on stdout.

use std::path::Path;

use serde::Serialize;
use serde_json::json;
use wayline_core::{
  change::NewFileChange,
  decision::NewDecision,
  feature::{Stage, UpsertFeature},
  now_ms,
  session::{NewSession, SessionStatus},
  step::NewStep,
  store::JourneyStore,
};
use wayline_store_sqlite::SqliteStore;

use crate::{
  DecisionArgs, EndStatus, FeatureCommand, FeatureUpsertArgs, FileChangeArgs,
  LastSessionArgs, OutputFormat, QueryCommand, SearchKind, SessionCommand,
  StepArgs, SummaryArgs,
};

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

pub fn init(db_path: &Path) -> anyhow::Result<()> {
  // The schema was applied when the store opened.
  emit(&json!({
    "status": "initialized",
    "path": db_path.display().to_string(),
  }))
}

pub async fn session(
  store: &SqliteStore,
  action: SessionCommand,
) -> anyhow::Result<()> {
  match action {
    SessionCommand::Start { project, feature, request } => {
      let mut input = NewSession::new(project);
      input.feature_name = feature;
      input.initial_request = request;
      emit(&store.start_session(input).await?)
    }
    SessionCommand::End { session_id, summary, status } => {
      let status = match status {
        EndStatus::Completed => SessionStatus::Completed,
        EndStatus::Abandoned => SessionStatus::Abandoned,
      };
      emit(&store.end_session(session_id, summary, status).await?)
    }
    SessionCommand::Active { project } => {
      emit(&store.get_active_session(project.as_deref()).await?)
    }
  }
}

pub async fn step(store: &SqliteStore, args: StepArgs) -> anyhow::Result<()> {
  let mut input = NewStep::new(args.session_id, args.step_type, args.action);
  input.agent_name = args.agent;
  input.agent_model = args.model;
  input.pipeline_stage = args.stage;
  input.target = args.target;
  input.result = args.result;
  input.files_created = args.files_created;
  input.files_modified = args.files_modified;
  input.files_deleted = args.files_deleted;
  input.context = args.context;

  emit(&store.record_step(input).await?)
}

pub async fn feature(
  store: &SqliteStore,
  action: FeatureCommand,
) -> anyhow::Result<()> {
  match action {
    // `create` and `update` share upsert semantics; both spellings exist
    // so call sites read naturally.
    FeatureCommand::Create(args) | FeatureCommand::Update(args) => {
      emit(&store.upsert_feature(upsert_input(args)?).await?)
    }
    FeatureCommand::Get { name } => emit(&store.get_feature(&name).await?),
    FeatureCommand::Stage { name, stage } => {
      let stage = Stage::new(stage)?;
      emit(&store.mark_stage_complete(&name, stage).await?)
    }
  }
}

fn upsert_input(args: FeatureUpsertArgs) -> anyhow::Result<UpsertFeature> {
  let mut input = UpsertFeature::new(args.name, args.project);
  input.current_stage = args.stage.map(Stage::new).transpose()?;
  input.status = args.status;
  input.description = args.description;
  Ok(input)
}

pub async fn file_change(
  store: &SqliteStore,
  args: FileChangeArgs,
) -> anyhow::Result<()> {
  let mut input =
    NewFileChange::new(args.session_id, args.path, args.change_type);
  input.step_id = args.step_id;
  input.old_path = args.old_path;
  input.description = args.description;
  input.lines_added = args.lines_added;
  input.lines_removed = args.lines_removed;

  emit(&store.record_file_change(input).await?)
}

pub async fn decision(
  store: &SqliteStore,
  args: DecisionArgs,
) -> anyhow::Result<()> {
  let mut input = NewDecision::new(args.session_id, args.question, args.choice);
  if let Some(decision_type) = args.decision_type {
    input.decision_type = decision_type;
  }
  input.feature_name = args.feature;
  input.step_id = args.step_id;
  input.alternatives = args.alternatives;
  input.rationale = args.rationale;
  input.impact = args.impact;

  emit(&store.record_decision(input).await?)
}

pub async fn query(
  store: &SqliteStore,
  action: QueryCommand,
) -> anyhow::Result<()> {
  match action {
    QueryCommand::Sessions { project, days, limit } => {
      emit(&store.recent_sessions(project.as_deref(), days, limit).await?)
    }
    QueryCommand::Steps { session_id } => {
      emit(&store.session_steps(session_id).await?)
    }
    QueryCommand::Files { days, limit } => {
      emit(&store.recent_file_changes(days, limit).await?)
    }
    QueryCommand::Decisions { feature_name } => {
      emit(&store.feature_decisions(&feature_name).await?)
    }
    QueryCommand::Search { query, kind, limit } => match kind {
      SearchKind::Steps => emit(&store.search_steps(&query, limit).await?),
      SearchKind::Decisions => {
        emit(&store.search_decisions(&query, limit).await?)
      }
    },
  }
}

pub async fn summary(
  store: &SqliteStore,
  args: SummaryArgs,
) -> anyhow::Result<()> {
  emit(&store.journey_summary(args.project.as_deref(), args.days).await?)
}

pub async fn last_session(
  store: &SqliteStore,
  args: LastSessionArgs,
) -> anyhow::Result<()> {
  let view = store
    .last_session_info(args.project.as_deref(), args.global)
    .await?;

  match args.format {
    OutputFormat::Json => emit(&view),
    OutputFormat::Text => {
      match view {
        Some(view) => println!("{}", view.to_text(now_ms())),
        None => println!("No previous sessions found."),
      }
      Ok(())
    }
  }
}
