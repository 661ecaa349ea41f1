//! Integration tests for `SqliteStore` against an in-memory database.

use uuid::Uuid;
use wayline_core::{
  change::NewFileChange,
  decision::NewDecision,
  feature::{STATUS_COMPLETED, STATUS_IN_PROGRESS, Stage, UpsertFeature},
  recall::RecallView,
  session::{NewSession, SessionStatus},
  step::{NewStep, STEP_TYPE_AGENT_SPAWN},
  store::JourneyStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_session(project: &str, feature: Option<&str>) -> NewSession {
  let mut input = NewSession::new(project);
  input.feature_name = feature.map(str::to_owned);
  input
}

fn agent_step(session_id: Uuid, agent: &str, action: &str) -> NewStep {
  let mut input = NewStep::new(session_id, STEP_TYPE_AGENT_SPAWN, action);
  input.agent_name = Some(agent.to_owned());
  input
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_and_get_session() {
  let s = store().await;

  let session = s.start_session(new_session("atlas", None)).await.unwrap();
  assert_eq!(session.status, SessionStatus::Active);
  assert_eq!(session.total_steps, 0);

  let fetched = s.get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(fetched.session_id, session.session_id);
  assert_eq!(fetched.project, "atlas");
  assert_eq!(fetched.ended_at, None);
}

#[tokio::test]
async fn get_session_missing_returns_none() {
  let s = store().await;
  let result = s.get_session(Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn active_session_latest_wins() {
  let s = store().await;
  s.start_session(new_session("atlas", None)).await.unwrap();
  let second = s.start_session(new_session("atlas", None)).await.unwrap();

  let active = s.get_active_session(Some("atlas")).await.unwrap().unwrap();
  assert_eq!(active.session_id, second.session_id);
}

#[tokio::test]
async fn active_session_filters_by_project() {
  let s = store().await;
  let atlas = s.start_session(new_session("atlas", None)).await.unwrap();
  s.start_session(new_session("boreas", None)).await.unwrap();

  let active = s.get_active_session(Some("atlas")).await.unwrap().unwrap();
  assert_eq!(active.session_id, atlas.session_id);

  assert!(s.get_active_session(Some("ghost")).await.unwrap().is_none());
}

#[tokio::test]
async fn ended_session_is_not_active() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();
  s.end_session(session.session_id, None, SessionStatus::Completed)
    .await
    .unwrap();

  assert!(s.get_active_session(Some("atlas")).await.unwrap().is_none());
}

#[tokio::test]
async fn end_session_snapshots_counts() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();
  let id = session.session_id;

  s.record_step(agent_step(id, "athena", "draft PRD"))
    .await
    .unwrap();
  s.record_step(agent_step(id, "ares", "implement handler"))
    .await
    .unwrap();
  s.record_step(NewStep::new(id, "command", "run tests"))
    .await
    .unwrap();

  let ended = s
    .end_session(id, Some("shipped".into()), SessionStatus::Completed)
    .await
    .unwrap();

  assert_eq!(ended.status, SessionStatus::Completed);
  assert_eq!(ended.summary.as_deref(), Some("shipped"));
  assert!(ended.ended_at.is_some());
  assert_eq!(ended.total_steps, 3);
  assert_eq!(ended.total_agents_spawned, 2);
}

#[tokio::test]
async fn end_session_with_zero_steps_records_zero_counts() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();

  let ended = s
    .end_session(session.session_id, None, SessionStatus::Completed)
    .await
    .unwrap();

  assert_eq!(ended.total_steps, 0);
  assert_eq!(ended.total_agents_spawned, 0);
}

#[tokio::test]
async fn end_session_twice_errors_and_keeps_counts() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();
  let id = session.session_id;

  s.record_step(NewStep::new(id, "command", "one")).await.unwrap();
  s.end_session(id, None, SessionStatus::Completed).await.unwrap();

  // Steps recorded after the end do not change the stamped counts.
  s.record_step(NewStep::new(id, "command", "two")).await.unwrap();

  let err = s
    .end_session(id, None, SessionStatus::Completed)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(wayline_core::Error::SessionAlreadyEnded(_))
  ));

  let fetched = s.get_session(id).await.unwrap().unwrap();
  assert_eq!(fetched.total_steps, 1);
}

#[tokio::test]
async fn end_session_missing_errors() {
  let s = store().await;
  let err = s
    .end_session(Uuid::new_v4(), None, SessionStatus::Completed)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(wayline_core::Error::SessionNotFound(_))
  ));
}

#[tokio::test]
async fn end_session_abandoned_status() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();

  let ended = s
    .end_session(session.session_id, None, SessionStatus::Abandoned)
    .await
    .unwrap();
  assert_eq!(ended.status, SessionStatus::Abandoned);
}

#[tokio::test]
async fn recent_sessions_filters_by_project() {
  let s = store().await;
  s.start_session(new_session("atlas", None)).await.unwrap();
  s.start_session(new_session("atlas", None)).await.unwrap();
  s.start_session(new_session("boreas", None)).await.unwrap();

  let atlas = s.recent_sessions(Some("atlas"), 7, 20).await.unwrap();
  assert_eq!(atlas.len(), 2);

  let all = s.recent_sessions(None, 7, 20).await.unwrap();
  assert_eq!(all.len(), 3);

  let none = s.recent_sessions(Some("ghost"), 7, 20).await.unwrap();
  assert!(none.is_empty());
}

// ─── Steps ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn step_numbers_are_contiguous_from_one() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();
  let id = session.session_id;

  for i in 1..=4 {
    let step = s
      .record_step(NewStep::new(id, "command", format!("action {i}")))
      .await
      .unwrap();
    assert_eq!(step.step_number, i);
  }

  let steps = s.session_steps(id).await.unwrap();
  let numbers: Vec<i64> = steps.iter().map(|st| st.step_number).collect();
  assert_eq!(numbers, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn step_numbers_are_independent_per_session() {
  let s = store().await;
  let a = s.start_session(new_session("atlas", None)).await.unwrap();
  let b = s.start_session(new_session("boreas", None)).await.unwrap();

  // Interleave writes across the two sessions.
  s.record_step(NewStep::new(a.session_id, "command", "a1")).await.unwrap();
  s.record_step(NewStep::new(b.session_id, "command", "b1")).await.unwrap();
  s.record_step(NewStep::new(a.session_id, "command", "a2")).await.unwrap();
  s.record_step(NewStep::new(b.session_id, "command", "b2")).await.unwrap();
  s.record_step(NewStep::new(a.session_id, "command", "a3")).await.unwrap();

  let a_numbers: Vec<i64> = s
    .session_steps(a.session_id)
    .await
    .unwrap()
    .iter()
    .map(|st| st.step_number)
    .collect();
  let b_numbers: Vec<i64> = s
    .session_steps(b.session_id)
    .await
    .unwrap()
    .iter()
    .map(|st| st.step_number)
    .collect();

  assert_eq!(a_numbers, vec![1, 2, 3]);
  assert_eq!(b_numbers, vec![1, 2]);
}

#[tokio::test]
async fn step_file_lists_round_trip_in_order() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();

  let mut input = NewStep::new(session.session_id, "file_modify", "edit");
  input.files_modified = Some(vec!["a.go".into(), "b.go".into()]);
  // Duplicates and ordering must survive untouched.
  input.files_created = Some(vec!["z.rs".into(), "a.rs".into(), "z.rs".into()]);
  s.record_step(input).await.unwrap();

  let steps = s.session_steps(session.session_id).await.unwrap();
  assert_eq!(
    steps[0].files_modified.as_deref(),
    Some(["a.go".to_owned(), "b.go".to_owned()].as_slice())
  );
  assert_eq!(
    steps[0].files_created.as_deref(),
    Some(["z.rs".to_owned(), "a.rs".to_owned(), "z.rs".to_owned()].as_slice())
  );
  assert_eq!(steps[0].files_deleted, None);
}

#[tokio::test]
async fn record_step_for_missing_session_errors() {
  let s = store().await;
  let err = s
    .record_step(NewStep::new(Uuid::new_v4(), "command", "nope"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(wayline_core::Error::SessionNotFound(_))
  ));
}

// ─── Features ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_feature_with_defaults() {
  let s = store().await;

  let feature = s
    .upsert_feature(UpsertFeature::new("auth", "atlas"))
    .await
    .unwrap();

  assert_eq!(feature.current_stage, Stage::default());
  assert_eq!(feature.status, STATUS_IN_PROGRESS);
  assert_eq!(feature.description, None);
  assert!(feature.stages_completed.iter().all(Option::is_none));
}

#[tokio::test]
async fn upsert_updates_only_supplied_fields() {
  let s = store().await;

  let mut input = UpsertFeature::new("auth", "atlas");
  input.description = Some("token refresh".into());
  let created = s.upsert_feature(input).await.unwrap();

  let mut update = UpsertFeature::new("auth", "atlas");
  update.status = Some(STATUS_COMPLETED.to_owned());
  let updated = s.upsert_feature(update).await.unwrap();

  assert_eq!(updated.id, created.id);
  assert_eq!(updated.status, STATUS_COMPLETED);
  // Description survives an update that does not mention it.
  assert_eq!(updated.description.as_deref(), Some("token refresh"));
  assert!(updated.updated_at >= created.updated_at);
}

#[tokio::test]
async fn upsert_with_stage_stamps_completion_slot() {
  let s = store().await;
  s.upsert_feature(UpsertFeature::new("auth", "atlas")).await.unwrap();

  let mut update = UpsertFeature::new("auth", "atlas");
  update.current_stage = Some(Stage::new(2).unwrap());
  let updated = s.upsert_feature(update).await.unwrap();

  assert_eq!(updated.current_stage, Stage::new(2).unwrap());
  assert!(updated.stages_completed[2].is_some());
  assert!(updated.stages_completed[0].is_none());
}

#[tokio::test]
async fn mark_stage_complete_stamps_only_that_stage() {
  let s = store().await;
  s.upsert_feature(UpsertFeature::new("auth", "atlas")).await.unwrap();

  let feature = s
    .mark_stage_complete("auth", Stage::new(3).unwrap())
    .await
    .unwrap();

  assert_eq!(feature.current_stage, Stage::new(3).unwrap());
  assert!(feature.stages_completed[3].is_some());
  assert!(feature.stages_completed[0].is_none());
}

#[tokio::test]
async fn mark_stage_complete_unknown_feature_errors() {
  let s = store().await;
  let err = s
    .mark_stage_complete("ghost", Stage::new(1).unwrap())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(wayline_core::Error::FeatureNotFound(_))
  ));
}

#[tokio::test]
async fn get_feature_missing_returns_none() {
  let s = store().await;
  assert!(s.get_feature("ghost").await.unwrap().is_none());
}

// ─── File changes ────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_and_list_file_changes() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();

  let mut input =
    NewFileChange::new(session.session_id, "src/auth.rs", "modified");
  input.lines_added = Some(12);
  input.lines_removed = Some(3);
  let change = s.record_file_change(input).await.unwrap();
  assert_eq!(change.file_path, "src/auth.rs");

  let mut rename =
    NewFileChange::new(session.session_id, "src/token.rs", "renamed");
  rename.old_path = Some("src/jwt.rs".into());
  s.record_file_change(rename).await.unwrap();

  let changes = s.recent_file_changes(7, 50).await.unwrap();
  assert_eq!(changes.len(), 2);
  // Newest first.
  assert_eq!(changes[0].change_type, "renamed");
  assert_eq!(changes[0].old_path.as_deref(), Some("src/jwt.rs"));
}

#[tokio::test]
async fn record_file_change_missing_session_errors() {
  let s = store().await;
  let err = s
    .record_file_change(NewFileChange::new(Uuid::new_v4(), "a.rs", "created"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(wayline_core::Error::SessionNotFound(_))
  ));
}

// ─── Decisions ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_decision_defaults_and_round_trip() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();
  s.upsert_feature(UpsertFeature::new("auth", "atlas")).await.unwrap();

  let mut input = NewDecision::new(
    session.session_id,
    "Which token format?",
    "JWT",
  );
  input.feature_name = Some("auth".into());
  input.alternatives = Some(vec!["PASETO".into(), "opaque".into()]);
  input.rationale = Some("library support".into());
  let decision = s.record_decision(input).await.unwrap();

  assert_eq!(decision.decision_type, "implementation");

  let decisions = s.feature_decisions("auth").await.unwrap();
  assert_eq!(decisions.len(), 1);
  assert_eq!(
    decisions[0].alternatives.as_deref(),
    Some(["PASETO".to_owned(), "opaque".to_owned()].as_slice())
  );
}

#[tokio::test]
async fn record_decision_unknown_feature_errors() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();

  let mut input = NewDecision::new(session.session_id, "Q?", "A");
  input.feature_name = Some("ghost".into());
  let err = s.record_decision(input).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(wayline_core::Error::FeatureNotFound(_))
  ));
}

// ─── Recall ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn recall_empty_database_returns_none() {
  let s = store().await;
  assert!(s.last_session_info(None, false).await.unwrap().is_none());
  assert!(s.last_session_info(None, true).await.unwrap().is_none());
}

#[tokio::test]
async fn recall_project_mode_annotates_last_session() {
  let s = store().await;

  let mut feature = UpsertFeature::new("auth", "atlas");
  feature.current_stage = Some(Stage::new(3).unwrap());
  s.upsert_feature(feature).await.unwrap();

  let session = s
    .start_session(new_session("atlas", Some("auth")))
    .await
    .unwrap();
  let id = session.session_id;

  for i in 1..=7 {
    s.record_step(agent_step(id, "athena", &format!("action {i}")))
      .await
      .unwrap();
  }
  s.record_decision(NewDecision::new(id, "First?", "no")).await.unwrap();
  s.record_decision(NewDecision::new(id, "Schema?", "FTS5")).await.unwrap();

  let view = s
    .last_session_info(Some("atlas"), false)
    .await
    .unwrap()
    .unwrap();
  let RecallView::Project(recall) = view else {
    panic!("expected project mode");
  };

  assert_eq!(recall.session_id, id);
  assert_eq!(recall.feature_name.as_deref(), Some("auth"));
  assert_eq!(recall.current_stage, Stage::new(3).unwrap());
  assert_eq!(recall.next_stage, Some(Stage::new(4).unwrap()));

  // Five most recent steps, oldest first, agent names capitalized.
  assert_eq!(recall.last_actions.len(), 5);
  assert_eq!(recall.last_actions[0], "Athena: action 3");
  assert_eq!(recall.last_actions[4], "Athena: action 7");

  let decision = recall.last_decision.expect("last decision");
  assert_eq!(decision.question, "Schema?");

  assert_eq!(
    recall.recommendation.as_deref(),
    Some("Continue with Stage 4 (Athena - PM Spec Review)?")
  );
}

#[tokio::test]
async fn recall_project_mode_without_feature() {
  let s = store().await;
  s.start_session(new_session("atlas", None)).await.unwrap();

  let view = s.last_session_info(None, false).await.unwrap().unwrap();
  let RecallView::Project(recall) = view else {
    panic!("expected project mode");
  };

  assert_eq!(recall.current_stage, Stage::default());
  assert_eq!(recall.feature_status, None);
  assert_eq!(recall.recommendation, None);
}

#[tokio::test]
async fn recall_global_mode_lists_recent_sessions() {
  let s = store().await;

  let mut feature = UpsertFeature::new("auth", "atlas");
  feature.current_stage = Some(Stage::new(2).unwrap());
  s.upsert_feature(feature).await.unwrap();

  s.start_session(new_session("atlas", Some("auth"))).await.unwrap();
  s.start_session(new_session("boreas", None)).await.unwrap();

  let view = s.last_session_info(None, true).await.unwrap().unwrap();
  let RecallView::Global { sessions } = view else {
    panic!("expected global mode");
  };

  assert_eq!(sessions.len(), 2);
  // Newest first: boreas has no feature annotation.
  assert_eq!(sessions[0].project, "boreas");
  assert_eq!(sessions[0].current_stage, None);
  assert_eq!(sessions[1].project, "atlas");
  assert_eq!(sessions[1].current_stage, Some(Stage::new(2).unwrap()));
  assert_eq!(sessions[1].feature_status.as_deref(), Some(STATUS_IN_PROGRESS));
}

// ─── Journey summary ─────────────────────────────────────────────────────────

#[tokio::test]
async fn summary_empty_window_is_zeroed() {
  let s = store().await;

  let summary = s.journey_summary(Some("ghost"), 30).await.unwrap();

  assert_eq!(summary.sessions.total, 0);
  assert_eq!(summary.sessions.completed, 0);
  assert_eq!(summary.sessions.total_steps, 0);
  assert_eq!(summary.features.total, 0);
  assert_eq!(summary.features.average_stage, None);
  assert!(summary.agent_usage.is_empty());
  assert!(summary.file_changes.is_empty());
  assert!(summary.recent_decisions.is_empty());
}

#[tokio::test]
async fn summary_aggregates_window() {
  let s = store().await;

  let session = s.start_session(new_session("atlas", None)).await.unwrap();
  let id = session.session_id;

  s.record_step(agent_step(id, "athena", "plan")).await.unwrap();
  s.record_step(agent_step(id, "athena", "review")).await.unwrap();
  s.record_step(agent_step(id, "ares", "build")).await.unwrap();
  s.record_step(NewStep::new(id, "command", "test")).await.unwrap();

  s.record_file_change(NewFileChange::new(id, "a.rs", "created"))
    .await
    .unwrap();
  s.record_file_change(NewFileChange::new(id, "b.rs", "modified"))
    .await
    .unwrap();
  s.record_file_change(NewFileChange::new(id, "c.rs", "modified"))
    .await
    .unwrap();

  s.record_decision(NewDecision::new(id, "Q?", "A")).await.unwrap();

  s.end_session(id, None, SessionStatus::Completed).await.unwrap();

  let mut feature = UpsertFeature::new("auth", "atlas");
  feature.current_stage = Some(Stage::new(4).unwrap());
  s.upsert_feature(feature).await.unwrap();

  let summary = s.journey_summary(Some("atlas"), 30).await.unwrap();

  assert_eq!(summary.sessions.total, 1);
  assert_eq!(summary.sessions.completed, 1);
  assert_eq!(summary.sessions.total_steps, 4);
  assert_eq!(summary.sessions.total_agents, 3);

  assert_eq!(summary.features.total, 1);
  assert_eq!(summary.features.completed, 0);
  assert_eq!(summary.features.average_stage, Some(4.0));

  assert_eq!(summary.agent_usage.len(), 2);
  assert_eq!(summary.agent_usage[0].agent_name, "athena");
  assert_eq!(summary.agent_usage[0].count, 2);

  assert_eq!(summary.file_changes.get("modified"), Some(&2));
  assert_eq!(summary.file_changes.get("created"), Some(&1));

  assert_eq!(summary.recent_decisions.len(), 1);
  assert_eq!(summary.recent_decisions[0].question, "Q?");
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_steps_matches_context_field() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();

  let mut needle = NewStep::new(session.session_id, "command", "run checks");
  needle.context = Some("flaky retry in scheduler".into());
  s.record_step(needle).await.unwrap();
  s.record_step(NewStep::new(session.session_id, "command", "build"))
    .await
    .unwrap();

  let hits = s.search_steps("scheduler", 20).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].action, "run checks");
}

#[tokio::test]
async fn search_steps_absent_token_returns_empty() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();
  s.record_step(NewStep::new(session.session_id, "command", "build"))
    .await
    .unwrap();

  let hits = s.search_steps("nonexistent", 20).await.unwrap();
  assert!(hits.is_empty());
}

#[tokio::test]
async fn search_steps_respects_limit() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();

  for i in 1..=5 {
    s.record_step(NewStep::new(
      session.session_id,
      "command",
      format!("deploy round {i}"),
    ))
    .await
    .unwrap();
  }

  let hits = s.search_steps("deploy", 3).await.unwrap();
  assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn search_decisions_matches_rationale() {
  let s = store().await;
  let session = s.start_session(new_session("atlas", None)).await.unwrap();

  let mut input = NewDecision::new(session.session_id, "Cache layer?", "yes");
  input.rationale = Some("hot path latency".into());
  s.record_decision(input).await.unwrap();
  s.record_decision(NewDecision::new(session.session_id, "Other?", "no"))
    .await
    .unwrap();

  let hits = s.search_decisions("latency", 20).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].question, "Cache layer?");

  assert!(s.search_decisions("absent", 20).await.unwrap().is_empty());
}
