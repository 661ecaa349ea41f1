//! The `JourneyStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `wayline-store-sqlite`). Higher layers (`wayline-cli`) depend on this
//! abstraction, not on any concrete backend.
//!
//! Writes flow caller → store; reads fan in store → recall views. Every
//! method is one bounded, synchronous unit of work — at most one storage
//! transaction, no background tasks, no internal retries.

use std::future::Future;

use uuid::Uuid;

use crate::{
  change::{FileChange, NewFileChange},
  decision::{Decision, NewDecision},
  feature::{Feature, Stage, UpsertFeature},
  recall::{JourneySummary, RecallView},
  session::{NewSession, Session, SessionStatus},
  step::{NewStep, Step},
};

/// Default trailing window (days) for session/file-change queries.
pub const DEFAULT_QUERY_DAYS: i64 = 7;

/// Default trailing window (days) for the journey summary.
pub const DEFAULT_SUMMARY_DAYS: i64 = 30;

/// Default result cap for full-text search.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Abstraction over a Wayline journey ledger backend.
///
/// Sessions are created then mutated exactly once (on end); steps, file
/// changes, and decisions are append-only; features are upserted by name.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait JourneyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Create and persist a new session with `status = active` and
  /// `started_at = now`. Multiple active sessions may coexist, even within
  /// one project.
  fn start_session(
    &self,
    input: NewSession,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;

  /// End a session: snapshot its step and agent-spawn counts as of now and
  /// stamp them, together with `ended_at`, `status`, and `summary`, in one
  /// transaction.
  ///
  /// Errors if the session does not exist or has already been ended; the
  /// counts stamped by the first call never change.
  fn end_session(
    &self,
    session_id: Uuid,
    summary: Option<String>,
    status: SessionStatus,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;

  /// Retrieve a session by its public UUID. Returns `None` if not found.
  fn get_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// The most recently started session still `active`, optionally filtered
  /// by project. Latest `started_at` wins.
  fn get_active_session<'a>(
    &'a self,
    project: Option<&'a str>,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + 'a;

  /// Sessions started within the trailing `days` window, newest first.
  fn recent_sessions<'a>(
    &'a self,
    project: Option<&'a str>,
    days: i64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Session>, Self::Error>> + Send + 'a;

  // ── Steps — append-only writes ────────────────────────────────────────

  /// Record a step. The store assigns `timestamp` and the next contiguous
  /// `step_number` for the owning session; assignment and insert share one
  /// immediate transaction so concurrent writers cannot duplicate numbers.
  fn record_step(
    &self,
    input: NewStep,
  ) -> impl Future<Output = Result<Step, Self::Error>> + Send + '_;

  /// All steps for a session, ordered by `step_number`.
  fn session_steps(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Step>, Self::Error>> + Send + '_;

  // ── Features ──────────────────────────────────────────────────────────

  /// Insert a feature (with defaults for unset fields) or update only the
  /// supplied fields, always touching `updated_at`. A supplied
  /// `current_stage` also stamps that stage's completion slot.
  fn upsert_feature(
    &self,
    input: UpsertFeature,
  ) -> impl Future<Output = Result<Feature, Self::Error>> + Send + '_;

  /// Set `current_stage = stage` and stamp its completion slot. Errors if
  /// the feature does not exist.
  fn mark_stage_complete<'a>(
    &'a self,
    feature_name: &'a str,
    stage: Stage,
  ) -> impl Future<Output = Result<Feature, Self::Error>> + Send + 'a;

  /// Retrieve a feature by name. Returns `None` if not found.
  fn get_feature<'a>(
    &'a self,
    feature_name: &'a str,
  ) -> impl Future<Output = Result<Option<Feature>, Self::Error>> + Send + 'a;

  // ── File changes & decisions — append-only writes ─────────────────────

  /// Record a file change, optionally linked to the step that produced it.
  fn record_file_change(
    &self,
    input: NewFileChange,
  ) -> impl Future<Output = Result<FileChange, Self::Error>> + Send + '_;

  /// File changes within the trailing `days` window, newest first.
  fn recent_file_changes(
    &self,
    days: i64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<FileChange>, Self::Error>> + Send + '_;

  /// Record a decision.
  fn record_decision(
    &self,
    input: NewDecision,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + '_;

  /// All decisions linked to a feature, oldest first.
  fn feature_decisions<'a>(
    &'a self,
    feature_name: &'a str,
  ) -> impl Future<Output = Result<Vec<Decision>, Self::Error>> + Send + 'a;

  // ── Recall & summary ──────────────────────────────────────────────────

  /// The "what was I doing last" view. Global mode lists recent sessions
  /// across all projects; project mode annotates the single most recent
  /// session with its feature, recent steps, and last decision.
  ///
  /// Returns `None` — not an error — when no session matches.
  fn last_session_info<'a>(
    &'a self,
    project: Option<&'a str>,
    global_mode: bool,
  ) -> impl Future<Output = Result<Option<RecallView>, Self::Error>> + Send + 'a;

  /// Aggregate counters over the trailing `days` window, optionally
  /// filtered by project. Counts are zeroed, never absent, when nothing
  /// matches.
  fn journey_summary<'a>(
    &'a self,
    project: Option<&'a str>,
    days: i64,
  ) -> impl Future<Output = Result<JourneySummary, Self::Error>> + Send + 'a;

  // ── Search ────────────────────────────────────────────────────────────

  /// Full-text search over step free-text fields (action, target, result,
  /// context), newest first, capped at `limit`.
  fn search_steps<'a>(
    &'a self,
    query: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Step>, Self::Error>> + Send + 'a;

  /// Full-text search over decision free-text fields (question, choice,
  /// rationale), newest first, capped at `limit`.
  fn search_decisions<'a>(
    &'a self,
    query: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Decision>, Self::Error>> + Send + 'a;
}
