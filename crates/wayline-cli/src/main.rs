//! `wayline` — command-line surface of the journey ledger.
//!
//! Every command is a bounded unit of work: resolve configuration once,
//! open the store, perform one operation, emit a serialized record on
//! stdout. Diagnostics go to stderr with a nonzero exit code.
//!
//! The database path resolves in order: `--db` flag (or `WAYLINE_DB`),
//! the `db_path` key of the TOML config file, then
//! `~/.wayline/journey.db`.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use directories::BaseDirs;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use wayline_core::store::{
  DEFAULT_QUERY_DAYS, DEFAULT_SEARCH_LIMIT, DEFAULT_SUMMARY_DAYS,
};
use wayline_store_sqlite::SqliteStore;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
  name = "wayline",
  version,
  about = "Local journey-tracking ledger for AI-assisted development"
)]
struct Cli {
  /// Path to the SQLite database file.
  #[arg(long, env = "WAYLINE_DB", global = true, value_name = "FILE")]
  db: Option<PathBuf>,

  /// Path to a TOML configuration file.
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create the database file and apply the schema (idempotent).
  Init,
  /// Start, end, or inspect sessions.
  Session {
    #[command(subcommand)]
    action: SessionCommand,
  },
  /// Record a step within a session.
  Step(StepArgs),
  /// Create, update, or inspect features.
  Feature {
    #[command(subcommand)]
    action: FeatureCommand,
  },
  /// Record a file change.
  FileChange(FileChangeArgs),
  /// Record a decision.
  Decision(DecisionArgs),
  /// Query the ledger.
  Query {
    #[command(subcommand)]
    action: QueryCommand,
  },
  /// Aggregate journey summary over a trailing window.
  Summary(SummaryArgs),
  /// Recall what was happening in the most recent session.
  LastSession(LastSessionArgs),
}

#[derive(Subcommand)]
enum SessionCommand {
  /// Start a new session.
  Start {
    project: String,
    /// Feature this session works on.
    #[arg(long)]
    feature: Option<String>,
    /// The request that kicked the session off.
    #[arg(long)]
    request: Option<String>,
  },
  /// End a session and snapshot its step/agent counters.
  End {
    session_id: Uuid,
    #[arg(long)]
    summary: Option<String>,
    #[arg(long, value_enum, default_value_t = EndStatus::Completed)]
    status: EndStatus,
  },
  /// Show the most recent active session.
  Active { project: Option<String> },
}

#[derive(Clone, Copy, ValueEnum)]
enum EndStatus {
  Completed,
  Abandoned,
}

#[derive(Args)]
struct StepArgs {
  session_id: Uuid,
  /// Step type, e.g. agent_spawn, file_modify, decision, command.
  step_type:  String,
  action:     String,

  /// Name of the spawned or acting agent.
  #[arg(long)]
  agent: Option<String>,
  /// Model backing the agent.
  #[arg(long)]
  model: Option<String>,
  /// Pipeline stage this step belongs to.
  #[arg(long)]
  stage: Option<i64>,
  #[arg(long)]
  target: Option<String>,
  #[arg(long)]
  result: Option<String>,
  /// Comma-separated list of created paths.
  #[arg(long, value_delimiter = ',')]
  files_created: Option<Vec<String>>,
  /// Comma-separated list of modified paths.
  #[arg(long, value_delimiter = ',')]
  files_modified: Option<Vec<String>>,
  /// Comma-separated list of deleted paths.
  #[arg(long, value_delimiter = ',')]
  files_deleted: Option<Vec<String>>,
  #[arg(long)]
  context: Option<String>,
}

#[derive(Subcommand)]
enum FeatureCommand {
  /// Create a feature (or update it if the name already exists).
  Create(FeatureUpsertArgs),
  /// Update a feature (or create it if the name is new).
  Update(FeatureUpsertArgs),
  /// Show a feature by name.
  Get { name: String },
  /// Mark a pipeline stage complete.
  Stage { name: String, stage: i64 },
}

#[derive(Args)]
struct FeatureUpsertArgs {
  name:    String,
  project: String,

  /// Current pipeline stage (0-8); also stamps that stage's completion
  /// timestamp on update.
  #[arg(long)]
  stage: Option<i64>,
  #[arg(long)]
  status: Option<String>,
  #[arg(long)]
  description: Option<String>,
}

#[derive(Args)]
struct FileChangeArgs {
  session_id:  Uuid,
  path:        String,
  /// Change type, e.g. created, modified, deleted, renamed.
  change_type: String,

  /// Step that produced this change.
  #[arg(long)]
  step_id: Option<i64>,
  /// Previous path for renames.
  #[arg(long)]
  old_path: Option<String>,
  #[arg(long)]
  description: Option<String>,
  #[arg(long)]
  lines_added: Option<i64>,
  #[arg(long)]
  lines_removed: Option<i64>,
}

#[derive(Args)]
struct DecisionArgs {
  session_id: Uuid,
  question:   String,
  choice:     String,

  /// Decision type (defaults to "implementation").
  #[arg(long = "type")]
  decision_type: Option<String>,
  /// Feature this decision belongs to.
  #[arg(long)]
  feature: Option<String>,
  /// Step that prompted the decision.
  #[arg(long)]
  step_id: Option<i64>,
  /// Comma-separated rejected alternatives.
  #[arg(long, value_delimiter = ',')]
  alternatives: Option<Vec<String>>,
  #[arg(long)]
  rationale: Option<String>,
  #[arg(long)]
  impact: Option<String>,
}

#[derive(Subcommand)]
enum QueryCommand {
  /// Recent sessions, newest first.
  Sessions {
    project: Option<String>,
    #[arg(long, default_value_t = DEFAULT_QUERY_DAYS)]
    days: i64,
    #[arg(long, default_value_t = 20)]
    limit: usize,
  },
  /// All steps of a session, in order.
  Steps { session_id: Uuid },
  /// Recent file changes, newest first.
  Files {
    #[arg(long, default_value_t = DEFAULT_QUERY_DAYS)]
    days: i64,
    #[arg(long, default_value_t = 50)]
    limit: usize,
  },
  /// All decisions recorded against a feature.
  Decisions { feature_name: String },
  /// Full-text search over steps or decisions.
  Search {
    query: String,
    #[arg(long, value_enum, default_value_t = SearchKind::Steps)]
    kind: SearchKind,
    #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    limit: usize,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum SearchKind {
  Steps,
  Decisions,
}

#[derive(Args)]
struct SummaryArgs {
  project: Option<String>,
  #[arg(long, default_value_t = DEFAULT_SUMMARY_DAYS)]
  days: i64,
}

#[derive(Args)]
struct LastSessionArgs {
  project: Option<String>,
  /// List recent sessions across all projects instead.
  #[arg(long)]
  global: bool,
  #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
  format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
  Json,
  Text,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct FileConfig {
  #[serde(default)]
  db_path: Option<PathBuf>,
}

/// Resolve the database path: flag/env first, then config file, then the
/// per-user default.
fn resolve_db_path(cli: &Cli) -> anyhow::Result<PathBuf> {
  if let Some(path) = &cli.db {
    return Ok(path.clone());
  }

  let mut builder = config::Config::builder();
  if let Some(path) = &cli.config {
    builder = builder.add_source(config::File::from(path.clone()));
  } else if let Some(dirs) = BaseDirs::new() {
    let default = dirs.home_dir().join(".wayline").join("config.toml");
    builder = builder.add_source(config::File::from(default).required(false));
  }

  let settings = builder
    .add_source(config::Environment::with_prefix("WAYLINE"))
    .build()
    .context("failed to read configuration")?;
  let file_cfg: FileConfig = settings
    .try_deserialize()
    .context("failed to deserialise configuration")?;

  if let Some(path) = file_cfg.db_path {
    return Ok(expand_tilde(&path));
  }

  let dirs =
    BaseDirs::new().context("cannot determine the home directory")?;
  Ok(dirs.home_dir().join(".wayline").join("journey.db"))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Diagnostics go to stderr so stdout stays clean JSON.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let db_path = resolve_db_path(&cli)?;
  if let Some(parent) = db_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  // Opening applies the schema, so `init` is just an open plus an ack.
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open store at {}", db_path.display()))?;
  tracing::debug!(path = %db_path.display(), "store opened");

  match cli.command {
    Commands::Init => commands::init(&db_path),
    Commands::Session { action } => commands::session(&store, action).await,
    Commands::Step(args) => commands::step(&store, args).await,
    Commands::Feature { action } => commands::feature(&store, action).await,
    Commands::FileChange(args) => commands::file_change(&store, args).await,
    Commands::Decision(args) => commands::decision(&store, args).await,
    Commands::Query { action } => commands::query(&store, action).await,
    Commands::Summary(args) => commands::summary(&store, args).await,
    Commands::LastSession(args) => commands::last_session(&store, args).await,
  }
}
