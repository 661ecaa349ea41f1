//! SQL schema for the Wayline SQLite store.
//!
//! Executed at connection startup; idempotent thanks to
//! `CREATE ... IF NOT EXISTS`. Future migrations will be gated on the
//! `PRAGMA user_version` number.

/// Full schema DDL.
///
/// Stage-completion timestamps are a fixed enumeration of nine columns;
/// the matching UPDATE statements live in a closed nine-arm match in
/// `store.rs`, so no identifier is ever built from a stage number.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sessions (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id           TEXT NOT NULL UNIQUE,
    project              TEXT NOT NULL,
    feature_name         TEXT,
    initial_request      TEXT,
    started_at           INTEGER NOT NULL,   -- epoch ms
    ended_at             INTEGER,
    status               TEXT NOT NULL DEFAULT 'active',
    summary              TEXT,
    -- Snapshots stamped once by end_session; zero while active.
    total_steps          INTEGER NOT NULL DEFAULT 0,
    total_agents_spawned INTEGER NOT NULL DEFAULT 0
);

-- Steps are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS steps (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id     TEXT NOT NULL REFERENCES sessions(session_id),
    step_number    INTEGER NOT NULL,
    step_type      TEXT NOT NULL,
    timestamp      INTEGER NOT NULL,
    agent_name     TEXT,
    agent_model    TEXT,
    pipeline_stage INTEGER,
    action         TEXT NOT NULL,
    target         TEXT,
    result         TEXT,
    files_created  TEXT,    -- JSON array of paths
    files_modified TEXT,    -- JSON array of paths
    files_deleted  TEXT,    -- JSON array of paths
    context        TEXT,
    UNIQUE (session_id, step_number)
);

CREATE TABLE IF NOT EXISTS features (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    feature_name      TEXT NOT NULL UNIQUE,
    project           TEXT NOT NULL,
    created_at        INTEGER NOT NULL,
    updated_at        INTEGER NOT NULL,
    current_stage     INTEGER NOT NULL DEFAULT 0
                      CHECK (current_stage BETWEEN 0 AND 8),
    status            TEXT NOT NULL DEFAULT 'in_progress',
    description       TEXT,
    stage_0_completed INTEGER,
    stage_1_completed INTEGER,
    stage_2_completed INTEGER,
    stage_3_completed INTEGER,
    stage_4_completed INTEGER,
    stage_5_completed INTEGER,
    stage_6_completed INTEGER,
    stage_7_completed INTEGER,
    stage_8_completed INTEGER
);

-- Append-only, like steps.
CREATE TABLE IF NOT EXISTS file_changes (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id    TEXT NOT NULL REFERENCES sessions(session_id),
    step_id       INTEGER REFERENCES steps(id),
    timestamp     INTEGER NOT NULL,
    file_path     TEXT NOT NULL,
    change_type   TEXT NOT NULL,
    old_path      TEXT,               -- rename source
    description   TEXT,
    lines_added   INTEGER,
    lines_removed INTEGER
);

-- Append-only, like steps.
CREATE TABLE IF NOT EXISTS decisions (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id    TEXT NOT NULL REFERENCES sessions(session_id),
    step_id       INTEGER REFERENCES steps(id),
    feature_name  TEXT REFERENCES features(feature_name),
    timestamp     INTEGER NOT NULL,
    decision_type TEXT NOT NULL DEFAULT 'implementation',
    question      TEXT NOT NULL,
    choice        TEXT NOT NULL,
    alternatives  TEXT,               -- JSON array
    rationale     TEXT,
    impact        TEXT
);

CREATE INDEX IF NOT EXISTS sessions_project_idx ON sessions(project, started_at);
CREATE INDEX IF NOT EXISTS steps_session_idx    ON steps(session_id);
CREATE INDEX IF NOT EXISTS changes_session_idx  ON file_changes(session_id);
CREATE INDEX IF NOT EXISTS decisions_session_idx ON decisions(session_id);
CREATE INDEX IF NOT EXISTS decisions_feature_idx ON decisions(feature_name);

-- Full-text mirrors over the free-text columns. The AFTER INSERT triggers
-- run inside the inserting transaction, so index and base table cannot
-- diverge. The base tables are append-only; no update/delete triggers are
-- needed.
CREATE VIRTUAL TABLE IF NOT EXISTS steps_fts USING fts5(
    action, target, result, context,
    content='steps', content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS steps_ai AFTER INSERT ON steps BEGIN
    INSERT INTO steps_fts(rowid, action, target, result, context)
    VALUES (new.id, new.action, new.target, new.result, new.context);
END;

CREATE VIRTUAL TABLE IF NOT EXISTS decisions_fts USING fts5(
    question, choice, rationale,
    content='decisions', content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS decisions_ai AFTER INSERT ON decisions BEGIN
    INSERT INTO decisions_fts(rowid, question, choice, rationale)
    VALUES (new.id, new.question, new.choice, new.rationale);
END;

PRAGMA user_version = 1;
";
