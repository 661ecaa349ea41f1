//! Error types for `wayline-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  /// Ending a session twice is an error; the counts stamped by the first
  /// `end_session` call are immutable.
  #[error("session {0} is already ended")]
  SessionAlreadyEnded(Uuid),

  #[error("feature not found: {0:?}")]
  FeatureNotFound(String),

  /// Pipeline stages are bounded; out-of-range values are rejected before
  /// any write, never clamped.
  #[error("pipeline stage out of range (expected 0..=8): {0}")]
  StageOutOfRange(i64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
