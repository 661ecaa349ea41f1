//! Core types and trait definitions for the Wayline journey ledger.
//!
//! Domain records, the [`store::JourneyStore`] trait, and the pure
//! recall/summary derivation live here. Storage and CLI concerns belong to
//! the crates that depend on this one; this crate is deliberately free of
//! both.

pub mod change;
pub mod decision;
pub mod error;
pub mod feature;
pub mod recall;
pub mod session;
pub mod step;
pub mod store;

pub use error::{Error, Result};

/// Epoch milliseconds — the single timestamp representation used throughout
/// the ledger, on disk and in memory.
pub type UnixMillis = i64;

/// The current time as epoch milliseconds.
pub fn now_ms() -> UnixMillis { chrono::Utc::now().timestamp_millis() }
