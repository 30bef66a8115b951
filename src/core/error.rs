//! Error types.
//!
//! Most engine operations degrade to a logged warning and a safe default
//! instead of failing. `BuffError` covers the APIs that report failure
//! explicitly: formula parsing, merge flag decoding, and snapshot decoding.

use crate::modifiers::MergeFlags;

/// Errors returned by the fallible engine APIs.
#[derive(Debug, thiserror::Error)]
pub enum BuffError {
    /// A formula could not be parsed.
    #[error("malformed formula '{formula}': {reason}")]
    Formula {
        /// The formula text.
        formula: String,
        /// What the parser rejected.
        reason: String,
    },

    /// Merge flags combine contradictory duration rules.
    #[error("merge flags {:#05b} combine ADD_DURATION with REFRESH_DURATION", .0.bits())]
    InvalidMergeFlags(MergeFlags),

    /// No factory is registered for a snapshot type tag.
    #[error("unknown type tag '{0}'")]
    UnknownTypeTag(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
