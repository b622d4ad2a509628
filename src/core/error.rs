//! Unified error type for the memory bank engine
//!
//! Every failure mode surfaced by the file layer, index, graph, scoring,
//! optimizer, duplication detector, planners, executor, and learning store
//! funnels through `BankError`. Each variant carries the fields needed to
//! render a one-sentence message and, where useful, a hint naming the next
//! step a caller should take.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for all memory bank operations.
#[derive(Error, Debug)]
pub enum BankError {
    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Invalid { message: String },

    /// A path resolved outside the bank root.
    #[error("path escapes bank root: {path}")]
    PathEscape { path: PathBuf },

    /// A write or read observed a hash mismatch, or a write contained merge markers.
    #[error("conflict on {file}: {reason}")]
    Conflict { file: String, reason: ConflictReason },

    /// A per-path lock could not be acquired within the configured timeout.
    #[error("timed out waiting for lock on {file} after {timeout_ms}ms")]
    LockTimeout { file: String, timeout_ms: u64 },

    /// The global rate limiter could not admit the operation in time.
    #[error("rate limited: {operation} exceeded {limit_per_sec}/s")]
    RateLimited { operation: String, limit_per_sec: u32 },

    /// A referenced file, version, or suggestion does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// A suggestion or snapshot is no longer applicable to current state.
    #[error("stale {kind}: {reason}")]
    Stale { kind: String, reason: String },

    /// An operation attempted an illegal state transition.
    #[error("invalid state transition for {subject}: {from} -> {to}")]
    InvalidState {
        subject: String,
        from: String,
        to: String,
    },

    /// The metadata index's integrity tag did not match its contents.
    #[error("metadata index corrupted: {message}")]
    IndexCorrupted { message: String },

    /// Post-refactor validation found a problem.
    #[error("validation failed after refactor: {message}")]
    ValidationFailed { message: String },

    /// Anything else, tagged with the subsystem it occurred in.
    #[error("internal error in {context}: {message}")]
    Internal { context: String, message: String },
}

/// Why a write/read was rejected as conflicting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The on-disk hash no longer matches the caller's `expected_hash`.
    HashMismatch,
    /// The content to be written contains unresolved merge markers.
    MergeMarkers,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMismatch => write!(f, "expected_hash no longer matches on-disk content"),
            Self::MergeMarkers => write!(f, "content contains unresolved merge markers"),
        }
    }
}

impl BankError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn path_escape(path: impl Into<PathBuf>) -> Self {
        Self::PathEscape { path: path.into() }
    }

    pub fn conflict(file: impl Into<String>, reason: ConflictReason) -> Self {
        Self::Conflict {
            file: file.into(),
            reason,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn internal(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: message.into(),
        }
    }

    /// The error kind name, stable across variant field changes, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "Invalid",
            Self::PathEscape { .. } => "PathEscape",
            Self::Conflict { .. } => "Conflict",
            Self::LockTimeout { .. } => "LockTimeout",
            Self::RateLimited { .. } => "RateLimited",
            Self::NotFound { .. } => "NotFound",
            Self::Stale { .. } => "Stale",
            Self::InvalidState { .. } => "InvalidState",
            Self::IndexCorrupted { .. } => "IndexCorrupted",
            Self::ValidationFailed { .. } => "ValidationFailed",
            Self::Internal { .. } => "Internal",
        }
    }

    /// True for kinds a caller can retry or resolve without developer intervention.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::RateLimited { .. })
    }

    /// A next-step hint, where one applies. `None` for kinds with no useful suggestion.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Conflict {
                reason: ConflictReason::HashMismatch,
                ..
            } => Some("read the file again to refresh expected_hash, then retry".to_string()),
            Self::Conflict {
                reason: ConflictReason::MergeMarkers,
                ..
            } => Some("resolve the merge markers in the content before writing".to_string()),
            Self::LockTimeout { .. } => Some("retry after the current writer finishes".to_string()),
            Self::RateLimited { .. } => Some("wait and retry; consider batching writes".to_string()),
            Self::IndexCorrupted { .. } => {
                Some("rebuild the index by rescanning the bank directory".to_string())
            }
            Self::Stale { .. } => {
                Some("re-run the planner to produce a fresh suggestion".to_string())
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for BankError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                what: err.to_string(),
            },
            _ => Self::Internal {
                context: "io".to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for BankError {
    fn from(err: serde_json::Error) -> Self {
        Self::Invalid {
            message: format!("JSON error: {err}"),
        }
    }
}

impl From<toml::de::Error> for BankError {
    fn from(err: toml::de::Error) -> Self {
        Self::Invalid {
            message: format!("TOML error: {err}"),
        }
    }
}

impl From<toml::ser::Error> for BankError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Internal {
            context: "toml-serialize".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, BankError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_identifier() {
        let err = BankError::not_found("memory-bank/foo.md");
        assert_eq!(err.kind(), "NotFound");
    }

    #[test]
    fn conflict_hint_mentions_expected_hash() {
        let err = BankError::conflict("foo.md", ConflictReason::HashMismatch);
        assert!(err.hint().unwrap().contains("expected_hash"));
    }

    #[test]
    fn transient_kinds_are_marked() {
        assert!(BankError::LockTimeout {
            file: "foo.md".into(),
            timeout_ms: 5000
        }
        .is_transient());
        assert!(!BankError::invalid("bad").is_transient());
    }
}
