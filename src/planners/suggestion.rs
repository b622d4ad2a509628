//! Suggestion data model and state machine (C11/C12).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{BankError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionType {
    Consolidate,
    Split,
    Reorganize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionState {
    Proposed,
    PendingApproval,
    Approved,
    Applying,
    Applied,
    Rejected,
    RolledBack,
    Stale,
}

/// One step of a refactoring plan, a closed set dispatched by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    ReplaceSection {
        file: String,
        section: String,
        new_content: String,
    },
    RemoveSection {
        file: String,
        section: String,
    },
    CreateFile {
        file: String,
        content: String,
    },
    MoveFile {
        from: String,
        to: String,
    },
    RenameFile {
        from: String,
        to: String,
    },
    CreateCategory {
        name: String,
        members: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggestion_id: String,
    pub suggestion_type: SuggestionType,
    pub affected_files: Vec<String>,
    pub rationale: String,
    pub confidence: f64,
    pub priority: u32,
    pub operations: Vec<Operation>,
    pub state: SuggestionState,
    /// Hash of each affected file at proposal time, used to detect staleness.
    pub expected_hashes: std::collections::HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Suggestion {
    pub fn new(
        suggestion_type: SuggestionType,
        affected_files: Vec<String>,
        rationale: String,
        confidence: f64,
        priority: u32,
        operations: Vec<Operation>,
        expected_hashes: std::collections::HashMap<String, String>,
    ) -> Self {
        Self {
            suggestion_id: Uuid::new_v4().to_string(),
            suggestion_type,
            affected_files,
            rationale,
            confidence: confidence.clamp(0.0, 1.0),
            priority,
            operations,
            state: SuggestionState::Proposed,
            expected_hashes,
            created_at: Utc::now(),
        }
    }

    /// Advance to `target`, failing with `InvalidState` unless the pair
    /// `(self.state, target)` is one of the legal transitions below.
    pub fn transition(&mut self, target: SuggestionState) -> Result<()> {
        use SuggestionState::*;
        let legal = matches!(
            (self.state, target),
            (Proposed, PendingApproval)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Approved, Applying)
                | (Applying, Applied)
                | (Applying, RolledBack)
                | (Proposed, Stale)
                | (PendingApproval, Stale)
                | (Approved, Stale)
        );
        if !legal {
            return Err(BankError::InvalidState {
                subject: self.suggestion_id.clone(),
                from: format!("{:?}", self.state),
                to: format!("{target:?}"),
            });
        }
        self.state = target;
        Ok(())
    }
}
