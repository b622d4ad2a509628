//! Feedback record model (C13).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::planners::suggestion::SuggestionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Accepted,
    Rejected,
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub suggestion_id: String,
    pub suggestion_type: SuggestionType,
    pub outcome: Outcome,
    pub conditions: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        suggestion_id: impl Into<String>,
        suggestion_type: SuggestionType,
        outcome: Outcome,
        conditions: HashMap<String, String>,
    ) -> Self {
        Self {
            suggestion_id: suggestion_id.into(),
            suggestion_type,
            outcome,
            conditions,
            timestamp: Utc::now(),
        }
    }
}
