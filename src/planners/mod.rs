//! Structure, consolidation, split, and reorganization planners (C11).
//!
//! Each sub-planner is pure: it consumes data already owned by the metadata
//! index, dependency graph, and duplication detector, and produces plain
//! `Suggestion` values. Planners never call back into the executor.

pub mod consolidation;
pub mod quality;
pub mod reorg;
pub mod split;
pub mod suggestion;

pub use quality::{HealthGrade, QualityMetrics};
pub use suggestion::{Operation, Suggestion, SuggestionState, SuggestionType};
