//! Narrow trait boundaries for the out-of-scope collaborators (MCP/RPC tool
//! façade, CLI, template rendering, shared-rules submodule, structure
//! scaffolding) to call into the core through, mirroring the corpus's
//! layering of `core/` beneath `commands/`/`mcp/` — the core depends on
//! nothing above these traits.

use async_trait::async_trait;

use crate::core::error::Result;
use crate::optimizer::{OptimizationResult, Strategy};

#[async_trait]
pub trait BankOperations {
    async fn write(&self, file: &str, content: &[u8], expected_hash: Option<&str>) -> Result<(u64, String)>;
    async fn read(&self, file: &str) -> Result<Vec<u8>>;
    async fn delete(&self, file: &str) -> Result<()>;
    async fn list(&self) -> Vec<String>;
}

#[async_trait]
pub trait QueryOperations {
    async fn score(&self, query: &str) -> Result<Vec<(String, f64)>>;
    async fn optimize(
        &self,
        query: &str,
        token_budget: u64,
        strategy: Strategy,
        mandatory_files: &[String],
    ) -> Result<OptimizationResult>;
}

#[async_trait]
pub trait RefactorOperations {
    async fn suggest(&self) -> Result<Vec<crate::planners::Suggestion>>;
    async fn approve(&self, suggestion_id: &str) -> Result<()>;
    async fn apply(&self, suggestion_id: &str) -> Result<()>;
    async fn rollback(&self, suggestion_id: &str) -> Result<()>;
}
