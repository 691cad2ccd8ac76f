//! cache_generations tool implementation.
//!
//! Lists every cache generation in storage.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{CacheDb, GenerationInfo};

use crate::tools::json_result;

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    /// Name of the generation this server serves from.
    pub current: String,
    /// Generations in storage, oldest first.
    pub generations: Vec<GenerationInfo>,
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl(cache: &CacheDb, current: &str) -> Result<CallToolResult, McpError> {
    let generations = cache.list_generations().await?;
    json_result(&CacheGenerationsOutput { current: current.to_string(), generations })
}
