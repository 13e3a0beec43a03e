//! Extension seams for collaborators that live outside the core.

use super::context::ToolContext;
use super::result::{FetchedPage, ImageArtifact, SearchResult};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Platform-specific tool registered at startup (chat history readers,
/// user/channel lookups). Its output reaches the model unchanged.
#[async_trait]
pub trait PlatformTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for the arguments
    fn parameters(&self) -> Value;

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value>;

    /// Platform tools rendered back to the user when the model is silent
    fn is_informational(&self) -> bool {
        false
    }
}

/// Parameters for one image generation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seed: Option<i64>,
    pub workflow: Option<String>,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: ImageRequest) -> Result<ImageArtifact>;
}

/// Outbound web access used by `web_search`, `fetch_webpage` and
/// `summarize_website`
#[async_trait]
pub trait WebClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;

    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}
