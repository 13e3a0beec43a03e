//! Core and archival memory tools.

use crate::config::constants::store as store_defaults;
use crate::knowledge::{KnowledgeStore, NewArchivalMemory};
use crate::tools::args::{ArchivalInsertArgs, MemoryBlockArgs, SearchArgs};
use crate::tools::context::ToolContext;
use crate::tools::result::{ToolData, ToolResult};
use anyhow::Result;
use serde_json::json;

/// Upsert a named core memory block. Insert and replace share semantics.
pub async fn save_memory_block(
    store: &dyn KnowledgeStore,
    ctx: &ToolContext,
    args: MemoryBlockArgs,
) -> Result<ToolResult> {
    let name = args.name.trim();
    if name.is_empty() || args.content.trim().is_empty() {
        return Ok(ToolResult::invalid("name and content are required"));
    }

    store
        .update_memory_block(&ctx.agent_id, name, &args.content)
        .await?;
    tracing::debug!(agent_id = %ctx.agent_id, block = name, "memory block saved");
    Ok(ToolResult::ok(format!("Memory '{name}' has been saved.")))
}

pub async fn archival_insert(
    store: &dyn KnowledgeStore,
    ctx: &ToolContext,
    args: ArchivalInsertArgs,
) -> Result<ToolResult> {
    let content = args.content.trim();
    if content.is_empty() {
        return Ok(ToolResult::invalid("content is required"));
    }

    // A blank summary is derived from the content by the store.
    let summary = args.summary.unwrap_or_default();
    let tags = args
        .tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();

    store
        .create_archival_memory(
            &ctx.agent_id,
            NewArchivalMemory {
                summary,
                content: content.to_string(),
                tags,
            },
        )
        .await?;
    Ok(ToolResult::ok("Information archived successfully."))
}

pub async fn archival_search(
    store: &dyn KnowledgeStore,
    ctx: &ToolContext,
    args: SearchArgs,
) -> Result<ToolResult> {
    let query = args.query.trim();
    if query.is_empty() {
        return Ok(ToolResult::invalid("query is required"));
    }
    let limit = args.limit.unwrap_or(store_defaults::DEFAULT_SEARCH_LIMIT).max(1);

    let memories = store
        .search_archival_memories(&ctx.agent_id, query, limit)
        .await?;
    let message = format!("Found {} results for '{query}'", memories.len());
    Ok(ToolResult::ok(message).with_data(ToolData::Raw(json!(memories))))
}

pub async fn memory_search(
    store: &dyn KnowledgeStore,
    ctx: &ToolContext,
    args: SearchArgs,
) -> Result<ToolResult> {
    let query = args.query.trim();
    if query.is_empty() {
        return Ok(ToolResult::invalid("query is required"));
    }
    let limit = args.limit.unwrap_or(store_defaults::DEFAULT_SEARCH_LIMIT).max(1);

    let hits = store.search_memory(&ctx.agent_id, query, limit).await?;
    let message = format!("Found {} results for '{query}'", hits.len());
    Ok(ToolResult::ok(message).with_data(ToolData::Raw(json!(hits))))
}
