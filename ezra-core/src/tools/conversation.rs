//! Conversation tools: channel history and explicit replies.

use crate::knowledge::KnowledgeStore;
use crate::tools::args::{HistoryArgs, SendMessageArgs};
use crate::tools::context::ToolContext;
use crate::tools::result::{ToolData, ToolResult};
use anyhow::Result;
use serde_json::json;

const DEFAULT_HISTORY_LIMIT: usize = 20;

pub async fn get_conversation_history(
    store: &dyn KnowledgeStore,
    ctx: &ToolContext,
    args: HistoryArgs,
) -> Result<ToolResult> {
    let channel_id = ctx.channel_or_current(args.channel_id.as_deref());
    if channel_id.trim().is_empty() {
        return Ok(ToolResult::invalid("channel_id is required"));
    }
    let limit = args.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);

    let messages = store.get_conversation_history(channel_id, limit).await?;
    Ok(
        ToolResult::ok(format!("Retrieved {} messages", messages.len())).with_data(
            ToolData::Raw(json!({
                "channel_id": channel_id,
                "messages": messages,
            })),
        ),
    )
}

/// The text becomes the turn's reply when nothing else produced one
pub fn send_message(args: SendMessageArgs) -> ToolResult {
    let text = args.message.trim();
    if text.is_empty() {
        return ToolResult::invalid("message is required");
    }
    ToolResult::ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{NewMessage, Role, SqliteKnowledgeStore};

    #[tokio::test]
    async fn history_defaults_to_current_channel() -> Result<()> {
        let store = SqliteKnowledgeStore::open_in_memory()?;
        for (text, role) in [("hi there", Role::User), ("hello!", Role::Agent)] {
            store
                .log_message(NewMessage::new("Ezra", "alice", "general", text, role, "web"))
                .await?;
        }

        let ctx = ToolContext::new("Ezra", "alice", "general", "web");
        let result = get_conversation_history(&store, &ctx, HistoryArgs::default()).await?;
        assert_eq!(result.message, "Retrieved 2 messages");
        match result.data {
            Some(ToolData::Raw(data)) => {
                assert_eq!(data["messages"][0]["content"], "hi there");
                assert_eq!(data["channel_id"], "general");
            }
            other => panic!("unexpected data: {other:?}"),
        }

        let no_channel = ToolContext::new("Ezra", "alice", "", "web");
        let rejected = get_conversation_history(&store, &no_channel, HistoryArgs::default()).await?;
        assert_eq!(rejected.error_text(), "channel_id is required");
        Ok(())
    }

    #[test]
    fn send_message_carries_the_text() {
        let sent = send_message(SendMessageArgs { message: " On it. ".into() });
        assert!(sent.success);
        assert_eq!(sent.message, "On it.");
        assert!(!send_message(SendMessageArgs::default()).success);
    }
}
