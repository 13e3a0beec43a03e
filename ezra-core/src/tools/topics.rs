//! Topic graph tools.

use crate::knowledge::{KnowledgeStore, TopicRelation};
use crate::tools::args::{CreateTopicArgs, FindRelatedArgs, LinkTopicsArgs, LinkUserTopicArgs};
use crate::tools::context::ToolContext;
use crate::tools::result::{ToolData, ToolResult};
use anyhow::Result;
use serde_json::json;

const DEFAULT_RELATED_DEPTH: usize = 2;
const DEFAULT_INTEREST_STRENGTH: f64 = 1.0;

pub async fn create_topic(store: &dyn KnowledgeStore, args: CreateTopicArgs) -> Result<ToolResult> {
    let name = args.name.trim();
    if name.is_empty() {
        return Ok(ToolResult::invalid("name is required"));
    }

    let topic = store.create_topic(name, args.description.trim()).await?;
    Ok(ToolResult::ok(format!("Topic '{name}' created.")).with_data(ToolData::Raw(json!(topic))))
}

pub async fn link_topics(store: &dyn KnowledgeStore, args: LinkTopicsArgs) -> Result<ToolResult> {
    let (from, to) = (args.topic1.trim(), args.topic2.trim());
    if from.is_empty() || to.is_empty() {
        return Ok(ToolResult::invalid("topic1 and topic2 are required"));
    }

    let relation = TopicRelation::parse_or_default(&args.relationship);
    store.link_topics(from, to, relation).await?;
    Ok(ToolResult::ok(format!(
        "Linked '{from}' to '{to}' with relationship '{}'",
        relation.as_str()
    )))
}

pub async fn find_related_topics(
    store: &dyn KnowledgeStore,
    args: FindRelatedArgs,
) -> Result<ToolResult> {
    let topic = args.topic.trim();
    if topic.is_empty() {
        return Ok(ToolResult::invalid("topic is required"));
    }

    let depth = args.depth.unwrap_or(DEFAULT_RELATED_DEPTH);
    let related = store.get_related_topics(topic, depth).await?;
    Ok(ToolResult::ok(format!("Found {} related topics", related.len()))
        .with_data(ToolData::Raw(json!(related))))
}

pub async fn link_user_to_topic(
    store: &dyn KnowledgeStore,
    ctx: &ToolContext,
    args: LinkUserTopicArgs,
) -> Result<ToolResult> {
    let topic = args.topic.trim();
    if topic.is_empty() {
        return Ok(ToolResult::invalid("topic is required"));
    }

    let user_id = ctx.user_or_self(args.user_id.as_deref());
    let strength = store
        .link_user_to_topic(
            user_id,
            topic,
            args.strength.unwrap_or(DEFAULT_INTEREST_STRENGTH),
        )
        .await?;
    tracing::debug!(user_id, topic, strength, "user interest updated");
    Ok(ToolResult::ok(format!("Linked user to topic '{topic}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::SqliteKnowledgeStore;

    #[tokio::test]
    async fn topic_graph_tools() -> Result<()> {
        let store = SqliteKnowledgeStore::open_in_memory()?;

        let created = create_topic(
            &store,
            CreateTopicArgs { name: "Rust".into(), description: "A language".into() },
        )
        .await?;
        assert_eq!(created.message, "Topic 'Rust' created.");

        let linked = link_topics(
            &store,
            LinkTopicsArgs {
                topic1: "Tokio".into(),
                topic2: "Rust".into(),
                relationship: "subtopic_of".into(),
            },
        )
        .await?;
        assert_eq!(linked.message, "Linked 'Tokio' to 'Rust' with relationship 'SUBTOPIC_OF'");

        let related = find_related_topics(
            &store,
            FindRelatedArgs { topic: "rust".into(), depth: None },
        )
        .await?;
        assert_eq!(related.message, "Found 1 related topics");

        let missing = link_topics(&store, LinkTopicsArgs::default()).await?;
        assert_eq!(missing.error_text(), "topic1 and topic2 are required");
        Ok(())
    }
}
