//! Fact tools and the user-context lookup.

use crate::config::constants::store as store_defaults;
use crate::knowledge::{KnowledgeStore, NewFact, UserContext};
use crate::tools::args::{CreateFactArgs, SearchFactsArgs, UserContextArgs};
use crate::tools::context::ToolContext;
use crate::tools::result::{FactList, ToolData, ToolResult};
use anyhow::Result;
use std::collections::HashSet;

const DEFAULT_FACT_SOURCE: &str = "conversation";
const NAME_CUES: &[&str] = &["name is", "my name", "user's name", "user name", "i'm ", "i am "];

pub async fn create_fact(
    store: &dyn KnowledgeStore,
    ctx: &ToolContext,
    args: CreateFactArgs,
) -> Result<ToolResult> {
    let content = args.content.trim();
    if content.is_empty() {
        return Ok(ToolResult::invalid("content is required"));
    }
    let source = match args.source.trim() {
        "" => DEFAULT_FACT_SOURCE,
        source => source,
    };
    let user_id = ctx.user_or_self(args.user_id.as_deref());

    let mut fact = NewFact::new(&ctx.agent_id, content)
        .with_source(source)
        .about(args.topics.iter().map(|t| t.trim()).filter(|t| !t.is_empty()));
    if !user_id.is_empty() {
        fact = fact.told_by(user_id);
    }
    store.create_fact(fact).await?;

    Ok(ToolResult::ok(format!("Fact stored: {content}")))
}

pub async fn search_facts(store: &dyn KnowledgeStore, args: SearchFactsArgs) -> Result<ToolResult> {
    let topic = args.topic.trim();
    if topic.is_empty() {
        return Ok(ToolResult::invalid("topic is required"));
    }

    let facts = store
        .get_facts_about_topic(topic, store_defaults::TOPIC_FACT_LIMIT)
        .await?;
    let message = format!("Found {} facts about '{topic}'", facts.len());
    Ok(ToolResult::ok(message).with_data(ToolData::FactList(FactList {
        topic: topic.to_string(),
        facts,
    })))
}

pub async fn get_user_context(
    store: &dyn KnowledgeStore,
    ctx: &ToolContext,
    args: UserContextArgs,
) -> Result<ToolResult> {
    let user_id = ctx.user_or_self(args.user_id.as_deref());
    match store.get_user_context(user_id).await {
        Ok(context) => {
            let message = describe_user(&context);
            Ok(ToolResult::ok(message).with_data(ToolData::UserContextPayload(Box::new(context))))
        }
        Err(err) if err.is_not_found() => Ok(ToolResult::ok(NO_USER_INFO)),
        Err(err) => Err(err.into()),
    }
}

pub const NO_USER_INFO: &str = "No information found yet about this user.";

/// Conversational summary handed to the model: name facts first, then the
/// rest, then interests. Topics that are just the user's name are dropped.
pub fn describe_user(context: &UserContext) -> String {
    let mut personal = Vec::new();
    let mut other = Vec::new();
    let mut names = HashSet::new();

    for fact in &context.facts {
        let lower = fact.content.to_lowercase();
        if !NAME_CUES.iter().any(|cue| lower.contains(cue)) {
            other.push(fact.content.as_str());
            continue;
        }
        personal.push(fact.content.as_str());
        if let Some(name) = name_after_cue(&fact.content) {
            names.insert(name);
        }
    }

    let interests: Vec<&str> = context
        .topics
        .iter()
        .map(|topic| topic.name.as_str())
        .filter(|name| !names.contains(&name.to_lowercase()))
        .collect();

    if personal.is_empty() && other.is_empty() && interests.is_empty() {
        return NO_USER_INFO.to_string();
    }

    let mut lines = Vec::new();
    if !personal.is_empty() || !other.is_empty() {
        lines.push("Facts about the user:".to_string());
        lines.extend(personal.iter().chain(other.iter()).map(|fact| format!("- {fact}")));
    }
    if !interests.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Topics of interest:".to_string());
        lines.extend(interests.iter().map(|topic| format!("- {topic}")));
    }
    lines.join("\n")
}

/// First word after "name is" / "user's name ... is", lowercased
fn name_after_cue(content: &str) -> Option<String> {
    let lower = content.to_lowercase();
    let rest = if let Some(index) = lower.find("name is") {
        content.get(index + "name is".len()..)?
    } else if let Some(index) = lower.find("user's name") {
        let start = index + "user's name".len();
        let is_at = lower.get(start..)?.find(" is ")?;
        content.get(start + is_at + " is ".len()..)?
    } else {
        return None;
    };
    rest.split_whitespace()
        .next()
        .map(|word| {
            word.trim_matches(|c: char| ".,!?;: ".contains(c))
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{Fact, SqliteKnowledgeStore, Topic, User};
    use chrono::Utc;

    fn fact(content: &str) -> Fact {
        Fact {
            id: content.into(),
            content: content.into(),
            source: "conversation".into(),
            confidence: 1.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn topic(name: &str) -> Topic {
        Topic {
            id: name.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    fn context(facts: Vec<Fact>, topics: Vec<Topic>) -> UserContext {
        UserContext {
            user: User {
                id: "alice".into(),
                external_id: "alice".into(),
                platform: "web".into(),
                display_name: "Alice".into(),
                preferred_language: String::new(),
                first_seen: Utc::now(),
                last_seen: Utc::now(),
            },
            topics,
            facts,
            message_count: 0,
            last_message: None,
            conversations: 0,
        }
    }

    #[test]
    fn name_topics_are_not_interests() {
        let ctx = context(
            vec![fact("Likes hiking"), fact("The user's name is Alice.")],
            vec![topic("Alice"), topic("Hiking")],
        );
        assert_eq!(
            describe_user(&ctx),
            "Facts about the user:\n- The user's name is Alice.\n- Likes hiking\n\nTopics of interest:\n- Hiking"
        );
        assert_eq!(describe_user(&context(Vec::new(), Vec::new())), NO_USER_INFO);
    }

    #[tokio::test]
    async fn facts_are_searchable_by_topic() -> Result<()> {
        let store = SqliteKnowledgeStore::open_in_memory()?;
        let ctx = ToolContext::new("Ezra", "alice", "c1", "web");
        store.get_or_create_user("alice", "alice", "Alice", "web").await?;

        let stored = create_fact(
            &store,
            &ctx,
            CreateFactArgs {
                content: "Alice keeps bees".into(),
                topics: vec!["Beekeeping".into()],
                ..CreateFactArgs::default()
            },
        )
        .await?;
        assert_eq!(stored.message, "Fact stored: Alice keeps bees");

        let found = search_facts(&store, SearchFactsArgs { topic: "beekeeping".into() }).await?;
        assert_eq!(found.message, "Found 1 facts about 'beekeeping'");

        let described = get_user_context(&store, &ctx, UserContextArgs::default()).await?;
        assert!(described.message.contains("- Alice keeps bees"));
        Ok(())
    }
}
