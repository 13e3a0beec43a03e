//! Typed tool arguments.
//!
//! Models emit loosely typed JSON: numbers arrive as strings, lists as
//! comma-separated text, and argument names drift between releases. The
//! deserializers here accept those variants so handlers only ever see the
//! typed shapes below. Emptiness checks stay in the handlers, which own the
//! user-facing error text.

use crate::config::constants::tools;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvocationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MemoryBlockArgs {
    #[serde(default, alias = "label", alias = "block_name")]
    pub name: String,
    #[serde(default, alias = "value")]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArchivalInsertArgs {
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchArgs {
    #[serde(default)]
    pub query: String,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateFactArgs {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub topics: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchFactsArgs {
    #[serde(default, alias = "query")]
    pub topic: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserContextArgs {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateTopicArgs {
    #[serde(default, alias = "topic")]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LinkTopicsArgs {
    #[serde(default, alias = "a", alias = "from")]
    pub topic1: String,
    #[serde(default, alias = "b", alias = "to")]
    pub topic2: String,
    #[serde(default)]
    pub relationship: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FindRelatedArgs {
    #[serde(default, alias = "name")]
    pub topic: String,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub depth: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LinkUserTopicArgs {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub topic: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub strength: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryArgs {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SendMessageArgs {
    #[serde(default, alias = "text", alias = "content")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MimicArgs {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub message_count: Option<usize>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub update: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalyzeStyleArgs {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebSearchArgs {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub original_question: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FetchArgs {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RepoArgs {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GitHubSearchArgs {
    #[serde(default)]
    pub query: String,
    #[serde(default, rename = "type")]
    pub search_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrgReposArgs {
    #[serde(default)]
    pub org: String,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReadFileArgs {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageArgs {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub seed: Option<i64>,
    #[serde(default)]
    pub workflow: Option<String>,
}

/// A parsed tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    CoreMemoryInsert(MemoryBlockArgs),
    CoreMemoryReplace(MemoryBlockArgs),
    ArchivalMemoryInsert(ArchivalInsertArgs),
    ArchivalMemorySearch(SearchArgs),
    MemorySearch(SearchArgs),
    CreateFact(CreateFactArgs),
    SearchFacts(SearchFactsArgs),
    GetUserContext(UserContextArgs),
    CreateTopic(CreateTopicArgs),
    LinkTopics(LinkTopicsArgs),
    FindRelatedTopics(FindRelatedArgs),
    LinkUserToTopic(LinkUserTopicArgs),
    GetConversationHistory(HistoryArgs),
    SendMessage(SendMessageArgs),
    MimicPersonality(MimicArgs),
    RevertPersonality,
    AnalyzeUserStyle(AnalyzeStyleArgs),
    WebSearch(WebSearchArgs),
    FetchWebpage(FetchArgs),
    SummarizeWebsite(FetchArgs),
    GitHubRepoInfo(RepoArgs),
    GitHubSearch(GitHubSearchArgs),
    GitHubListOrgRepos(OrgReposArgs),
    GitHubReadFile(ReadFileArgs),
    GenerateImage(ImageArgs),
    Ignore,
}

impl ToolInvocation {
    /// Parse a builtin tool call. Names outside the builtin catalog return
    /// [`InvocationError::UnknownTool`] so the caller can try platform tools.
    pub fn parse(name: &str, args: Value) -> Result<Self, InvocationError> {
        let args = match args {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };

        let invocation = match name {
            tools::CORE_MEMORY_INSERT => Self::CoreMemoryInsert(decode(name, args)?),
            tools::CORE_MEMORY_REPLACE | tools::UPDATE_CORE_MEMORY => {
                Self::CoreMemoryReplace(decode(name, args)?)
            }
            tools::ARCHIVAL_MEMORY_INSERT => Self::ArchivalMemoryInsert(decode(name, args)?),
            tools::ARCHIVAL_MEMORY_SEARCH => Self::ArchivalMemorySearch(decode(name, args)?),
            tools::MEMORY_SEARCH => Self::MemorySearch(decode(name, args)?),
            tools::CREATE_FACT => Self::CreateFact(decode(name, args)?),
            tools::SEARCH_FACTS => Self::SearchFacts(decode(name, args)?),
            tools::GET_USER_CONTEXT => Self::GetUserContext(decode(name, args)?),
            tools::CREATE_TOPIC => Self::CreateTopic(decode(name, args)?),
            tools::LINK_TOPICS => Self::LinkTopics(decode(name, args)?),
            tools::FIND_RELATED_TOPICS => Self::FindRelatedTopics(decode(name, args)?),
            tools::LINK_USER_TO_TOPIC => Self::LinkUserToTopic(decode(name, args)?),
            tools::GET_CONVERSATION_HISTORY => Self::GetConversationHistory(decode(name, args)?),
            tools::SEND_MESSAGE => Self::SendMessage(decode(name, args)?),
            tools::MIMIC_PERSONALITY => Self::MimicPersonality(decode(name, args)?),
            tools::REVERT_PERSONALITY => Self::RevertPersonality,
            tools::ANALYZE_USER_STYLE => Self::AnalyzeUserStyle(decode(name, args)?),
            tools::WEB_SEARCH => Self::WebSearch(decode(name, args)?),
            tools::FETCH_WEBPAGE => Self::FetchWebpage(decode(name, args)?),
            tools::SUMMARIZE_WEBSITE => Self::SummarizeWebsite(decode(name, args)?),
            tools::GITHUB_REPO_INFO => Self::GitHubRepoInfo(decode(name, args)?),
            tools::GITHUB_SEARCH => Self::GitHubSearch(decode(name, args)?),
            tools::GITHUB_LIST_ORG_REPOS => Self::GitHubListOrgRepos(decode(name, args)?),
            tools::GITHUB_READ_FILE => Self::GitHubReadFile(decode(name, args)?),
            tools::GENERATE_IMAGE => Self::GenerateImage(decode(name, args)?),
            tools::IGNORE => Self::Ignore,
            other => return Err(InvocationError::UnknownTool(other.to_string())),
        };
        Ok(invocation)
    }

    /// Canonical tool name (aliases resolve to their target)
    pub fn name(&self) -> &'static str {
        match self {
            Self::CoreMemoryInsert(_) => tools::CORE_MEMORY_INSERT,
            Self::CoreMemoryReplace(_) => tools::CORE_MEMORY_REPLACE,
            Self::ArchivalMemoryInsert(_) => tools::ARCHIVAL_MEMORY_INSERT,
            Self::ArchivalMemorySearch(_) => tools::ARCHIVAL_MEMORY_SEARCH,
            Self::MemorySearch(_) => tools::MEMORY_SEARCH,
            Self::CreateFact(_) => tools::CREATE_FACT,
            Self::SearchFacts(_) => tools::SEARCH_FACTS,
            Self::GetUserContext(_) => tools::GET_USER_CONTEXT,
            Self::CreateTopic(_) => tools::CREATE_TOPIC,
            Self::LinkTopics(_) => tools::LINK_TOPICS,
            Self::FindRelatedTopics(_) => tools::FIND_RELATED_TOPICS,
            Self::LinkUserToTopic(_) => tools::LINK_USER_TO_TOPIC,
            Self::GetConversationHistory(_) => tools::GET_CONVERSATION_HISTORY,
            Self::SendMessage(_) => tools::SEND_MESSAGE,
            Self::MimicPersonality(_) => tools::MIMIC_PERSONALITY,
            Self::RevertPersonality => tools::REVERT_PERSONALITY,
            Self::AnalyzeUserStyle(_) => tools::ANALYZE_USER_STYLE,
            Self::WebSearch(_) => tools::WEB_SEARCH,
            Self::FetchWebpage(_) => tools::FETCH_WEBPAGE,
            Self::SummarizeWebsite(_) => tools::SUMMARIZE_WEBSITE,
            Self::GitHubRepoInfo(_) => tools::GITHUB_REPO_INFO,
            Self::GitHubSearch(_) => tools::GITHUB_SEARCH,
            Self::GitHubListOrgRepos(_) => tools::GITHUB_LIST_ORG_REPOS,
            Self::GitHubReadFile(_) => tools::GITHUB_READ_FILE,
            Self::GenerateImage(_) => tools::GENERATE_IMAGE,
            Self::Ignore => tools::IGNORE,
        }
    }
}

fn decode<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, InvocationError> {
    serde_json::from_value(args).map_err(|err| InvocationError::InvalidArguments {
        tool: tool.to_string(),
        message: err.to_string(),
    })
}

fn lenient_f64_value(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_usize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(lenient_f64_value(value)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as usize))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(lenient_f64_value(value)
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(lenient_f64_value(value)
        .filter(|v| v.is_finite())
        .map(|v| v as i64))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(lenient_f64_value(value).filter(|v| v.is_finite()))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(text)) => matches!(text.trim(), "true" | "1"),
        Some(Value::Number(number)) => number.as_i64() == Some(1),
        _ => false,
    })
}

/// Array of strings, or one comma-separated string
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(values)) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(text) => Some(text),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(text)) => text.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_core_memory_is_an_alias() -> Result<(), InvocationError> {
        let parsed = ToolInvocation::parse(
            "update_core_memory",
            json!({"name": "identity", "content": "I am X"}),
        )?;
        assert_eq!(parsed.name(), "core_memory_replace");
        assert_eq!(
            parsed,
            ToolInvocation::CoreMemoryReplace(MemoryBlockArgs {
                name: "identity".into(),
                content: "I am X".into(),
            })
        );
        Ok(())
    }

    #[test]
    fn argument_aliases_are_accepted() -> Result<(), InvocationError> {
        let parsed = ToolInvocation::parse(
            "link_topics",
            json!({"a": "Animation", "b": "Hazbin Hotel", "relationship": "RELATED_TO"}),
        )?;
        let ToolInvocation::LinkTopics(args) = parsed else {
            panic!("expected link_topics");
        };
        assert_eq!(args.topic1, "Animation");
        assert_eq!(args.topic2, "Hazbin Hotel");

        let parsed = ToolInvocation::parse("send_message", json!({"text": "hello"}))?;
        assert_eq!(
            parsed,
            ToolInvocation::SendMessage(SendMessageArgs {
                message: "hello".into()
            })
        );

        let parsed = ToolInvocation::parse("find_related_topics", json!({"name": "Rust"}))?;
        let ToolInvocation::FindRelatedTopics(args) = parsed else {
            panic!("expected find_related_topics");
        };
        assert_eq!(args.topic, "Rust");
        assert_eq!(args.depth, None);
        Ok(())
    }

    #[test]
    fn numbers_and_lists_are_lenient() -> Result<(), InvocationError> {
        let parsed = ToolInvocation::parse(
            "create_fact",
            json!({"content": "Likes tea", "topics": "Drinks, Preferences ,"}),
        )?;
        let ToolInvocation::CreateFact(args) = parsed else {
            panic!("expected create_fact");
        };
        assert_eq!(args.topics, vec!["Drinks", "Preferences"]);

        let parsed = ToolInvocation::parse("memory_search", json!({"query": "tea", "limit": "3"}))?;
        let ToolInvocation::MemorySearch(args) = parsed else {
            panic!("expected memory_search");
        };
        assert_eq!(args.limit, Some(3));

        let parsed = ToolInvocation::parse("mimic_personality", json!({"user_id": "u", "update": "true"}))?;
        let ToolInvocation::MimicPersonality(args) = parsed else {
            panic!("expected mimic_personality");
        };
        assert!(args.update);
        Ok(())
    }

    #[test]
    fn unknown_names_and_bad_shapes_are_rejected() {
        assert_eq!(
            ToolInvocation::parse("launch_rockets", json!({})),
            Err(InvocationError::UnknownTool("launch_rockets".into()))
        );
        assert!(matches!(
            ToolInvocation::parse("create_fact", json!({"content": 7})),
            Err(InvocationError::InvalidArguments { .. })
        ));
        assert_eq!(ToolInvocation::parse("ignore", Value::Null), Ok(ToolInvocation::Ignore));
    }
}
