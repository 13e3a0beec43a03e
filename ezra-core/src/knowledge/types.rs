use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub system_instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub name: String,
    pub personality: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AgentIdentity {
    pub fn new(name: impl Into<String>, personality: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            personality: personality.into(),
            capabilities: Vec::new(),
        }
    }
}

/// Input for [`KnowledgeStore::create_agent`](super::KnowledgeStore::create_agent)
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub id: String,
    pub name: String,
    pub model: String,
    pub system_instructions: String,
    pub identity: AgentIdentity,
}

/// Per-agent overrides applied to a turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model: String,
    pub system_instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub name: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivalMemory {
    pub id: String,
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct NewArchivalMemory {
    pub summary: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Pointer to an archival memory carried in the prompt instead of its body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivalRef {
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    pub relevance_score: f64,
}

/// Snapshot of agent state consumed by one prompt build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub identity: AgentIdentity,
    pub core_memory: Vec<MemoryBlock>,
    pub archival_refs: Vec<ArchivalRef>,
    /// Free-form per-turn context (recent history, platform hints)
    #[serde(default)]
    pub user_context: Map<String, Value>,
}

impl ContextWindow {
    pub fn validate(&self) -> Result<(), String> {
        if self.identity.name.trim().is_empty() {
            return Err("context window identity name cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn memory_block(&self, name: &str) -> Option<&MemoryBlock> {
        self.core_memory.iter().find(|block| block.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub external_id: String,
    pub platform: String,
    pub display_name: String,
    /// Language code; empty when the user never stated one
    #[serde(default)]
    pub preferred_language: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub content: String,
    pub source: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFact {
    pub agent_id: String,
    pub content: String,
    pub source: String,
    pub user_id: Option<String>,
    pub topics: Vec<String>,
    pub confidence: f64,
}

impl NewFact {
    pub fn new(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: content.into(),
            source: String::new(),
            user_id: None,
            topics: Vec::new(),
            confidence: 1.0,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn told_by(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn about<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub channel_id: String,
    pub platform: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "agent" => Some(Role::Agent),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub platform: String,
    pub timestamp: DateTime<Utc>,
    /// Sender (user id for user messages, agent id for agent messages)
    #[serde(default)]
    pub author_id: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub agent_id: String,
    pub user_id: String,
    pub channel_id: String,
    pub content: String,
    pub role: Role,
    pub platform: String,
    pub reply_to: Option<String>,
    pub mentions: Vec<String>,
}

impl NewMessage {
    pub fn new(
        agent_id: impl Into<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
        role: Role,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            content: content.into(),
            role,
            platform: platform.into(),
            reply_to: None,
            mentions: Vec::new(),
        }
    }
}

/// Everything the agent knows about one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user: User,
    pub topics: Vec<Topic>,
    pub facts: Vec<Fact>,
    pub message_count: u64,
    pub last_message: Option<String>,
    pub conversations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchHitKind {
    Fact,
    Memory,
    Topic,
    Archival,
}

impl SearchHitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchHitKind::Fact => "fact",
            SearchHitKind::Memory => "memory",
            SearchHitKind::Topic => "topic",
            SearchHitKind::Archival => "archival",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: SearchHitKind,
    pub id: String,
    pub content: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicRelation {
    RelatedTo,
    SubtopicOf,
}

impl TopicRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicRelation::RelatedTo => "RELATED_TO",
            TopicRelation::SubtopicOf => "SUBTOPIC_OF",
        }
    }

    /// Unknown or empty values default to `RELATED_TO`
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "SUBTOPIC_OF" | "SUBTOPIC" | "CHILD_OF" => TopicRelation::SubtopicOf,
            _ => TopicRelation::RelatedTo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactRelation {
    Supports,
    Contradicts,
    RelatedTo,
}

impl FactRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactRelation::Supports => "SUPPORTS",
            FactRelation::Contradicts => "CONTRADICTS",
            FactRelation::RelatedTo => "RELATED_TO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextStats {
    pub memory_blocks: usize,
    pub archival_memories: usize,
    pub core_memory_chars: usize,
    pub archival_chars: usize,
    pub estimated_tokens: usize,
    pub context_window_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSimilarity {
    pub user1_id: String,
    pub user2_id: String,
    pub similarity_score: f64,
    pub based_on: String,
    pub shared_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityMemory {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub consented: bool,
    pub created_at: DateTime<Utc>,
}
