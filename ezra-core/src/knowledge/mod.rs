//! Knowledge store: the persistent graph of agents, users, facts, topics and
//! conversations.
//!
//! [`KnowledgeStore`] is the only path to persistent state. Every call runs
//! in its own session; there are no transactions spanning calls. Calls are
//! cancel-safe by drop: a caller that stops awaiting simply discards the
//! result.
//!
//! Relationships follow the graph model:
//!
//! - `Agent -HAS_IDENTITY-> AgentIdentity`, `-HAS_MEMORY-> MemoryBlock`,
//!   `-HAS_ARCHIVAL-> ArchivalMemory`, `-KNOWS_FACT-> Fact`, `-SENT-> Message`
//! - `User -TOLD_ME-> Fact`, `-INTERESTED_IN-> Topic` (weighted),
//!   `-SENT-> Message`, `-PARTICIPATED_IN-> Conversation`,
//!   `-MENTIONED-> User` (counted)
//! - `Fact -ABOUT-> Topic`, `Topic -RELATED_TO|SUBTOPIC_OF-> Topic`
//! - `Conversation -CONTAINS-> Message`, `Message -REPLIES_TO-> Message`,
//!   `Message -MENTIONS-> User`

pub mod dedup;
pub mod sqlite;
pub mod types;

pub use dedup::{are_facts_similar, deduplicate_facts, normalize_fact_content};
pub use sqlite::SqliteKnowledgeStore;
pub use types::*;

use crate::error::ErrorKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("storage backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("failed to encode stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Validation(_) | StoreError::Serialization(_) => ErrorKind::Validation,
            StoreError::Backend(_) | StoreError::Join(_) => ErrorKind::Retryable,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        StoreError::NotFound(what.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    // Agents and their memory

    async fn create_agent(&self, agent: NewAgent) -> StoreResult<Agent>;

    async fn list_agents(&self) -> StoreResult<Vec<Agent>>;

    /// Model override and system instructions; instructions fall back to the
    /// identity personality when unset.
    async fn get_agent_config(&self, agent_id: &str) -> StoreResult<AgentConfig>;

    async fn update_agent_config(
        &self,
        agent_id: &str,
        model: Option<String>,
        system_instructions: Option<String>,
    ) -> StoreResult<()>;

    async fn update_agent_identity(
        &self,
        agent_id: &str,
        identity: AgentIdentity,
    ) -> StoreResult<()>;

    /// Identity, every memory block and archival pointers. `NotFound` when
    /// the agent does not exist.
    async fn fetch_context_window(&self, agent_id: &str) -> StoreResult<ContextWindow>;

    /// Upsert; creates the agent (with a default identity) when missing.
    async fn update_memory_block(
        &self,
        agent_id: &str,
        name: &str,
        content: &str,
    ) -> StoreResult<MemoryBlock>;

    async fn delete_memory_block(&self, agent_id: &str, name: &str) -> StoreResult<()>;

    async fn create_archival_memory(
        &self,
        agent_id: &str,
        memory: NewArchivalMemory,
    ) -> StoreResult<ArchivalMemory>;

    /// Newest first
    async fn list_archival_memories(&self, agent_id: &str) -> StoreResult<Vec<ArchivalMemory>>;

    async fn delete_archival_memory(&self, agent_id: &str, memory_id: &str) -> StoreResult<()>;

    async fn search_archival_memories(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<ArchivalMemory>>;

    async fn context_stats(&self, agent_id: &str) -> StoreResult<ContextStats>;

    // Users

    /// First sight creates the user; later calls refresh `last_seen` and
    /// overwrite the display name only with a non-empty value.
    async fn get_or_create_user(
        &self,
        user_id: &str,
        external_id: &str,
        display_name: &str,
        platform: &str,
    ) -> StoreResult<User>;

    async fn get_user(&self, user_id: &str) -> StoreResult<User>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn set_user_language_preference(&self, user_id: &str, lang_code: &str)
    -> StoreResult<()>;

    /// Empty when no preference was recorded
    async fn get_user_language_preference(&self, user_id: &str) -> StoreResult<String>;

    /// Case-insensitive equality on display name
    async fn find_user_by_display_name(&self, name: &str) -> StoreResult<User>;

    /// Facts are deduplicated before they are returned.
    async fn get_user_context(&self, user_id: &str) -> StoreResult<UserContext>;

    /// Facts told by the user, newest first, without deduplication
    async fn get_user_facts(&self, user_id: &str) -> StoreResult<Vec<Fact>>;

    /// Messages the user sent, newest first
    async fn get_user_messages(&self, user_id: &str, limit: usize) -> StoreResult<Vec<ChatMessage>>;

    async fn record_user_mention(&self, from_user: &str, to_user: &str) -> StoreResult<()>;

    // Facts

    async fn create_fact(&self, fact: NewFact) -> StoreResult<Fact>;

    /// `NotFound` when the fact is absent.
    async fn update_fact(&self, fact_id: &str, content: &str) -> StoreResult<Fact>;

    async fn delete_fact(&self, fact_id: &str) -> StoreResult<()>;

    async fn get_fact(&self, fact_id: &str) -> StoreResult<Fact>;

    async fn fact_topics(&self, fact_id: &str) -> StoreResult<Vec<Topic>>;

    async fn get_facts_about_topic(&self, topic: &str, limit: usize) -> StoreResult<Vec<Fact>>;

    async fn list_facts(&self, limit: usize) -> StoreResult<Vec<Fact>>;

    async fn link_facts(&self, from: &str, to: &str, relation: FactRelation) -> StoreResult<()>;

    async fn record_fact_verification(
        &self,
        fact_id: &str,
        user_id: &str,
        verified: bool,
    ) -> StoreResult<()>;

    // Topics

    /// Idempotent on the case-insensitive name; the description is only
    /// overwritten by a non-empty value.
    async fn create_topic(&self, name: &str, description: &str) -> StoreResult<Topic>;

    async fn get_topic(&self, name: &str) -> StoreResult<Topic>;

    async fn list_topics(&self) -> StoreResult<Vec<Topic>>;

    async fn link_topics(&self, from: &str, to: &str, relation: TopicRelation) -> StoreResult<()>;

    /// Depth is clamped to [1, 5].
    async fn get_related_topics(&self, name: &str, depth: usize) -> StoreResult<Vec<Topic>>;

    /// Returns the resulting interest strength.
    async fn link_user_to_topic(&self, user_id: &str, topic: &str, strength: f64)
    -> StoreResult<f64>;

    // Conversations

    async fn log_interaction(
        &self,
        agent_id: &str,
        user_id: &str,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn log_message(&self, message: NewMessage) -> StoreResult<ChatMessage>;

    /// Chronological order, at most `limit` of the most recent messages.
    async fn get_conversation_history(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ChatMessage>>;

    async fn get_conversation(&self, channel_id: &str) -> StoreResult<Conversation>;

    async fn list_messages(&self, limit: usize) -> StoreResult<Vec<ChatMessage>>;

    async fn list_conversations(&self, limit: usize) -> StoreResult<Vec<Conversation>>;

    // Search and relations

    async fn search_memory(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<SearchHit>>;

    async fn calculate_user_similarity(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> StoreResult<UserSimilarity>;

    async fn find_similar_users(&self, user_id: &str, limit: usize)
    -> StoreResult<Vec<UserSimilarity>>;

    // Personality

    async fn store_personality_memory(
        &self,
        user_id: &str,
        content: &str,
        tags: Vec<String>,
        consented: bool,
    ) -> StoreResult<PersonalityMemory>;

    async fn retrieve_personality_memories(
        &self,
        user_id: &str,
        query: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<PersonalityMemory>>;

    async fn delete_personality_memories(&self, user_id: &str) -> StoreResult<usize>;

    async fn store_personality_profile(
        &self,
        user_id: &str,
        scope: &str,
        profile: Value,
    ) -> StoreResult<()>;

    async fn get_personality_profile(&self, user_id: &str, scope: &str)
    -> StoreResult<Option<Value>>;

    async fn delete_personality_profile(&self, user_id: &str, scope: &str) -> StoreResult<()>;
}
