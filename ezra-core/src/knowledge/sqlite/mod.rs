//! SQLite-backed [`KnowledgeStore`].
//!
//! Module layout:
//!   agents       : agents, identities, memory blocks, archival memories
//!   users        : users, language preference, user context
//!   facts        : fact CRUD, fact links and verification
//!   topics       : topic upsert, topic graph walks, user interests
//!   conversations: conversations, messages, interactions
//!   search       : cross-entity substring search
//!   relations    : user similarity
//!   personality  : personality memories and cached style profiles
//!   edges        : shared relationship table helpers

mod agents;
mod conversations;
mod edges;
mod facts;
mod personality;
mod relations;
pub(crate) mod schema;
mod search;
mod topics;
mod users;

use super::types::*;
use super::{KnowledgeStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub(super) fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

pub(super) fn to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

pub(super) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(super) fn encode_list(values: &[String]) -> StoreResult<String> {
    Ok(serde_json::to_string(values)?)
}

/// Malformed lists decode as empty rather than failing the whole read.
pub(super) fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Thread-safe store wrapper. Each call takes the connection lock inside a
/// blocking task, so no lock is ever held across an await point.
#[derive(Clone)]
pub struct SqliteKnowledgeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKnowledgeStore {
    /// Open (or create) the database file and run migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening knowledge store");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                StoreError::Validation(format!(
                    "cannot create database directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn create_agent(&self, agent: NewAgent) -> StoreResult<Agent> {
        self.with_conn(move |conn| agents::create_agent(conn, agent))
            .await
    }

    async fn list_agents(&self) -> StoreResult<Vec<Agent>> {
        self.with_conn(agents::list_agents).await
    }

    async fn get_agent_config(&self, agent_id: &str) -> StoreResult<AgentConfig> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| agents::get_agent_config(conn, &agent_id))
            .await
    }

    async fn update_agent_config(
        &self,
        agent_id: &str,
        model: Option<String>,
        system_instructions: Option<String>,
    ) -> StoreResult<()> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            agents::update_agent_config(conn, &agent_id, model, system_instructions)
        })
        .await
    }

    async fn update_agent_identity(
        &self,
        agent_id: &str,
        identity: AgentIdentity,
    ) -> StoreResult<()> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| agents::update_agent_identity(conn, &agent_id, &identity))
            .await
    }

    async fn fetch_context_window(&self, agent_id: &str) -> StoreResult<ContextWindow> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| agents::fetch_context_window(conn, &agent_id))
            .await
    }

    async fn update_memory_block(
        &self,
        agent_id: &str,
        name: &str,
        content: &str,
    ) -> StoreResult<MemoryBlock> {
        let (agent_id, name, content) = (agent_id.to_string(), name.to_string(), content.to_string());
        self.with_conn(move |conn| agents::update_memory_block(conn, &agent_id, &name, &content))
            .await
    }

    async fn delete_memory_block(&self, agent_id: &str, name: &str) -> StoreResult<()> {
        let (agent_id, name) = (agent_id.to_string(), name.to_string());
        self.with_conn(move |conn| agents::delete_memory_block(conn, &agent_id, &name))
            .await
    }

    async fn create_archival_memory(
        &self,
        agent_id: &str,
        memory: NewArchivalMemory,
    ) -> StoreResult<ArchivalMemory> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| agents::create_archival_memory(conn, &agent_id, memory))
            .await
    }

    async fn list_archival_memories(&self, agent_id: &str) -> StoreResult<Vec<ArchivalMemory>> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| agents::list_archival_memories(conn, &agent_id))
            .await
    }

    async fn delete_archival_memory(&self, agent_id: &str, memory_id: &str) -> StoreResult<()> {
        let (agent_id, memory_id) = (agent_id.to_string(), memory_id.to_string());
        self.with_conn(move |conn| agents::delete_archival_memory(conn, &agent_id, &memory_id))
            .await
    }

    async fn search_archival_memories(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<ArchivalMemory>> {
        let (agent_id, query) = (agent_id.to_string(), query.to_string());
        self.with_conn(move |conn| agents::search_archival_memories(conn, &agent_id, &query, limit))
            .await
    }

    async fn context_stats(&self, agent_id: &str) -> StoreResult<ContextStats> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| agents::context_stats(conn, &agent_id))
            .await
    }

    async fn get_or_create_user(
        &self,
        user_id: &str,
        external_id: &str,
        display_name: &str,
        platform: &str,
    ) -> StoreResult<User> {
        let (user_id, external_id, display_name, platform) = (
            user_id.to_string(),
            external_id.to_string(),
            display_name.to_string(),
            platform.to_string(),
        );
        self.with_conn(move |conn| {
            users::get_or_create_user(conn, &user_id, &external_id, &display_name, &platform)
        })
        .await
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<User> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| users::get_user(conn, &user_id))
            .await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.with_conn(users::list_users).await
    }

    async fn set_user_language_preference(
        &self,
        user_id: &str,
        lang_code: &str,
    ) -> StoreResult<()> {
        let (user_id, lang_code) = (user_id.to_string(), lang_code.to_string());
        self.with_conn(move |conn| users::set_language_preference(conn, &user_id, &lang_code))
            .await
    }

    async fn get_user_language_preference(&self, user_id: &str) -> StoreResult<String> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| users::get_language_preference(conn, &user_id))
            .await
    }

    async fn find_user_by_display_name(&self, name: &str) -> StoreResult<User> {
        let name = name.to_string();
        self.with_conn(move |conn| users::find_by_display_name(conn, &name))
            .await
    }

    async fn get_user_context(&self, user_id: &str) -> StoreResult<UserContext> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| users::get_user_context(conn, &user_id))
            .await
    }

    async fn get_user_facts(&self, user_id: &str) -> StoreResult<Vec<Fact>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| users::user_facts(conn, &user_id))
            .await
    }

    async fn get_user_messages(&self, user_id: &str, limit: usize) -> StoreResult<Vec<ChatMessage>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| users::user_messages(conn, &user_id, limit))
            .await
    }

    async fn record_user_mention(&self, from_user: &str, to_user: &str) -> StoreResult<()> {
        let (from_user, to_user) = (from_user.to_string(), to_user.to_string());
        self.with_conn(move |conn| users::record_mention(conn, &from_user, &to_user))
            .await
    }

    async fn create_fact(&self, fact: NewFact) -> StoreResult<Fact> {
        self.with_conn(move |conn| facts::create_fact(conn, fact))
            .await
    }

    async fn update_fact(&self, fact_id: &str, content: &str) -> StoreResult<Fact> {
        let (fact_id, content) = (fact_id.to_string(), content.to_string());
        self.with_conn(move |conn| facts::update_fact(conn, &fact_id, &content))
            .await
    }

    async fn delete_fact(&self, fact_id: &str) -> StoreResult<()> {
        let fact_id = fact_id.to_string();
        self.with_conn(move |conn| facts::delete_fact(conn, &fact_id))
            .await
    }

    async fn get_fact(&self, fact_id: &str) -> StoreResult<Fact> {
        let fact_id = fact_id.to_string();
        self.with_conn(move |conn| facts::get_fact(conn, &fact_id))
            .await
    }

    async fn fact_topics(&self, fact_id: &str) -> StoreResult<Vec<Topic>> {
        let fact_id = fact_id.to_string();
        self.with_conn(move |conn| facts::fact_topics(conn, &fact_id))
            .await
    }

    async fn get_facts_about_topic(&self, topic: &str, limit: usize) -> StoreResult<Vec<Fact>> {
        let topic = topic.to_string();
        self.with_conn(move |conn| facts::facts_about_topic(conn, &topic, limit))
            .await
    }

    async fn list_facts(&self, limit: usize) -> StoreResult<Vec<Fact>> {
        self.with_conn(move |conn| facts::list_facts(conn, limit))
            .await
    }

    async fn link_facts(&self, from: &str, to: &str, relation: FactRelation) -> StoreResult<()> {
        let (from, to) = (from.to_string(), to.to_string());
        self.with_conn(move |conn| facts::link_facts(conn, &from, &to, relation))
            .await
    }

    async fn record_fact_verification(
        &self,
        fact_id: &str,
        user_id: &str,
        verified: bool,
    ) -> StoreResult<()> {
        let (fact_id, user_id) = (fact_id.to_string(), user_id.to_string());
        self.with_conn(move |conn| facts::record_verification(conn, &fact_id, &user_id, verified))
            .await
    }

    async fn create_topic(&self, name: &str, description: &str) -> StoreResult<Topic> {
        let (name, description) = (name.to_string(), description.to_string());
        self.with_conn(move |conn| topics::upsert_topic(conn, &name, &description))
            .await
    }

    async fn get_topic(&self, name: &str) -> StoreResult<Topic> {
        let name = name.to_string();
        self.with_conn(move |conn| topics::get_topic(conn, &name))
            .await
    }

    async fn list_topics(&self) -> StoreResult<Vec<Topic>> {
        self.with_conn(topics::list_topics).await
    }

    async fn link_topics(&self, from: &str, to: &str, relation: TopicRelation) -> StoreResult<()> {
        let (from, to) = (from.to_string(), to.to_string());
        self.with_conn(move |conn| topics::link_topics(conn, &from, &to, relation))
            .await
    }

    async fn get_related_topics(&self, name: &str, depth: usize) -> StoreResult<Vec<Topic>> {
        let name = name.to_string();
        self.with_conn(move |conn| topics::related_topics(conn, &name, depth))
            .await
    }

    async fn link_user_to_topic(
        &self,
        user_id: &str,
        topic: &str,
        strength: f64,
    ) -> StoreResult<f64> {
        let (user_id, topic) = (user_id.to_string(), topic.to_string());
        self.with_conn(move |conn| topics::link_user_to_topic(conn, &user_id, &topic, strength))
            .await
    }

    async fn log_interaction(
        &self,
        agent_id: &str,
        user_id: &str,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()> {
        let (agent_id, user_id, message) =
            (agent_id.to_string(), user_id.to_string(), message.to_string());
        self.with_conn(move |conn| {
            conversations::log_interaction(conn, &agent_id, &user_id, &message, timestamp)
        })
        .await
    }

    async fn log_message(&self, message: NewMessage) -> StoreResult<ChatMessage> {
        self.with_conn(move |conn| conversations::log_message(conn, message))
            .await
    }

    async fn get_conversation_history(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ChatMessage>> {
        let channel_id = channel_id.to_string();
        self.with_conn(move |conn| conversations::conversation_history(conn, &channel_id, limit))
            .await
    }

    async fn get_conversation(&self, channel_id: &str) -> StoreResult<Conversation> {
        let channel_id = channel_id.to_string();
        self.with_conn(move |conn| conversations::get_conversation(conn, &channel_id))
            .await
    }

    async fn list_messages(&self, limit: usize) -> StoreResult<Vec<ChatMessage>> {
        self.with_conn(move |conn| conversations::list_messages(conn, limit))
            .await
    }

    async fn list_conversations(&self, limit: usize) -> StoreResult<Vec<Conversation>> {
        self.with_conn(move |conn| conversations::list_conversations(conn, limit))
            .await
    }

    async fn search_memory(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<SearchHit>> {
        let (agent_id, query) = (agent_id.to_string(), query.to_string());
        self.with_conn(move |conn| search::search_memory(conn, &agent_id, &query, limit))
            .await
    }

    async fn calculate_user_similarity(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> StoreResult<UserSimilarity> {
        let (user_a, user_b) = (user_a.to_string(), user_b.to_string());
        self.with_conn(move |conn| relations::calculate_similarity(conn, &user_a, &user_b))
            .await
    }

    async fn find_similar_users(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<UserSimilarity>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| relations::find_similar_users(conn, &user_id, limit))
            .await
    }

    async fn store_personality_memory(
        &self,
        user_id: &str,
        content: &str,
        tags: Vec<String>,
        consented: bool,
    ) -> StoreResult<PersonalityMemory> {
        let (user_id, content) = (user_id.to_string(), content.to_string());
        self.with_conn(move |conn| {
            personality::store_memory(conn, &user_id, &content, tags, consented)
        })
        .await
    }

    async fn retrieve_personality_memories(
        &self,
        user_id: &str,
        query: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<PersonalityMemory>> {
        let (user_id, query) = (user_id.to_string(), query.map(str::to_string));
        self.with_conn(move |conn| {
            personality::retrieve_memories(conn, &user_id, query.as_deref(), limit)
        })
        .await
    }

    async fn delete_personality_memories(&self, user_id: &str) -> StoreResult<usize> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| personality::delete_memories(conn, &user_id))
            .await
    }

    async fn store_personality_profile(
        &self,
        user_id: &str,
        scope: &str,
        profile: Value,
    ) -> StoreResult<()> {
        let (user_id, scope) = (user_id.to_string(), scope.to_string());
        self.with_conn(move |conn| personality::store_profile(conn, &user_id, &scope, &profile))
            .await
    }

    async fn get_personality_profile(
        &self,
        user_id: &str,
        scope: &str,
    ) -> StoreResult<Option<Value>> {
        let (user_id, scope) = (user_id.to_string(), scope.to_string());
        self.with_conn(move |conn| personality::get_profile(conn, &user_id, &scope))
            .await
    }

    async fn delete_personality_profile(&self, user_id: &str, scope: &str) -> StoreResult<()> {
        let (user_id, scope) = (user_id.to_string(), scope.to_string());
        self.with_conn(move |conn| personality::delete_profile(conn, &user_id, &scope))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::edges::{kind, rel};
    use super::*;
    use rusqlite::OptionalExtension;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn store() -> Result<SqliteKnowledgeStore, StoreError> {
        SqliteKnowledgeStore::open_in_memory()
    }

    async fn seed_agent(store: &SqliteKnowledgeStore) -> StoreResult<Agent> {
        store
            .create_agent(NewAgent {
                id: "Ezra".into(),
                name: "Ezra".into(),
                model: String::new(),
                system_instructions: String::new(),
                identity: AgentIdentity::new("Ezra", "Helpful and curious"),
            })
            .await
    }

    #[tokio::test]
    async fn missing_agent_context_is_not_found() -> TestResult {
        let store = store()?;
        let err = store.fetch_context_window("nobody").await.err();
        assert!(err.is_some_and(|e| e.is_not_found()));
        Ok(())
    }

    #[tokio::test]
    async fn memory_block_upsert_keeps_single_row() -> TestResult {
        let store = store()?;
        seed_agent(&store).await?;
        store.update_memory_block("Ezra", "persona", "first").await?;
        store.update_memory_block("Ezra", "persona", "second").await?;

        let window = store.fetch_context_window("Ezra").await?;
        let persona: Vec<_> = window
            .core_memory
            .iter()
            .filter(|b| b.name == "persona")
            .collect();
        assert_eq!(persona.len(), 1);
        assert_eq!(persona[0].content, "second");
        Ok(())
    }

    #[tokio::test]
    async fn memory_block_upsert_creates_missing_agent() -> TestResult {
        let store = store()?;
        store.update_memory_block("Nova", "human", "likes jazz").await?;
        let window = store.fetch_context_window("Nova").await?;
        assert_eq!(window.identity.name, "Nova");
        assert!(window.memory_block("human").is_some());

        store.delete_memory_block("Nova", "human").await?;
        let err = store.delete_memory_block("Nova", "human").await.err();
        assert!(err.is_some_and(|e| e.is_not_found()));
        Ok(())
    }

    #[tokio::test]
    async fn get_or_create_user_is_idempotent() -> TestResult {
        let store = store()?;
        let first = store.get_or_create_user("alice", "1001", "Alice", "discord").await?;
        let second = store.get_or_create_user("alice", "1001", "", "discord").await?;

        assert_eq!(first.id, second.id);
        assert_eq!(first.first_seen, second.first_seen);
        assert!(second.last_seen >= first.last_seen);
        assert_eq!(second.display_name, "Alice");

        let renamed = store.get_or_create_user("alice", "1001", "Ally", "discord").await?;
        assert_eq!(renamed.display_name, "Ally");
        Ok(())
    }

    #[tokio::test]
    async fn topic_upsert_preserves_case_and_description() -> TestResult {
        let store = store()?;
        let created = store.create_topic("Rust", "systems language").await?;
        let again = store.create_topic("rust", "").await?;
        assert_eq!(created.id, again.id);
        assert_eq!(again.name, "Rust");
        assert_eq!(again.description, "systems language");

        let updated = store.create_topic("RUST", "memory safe").await?;
        assert_eq!(updated.description, "memory safe");
        assert_eq!(store.list_topics().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn log_message_reuses_conversation() -> TestResult {
        let store = store()?;
        store
            .log_message(NewMessage::new("Ezra", "alice", "chan-1", "hi", Role::User, "discord"))
            .await?;
        store
            .log_message(NewMessage::new("Ezra", "alice", "chan-1", "hello!", Role::Agent, "discord"))
            .await?;

        assert_eq!(store.list_conversations(10).await?.len(), 1);
        let history = store.get_conversation_history("chan-1", 10).await?;
        let roles: Vec<_> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Agent]);
        assert_eq!(history[1].author_id, "Ezra");

        let context = store.get_user_context("alice").await?;
        assert_eq!(context.message_count, 1);
        assert_eq!(context.last_message.as_deref(), Some("hi"));
        assert_eq!(context.conversations, 1);
        Ok(())
    }

    #[tokio::test]
    async fn history_returns_latest_in_chronological_order() -> TestResult {
        let store = store()?;
        for i in 0..5 {
            store
                .log_message(NewMessage::new(
                    "Ezra",
                    "bob",
                    "chan-2",
                    format!("m{i}"),
                    Role::User,
                    "web",
                ))
                .await?;
        }
        let history = store.get_conversation_history("chan-2", 3).await?;
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
        Ok(())
    }

    #[tokio::test]
    async fn user_context_facts_are_deduplicated() -> TestResult {
        let store = store()?;
        seed_agent(&store).await?;
        store.get_or_create_user("alice", "", "Alice", "web").await?;
        for content in ["User likes teal.", "user likes TEAL", "User owns a cat named Miso"] {
            store
                .create_fact(NewFact::new("Ezra", content).told_by("alice").about(["Preferences"]))
                .await?;
        }

        let context = store.get_user_context("alice").await?;
        assert_eq!(context.facts.len(), 2);
        assert_eq!(store.get_user_facts("alice").await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn fact_lifecycle_and_topics() -> TestResult {
        let store = store()?;
        let fact = store
            .create_fact(NewFact::new("Ezra", "Alice runs marathons").about(["Sports", "Health"]))
            .await?;
        let topics: Vec<_> = store
            .fact_topics(&fact.id)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(topics, vec!["Health", "Sports"]);

        let updated = store.update_fact(&fact.id, "Alice runs ultramarathons").await?;
        assert_eq!(updated.content, "Alice runs ultramarathons");
        assert!(updated.updated_at >= fact.updated_at);

        assert_eq!(store.get_facts_about_topic("sport", 20).await?.len(), 1);

        store.delete_fact(&fact.id).await?;
        assert!(store.update_fact(&fact.id, "x").await.is_err_and(|e| e.is_not_found()));
        assert!(store.get_facts_about_topic("sport", 20).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn related_topics_respect_depth() -> TestResult {
        let store = store()?;
        store.link_topics("Rust", "Systems", TopicRelation::RelatedTo).await?;
        store.link_topics("Systems", "Kernels", TopicRelation::SubtopicOf).await?;

        let near: Vec<_> = store
            .get_related_topics("rust", 1)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(near, vec!["Systems"]);

        let far: Vec<_> = store
            .get_related_topics("Rust", 0)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(far, vec!["Systems"], "depth below 1 is clamped to 1");

        assert_eq!(store.get_related_topics("Rust", 9).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn interest_strength_is_clamped_and_averaged() -> TestResult {
        let store = store()?;
        let first = store.link_user_to_topic("carol", "Chess", 3.0).await?;
        assert!((first - 1.0).abs() < f64::EPSILON);
        let second = store.link_user_to_topic("carol", "chess", 0.5).await?;
        assert!((second - 0.75).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn search_memory_tags_hit_types() -> TestResult {
        let store = store()?;
        seed_agent(&store).await?;
        store.update_memory_block("Ezra", "garden", "Tomatoes are planted").await?;
        store
            .create_fact(NewFact::new("Ezra", "Dave grows tomatoes").about(["Gardening"]))
            .await?;
        store.create_topic("Tomato Sauce", "cooking with tomatoes").await?;

        let hits = store.search_memory("Ezra", "TOMAT", 10).await?;
        let kinds: Vec<_> = hits.iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![SearchHitKind::Fact, SearchHitKind::Memory, SearchHitKind::Topic]
        );
        assert_eq!(hits[1].id, "garden");
        assert!((hits[2].score - 0.8).abs() < f64::EPSILON);

        assert_eq!(store.search_memory("Ezra", "tomat", 2).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn archival_memories_newest_first() -> TestResult {
        let store = store()?;
        seed_agent(&store).await?;
        let first = store
            .create_archival_memory(
                "Ezra",
                NewArchivalMemory {
                    content: "Met Alice at the meetup".into(),
                    ..Default::default()
                },
            )
            .await?;
        store
            .create_archival_memory(
                "Ezra",
                NewArchivalMemory {
                    content: "Alice moved to Lisbon".into(),
                    tags: vec!["travel".into()],
                    ..Default::default()
                },
            )
            .await?;

        let listed = store.list_archival_memories("Ezra").await?;
        assert_eq!(listed[0].content, "Alice moved to Lisbon");
        assert_eq!(store.search_archival_memories("Ezra", "travel", 5).await?.len(), 1);

        store.delete_archival_memory("Ezra", &first.id).await?;
        assert_eq!(store.list_archival_memories("Ezra").await?.len(), 1);
        let window = store.fetch_context_window("Ezra").await?;
        assert_eq!(window.archival_refs.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn language_preference_round_trip() -> TestResult {
        let store = store()?;
        store.get_or_create_user("bob", "2002", "Bob", "discord").await?;
        assert_eq!(store.get_user_language_preference("bob").await?, "");
        store.set_user_language_preference("bob", "fr").await?;
        assert_eq!(store.get_user_language_preference("bob").await?, "fr");

        let found = store.find_user_by_display_name("@BOB").await?;
        assert_eq!(found.id, "bob");
        assert!(store
            .set_user_language_preference("ghost", "fr")
            .await
            .is_err_and(|e| e.is_not_found()));
        Ok(())
    }

    #[tokio::test]
    async fn agent_config_falls_back_to_personality() -> TestResult {
        let store = store()?;
        seed_agent(&store).await?;
        let config = store.get_agent_config("Ezra").await?;
        assert_eq!(config.model, "");
        assert_eq!(config.system_instructions, "Helpful and curious");

        store
            .update_agent_config("Ezra", Some("openai/gpt-4o".into()), None)
            .await?;
        assert_eq!(store.get_agent_config("Ezra").await?.model, "openai/gpt-4o");
        Ok(())
    }

    #[tokio::test]
    async fn similarity_weights_shared_topics() -> TestResult {
        let store = store()?;
        store.get_or_create_user("u1", "", "", "web").await?;
        store.get_or_create_user("u2", "", "", "web").await?;
        store.link_user_to_topic("u1", "Go", 1.0).await?;
        store.link_user_to_topic("u2", "Go", 1.0).await?;
        store
            .log_message(NewMessage::new("Ezra", "u1", "c", "a", Role::User, "web"))
            .await?;
        store
            .log_message(NewMessage::new("Ezra", "u2", "c", "b", Role::User, "web"))
            .await?;

        let similarity = store.calculate_user_similarity("u1", "u2").await?;
        assert!((similarity.similarity_score - 0.7).abs() < 1e-9);
        assert_eq!(similarity.based_on, "topics");
        assert_eq!(similarity.shared_items, vec!["Go"]);

        let similar = store.find_similar_users("u1", 5).await?;
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].user2_id, "u2");
        Ok(())
    }

    #[tokio::test]
    async fn personality_profile_cache_round_trip() -> TestResult {
        let store = store()?;
        assert!(store.get_personality_profile("eve", "").await?.is_none());
        store
            .store_personality_profile("eve", "", serde_json::json!({"tone": "casual"}))
            .await?;
        let cached = store.get_personality_profile("eve", "").await?;
        assert_eq!(cached.and_then(|v| v["tone"].as_str().map(String::from)).as_deref(), Some("casual"));

        store
            .store_personality_memory("eve", "loves puns", vec!["humor".into()], true)
            .await?;
        assert_eq!(store.retrieve_personality_memories("eve", Some("PUN"), 5).await?.len(), 1);
        assert_eq!(store.delete_personality_memories("eve").await?, 1);
        Ok(())
    }

    /// (count, props) of one edge, if present
    async fn edge_row(
        store: &SqliteKnowledgeStore,
        src: (&str, &str),
        relation: &str,
        dst: (&str, &str),
    ) -> StoreResult<Option<(i64, Option<String>)>> {
        let key = [src.0, src.1, relation, dst.0, dst.1].map(String::from);
        store
            .with_conn(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT count, props FROM edges
                         WHERE src_kind = ?1 AND src_id = ?2 AND rel = ?3 AND dst_kind = ?4 AND dst_id = ?5",
                        rusqlite::params![key[0], key[1], key[2], key[3], key[4]],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await
    }

    #[tokio::test]
    async fn link_facts_writes_relation_edge() -> TestResult {
        let store = store()?;
        let marathon = store.create_fact(NewFact::new("Ezra", "Alice runs marathons")).await?;
        let knee = store.create_fact(NewFact::new("Ezra", "Alice has a bad knee")).await?;

        store.link_facts(&marathon.id, &knee.id, FactRelation::Contradicts).await?;
        store.link_facts(&marathon.id, &knee.id, FactRelation::Contradicts).await?;
        let edge = edge_row(&store, (kind::FACT, marathon.id.as_str()), "CONTRADICTS", (kind::FACT, knee.id.as_str())).await?;
        assert_eq!(edge.map(|(count, _)| count), Some(1));

        let err = store.link_facts(&marathon.id, "missing", FactRelation::Supports).await.err();
        assert!(err.is_some_and(|e| e.is_not_found()));
        Ok(())
    }

    #[tokio::test]
    async fn fact_verification_moves_confidence_and_records_verdict() -> TestResult {
        let store = store()?;
        let fact = store.create_fact(NewFact::new("Ezra", "The office closes at 6")).await?;

        store.record_fact_verification(&fact.id, "carol", false).await?;
        let disputed = store.get_fact(fact.id.as_str()).await?;
        assert!((disputed.confidence - 0.8).abs() < 1e-9);
        let edge = edge_row(&store, (kind::USER, "carol"), rel::VERIFIED, (kind::FACT, fact.id.as_str())).await?;
        let props: serde_json::Value = serde_json::from_str(&edge.and_then(|(_, props)| props).unwrap_or_default())?;
        assert_eq!(props["verified"], false);

        store.record_fact_verification(&fact.id, "carol", true).await?;
        let confirmed = store.get_fact(fact.id.as_str()).await?;
        assert!((confirmed.confidence - 0.9).abs() < 1e-9);
        let edge = edge_row(&store, (kind::USER, "carol"), rel::VERIFIED, (kind::FACT, fact.id.as_str())).await?;
        assert!(edge.and_then(|(_, props)| props).is_some_and(|props| props.contains("true")));
        Ok(())
    }

    #[tokio::test]
    async fn user_mentions_are_counted() -> TestResult {
        let store = store()?;
        store.record_user_mention("alice", "bob").await?;
        store.record_user_mention("alice", "bob").await?;
        store.record_user_mention("alice", "alice").await?;

        let edge = edge_row(&store, (kind::USER, "alice"), rel::MENTIONED, (kind::USER, "bob")).await?;
        assert_eq!(edge.map(|(count, _)| count), Some(2));
        let own = edge_row(&store, (kind::USER, "alice"), rel::MENTIONED, (kind::USER, "alice")).await?;
        assert!(own.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn deleting_personality_profile_clears_only_that_scope() -> TestResult {
        let store = store()?;
        store
            .store_personality_profile("eve", "", serde_json::json!({"tone": "casual"}))
            .await?;
        store
            .store_personality_profile("eve", "chan-9", serde_json::json!({"tone": "formal"}))
            .await?;

        store.delete_personality_profile("eve", "").await?;
        assert!(store.get_personality_profile("eve", "").await?.is_none());
        assert!(store.get_personality_profile("eve", "chan-9").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn log_message_links_replies_and_mentions() -> TestResult {
        let store = store()?;
        let question = store
            .log_message(NewMessage::new("Ezra", "alice", "chan-3", "anyone up for chess?", Role::User, "discord"))
            .await?;

        let mut answer = NewMessage::new("Ezra", "bob", "chan-3", "@alice sure", Role::User, "discord");
        answer.reply_to = Some(question.id.clone());
        answer.mentions = vec!["alice".into()];
        let answer = store.log_message(answer).await?;

        let reply = edge_row(&store, (kind::MESSAGE, answer.id.as_str()), rel::REPLIES_TO, (kind::MESSAGE, question.id.as_str())).await?;
        assert!(reply.is_some());
        let mention = edge_row(&store, (kind::MESSAGE, answer.id.as_str()), rel::MENTIONS, (kind::USER, "alice")).await?;
        assert!(mention.is_some());
        let mentioned = edge_row(&store, (kind::USER, "bob"), rel::MENTIONED, (kind::USER, "alice")).await?;
        assert_eq!(mentioned.map(|(count, _)| count), Some(1));

        let mut orphan = NewMessage::new("Ezra", "bob", "chan-3", "nvm", Role::User, "discord");
        orphan.reply_to = Some("no-such-message".into());
        let orphan = store.log_message(orphan).await?;
        let dangling = edge_row(&store, (kind::MESSAGE, orphan.id.as_str()), rel::REPLIES_TO, (kind::MESSAGE, "no-such-message")).await?;
        assert!(dangling.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn implicit_user_never_takes_another_users_external_id() -> TestResult {
        let store = store()?;
        store.get_or_create_user("u-alice", "bob", "Alice", "discord").await?;

        let err = store
            .log_message(NewMessage::new("Ezra", "bob", "chan-4", "hi", Role::User, "discord"))
            .await
            .err();
        assert!(err.is_some_and(|e| matches!(e, StoreError::Validation(_))));
        assert!(store.get_conversation_history("chan-4", 10).await?.is_empty());

        store
            .log_message(NewMessage::new("Ezra", "bob", "chan-4", "hi", Role::User, "web"))
            .await?;
        let alice = store.get_or_create_user("u-alice", "bob", "", "discord").await?;
        assert_eq!(alice.display_name, "Alice");
        Ok(())
    }
}
