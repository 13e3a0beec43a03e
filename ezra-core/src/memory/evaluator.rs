//! LLM-assisted memory evaluation.
//!
//! A judge model decides whether a user message carries something worth
//! remembering ([`MemoryEvaluator::evaluate`]), the decision is applied
//! against the user's existing facts ([`MemoryEvaluator::apply`]) and,
//! offline, duplicate facts are collapsed
//! ([`MemoryEvaluator::cleanup_duplicate_facts`]).

use super::json_extract::{JsonExtractError, JsonShape, extract_json};
use crate::config::constants::memory;
use crate::knowledge::{Fact, KnowledgeStore, NewFact, StoreError};
use crate::llm::{LLMError, ModelClient};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const EVALUATE_INSTRUCTION: &str =
    "Analyze and respond with JSON only. No markdown, no explanation, just the JSON object.";
const ARRAY_INSTRUCTION: &str = "Respond with JSON array only. No markdown, no explanation.";

const GREETING_PREFIXES: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "thanks",
    "thank you",
    "ty",
    "thx",
    "bye",
    "goodbye",
    "see you",
];

const QUESTION_PREFIXES: &[&str] = &[
    "what", "how", "when", "where", "why", "who", "can you", "could you", "will you",
    "would you", "tell me", "show me", "help me",
];

const COMMAND_PREFIXES: &[&str] = &["/", "!", "@", "search", "find", "get", "show"];

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("judge model call failed: {0}")]
    Model(#[from] LLMError),

    #[error("knowledge store error: {0}")]
    Store(#[from] StoreError),

    #[error("unusable judge response: {0}")]
    Parse(#[from] JsonExtractError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Fact,
    Preference,
    PersonalInfo,
    LifeEvent,
    None,
}

impl MemoryType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "fact" => MemoryType::Fact,
            "preference" => MemoryType::Preference,
            "personal_info" => MemoryType::PersonalInfo,
            "life_event" => MemoryType::LifeEvent,
            _ => MemoryType::None,
        }
    }

    /// Provenance recorded on facts created from this kind of memory
    pub fn source(self) -> &'static str {
        match self {
            MemoryType::LifeEvent => "life event",
            MemoryType::Preference => "preference",
            MemoryType::PersonalInfo => "personal information",
            MemoryType::Fact | MemoryType::None => "auto-extracted",
        }
    }

    pub fn default_topic(self) -> &'static str {
        match self {
            MemoryType::Preference => "Preferences",
            MemoryType::PersonalInfo => "Personal",
            MemoryType::LifeEvent => "Life Events",
            MemoryType::Fact | MemoryType::None => "General",
        }
    }
}

/// The judge's verdict on one message
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryDecision {
    pub should_save: bool,
    pub memory_type: String,
    pub content: String,
    pub topics: Vec<String>,
    #[serde(deserialize_with = "lenient_importance")]
    pub importance: u8,
    pub updates_existing: bool,
    pub existing_id: String,
    pub reasoning: String,
}

impl MemoryDecision {
    pub fn skip() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> MemoryType {
        MemoryType::parse(&self.memory_type)
    }

    pub fn is_saveable(&self) -> bool {
        self.should_save
            && self.importance >= memory::MIN_IMPORTANCE
            && !self.content.trim().is_empty()
    }

    fn topics_or_default(&self) -> Vec<String> {
        let topics: Vec<String> = self
            .topics
            .iter()
            .map(|topic| topic.trim())
            .filter(|topic| !topic.is_empty())
            .map(str::to_string)
            .collect();
        if topics.is_empty() {
            vec![self.kind().default_topic().to_string()]
        } else {
            topics
        }
    }
}

/// Accepts `7`, `7.0` and `"7"`; anything else counts as 0
fn lenient_importance<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.map(|n| n.round().clamp(0.0, 10.0) as u8).unwrap_or(0))
}

#[derive(Debug, Deserialize)]
struct SimilarityVerdict {
    #[serde(default)]
    id: String,
    #[serde(default)]
    relationship: String,
    #[serde(default)]
    confidence: f64,
}

impl SimilarityVerdict {
    fn is_match(&self) -> bool {
        match self.relationship.trim().to_ascii_lowercase().as_str() {
            "duplicate" | "conflict" | "update" => self.confidence >= memory::MATCH_CONFIDENCE,
            "similar" => self.confidence >= memory::SIMILAR_CONFIDENCE,
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DuplicateGroup {
    #[serde(default)]
    group: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOutcome {
    Skipped,
    Updated { fact_id: String },
    Created { fact_id: String },
}

/// Deleted fact ids, in deletion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub groups: usize,
    pub deleted: Vec<String>,
}

#[derive(Clone)]
pub struct MemoryEvaluator {
    judge: ModelClient,
    store: Arc<dyn KnowledgeStore>,
}

impl MemoryEvaluator {
    pub fn new(judge: ModelClient, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { judge, store }
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Evaluate then apply. Judge failures abort without writing anything.
    pub async fn process(
        &self,
        agent_id: &str,
        user_id: &str,
        message: &str,
    ) -> Result<MemoryOutcome, EvaluationError> {
        let decision = self.evaluate(user_id, message).await?;
        self.apply(agent_id, user_id, &decision).await
    }

    pub async fn evaluate(
        &self,
        user_id: &str,
        message: &str,
    ) -> Result<MemoryDecision, EvaluationError> {
        if is_non_memory_message(message) {
            debug!(user_id, "message skipped by memory heuristics");
            return Ok(MemoryDecision::skip());
        }

        let existing = self.existing_facts(user_id).await?;
        let listed: Vec<Value> = existing
            .iter()
            .map(|fact| json!({ "id": fact.id, "content": fact.content }))
            .collect();
        let prompt = evaluation_prompt(message, &serde_json::to_string(&listed).unwrap_or_else(|_| "[]".into()));

        let response = self
            .judge
            .generate(&prompt, EVALUATE_INSTRUCTION, &[])
            .await
            .inspect_err(|err| warn!(user_id, error = %err, "memory evaluation call failed"))?;

        let mut decision: MemoryDecision = extract_json(response.content_text(), JsonShape::Object)
            .inspect_err(|err| {
                warn!(user_id, error = %err, response = response.content_text(), "unparseable memory decision")
            })?;
        if decision.importance < memory::MIN_IMPORTANCE {
            decision.should_save = false;
        }

        debug!(
            user_id,
            should_save = decision.should_save,
            memory_type = %decision.memory_type,
            importance = decision.importance,
            "memory evaluation completed"
        );
        Ok(decision)
    }

    pub async fn apply(
        &self,
        agent_id: &str,
        user_id: &str,
        decision: &MemoryDecision,
    ) -> Result<MemoryOutcome, EvaluationError> {
        if !decision.is_saveable() {
            return Ok(MemoryOutcome::Skipped);
        }
        let content = decision.content.trim();

        if decision.updates_existing && !decision.existing_id.trim().is_empty() {
            let existing_id = decision.existing_id.trim();
            match self.store.update_fact(existing_id, content).await {
                Ok(fact) => {
                    info!(fact_id = %fact.id, user_id, "updated existing fact");
                    return Ok(MemoryOutcome::Updated { fact_id: fact.id });
                }
                Err(err) => {
                    warn!(existing_id, error = %err, "existing fact not updated, checking for similar facts");
                }
            }
        }

        if let Some(similar) = self.find_similar_fact(user_id, content).await? {
            match self.store.update_fact(&similar.id, content).await {
                Ok(fact) => {
                    info!(
                        fact_id = %fact.id,
                        user_id,
                        old_content = %similar.content,
                        new_content = content,
                        "updated similar fact instead of creating a duplicate"
                    );
                    return Ok(MemoryOutcome::Updated { fact_id: fact.id });
                }
                Err(err) => {
                    warn!(fact_id = %similar.id, error = %err, "similar fact not updated, creating a new one");
                }
            }
        }

        let kind = decision.kind();
        let topics = decision.topics_or_default();
        let fact = self
            .store
            .create_fact(
                NewFact::new(agent_id, content)
                    .with_source(kind.source())
                    .told_by(user_id)
                    .about(topics.clone()),
            )
            .await?;

        info!(
            fact_id = %fact.id,
            user_id,
            memory_type = %decision.memory_type,
            importance = decision.importance,
            ?topics,
            reasoning = %decision.reasoning,
            "auto-saved memory"
        );
        Ok(MemoryOutcome::Created { fact_id: fact.id })
    }

    /// Ask the judge to group duplicate or conflicting facts and keep only
    /// the first fact of each group.
    pub async fn cleanup_duplicate_facts(
        &self,
        user_id: &str,
    ) -> Result<CleanupReport, EvaluationError> {
        let facts = self.store.get_user_facts(user_id).await?;
        if facts.len() < 2 {
            return Ok(CleanupReport::default());
        }

        let prompt = format!(
            r#"You are a memory deduplication system. Analyze these facts and group them by duplicates or conflicts.

Facts:
{}

Respond with ONLY valid JSON array (no markdown, no explanation):
[
  {{"group": ["fact_id1", "fact_id2", ...], "type": "duplicate|conflict", "reason": "why they're grouped"}}
]

Guidelines:
- Group facts that are clearly duplicates (same meaning, different wording)
- Group facts that are conflicts (contradictory information about the same topic)
- Put the fact worth keeping first in each group
- Each fact ID should appear in at most one group
- Only create groups with 2+ facts
- Return empty array if no duplicates/conflicts found"#,
            numbered_facts(&facts)
        );

        let response = self.judge.generate(&prompt, ARRAY_INSTRUCTION, &[]).await?;
        let groups: Vec<DuplicateGroup> = extract_json(response.content_text(), JsonShape::Array)?;

        let mut report = CleanupReport::default();
        for group in groups.into_iter().filter(|g| g.group.len() >= 2) {
            report.groups += 1;
            let keep_id = &group.group[0];
            for fact_id in &group.group[1..] {
                if fact_id == keep_id {
                    continue;
                }
                match self.store.delete_fact(fact_id).await {
                    Ok(()) => {
                        info!(fact_id = %fact_id, kept_id = %keep_id, user_id, "deleted duplicate fact");
                        report.deleted.push(fact_id.clone());
                    }
                    Err(err) => warn!(fact_id = %fact_id, error = %err, "failed to delete duplicate fact"),
                }
            }
        }
        Ok(report)
    }

    async fn existing_facts(&self, user_id: &str) -> Result<Vec<Fact>, EvaluationError> {
        match self.store.get_user_context(user_id).await {
            Ok(context) => Ok(context.facts),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// First existing fact the judge considers the same memory
    async fn find_similar_fact(
        &self,
        user_id: &str,
        content: &str,
    ) -> Result<Option<Fact>, EvaluationError> {
        let facts = self.existing_facts(user_id).await?;
        if facts.is_empty() {
            return Ok(None);
        }

        let prompt = format!(
            r#"Compare this new fact with existing facts and identify which ones are duplicates, conflicts, or updates:

New fact: "{content}"

Existing facts:
{}

Respond with ONLY valid JSON array (no markdown, no explanation):
[
  {{"id": "fact_id", "relationship": "duplicate|conflict|update|similar|none", "confidence": 0.0-1.0, "reason": "brief explanation"}}
]

Guidelines:
- "duplicate": Same meaning, different wording (e.g., "User prefers English" vs "User prefers to communicate in English")
- "conflict": Contradictory information (e.g., "User prefers English" vs "User prefers Pig Latin")
- "update": Newer version of old information (e.g., "User is 25" vs "User is 26")
- "similar": Related but not identical (e.g., "User likes pizza" vs "User loves Italian food")
- "none": Not related

Only include facts where relationship is NOT "none" and confidence >= 0.7. Return the most similar/conflicting fact first."#,
            numbered_facts(&facts)
        );

        let response = self.judge.generate(&prompt, ARRAY_INSTRUCTION, &[]).await?;
        let verdicts: Vec<SimilarityVerdict> =
            extract_json(response.content_text(), JsonShape::Array)?;

        let mut by_id: HashMap<String, Fact> =
            facts.into_iter().map(|fact| (fact.id.clone(), fact)).collect();
        Ok(verdicts
            .iter()
            .filter(|verdict| verdict.is_match())
            .find_map(|verdict| by_id.remove(verdict.id.trim())))
    }
}

/// Cheap pre-filter for greetings, questions aimed at the agent and commands
pub fn is_non_memory_message(message: &str) -> bool {
    let lower = message.trim().to_lowercase();
    if lower.chars().count() < memory::MIN_MESSAGE_CHARS {
        return true;
    }

    if GREETING_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        return true;
    }

    // Questions that mention the speaker may still carry a memory
    if QUESTION_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
        && lower.contains('?')
        && !lower.contains("my ")
        && !lower.contains("i ")
    {
        return true;
    }

    COMMAND_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

fn numbered_facts(facts: &[Fact]) -> String {
    facts
        .iter()
        .enumerate()
        .map(|(i, fact)| format!("{}. [ID: {}] {}", i + 1, fact.id, fact.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn evaluation_prompt(message: &str, existing_json: &str) -> String {
    format!(
        r#"You are a memory evaluation system. Analyze this user message and decide if anything should be saved to memory.

User message: "{message}"

Existing facts about this user:
{existing_json}

Respond with ONLY valid JSON (no markdown, no explanation):
{{
  "should_save": true or false,
  "memory_type": "fact" or "preference" or "personal_info" or "life_event" or "none",
  "content": "The specific information to save, rewritten clearly and concisely",
  "topics": ["topic1", "topic2"],
  "importance": 1-10,
  "updates_existing": true or false,
  "existing_id": "fact id if updating, empty string otherwise",
  "reasoning": "Brief one-sentence explanation"
}}

Guidelines:
- Save facts about the user: name, location, job, interests, opinions, relationships
- Save preferences: likes, dislikes, favorites, habits
- Save personal info: age, location, occupation, family
- Save life events: major changes, achievements, milestones
- DON'T save: greetings, questions to you, generic statements, temporary states
- Importance scale:
  * 8-10: Major life events, core identity, important relationships, critical preferences
  * 5-7: Preferences, interests, opinions, moderate importance facts
  * 1-4: Minor details, passing mentions, low importance
- CRITICAL: Check existing facts carefully for duplicates or conflicts:
  * If the new info is a duplicate (same meaning, different wording), set updates_existing=true and provide existing_id
  * If the new info contradicts existing info, set updates_existing=true and provide existing_id of the fact to replace
  * If the new info updates old info (e.g., age changes), set updates_existing=true and provide existing_id
- Only set should_save=true if importance >= 3
- Extract topics automatically (e.g., "I love pizza" -> topics: ["Food", "Preferences"])
- Rewrite content to be clear and standalone (e.g., "I love pizza" -> "User loves pizza")"#
    )
}
