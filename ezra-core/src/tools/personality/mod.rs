//! Personality mimicry: style analysis, cached profiles and per-agent mimic
//! state.

pub mod analysis;
pub mod prompt;

pub use analysis::{StyleProfile, analyze_messages, extract_opinions};

use crate::error::ErrorKind;
use crate::knowledge::KnowledgeStore;
use crate::tools::args::{AnalyzeStyleArgs, MimicArgs};
use crate::tools::context::ToolContext;
use crate::tools::result::{ToolData, ToolResult};
use anyhow::{Result, anyhow};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;

/// Mimic analysis never looks at fewer messages than this
pub const MIN_MIMIC_MESSAGES: usize = 300;
pub const ANALYZE_MESSAGES: usize = 100;
const REFERENCE_MEMORY_LIMIT: usize = 5;
const OPINION_TAG: &str = "auto_extracted";

#[derive(Debug, Clone)]
pub struct MimicState {
    pub original_personality: String,
    pub profile: StyleProfile,
}

pub struct PersonalityService {
    store: Arc<dyn KnowledgeStore>,
    states: DashMap<String, MimicState>,
}

impl PersonalityService {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            states: DashMap::new(),
        }
    }

    pub fn is_mimicking(&self, agent_id: &str) -> bool {
        self.states.contains_key(agent_id)
    }

    /// Style prompt for the agent's active mimic, if any
    pub fn mimic_prompt(&self, agent_id: &str) -> Option<String> {
        self.states
            .get(agent_id)
            .map(|state| state.profile.style_prompt.clone())
    }

    pub fn mimicked_username(&self, agent_id: &str) -> Option<String> {
        self.states
            .get(agent_id)
            .map(|state| state.profile.username.clone())
    }

    pub async fn mimic(&self, ctx: &ToolContext, args: MimicArgs) -> Result<ToolResult> {
        let user_id = args.user_id.trim();
        if user_id.is_empty() {
            return Ok(ToolResult::invalid("user_id is required"));
        }

        if let Some(state) = self.states.get(&ctx.agent_id)
            && state.profile.user_id == user_id
            && !args.update
        {
            let name = state.profile.username.clone();
            tracing::info!(agent_id = %ctx.agent_id, user_id, "mimic already active");
            return Ok(ToolResult::ok(format!(
                "You are already mimicking {name}'s personality. Respond to the user's message naturally in their style - do not call this tool again."
            ))
            .with_data(ToolData::Raw(json!({
                "mimicking": name,
                "messages_analyzed": state.profile.message_count,
                "already_active": true,
                "instruction": "You are already mimicking this user. Do NOT call this tool again. Just respond to the user's message naturally in the mimicked style.",
            }))));
        }

        let message_count = args
            .message_count
            .unwrap_or(MIN_MIMIC_MESSAGES)
            .max(MIN_MIMIC_MESSAGES);

        let original_personality = match self.store.fetch_context_window(&ctx.agent_id).await {
            Ok(window) => window.identity.personality,
            Err(err) if err.is_not_found() => String::new(),
            Err(err) => return Err(err.into()),
        };

        let profile = match self
            .load_profile(ctx, user_id, args.username.as_deref(), message_count, args.update)
            .await
        {
            Ok(profile) => profile,
            Err(err) => {
                return Ok(ToolResult::failure(
                    ErrorKind::ToolExecution,
                    format!("Failed to analyze personality: {err}"),
                ));
            }
        };

        let message = format!(
            "Now mimicking {}'s personality based on {} messages. Use revert_personality to stop.",
            profile.username, profile.message_count
        );
        let data = json!({
            "mimicking": profile.username,
            "messages_analyzed": profile.message_count,
            "style": profile.tone_indicators,
            "capitalization": profile.capitalization,
            "avg_message_length": profile.avg_message_length,
        });
        tracing::info!(
            agent_id = %ctx.agent_id,
            mimicking = %profile.username,
            messages = profile.message_count,
            "mimic mode activated"
        );
        self.states.insert(
            ctx.agent_id.clone(),
            MimicState {
                original_personality,
                profile,
            },
        );

        Ok(ToolResult::ok(message).with_data(ToolData::Raw(data)))
    }

    pub fn revert(&self, ctx: &ToolContext) -> ToolResult {
        match self.states.remove(&ctx.agent_id) {
            Some((_, state)) => {
                tracing::info!(agent_id = %ctx.agent_id, was_mimicking = %state.profile.username, "mimic mode deactivated");
                ToolResult::ok(format!(
                    "Stopped mimicking {}. Reverted to original personality.",
                    state.profile.username
                ))
            }
            None => ToolResult::ok("Not currently mimicking anyone."),
        }
    }

    pub async fn analyze(&self, ctx: &ToolContext, args: AnalyzeStyleArgs) -> Result<ToolResult> {
        let user_id = args.user_id.trim();
        if user_id.is_empty() {
            return Ok(ToolResult::invalid("user_id is required"));
        }

        let profile = match self
            .load_profile(ctx, user_id, None, ANALYZE_MESSAGES, false)
            .await
        {
            Ok(profile) => profile,
            Err(err) => return Ok(ToolResult::failure(ErrorKind::ToolExecution, err.to_string())),
        };

        Ok(ToolResult::ok(format!(
            "Analyzed {} messages from {}",
            profile.message_count, profile.username
        ))
        .with_data(ToolData::Raw(json!({
            "username": profile.username,
            "messages_analyzed": profile.message_count,
            "avg_message_length": profile.avg_message_length,
            "capitalization": profile.capitalization,
            "punctuation": profile.punctuation_style,
            "tone": profile.tone_indicators,
            "common_words": profile.common_words,
            "emoji_usage": profile.emoji_usage,
            "sample_messages": profile.sample_messages,
        }))))
    }

    /// Cached profile for (user, platform) unless `force` is set; otherwise
    /// a fresh analysis that also stores the user's opinions as consented
    /// reference memories.
    async fn load_profile(
        &self,
        ctx: &ToolContext,
        user_id: &str,
        username: Option<&str>,
        message_count: usize,
        force: bool,
    ) -> Result<StyleProfile> {
        let scope = ctx.platform.as_str();

        if !force
            && let Some(cached) = self.store.get_personality_profile(user_id, scope).await?
        {
            match serde_json::from_value::<StyleProfile>(cached) {
                Ok(mut profile) => {
                    tracing::debug!(user_id, scope, "using cached personality profile");
                    profile.style_prompt = self.render_prompt(&profile).await;
                    return Ok(profile);
                }
                Err(err) => {
                    tracing::warn!(user_id, error = %err, "cached profile unreadable, re-analyzing");
                }
            }
        }

        let username = match username.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => match self.store.get_user(user_id).await {
                Ok(user) if !user.display_name.is_empty() => user.display_name,
                Ok(_) => user_id.to_string(),
                Err(err) if err.is_not_found() => user_id.to_string(),
                Err(err) => return Err(err.into()),
            },
        };

        let messages = self.store.get_user_messages(user_id, message_count).await?;
        let mut profile = analyze_messages(user_id, &username, &messages)
            .ok_or_else(|| anyhow!("no messages found from user {user_id}"))?;

        let texts: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        for opinion in extract_opinions(&texts) {
            if let Err(err) = self
                .store
                .store_personality_memory(user_id, &opinion, vec![OPINION_TAG.to_string()], true)
                .await
            {
                tracing::warn!(user_id, error = %err, "failed to store personality memory");
            }
        }

        profile.style_prompt = self.render_prompt(&profile).await;
        match serde_json::to_value(&profile) {
            Ok(value) => {
                if let Err(err) = self.store.store_personality_profile(user_id, scope, value).await {
                    tracing::warn!(user_id, scope, error = %err, "failed to cache personality profile");
                }
            }
            Err(err) => tracing::warn!(user_id, error = %err, "failed to encode personality profile"),
        }
        Ok(profile)
    }

    async fn render_prompt(&self, profile: &StyleProfile) -> String {
        let base = prompt::style_prompt(profile);
        match self
            .store
            .retrieve_personality_memories(&profile.user_id, None, REFERENCE_MEMORY_LIMIT)
            .await
        {
            Ok(memories) => {
                let approved: Vec<_> = memories.into_iter().filter(|m| m.consented).collect();
                prompt::with_reference_memories(base, &approved)
            }
            Err(err) => {
                tracing::warn!(user_id = %profile.user_id, error = %err, "failed to load personality memories");
                base
            }
        }
    }
}
