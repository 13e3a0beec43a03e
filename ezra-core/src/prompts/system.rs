//! System prompt assembly for one turn

use super::templates::PromptTemplates;
use crate::config::constants::agent;
use crate::knowledge::{ContextWindow, UserContext};
use crate::language::Language;
use crate::tools::ToolContext;
use chrono::{Datelike, Local, NaiveDate};
use serde_json::json;

/// Everything one prompt build reads
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub window: &'a ContextWindow,
    pub user: Option<&'a UserContext>,
    pub ctx: &'a ToolContext,
    /// Style prompt of an active mimic
    pub mimic_prompt: Option<&'a str>,
    /// Per-agent instructions from the agent config
    pub system_instructions: Option<&'a str>,
}

/// Builds the system prompt. Sections always appear in this order: agent
/// header, current date, mimic block, language block, core state, user
/// context, platform, capabilities, behavior rules, response format.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    today: Option<NaiveDate>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the date instead of reading the local clock
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.today = Some(date);
        self
    }

    pub fn build(&self, inputs: &PromptInputs<'_>) -> Result<String, serde_json::Error> {
        let mut sections = Vec::with_capacity(10);

        let name = match inputs.window.identity.name.trim() {
            "" => agent::DEFAULT_AGENT_ID,
            name => name,
        };
        let mut header = PromptTemplates::agent_header(name);
        if let Some(instructions) = inputs
            .system_instructions
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            header.push_str("\n\n");
            header.push_str(instructions);
        }
        sections.push(header);

        sections.push(self.date_section());

        if let Some(style) = inputs.mimic_prompt.filter(|prompt| !prompt.trim().is_empty()) {
            sections.push(PromptTemplates::mimic_section(style));
        }

        if let Some(user) = inputs.user {
            let language = resolve_language(user);
            if !language.is_default() {
                sections.push(PromptTemplates::language_section(language));
            }
        }

        sections.push(format!(
            "## Your Core State\n{}",
            serde_json::to_string_pretty(inputs.window)?
        ));

        if let Some(user) = inputs.user {
            sections.push(format!("## Current User Context\n{}", user_section(user)?));
        }

        sections.push(format!(
            "## Platform Information\n- Platform: {}\n- Channel ID: {}",
            inputs.ctx.platform, inputs.ctx.channel_id
        ));
        sections.push(PromptTemplates::capabilities().to_string());
        sections.push(PromptTemplates::action_rules().to_string());
        sections.push(PromptTemplates::response_format().to_string());

        Ok(sections.join("\n\n"))
    }

    fn date_section(&self) -> String {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        format!(
            "## Current Date\nToday is {}. When searching for current events or news, use \"{} {}\" or similar date context in your queries.",
            today.format("%A, %B %-d, %Y"),
            today.format("%B"),
            today.year()
        )
    }
}

/// Stored preference, then preference facts, then English
pub fn resolve_language(user: &UserContext) -> Language {
    Language::resolve(&user.user.preferred_language, &user.facts)
}

fn user_section(user: &UserContext) -> Result<String, serde_json::Error> {
    let interests: Vec<&str> = user.topics.iter().map(|topic| topic.name.as_str()).collect();
    let known_facts: Vec<&str> = user.facts.iter().map(|fact| fact.content.as_str()).collect();
    serde_json::to_string_pretty(&json!({
        "user_id": user.user.id,
        "external_id": user.user.external_id,
        "username": user.user.display_name,
        "preferred_language": user.user.preferred_language,
        "message_count": user.message_count,
        "interests": interests,
        "known_facts": known_facts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{AgentIdentity, Fact, Topic, User};
    use chrono::Utc;
    use serde_json::Map;

    fn window() -> ContextWindow {
        ContextWindow {
            identity: AgentIdentity::new("Ezra", "curious and direct"),
            core_memory: Vec::new(),
            archival_refs: Vec::new(),
            user_context: Map::new(),
        }
    }

    fn user(preferred_language: &str, facts: &[&str]) -> UserContext {
        let now = Utc::now();
        UserContext {
            user: User {
                id: "bob".into(),
                external_id: "1234".into(),
                platform: "discord".into(),
                display_name: "bob".into(),
                preferred_language: preferred_language.into(),
                first_seen: now,
                last_seen: now,
            },
            topics: vec![Topic {
                id: "t1".into(),
                name: "Sailing".into(),
                description: String::new(),
            }],
            facts: facts
                .iter()
                .map(|content| Fact {
                    id: (*content).into(),
                    content: (*content).into(),
                    source: "conversation".into(),
                    confidence: 1.0,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
            message_count: 12,
            last_message: None,
            conversations: 1,
        }
    }

    fn build(user: Option<&UserContext>, mimic: Option<&str>) -> String {
        let window = window();
        let ctx = ToolContext::new("Ezra", "bob", "general", "discord");
        let builder = PromptBuilder::new().with_date(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap_or_default());
        builder
            .build(&PromptInputs {
                window: &window,
                user,
                ctx: &ctx,
                mimic_prompt: mimic,
                system_instructions: None,
            })
            .unwrap_or_default()
    }

    fn position(prompt: &str, needle: &str) -> usize {
        prompt
            .find(needle)
            .unwrap_or_else(|| panic!("missing section {needle}"))
    }

    #[test]
    fn sections_appear_in_order() {
        let bob = user("fr", &[]);
        let prompt = build(Some(&bob), Some("You ARE alice."));
        let order = [
            "# Ezra - AI Agent System",
            "## Current Date",
            "## PERSONALITY MIMIC MODE ACTIVE",
            "## LANGUAGE PREFERENCE",
            "## Your Core State",
            "## Current User Context",
            "## Platform Information",
            "## Your Capabilities",
            "## CRITICAL: ACTION-FIRST BEHAVIOR",
            "## Response Format",
        ];
        let positions: Vec<usize> = order.iter().map(|needle| position(&prompt, needle)).collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{positions:?}");
        assert!(prompt.contains("Today is Friday, March 14, 2025."));
        assert!(prompt.contains("\"March 2025\""));
        assert!(prompt.contains("communicate in French (language code: fr)"));
        assert!(prompt.contains("- Channel ID: general"));
        assert!(prompt.contains("\"Sailing\""));
    }

    #[test]
    fn english_users_get_no_language_section() {
        let plain = user("", &["User likes teal"]);
        assert!(!build(Some(&plain), None).contains("LANGUAGE PREFERENCE"));
        assert!(!build(None, None).contains("LANGUAGE PREFERENCE"));
        assert!(!build(None, None).contains("MIMIC MODE"));
    }

    #[test]
    fn preference_facts_select_the_language() {
        let bob = user("", &["User prefers to communicate in Spanish"]);
        assert!(build(Some(&bob), None).contains("communicate in Spanish (language code: es)"));
    }
}
