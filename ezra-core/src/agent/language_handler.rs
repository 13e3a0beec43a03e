//! Language preference instructions ("set language for @bob to French").
//!
//! Adapters run [`LanguageInstructionHandler::handle`] before a turn. A
//! recognised instruction stores the preference on the target user plus a
//! standalone fact so it survives a reset of the preference column.

use crate::knowledge::{KnowledgeStore, NewFact, StoreResult, User};
use crate::language::Language;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LANGUAGE_FACT_SOURCE: &str = "language_preference";
pub const LANGUAGE_TOPIC: &str = "Language Preferences";

/// Instruction shapes that name a target user, most specific first
static TARGET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    const NAME: &str = r"@?(?P<target>\w+(?:\s+\w+)?)";
    const LANG: &str = r"(?P<lang>pig\s+latin|\w+)";
    [
        format!(r"(?i)set\s+language\s+for\s+{NAME}\s+to\s+{LANG}"),
        format!(r"(?i)set\s+language\s+to\s+{LANG}\s+(?:for|to)\s+{NAME}"),
        format!(r"(?i)set\s+lang={LANG}\s+(?:for|to)\s+{NAME}"),
        format!(r"(?i)set\s+{NAME}\s+language\s+to\s+{LANG}"),
        format!(r"(?i)never\s+forget\s+that\s+{NAME}"),
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// A user the adapter resolved from a platform mention. The agent itself
/// is never in this list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub user_id: String,
    pub display_name: String,
}

impl Mention {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageOutcome {
    NotAnInstruction,
    /// A named target could not be resolved; nothing was changed
    TargetNotFound { name: String },
    Applied {
        user_id: String,
        display_name: String,
        language: Language,
        for_requester: bool,
    },
}

impl LanguageOutcome {
    pub fn confirmation(&self) -> Option<String> {
        match self {
            LanguageOutcome::Applied {
                display_name,
                language,
                for_requester: false,
                ..
            } => Some(format!(
                "Got it! I'll speak {language} with {display_name} from now on."
            )),
            LanguageOutcome::Applied { language, .. } => {
                Some(format!("Got it! I'll speak {language} with you from now on."))
            }
            _ => None,
        }
    }
}

struct Instruction {
    language: Language,
    target: Option<String>,
}

pub struct LanguageInstructionHandler {
    store: Arc<dyn KnowledgeStore>,
}

impl LanguageInstructionHandler {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        agent_id: &str,
        requester: &Mention,
        platform: &str,
        message: &str,
        mentions: &[Mention],
    ) -> StoreResult<LanguageOutcome> {
        let Some(instruction) = parse_instruction(message) else {
            return Ok(LanguageOutcome::NotAnInstruction);
        };
        debug!(language = %instruction.language, target = ?instruction.target, "language instruction detected");

        let (user, for_requester) = if let Some(mention) = mentions.first() {
            let user = self
                .store
                .get_or_create_user(&mention.user_id, &mention.user_id, &mention.display_name, platform)
                .await?;
            (user, false)
        } else if let Some(name) = instruction.target {
            match self.resolve_named(&name).await? {
                Some(user) => (user, false),
                None => {
                    warn!(target_name = %name, "language target not found");
                    return Ok(LanguageOutcome::TargetNotFound { name });
                }
            }
        } else {
            let user = self
                .store
                .get_or_create_user(
                    &requester.user_id,
                    &requester.user_id,
                    &requester.display_name,
                    platform,
                )
                .await?;
            (user, true)
        };

        self.apply(agent_id, &user, instruction.language).await?;
        info!(
            target_user_id = %user.id,
            requester_id = %requester.user_id,
            language = instruction.language.code(),
            "language preference set"
        );

        Ok(LanguageOutcome::Applied {
            user_id: user.id,
            display_name: user.display_name,
            language: instruction.language,
            for_requester,
        })
    }

    /// Store the preference and its backing fact
    pub async fn apply(&self, agent_id: &str, user: &User, language: Language) -> StoreResult<()> {
        self.store
            .set_user_language_preference(&user.id, language.code())
            .await?;

        let fact = NewFact::new(agent_id, format!("User prefers to communicate in {}", language.name()))
            .with_source(LANGUAGE_FACT_SOURCE)
            .told_by(user.id.clone())
            .about([LANGUAGE_TOPIC]);
        if let Err(err) = self.store.create_fact(fact).await {
            warn!(user_id = %user.id, error = %err, "failed to record language preference fact");
        }
        Ok(())
    }

    /// Display-name lookup; a two-word capture falls back to its first word
    async fn resolve_named(&self, name: &str) -> StoreResult<Option<User>> {
        let mut candidates = vec![name.trim().to_string()];
        if let Some(first) = name.split_whitespace().next()
            && first != name.trim()
        {
            candidates.push(first.to_string());
        }

        for candidate in candidates {
            match self.store.find_user_by_display_name(&candidate).await {
                Ok(user) => return Ok(Some(user)),
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

fn parse_instruction(message: &str) -> Option<Instruction> {
    for pattern in TARGET_PATTERNS.iter() {
        let Some(captures) = pattern.captures(message) else {
            continue;
        };
        let language = captured_language(&captures).or_else(|| Language::from_message(message));
        if let Some(language) = language {
            return Some(Instruction {
                language,
                target: captures
                    .name("target")
                    .map(|target| target.as_str().trim().to_string()),
            });
        }
    }

    Language::from_message(message).map(|language| Instruction {
        language,
        target: None,
    })
}

fn captured_language(captures: &Captures<'_>) -> Option<Language> {
    let word = captures.name("lang")?.as_str();
    let collapsed = word.split_whitespace().collect::<Vec<_>>().join(" ");
    Language::from_code(&collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::SqliteKnowledgeStore;
    use crate::knowledge::StoreError;

    async fn setup() -> (LanguageInstructionHandler, Arc<dyn KnowledgeStore>) {
        let store: Arc<dyn KnowledgeStore> = match SqliteKnowledgeStore::open_in_memory() {
            Ok(store) => Arc::new(store),
            Err(err) => panic!("in-memory store: {err}"),
        };
        for (id, name) in [("u-alice", "alice"), ("u-bob", "bob")] {
            if let Err(err) = store.get_or_create_user(id, id, name, "discord").await {
                panic!("user: {err}");
            }
        }
        (LanguageInstructionHandler::new(store.clone()), store)
    }

    fn alice() -> Mention {
        Mention::new("u-alice", "alice")
    }

    #[test]
    fn instructions_are_parsed() {
        let cases = [
            ("set language for @bob to French", Language::French, Some("bob")),
            ("set @bob language to spanish", Language::Spanish, Some("bob")),
            ("set language to German for @bob", Language::German, Some("bob")),
            ("set lang=ja for bob", Language::Japanese, Some("bob")),
            ("set language for bob to pig latin", Language::PigLatin, Some("bob")),
            ("please speak french with me", Language::French, None),
        ];
        for (message, language, target) in cases {
            let parsed = parse_instruction(message).unwrap_or_else(|| panic!("not parsed: {message}"));
            assert_eq!(parsed.language, language, "{message}");
            assert_eq!(parsed.target.as_deref(), target, "{message}");
        }
        assert!(parse_instruction("what's the weather like?").is_none());
    }

    #[tokio::test]
    async fn named_target_gets_preference_and_fact() -> Result<(), StoreError> {
        let (handler, store) = setup().await;

        let outcome = handler
            .handle("Ezra", &alice(), "discord", "set language for @bob to French", &[])
            .await?;
        assert_eq!(
            outcome.confirmation().as_deref(),
            Some("Got it! I'll speak French with bob from now on.")
        );

        assert_eq!(store.get_user_language_preference("u-bob").await?, "fr");
        assert_eq!(store.get_user_language_preference("u-alice").await?, "");
        let facts = store.get_user_facts("u-bob").await?;
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "User prefers to communicate in French");
        assert_eq!(facts[0].source, LANGUAGE_FACT_SOURCE);
        let topics = store.fact_topics(&facts[0].id).await?;
        assert!(topics.iter().any(|topic| topic.name == LANGUAGE_TOPIC));
        Ok(())
    }

    #[tokio::test]
    async fn never_forget_uses_first_word_and_message_language() -> Result<(), StoreError> {
        let (handler, store) = setup().await;
        let outcome = handler
            .handle(
                "Ezra",
                &alice(),
                "discord",
                "never forget that bob is from france, speak french when he talks to you",
                &[],
            )
            .await?;
        assert!(matches!(outcome, LanguageOutcome::Applied { for_requester: false, .. }));
        assert_eq!(store.get_user_language_preference("u-bob").await?, "fr");
        Ok(())
    }

    #[tokio::test]
    async fn mentions_win_and_requester_is_the_fallback() -> Result<(), StoreError> {
        let (handler, store) = setup().await;

        handler
            .handle("Ezra", &alice(), "discord", "set language to Korean for that guy", &[Mention::new("u-carol", "carol")])
            .await?;
        assert_eq!(store.get_user_language_preference("u-carol").await?, "ko");

        let outcome = handler
            .handle("Ezra", &alice(), "discord", "respond in italian please", &[])
            .await?;
        assert!(matches!(outcome, LanguageOutcome::Applied { for_requester: true, .. }));
        assert_eq!(store.get_user_language_preference("u-alice").await?, "it");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_target_changes_nothing() -> Result<(), StoreError> {
        let (handler, store) = setup().await;
        let outcome = handler
            .handle("Ezra", &alice(), "discord", "set language for @zed to German", &[])
            .await?;
        assert_eq!(outcome, LanguageOutcome::TargetNotFound { name: "zed".into() });
        assert_eq!(store.get_user_language_preference("u-alice").await?, "");
        assert!(store.get_user_facts("u-alice").await?.is_empty());
        Ok(())
    }
}
