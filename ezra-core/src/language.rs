//! Language preferences.
//!
//! [`Language`] is the only vocabulary the preference extractor and the
//! prompt builder understand. Unknown codes are rejected rather than passed
//! through.

use crate::knowledge::Fact;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported reply languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    French,
    Spanish,
    German,
    Italian,
    Portuguese,
    Japanese,
    Chinese,
    Korean,
    Russian,
    PigLatin,
}

/// Detection order. Pig Latin goes first so "pig latin" is never read as
/// anything else; English goes last because it is the default.
const SCAN_ORDER: [Language; 11] = [
    Language::PigLatin,
    Language::French,
    Language::Spanish,
    Language::German,
    Language::Italian,
    Language::Portuguese,
    Language::Japanese,
    Language::Chinese,
    Language::Korean,
    Language::Russian,
    Language::English,
];

/// Phrases that name a language in a chat message
static MESSAGE_PATTERNS: Lazy<Vec<(Language, Vec<String>)>> = Lazy::new(|| {
    SCAN_ORDER
        .iter()
        .map(|&language| {
            let name = language.name().to_lowercase();
            let code = language.code();
            let mut patterns = vec![
                format!("speak {name}"),
                format!("speaks {name}"),
                format!("respond in {name}"),
                format!("reply in {name}"),
                format!("language to {name}"),
                format!("language={name}"),
                format!("lang={code}"),
            ];
            if language == Language::French {
                patterns.push("france".to_string());
            }
            (language, patterns)
        })
        .collect()
});

const PREFERENCE_MARKERS: &[&str] = &[
    "prefers to communicate in",
    "preferred language",
    "prefers to speak in",
];

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::French => "fr",
            Self::Spanish => "es",
            Self::German => "de",
            Self::Italian => "it",
            Self::Portuguese => "pt",
            Self::Japanese => "ja",
            Self::Chinese => "zh",
            Self::Korean => "ko",
            Self::Russian => "ru",
            Self::PigLatin => "pig_latin",
        }
    }

    /// Display name used in prompts and confirmation messages
    pub fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::French => "French",
            Self::Spanish => "Spanish",
            Self::German => "German",
            Self::Italian => "Italian",
            Self::Portuguese => "Portuguese",
            Self::Japanese => "Japanese",
            Self::Chinese => "Chinese",
            Self::Korean => "Korean",
            Self::Russian => "Russian",
            Self::PigLatin => "Pig Latin",
        }
    }

    pub fn all() -> &'static [Language] {
        &SCAN_ORDER
    }

    pub fn is_default(self) -> bool {
        self == Self::default()
    }

    /// Parse a language code or display name (case-insensitive).
    pub fn from_code(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        if normalized.is_empty() {
            return None;
        }
        SCAN_ORDER.iter().copied().find(|language| {
            language.code() == normalized
                || language.name().to_lowercase().replace(' ', "_") == normalized
        })
    }

    /// Scan a chat message for a language instruction.
    pub fn from_message(content: &str) -> Option<Self> {
        let lower = content.to_lowercase();
        MESSAGE_PATTERNS
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| lower.contains(p.as_str())))
            .map(|(language, _)| *language)
    }

    /// Infer a preference from stored facts about the user.
    ///
    /// Explicit preference statements win. The second pass accepts "only
    /// speaks X" style facts but skips any fact that opens with a mention,
    /// since those describe somebody else.
    pub fn from_facts(facts: &[Fact]) -> Option<Self> {
        let lowered: Vec<String> = facts.iter().map(|f| f.content.to_lowercase()).collect();

        for fact in &lowered {
            if !PREFERENCE_MARKERS.iter().any(|m| fact.contains(m)) {
                continue;
            }
            if let Some(language) = SCAN_ORDER
                .iter()
                .copied()
                .find(|l| fact.contains(&l.name().to_lowercase()))
            {
                return Some(language);
            }
        }

        for fact in &lowered {
            if fact.starts_with('@') {
                continue;
            }
            let about_user = fact.starts_with("user")
                || fact.starts_with("the user")
                || fact.contains(" only speak");
            if !about_user {
                continue;
            }
            if let Some(language) = SCAN_ORDER.iter().copied().find(|l| {
                let name = l.name().to_lowercase();
                fact.contains(&format!("speaks {name}")) || fact.contains(&format!("speak {name}"))
            }) {
                return Some(language);
            }
        }

        None
    }

    /// Stored preference first, then facts, then the default.
    pub fn resolve(preference: &str, facts: &[Fact]) -> Self {
        Self::from_code(preference)
            .or_else(|| Self::from_facts(facts))
            .unwrap_or_default()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
