//! Writing-style analysis over a user's stored messages.

use crate::knowledge::ChatMessage;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const COMMON_WORD_LIMIT: usize = 10;
const PHRASE_LIMIT: usize = 12;
const EMOJI_LIMIT: usize = 5;
const SAMPLE_COUNT: usize = 5;
const BURST_WINDOW_SECS: i64 = 60;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my", "your",
    "his", "its", "our", "their", "this", "that", "these", "those", "and", "but", "or", "so",
    "if", "then", "than", "of", "in", "on", "at", "to", "for", "with", "by", "from", "up",
    "about", "into", "through", "during", "before", "after", "above", "below", "between",
    "under", "again", "further", "once", "just", "like", "dont", "im",
];

const OPINION_CUES: &[&str] = &[
    "i hate",
    "i love",
    "i dislike",
    "i prefer",
    "i always",
    "i never",
    "i think",
    "i believe",
    "i feel",
    "my favorite",
    "my least favorite",
    "i'm a fan of",
    "i can't stand",
    "i'm into",
    "i'm not into",
];

static WORD: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[a-zA-Z]+").ok());
static PHRASE_TOKEN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[a-zA-Z0-9']+").ok());
static EMOJI: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"[\x{1F600}-\x{1F64F}]|[\x{1F300}-\x{1F5FF}]|[\x{1F680}-\x{1F6FF}]|[\x{2600}-\x{26FF}]|[\x{2700}-\x{27BF}]|:\w+:|<:\w+:\d+>",
    )
    .ok()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatHabits {
    pub code_ticks_rate: f64,
    pub code_block_rate: f64,
    pub emphasis_rate: f64,
    pub quote_rate: f64,
    pub multi_line_rate: f64,
    pub ellipsis_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthDistribution {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    /// Share of consecutive messages sent within a minute of each other
    pub burstiness: f64,
}

/// Everything the mimic prompt is generated from. Cached per (user, scope).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub user_id: String,
    pub username: String,
    pub message_count: usize,
    pub avg_message_length: f64,
    pub length_distribution: LengthDistribution,
    pub capitalization: String,
    pub punctuation_style: String,
    pub common_words: Vec<String>,
    pub common_phrases: Vec<String>,
    pub emoji_usage: Vec<String>,
    pub format_habits: FormatHabits,
    pub tone_indicators: Vec<String>,
    pub sample_messages: Vec<String>,
    #[serde(default)]
    pub style_prompt: String,
}

/// Build a profile from `messages` in any order. Returns `None` when there
/// is nothing to analyze.
pub fn analyze_messages(
    user_id: &str,
    username: &str,
    messages: &[ChatMessage],
) -> Option<StyleProfile> {
    if messages.is_empty() {
        return None;
    }
    let chronological: Vec<&ChatMessage> = messages
        .iter()
        .sorted_by_key(|message| message.timestamp)
        .collect();
    let texts: Vec<&str> = chronological.iter().map(|m| m.content.as_str()).collect();

    let lengths: Vec<usize> = texts.iter().map(|t| t.chars().count()).collect();
    let avg_message_length = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;

    Some(StyleProfile {
        user_id: user_id.to_string(),
        username: username.to_string(),
        message_count: texts.len(),
        avg_message_length,
        length_distribution: length_distribution(&lengths, &chronological),
        capitalization: capitalization(&texts).to_string(),
        punctuation_style: punctuation(&texts).to_string(),
        common_words: common_words(&texts, COMMON_WORD_LIMIT),
        common_phrases: common_phrases(&texts, PHRASE_LIMIT),
        emoji_usage: emoji_usage(&texts, EMOJI_LIMIT),
        format_habits: format_habits(&texts),
        tone_indicators: tone(&texts),
        sample_messages: sample_messages(&texts, SAMPLE_COUNT),
        style_prompt: String::new(),
    })
}

pub fn capitalization(messages: &[&str]) -> &'static str {
    let (mut lower, mut upper, mut normal) = (0usize, 0usize, 0usize);
    for message in messages {
        if *message == message.to_lowercase() {
            lower += 1;
        } else if *message == message.to_uppercase() {
            upper += 1;
        } else if message.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            normal += 1;
        }
    }

    let total = messages.len();
    if lower > total * 70 / 100 {
        "lowercase"
    } else if upper > total * 50 / 100 {
        "uppercase"
    } else if normal > total * 50 / 100 {
        "normal"
    } else {
        "mixed"
    }
}

pub fn punctuation(messages: &[&str]) -> &'static str {
    let total_chars: usize = messages.iter().map(|m| m.chars().count()).sum();
    if total_chars == 0 {
        return "minimal";
    }
    let marks = messages
        .iter()
        .flat_map(|m| m.chars())
        .filter(|c| matches!(c, '!' | '?' | '.' | ',' | ';' | ':'))
        .count();

    let ratio = marks as f64 / total_chars as f64;
    if ratio < 0.02 {
        "minimal"
    } else if ratio > 0.08 {
        "heavy"
    } else {
        "normal"
    }
}

/// Most frequent first; ties break alphabetically
fn top_by_count(counts: HashMap<String, usize>, limit: usize) -> Vec<String> {
    counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .take(limit)
        .map(|(item, _)| item)
        .collect()
}

pub fn common_words(messages: &[&str], limit: usize) -> Vec<String> {
    let Some(word) = WORD.as_ref() else {
        return Vec::new();
    };
    let mut counts: HashMap<String, usize> = HashMap::new();
    for message in messages {
        let lower = message.to_lowercase();
        for found in word.find_iter(&lower) {
            let w = found.as_str();
            if w.len() > 2 && !STOPWORDS.contains(&w) {
                *counts.entry(w.to_string()).or_default() += 1;
            }
        }
    }
    top_by_count(counts, limit)
}

/// Word bigrams of at least four characters
pub fn common_phrases(messages: &[&str], limit: usize) -> Vec<String> {
    let Some(token) = PHRASE_TOKEN.as_ref() else {
        return Vec::new();
    };
    let mut counts: HashMap<String, usize> = HashMap::new();
    for message in messages {
        let lower = message.to_lowercase();
        let words: Vec<&str> = token.find_iter(&lower).map(|m| m.as_str()).collect();
        for pair in words.windows(2) {
            let phrase = pair.join(" ");
            if phrase.len() >= 4 {
                *counts.entry(phrase).or_default() += 1;
            }
        }
    }
    top_by_count(counts, limit)
}

pub fn emoji_usage(messages: &[&str], limit: usize) -> Vec<String> {
    let Some(emoji) = EMOJI.as_ref() else {
        return Vec::new();
    };
    let mut counts: HashMap<String, usize> = HashMap::new();
    for message in messages {
        for found in emoji.find_iter(message) {
            *counts.entry(found.as_str().to_string()).or_default() += 1;
        }
    }
    top_by_count(counts, limit)
}

pub fn format_habits(messages: &[&str]) -> FormatHabits {
    if messages.is_empty() {
        return FormatHabits::default();
    }
    let rate = |predicate: &dyn Fn(&str) -> bool| {
        messages.iter().filter(|m| predicate(m)).count() as f64 / messages.len() as f64
    };

    FormatHabits {
        code_ticks_rate: rate(&|m| m.contains('`')),
        code_block_rate: rate(&|m| m.contains("```")),
        emphasis_rate: rate(&|m| m.contains('*')),
        quote_rate: rate(&|m| m.lines().any(|line| line.trim_start().starts_with('>'))),
        multi_line_rate: rate(&|m| m.contains('\n')),
        ellipsis_rate: rate(&|m| m.contains("...")),
    }
}

pub fn tone(messages: &[&str]) -> Vec<String> {
    let total = messages.len();
    if total == 0 {
        return vec!["neutral".to_string()];
    }
    let count = |predicate: &dyn Fn(&str) -> bool| messages.iter().filter(|m| predicate(m)).count();

    let exclamations = count(&|m| m.contains('!'));
    let questions = count(&|m| m.contains('?'));
    let laughs = count(&|m| {
        let lower = m.to_lowercase();
        lower.contains("lol") || lower.contains("lmao") || lower.contains("haha")
    });
    let shouting = count(&|m| m == m.to_uppercase() && m.chars().count() > 3);
    let long = count(&|m| m.chars().count() > 200);

    let mut indicators = Vec::new();
    if exclamations > total * 30 / 100 {
        indicators.push("enthusiastic");
    }
    if questions > total * 20 / 100 {
        indicators.push("inquisitive");
    }
    if laughs > total * 20 / 100 {
        indicators.push("humorous");
    }
    if shouting > total * 10 / 100 {
        indicators.push("expressive");
    }
    if long > total * 30 / 100 {
        indicators.push("detailed");
    } else if long < total * 10 / 100 {
        indicators.push("concise");
    }
    if indicators.is_empty() {
        indicators.push("casual");
    }
    indicators.into_iter().map(str::to_string).collect()
}

/// One short, one medium and one long message, topped up with medium ones
pub fn sample_messages(messages: &[&str], count: usize) -> Vec<String> {
    if messages.len() <= count {
        return messages.iter().map(|m| m.to_string()).collect();
    }

    let (mut short, mut medium, mut long) = (Vec::new(), Vec::new(), Vec::new());
    for message in messages {
        match message.chars().count() {
            0..50 => short.push(*message),
            50..150 => medium.push(*message),
            _ => long.push(*message),
        }
    }

    let mut samples: Vec<String> = [short.first(), medium.first(), long.first()]
        .into_iter()
        .flatten()
        .map(|m| m.to_string())
        .collect();
    for message in medium.iter().skip(1) {
        if samples.len() >= count {
            break;
        }
        samples.push(message.to_string());
    }
    samples
}

fn length_distribution(lengths: &[usize], chronological: &[&ChatMessage]) -> LengthDistribution {
    if lengths.is_empty() {
        return LengthDistribution::default();
    }
    let sorted: Vec<usize> = lengths.iter().copied().sorted().collect();
    let at = |index: usize| sorted.get(index).copied().unwrap_or_default() as f64;

    let burstiness = if chronological.len() > 1 {
        let bursts = chronological
            .windows(2)
            .filter(|pair| {
                let gap = pair[1].timestamp - pair[0].timestamp;
                gap.num_milliseconds() > 0 && gap.num_seconds() < BURST_WINDOW_SECS
            })
            .count();
        bursts as f64 / (chronological.len() - 1) as f64
    } else {
        0.0
    };

    LengthDistribution {
        p25: at(sorted.len() / 4),
        p50: at(sorted.len() / 2),
        p75: at(sorted.len() * 3 / 4),
        burstiness,
    }
}

/// Opinion sentences ("i love", "my favorite", ...) worth keeping as
/// reference memories. Deduplicated, in first-seen order.
pub fn extract_opinions(messages: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut opinions = Vec::new();
    for message in messages {
        let lower = message.to_lowercase();
        for cue in OPINION_CUES.iter().filter(|cue| lower.contains(*cue)) {
            let sentence = message
                .split('.')
                .map(str::trim)
                .find(|sentence| sentence.to_lowercase().contains(cue));
            if let Some(sentence) = sentence
                && (11..200).contains(&sentence.chars().count())
                && seen.insert(sentence.to_string())
            {
                opinions.push(sentence.to_string());
            }
        }
    }
    opinions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Role;
    use chrono::{Duration, TimeZone, Utc};

    fn messages(texts: &[&str]) -> Vec<ChatMessage> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single().unwrap_or_default();
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| ChatMessage {
                id: format!("m{i}"),
                content: text.to_string(),
                role: Role::User,
                platform: "discord".into(),
                timestamp: start + Duration::seconds(30 * i as i64),
                author_id: "u1".into(),
            })
            .collect()
    }

    #[test]
    fn lowercase_speakers_are_detected() {
        let texts = ["hey there", "lol ok", "sounds good to me", "brb", "Fine."];
        assert_eq!(capitalization(&texts), "lowercase");
        assert_eq!(capitalization(&["Hello there", "Good morning", "ok"]), "normal");
    }

    #[test]
    fn punctuation_density_buckets() {
        assert_eq!(punctuation(&["no punctuation here at all really"]), "minimal");
        assert_eq!(punctuation(&["what?! no way!!"]), "heavy");
        assert_eq!(punctuation(&[""]), "minimal");
    }

    #[test]
    fn tone_and_words() {
        let texts = ["haha that rocks!", "lol rust rocks!", "rust is great?", "ok"];
        let tone = tone(&texts);
        assert!(tone.contains(&"enthusiastic".to_string()));
        assert!(tone.contains(&"humorous".to_string()));
        assert!(!tone.contains(&"detailed".to_string()));

        let words = common_words(&texts, 2);
        assert_eq!(words, vec!["rocks".to_string(), "rust".to_string()]);
    }

    #[test]
    fn samples_mix_lengths() {
        let long = "x".repeat(160);
        let medium_a = "m".repeat(60);
        let medium_b = "n".repeat(70);
        let texts = ["tiny", medium_a.as_str(), long.as_str(), medium_b.as_str(), "also tiny", "third tiny"];
        let samples = sample_messages(&texts, 5);
        assert_eq!(samples, vec!["tiny".to_string(), medium_a.clone(), long.clone(), medium_b.clone()]);
    }

    #[test]
    fn opinions_are_extracted_once() {
        let texts = [
            "I love tea with honey. It is nice",
            "i love tea with honey",
            "My favorite color is teal",
            "i hate it",
        ];
        assert_eq!(
            extract_opinions(&texts),
            vec![
                "I love tea with honey".to_string(),
                "i love tea with honey".to_string(),
                "My favorite color is teal".to_string(),
            ]
        );
    }

    #[test]
    fn full_profile_from_messages() {
        let profile = analyze_messages(
            "u1",
            "alice",
            &messages(&["hello :wave: friends", "i love rust", "what about you?"]),
        );
        let Some(profile) = profile else {
            panic!("profile expected");
        };
        assert_eq!(profile.message_count, 3);
        assert_eq!(profile.emoji_usage, vec![":wave:".to_string()]);
        assert!((profile.length_distribution.burstiness - 1.0).abs() < f64::EPSILON);
        assert!(analyze_messages("u1", "alice", &[]).is_none());
    }
}
