//! Mimic-mode style instructions rendered from a [`StyleProfile`].

use super::analysis::StyleProfile;
use crate::knowledge::PersonalityMemory;
use crate::tools::web::text::truncate_chars;
use std::fmt::Write as _;

const SAMPLE_PREVIEW_CHARS: usize = 140;

pub fn style_prompt(profile: &StyleProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You ARE {}. You are writing as yourself in this chat.",
        profile.username
    );
    out.push_str(
        "Write exactly as you normally would. Be authentic to your own communication style.\n\n",
    );

    out.push_str("STYLE RULES:\n");
    out.push_str(match profile.capitalization.as_str() {
        "lowercase" => "- lowercase style: mostly lowercase, minimal sentence caps.\n",
        "uppercase" => "- emphasis caps: occasional ALL CAPS for emphasis.\n",
        "mixed" => "- mixed casual capitalization.\n",
        _ => "- normal capitalization.\n",
    });
    let _ = writeln!(out, "- punctuation: {}", profile.punctuation_style);
    if !profile.tone_indicators.is_empty() {
        let _ = writeln!(out, "- tone: {}", profile.tone_indicators.join(", "));
    }
    if !profile.common_words.is_empty() {
        let _ = writeln!(out, "- common words: {}", profile.common_words.join(", "));
    }
    if !profile.common_phrases.is_empty() {
        let _ = writeln!(out, "- common phrases: {}", profile.common_phrases.join(", "));
    }
    if profile.emoji_usage.is_empty() {
        out.push_str("- emoji: rarely\n");
    } else {
        let _ = writeln!(out, "- emoji set: {}", profile.emoji_usage.join(" "));
    }

    let habits = &profile.format_habits;
    out.push_str("- formatting habits:\n");
    let _ = writeln!(
        out,
        "  - code ticks rate ~{:.2}, code blocks ~{:.2}, multiline ~{:.2}, ellipses ~{:.2}",
        habits.code_ticks_rate, habits.code_block_rate, habits.multi_line_rate, habits.ellipsis_rate
    );
    if profile.avg_message_length < 50.0 {
        out.push_str("- message length: short and concise\n");
    } else if profile.avg_message_length > 150.0 {
        out.push_str("- message length: longer, detailed messages\n");
    }

    out.push_str("\nIMPORTANT GUIDELINES:\n");
    out.push_str("- Write naturally and authentically in your own style.\n");
    out.push_str("- Do NOT quote the provided examples verbatim - use them as style reference only.\n");
    out.push_str("- Stay true to your communication patterns and vocabulary.\n");
    out.push_str("- Be authentic to yourself in every response.\n");

    if !profile.sample_messages.is_empty() {
        out.push_str("\nEXAMPLES (pattern only, never copy):\n");
        for sample in &profile.sample_messages {
            let flat = sample.replace('\n', " ");
            if flat.chars().count() > SAMPLE_PREVIEW_CHARS {
                let _ = writeln!(out, "- {}…", truncate_chars(&flat, SAMPLE_PREVIEW_CHARS));
            } else {
                let _ = writeln!(out, "- {flat}");
            }
        }
    }

    out.push_str(
        "\nRespond naturally as yourself. Be authentic to your communication style in every message.\n",
    );
    out
}

/// Append approved personality memories so the mimic stays consistent
pub fn with_reference_memories(base: String, memories: &[PersonalityMemory]) -> String {
    let lines: Vec<&str> = memories
        .iter()
        .map(|memory| memory.content.trim())
        .filter(|content| !content.is_empty())
        .collect();
    if lines.is_empty() {
        return base;
    }

    let mut out = base;
    out.push_str("\n\nREFERENCE MEMORIES (approved facts - do not invent new ones):\n");
    for line in lines {
        let _ = writeln!(out, "- {line}");
    }
    out.push_str(
        "\nUse these memories to stay consistent. Do not claim knowledge beyond these approved memories.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile() -> StyleProfile {
        StyleProfile {
            username: "alice".into(),
            capitalization: "lowercase".into(),
            punctuation_style: "minimal".into(),
            tone_indicators: vec!["casual".into()],
            avg_message_length: 20.0,
            sample_messages: vec!["line one\nline two".into(), "y".repeat(200)],
            ..StyleProfile::default()
        }
    }

    #[test]
    fn prompt_carries_style_rules_and_examples() {
        let prompt = style_prompt(&profile());
        assert!(prompt.starts_with("You ARE alice."));
        assert!(prompt.contains("- lowercase style"));
        assert!(prompt.contains("- emoji: rarely"));
        assert!(prompt.contains("- message length: short and concise"));
        assert!(prompt.contains("- line one line two\n"));
        assert!(prompt.contains(&format!("- {}…\n", "y".repeat(140))));
    }

    #[test]
    fn memories_are_appended_only_when_present() {
        let base = style_prompt(&profile());
        assert_eq!(with_reference_memories(base.clone(), &[]), base);

        let memory = PersonalityMemory {
            id: "pm1".into(),
            user_id: "u1".into(),
            content: "My favorite color is teal".into(),
            tags: vec!["auto_extracted".into()],
            consented: true,
            created_at: Utc::now(),
        };
        let prompt = with_reference_memories(base, &[memory]);
        assert!(prompt.contains("REFERENCE MEMORIES (approved facts - do not invent new ones):\n- My favorite color is teal\n"));
    }
}
