//! Frequency-scored extractive summaries of fetched pages.

use super::text::collapse_whitespace;
use crate::tools::result::{FetchedPage, PageSummary};
use itertools::Itertools;
use std::collections::HashMap;

const SUMMARY_SENTENCES: usize = 5;
const MIN_SENTENCE_CHARS: usize = 40;
const MAX_SENTENCE_CHARS: usize = 400;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "his", "how", "its", "may", "new", "now", "see", "who",
    "did", "get", "him", "let", "say", "she", "too", "use", "that", "with", "this", "from",
    "they", "will", "would", "there", "their", "what", "about", "which", "when", "were", "been",
    "into", "than", "then", "them", "these", "some", "also", "more", "other", "such", "only",
    "just", "over", "very",
];

/// Pick the highest-scoring sentences of the page, kept in reading order
pub fn summarize_page(page: &FetchedPage) -> PageSummary {
    let body = page_body(page);
    let sentences = split_sentences(&body);

    let frequencies = word_frequencies(&sentences);
    let mut scored: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(index, sentence)| (index, score_sentence(sentence, &frequencies, index)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let summary = scored
        .into_iter()
        .take(SUMMARY_SENTENCES)
        .map(|(index, _)| index)
        .sorted()
        .filter_map(|index| sentences.get(index))
        .join(" ");

    let summary = if summary.is_empty() {
        page.metadata.get("description").cloned().unwrap_or_default()
    } else {
        summary
    };

    PageSummary {
        url: page.url.clone(),
        title: page.title.clone(),
        summary,
    }
}

/// Paragraph text without the markdown headline and metadata preamble
fn page_body(page: &FetchedPage) -> String {
    if !page.sections.is_empty() {
        return page
            .sections
            .iter()
            .flat_map(|section| section.content.iter())
            .filter(|paragraph| !paragraph.starts_with("```"))
            .map(|paragraph| paragraph.trim_start_matches("- ").trim_start_matches("> "))
            .join("\n");
    }
    page.content
        .lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with("**") && line.trim() != "---")
        .join("\n")
}

fn split_sentences(body: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for paragraph in body.lines() {
        let mut current = String::new();
        for ch in paragraph.chars() {
            current.push(ch);
            if matches!(ch, '.' | '!' | '?') {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
        push_sentence(&mut sentences, &current);
    }
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let sentence = collapse_whitespace(raw);
    let length = sentence.chars().count();
    if (MIN_SENTENCE_CHARS..=MAX_SENTENCE_CHARS).contains(&length) {
        sentences.push(sentence);
    }
}

fn words(sentence: &str) -> impl Iterator<Item = String> + '_ {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
}

fn word_frequencies(sentences: &[String]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for sentence in sentences {
        for word in words(sentence) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }
    counts
}

/// Mean keyword frequency, with a small boost for the opening sentences
fn score_sentence(sentence: &str, frequencies: &HashMap<String, usize>, position: usize) -> f64 {
    let (total, count) = words(sentence).fold((0usize, 0usize), |(total, count), word| {
        (total + frequencies.get(&word).copied().unwrap_or(0), count + 1)
    });
    if count == 0 {
        return 0.0;
    }
    let lead_bonus = if position < 2 { 1.25 } else { 1.0 };
    (total as f64 / count as f64) * lead_bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::result::PageSection;
    use std::collections::BTreeMap;

    fn page(paragraphs: &[&str]) -> FetchedPage {
        FetchedPage {
            url: "https://news.example/tokio".into(),
            title: "Tokio internals".into(),
            content: String::new(),
            sections: vec![PageSection {
                heading: String::new(),
                level: 0,
                content: paragraphs.iter().map(|p| p.to_string()).collect(),
            }],
            metadata: BTreeMap::new(),
            text_length: 0,
            fallback_used: false,
        }
    }

    #[test]
    fn keeps_reading_order_and_caps_sentences() {
        let paragraphs = [
            "Tokio is an asynchronous runtime for the Rust programming language.",
            "The runtime schedules tasks on a work-stealing scheduler across threads.",
            "Unrelated filler about the weather in the region is mildly pleasant today.",
            "Tasks in the runtime yield at await points so the scheduler can switch tasks.",
            "Timers in the runtime are driven by a hierarchical wheel inside the scheduler.",
            "The runtime also provides asynchronous networking primitives for Rust tasks.",
            "Tiny.",
            "Another runtime detail: blocking tasks run on a dedicated runtime thread pool.",
        ];
        let summary = summarize_page(&page(&paragraphs));
        assert_eq!(summary.title, "Tokio internals");
        assert!(summary.summary.starts_with("Tokio is an asynchronous runtime"));
        assert!(!summary.summary.contains("Tiny."));
        assert!(!summary.summary.contains("weather"));

        let first = summary.summary.find("work-stealing");
        let later = summary.summary.find("hierarchical wheel");
        if let (Some(first), Some(later)) = (first, later) {
            assert!(first < later);
        }
    }

    #[test]
    fn falls_back_to_description() {
        let mut page = page(&["short"]);
        page.metadata.insert("description".into(), "A page about runtimes".into());
        assert_eq!(summarize_page(&page).summary, "A page about runtimes");
    }
}
