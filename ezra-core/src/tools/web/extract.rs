//! Readable-text extraction from article HTML.

use super::text::{collapse_whitespace, cut_at_sentence};
use crate::config::constants::web;
use crate::tools::result::{FetchedPage, PageSection};
use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

const NOISE_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "aside", "form", "svg",
];
const MAIN_CONTENT: &[&str] = &[
    "article",
    "main",
    "[role=main]",
    ".post-content",
    ".entry-content",
    ".article-body",
    "body",
];
const MAX_SECTIONS: usize = 30;
const MIN_PARAGRAPH_CHARS: usize = 20;
const TRUNCATION_MARKER: &str = "\n\n... [content truncated]";

static BLOCKS: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6, p, li, blockquote, pre").ok());
static TITLE: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("title").ok());
static H1: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("h1").ok());
static META: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("meta").ok());
static TIME: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("time[datetime]").ok());

/// Title, sections and metadata pulled from one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredContent {
    pub title: String,
    pub full_text: String,
    pub sections: Vec<PageSection>,
    pub metadata: BTreeMap<String, String>,
    pub text_length: usize,
}

/// Turn a fetched body into a page, falling back to flat text when the
/// structured pass finds too little.
pub fn build_page(url: &str, html: &str) -> Result<FetchedPage> {
    let original_len = html.len();
    let structured = extract_structured(html, web::MAX_PAGE_CHARS);

    let ratio = if original_len == 0 {
        0.0
    } else {
        structured.text_length as f64 / original_len as f64
    };
    let insufficient = structured.text_length == 0
        || structured.full_text.is_empty()
        || (original_len > 10_000 && ratio < 0.005)
        || (original_len > 1_000 && structured.text_length < 100 && structured.sections.is_empty());

    if !insufficient {
        let mut metadata = structured.metadata;
        metadata.insert("source_url".into(), url.to_string());
        return Ok(FetchedPage {
            url: url.to_string(),
            title: structured.title,
            content: structured.full_text,
            sections: structured.sections,
            metadata,
            text_length: structured.text_length,
            fallback_used: false,
        });
    }

    let plain = extract_plain_text(html);
    if plain.is_empty() || (original_len > 1_000 && plain.len() < original_len / 100) {
        bail!("Could not extract text content from webpage (may be JavaScript-rendered or empty)");
    }

    let title = if structured.title.is_empty() {
        "Untitled".to_string()
    } else {
        structured.title
    };
    let mut content = if title == "Untitled" {
        plain
    } else {
        format!("# {title}\n\n{plain}")
    };
    if let Some(cut) = cut_at_sentence(&content, web::MAX_PAGE_CHARS, web::PAGE_SENTENCE_FLOOR) {
        content = cut + TRUNCATION_MARKER;
    }
    let text_length = content.chars().count();

    Ok(FetchedPage {
        url: url.to_string(),
        title,
        content,
        sections: Vec::new(),
        metadata: BTreeMap::from([("source_url".to_string(), url.to_string())]),
        text_length,
        fallback_used: true,
    })
}

pub fn extract_structured(html: &str, max_chars: usize) -> StructuredContent {
    let document = Html::parse_document(html);
    let title = extract_title(&document);
    let metadata = extract_metadata(&document);
    let sections = main_content(&document)
        .map(extract_sections)
        .unwrap_or_default();

    let mut parts = Vec::new();
    if !title.is_empty() {
        parts.push(format!("# {title}\n"));
    }
    if let Some(author) = metadata.get("author") {
        parts.push(format!("**Author:** {author}\n"));
    }
    if let Some(date) = metadata.get("date") {
        parts.push(format!("**Date:** {date}\n"));
    }
    if !metadata.is_empty() {
        parts.push("\n---\n\n".to_string());
    }
    for section in &sections {
        if !section.heading.is_empty() {
            let hashes = "#".repeat(usize::from(section.level) + 1);
            parts.push(format!("\n{hashes} {}\n", section.heading));
        }
        parts.extend(section.content.iter().cloned());
    }

    let has_body = sections.iter().any(|s| !s.content.is_empty());
    let mut full_text = if has_body { parts.join("\n") } else { String::new() };
    if let Some(cut) = cut_at_sentence(&full_text, max_chars, max_chars * 3 / 4) {
        full_text = cut + TRUNCATION_MARKER;
    }

    let mut sections = sections;
    sections.truncate(MAX_SECTIONS);

    StructuredContent {
        text_length: full_text.chars().count(),
        title,
        full_text,
        sections,
        metadata,
    }
}

/// `<title>`, then `og:title`, then the first `<h1>`
fn extract_title(document: &Html) -> String {
    let from_selector = |selector: &Lazy<Option<Selector>>| {
        selector
            .as_ref()
            .and_then(|sel| document.select(sel).next())
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|title| !title.is_empty())
    };

    from_selector(&TITLE)
        .or_else(|| meta_content(document, &["og:title"]))
        .or_else(|| from_selector(&H1))
        .unwrap_or_default()
}

fn extract_metadata(document: &Html) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    if let Some(author) = meta_content(document, &["author", "article:author", "twitter:creator"]) {
        metadata.insert("author".to_string(), author);
    }
    let date = meta_content(
        document,
        &["article:published_time", "date", "pubdate", "publish-date"],
    )
    .or_else(|| {
        TIME.as_ref()
            .and_then(|sel| document.select(sel).next())
            .and_then(|el| el.value().attr("datetime"))
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
    });
    if let Some(date) = date {
        metadata.insert("date".to_string(), date);
    }
    if let Some(description) = meta_content(document, &["description", "og:description"]) {
        metadata.insert("description".to_string(), description);
    }
    metadata
}

fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    let selector = META.as_ref()?;
    for key in keys {
        for el in document.select(selector) {
            let element = el.value();
            let name = element
                .attr("name")
                .or_else(|| element.attr("property"))
                .unwrap_or_default();
            if !name.eq_ignore_ascii_case(key) {
                continue;
            }
            if let Some(content) = element.attr("content") {
                let content = collapse_whitespace(content);
                if !content.is_empty() {
                    return Some(content);
                }
            }
        }
    }
    None
}

fn main_content(document: &Html) -> Option<ElementRef<'_>> {
    MAIN_CONTENT.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .find(|el| !collapse_whitespace(&el.text().collect::<String>()).is_empty())
    })
}

fn is_noise(element: &ElementRef<'_>) -> bool {
    NOISE_TAGS.contains(&element.value().name())
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| NOISE_TAGS.contains(&ancestor.value().name()))
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn extract_sections(root: ElementRef<'_>) -> Vec<PageSection> {
    let Some(blocks) = BLOCKS.as_ref() else {
        return Vec::new();
    };

    let mut sections: Vec<PageSection> = Vec::new();
    let mut current = PageSection {
        heading: String::new(),
        level: 0,
        content: Vec::new(),
    };

    for el in root.select(blocks) {
        if is_noise(&el) {
            continue;
        }
        let tag = el.value().name();
        // Nested blocks (p inside li, li inside blockquote) are read once
        // through their outermost block.
        if el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take_while(|ancestor| ancestor.id() != root.id())
            .any(|ancestor| matches!(ancestor.value().name(), "p" | "li" | "blockquote" | "pre"))
        {
            continue;
        }

        let text = if tag == "pre" {
            el.text().collect::<String>().trim().to_string()
        } else {
            collapse_whitespace(&el.text().collect::<String>())
        };
        if text.is_empty() {
            continue;
        }

        if let Some(level) = heading_level(tag) {
            if !current.heading.is_empty() || !current.content.is_empty() {
                sections.push(current);
            }
            current = PageSection {
                heading: text,
                level,
                content: Vec::new(),
            };
            continue;
        }

        let paragraph = match tag {
            "li" => format!("- {text}"),
            "blockquote" => format!("> {text}"),
            "pre" => format!("```\n{text}\n```"),
            _ if text.chars().count() < MIN_PARAGRAPH_CHARS => continue,
            _ => text,
        };
        if current.content.last() != Some(&paragraph) {
            current.content.push(paragraph);
        }
    }

    if !current.heading.is_empty() || !current.content.is_empty() {
        sections.push(current);
    }
    sections
}

/// Flat readable text of the whole body, one line per text run
pub fn extract_plain_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let mut lines: Vec<String> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let inside_noise = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| NOISE_TAGS.contains(&ancestor.value().name()) || ancestor.value().name() == "title");
        if inside_noise {
            continue;
        }
        let line = collapse_whitespace(text);
        if !line.is_empty() && lines.last() != Some(&line) {
            lines.push(line);
        }
    }
    lines.join("\n")
}
