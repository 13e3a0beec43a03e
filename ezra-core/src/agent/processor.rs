//! Folding tool results into per-turn state.
//!
//! Everything one turn learns from its tools lives in [`TurnState`]: the
//! textual results fed back to the model on recursion, the fetched-URL set,
//! the newest generated image and the embeds for the adapter. State
//! survives recursion steps; only the reply content is per step.

use super::format::render_tool_result;
use super::turn::{Embed, TurnResult};
use crate::config::constants::tools;
use crate::llm::ToolCall;
use crate::tools::web::text::truncate_chars;
use crate::tools::{ImageArtifact, ToolData, ToolResult};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Article text fed back to the model is capped per article
const ARTICLE_CONTEXT_CHARS: usize = 5_000;
const SNIPPET_CONTEXT_CHARS: usize = 200;

#[derive(Debug, Default)]
pub struct TurnState {
    pub tool_results: Vec<String>,
    /// Insertion-ordered, no duplicates
    pub fetched_urls: Vec<String>,
    pub fetch_count: usize,
    pub embeds: Vec<Embed>,
    pub image: Option<ImageArtifact>,
    pub tool_calls: Vec<ToolCall>,
}

/// What one model response's tool calls did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepSummary {
    pub tool_calls: usize,
    /// Results folded in by this step alone
    pub tool_results: usize,
    pub ran_web_search: bool,
}

/// Per-step rendering switches
#[derive(Debug, Clone, Copy)]
pub struct FoldOptions {
    /// Platform message limit for rendered excerpts
    pub max_chars: usize,
    /// Keep page excerpts out of the reply while more articles are wanted
    pub defer_page_render: bool,
}

impl TurnState {
    pub fn has_fetched(&self, url: &str) -> bool {
        let url = url.trim();
        self.fetched_urls.iter().any(|seen| seen == url)
    }

    /// Record a refused duplicate fetch so the model sees why
    pub fn reject_duplicate_fetch(&mut self, url: &str) {
        warn!(url, "skipping duplicate fetch within turn");
        self.tool_results.push(format!(
            "[{}] ERROR: {url} was already fetched in this turn; pick a different URL",
            tools::FETCH_WEBPAGE
        ));
    }

    /// Fold one executed call. `content` is the reply being built for the
    /// current step.
    pub fn fold(&mut self, call: &ToolCall, result: &ToolResult, content: &mut String, options: FoldOptions) {
        let name = call.name();
        if !result.success {
            warn!(tool = name, error = result.error_text(), "tool execution failed");
            self.tool_results
                .push(format!("[{name}] ERROR: {}", result.error_text()));
            return;
        }
        info!(tool = name, message = %result.message, "tool executed successfully");

        match (name, &result.data) {
            (tools::FETCH_WEBPAGE, Some(ToolData::FetchedPage(page))) => {
                let url = page.url.trim().to_string();
                if !url.is_empty() && !self.has_fetched(&url) {
                    self.fetched_urls.push(url.clone());
                }
                self.fetch_count += 1;
                if page.content.trim().is_empty() {
                    self.tool_results.push(format!("[{name}] Fetched: {url} - {}", result.message));
                } else {
                    self.tool_results.push(format!(
                        "[ARTICLE {} from {url}]:\n{}",
                        self.fetch_count,
                        article_excerpt(&page.content)
                    ));
                }
            }
            (tools::WEB_SEARCH, Some(ToolData::WebSearchResults(search))) if !search.results.is_empty() => {
                let mut lines = vec![format!(
                    "[{name}]: Found {} search results (ARTICLE URLs to fetch):",
                    search.results.len()
                )];
                for (index, hit) in search.results.iter().take(5).enumerate() {
                    lines.push(format!("  ARTICLE {}: {}", index + 1, hit.title));
                    lines.push(format!("    URL: {}", hit.url));
                    if !hit.snippet.is_empty() {
                        lines.push(format!("    Preview: {}", snippet(&hit.snippet)));
                    }
                }
                lines.push(
                    "IMPORTANT: These are ARTICLE URLs. Use fetch_webpage with these URLs to read the actual articles."
                        .to_string(),
                );
                self.tool_results.push(lines.join("\n"));
            }
            (tools::SUMMARIZE_WEBSITE, Some(ToolData::PageSummary(summary))) if !summary.summary.is_empty() => {
                let mut lines = vec![format!("[SUMMARY of {}]:", summary.url)];
                if !summary.title.is_empty() {
                    lines.push(format!("Title: {}", summary.title));
                }
                lines.push(summary.summary.clone());
                self.tool_results.push(lines.join("\n"));
            }
            _ if !result.message.is_empty() => {
                self.tool_results.push(format!("[{name}]: {}", result.message));
            }
            _ => {}
        }

        if let Some(ToolData::Image(image)) = &result.data
            && !image.bytes.is_empty()
        {
            debug!(size = image.bytes.len(), name = %image.file_name(), "captured generated image");
            self.image = Some(image.clone());
        }

        let informational = tools::INFORMATIONAL.contains(&name);
        let deferred = name == tools::FETCH_WEBPAGE && options.defer_page_render;
        if informational && result.data.is_some() && !deferred {
            let rendered = render_tool_result(name, result, options.max_chars, Utc::now());
            if let Some(text) = rendered.text.filter(|text| !text.is_empty()) {
                if name == tools::WEB_SEARCH {
                    // Search results only decorate a reply the model wrote,
                    // otherwise the turn recurses so articles can be fetched
                    if !content.is_empty() {
                        content.push_str("\n\n");
                        content.push_str(&text);
                    }
                } else if content.is_empty() {
                    *content = text;
                }
            }
            self.embeds.extend(rendered.embeds);
        }

        if name == tools::SEND_MESSAGE && content.is_empty() && !result.message.is_empty() {
            *content = result.message.clone();
        }
    }

    pub fn into_result(self, content: String) -> TurnResult {
        let (image_bytes, image_name, image_meta) = match self.image {
            Some(image) => {
                let name = image.file_name();
                let meta = image.metadata();
                (Some(image.bytes), Some(name), Some(meta))
            }
            None => (None, None, None),
        };
        TurnResult {
            content,
            tool_calls: self.tool_calls,
            ignored: false,
            embeds: self.embeds,
            image_bytes,
            image_name,
            image_meta,
        }
    }
}

fn article_excerpt(content: &str) -> String {
    if content.chars().count() <= ARTICLE_CONTEXT_CHARS {
        return content.to_string();
    }
    let truncated = truncate_chars(content, ARTICLE_CONTEXT_CHARS);
    let floor = truncated.len() * 3 / 4;
    let body = match truncated.rfind('.') {
        Some(period) if period > floor => &truncated[..=period],
        _ => truncated,
    };
    format!("{body}... [content truncated for summarization]")
}

fn snippet(text: &str) -> String {
    if text.chars().count() > SNIPPET_CONTEXT_CHARS {
        format!("{}...", truncate_chars(text, SNIPPET_CONTEXT_CHARS - 3))
    } else {
        text.to_string()
    }
}

/// Number of articles a "summarize the first N articles" request wants.
/// `None` when the message is not a multi-article request.
pub fn requested_article_count(message: &str) -> Option<usize> {
    let lower = message.to_lowercase();
    if !lower.contains("summarize") {
        return None;
    }
    let cue = ["article", "result", "first", "most interesting"]
        .iter()
        .any(|cue| lower.contains(cue));
    if !cue {
        return None;
    }

    let count = lower
        .split(|c: char| !c.is_alphanumeric())
        .find_map(|word| match word {
            "2" | "two" | "both" => Some(2),
            "3" | "three" => Some(3),
            "4" | "four" => Some(4),
            _ => None,
        })
        .unwrap_or(2);
    Some(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FetchedPage, SearchResult, WebSearchResults};

    fn call(name: &str) -> ToolCall {
        ToolCall::function("call-1".into(), name.into(), "{}".into())
    }

    fn options() -> FoldOptions {
        FoldOptions {
            max_chars: 2000,
            defer_page_render: false,
        }
    }

    fn page(url: &str, content: &str) -> ToolResult {
        ToolResult::ok(format!("Fetched {url}")).with_data(ToolData::FetchedPage(FetchedPage {
            url: url.into(),
            title: "Title".into(),
            content: content.into(),
            sections: Vec::new(),
            metadata: Default::default(),
            text_length: content.len(),
            fallback_used: false,
        }))
    }

    #[test]
    fn article_counts() {
        assert_eq!(requested_article_count("summarize the first 3 articles about rust"), Some(3));
        assert_eq!(requested_article_count("Summarize the most interesting result"), Some(2));
        assert_eq!(requested_article_count("summarize four articles on tokio"), Some(4));
        assert_eq!(requested_article_count("summarize this page"), None);
        assert_eq!(requested_article_count("find the first 3 articles"), None);
    }

    #[test]
    fn failures_become_error_lines() {
        let mut state = TurnState::default();
        let mut content = String::new();
        state.fold(
            &call(tools::WEB_SEARCH),
            &ToolResult::invalid("query is required"),
            &mut content,
            options(),
        );
        assert_eq!(state.tool_results, vec!["[web_search] ERROR: query is required"]);
        assert!(content.is_empty());
    }

    #[test]
    fn search_results_list_article_urls_without_replying() {
        let mut state = TurnState::default();
        let mut content = String::new();
        let result = ToolResult::ok("Found 1 results").with_data(ToolData::WebSearchResults(WebSearchResults {
            query: "rust".into(),
            original_question: String::new(),
            results: vec![SearchResult {
                title: "Rust 2024".into(),
                url: "https://example.com/rust".into(),
                snippet: "x".repeat(300),
            }],
        }));
        state.fold(&call(tools::WEB_SEARCH), &result, &mut content, options());

        assert!(content.is_empty());
        assert_eq!(state.embeds.len(), 1);
        let context = &state.tool_results[0];
        assert!(context.contains("ARTICLE 1: Rust 2024"));
        assert!(context.contains("URL: https://example.com/rust"));
        assert!(context.contains(&format!("Preview: {}...", "x".repeat(197))));
    }

    #[test]
    fn fetched_pages_are_tracked_and_numbered() {
        let mut state = TurnState::default();
        let mut content = String::new();
        let defer = FoldOptions {
            defer_page_render: true,
            ..options()
        };
        state.fold(&call(tools::FETCH_WEBPAGE), &page("https://a.example", "First."), &mut content, defer);
        state.fold(&call(tools::FETCH_WEBPAGE), &page("https://b.example", "Second."), &mut content, defer);

        assert_eq!(state.fetch_count, 2);
        assert_eq!(state.fetched_urls, vec!["https://a.example", "https://b.example"]);
        assert!(state.has_fetched(" https://a.example "));
        assert_eq!(state.tool_results[1], "[ARTICLE 2 from https://b.example]:\nSecond.");
        assert!(content.is_empty(), "deferred pages must not produce a reply");

        state.fold(&call(tools::FETCH_WEBPAGE), &page("https://c.example", "Third."), &mut content, options());
        assert!(content.starts_with("I fetched the webpage content from https://c.example"));
    }

    #[test]
    fn long_articles_are_cut_for_context() {
        let text = "Sentence number one. ".repeat(400);
        let excerpt = article_excerpt(&text);
        assert!(excerpt.ends_with("... [content truncated for summarization]"));
        assert!(excerpt.chars().count() < ARTICLE_CONTEXT_CHARS + 60);
    }

    #[test]
    fn send_message_supplies_content_and_images_are_kept() {
        let mut state = TurnState::default();
        let mut content = String::new();
        state.fold(&call(tools::SEND_MESSAGE), &ToolResult::ok("On it!"), &mut content, options());
        assert_eq!(content, "On it!");

        let image = ImageArtifact {
            bytes: vec![1, 2, 3],
            format: "png".into(),
            width: 512,
            height: 512,
            ..ImageArtifact::default()
        };
        state.fold(
            &call(tools::GENERATE_IMAGE),
            &ToolResult::ok("Generated").with_data(ToolData::Image(image)),
            &mut content,
            options(),
        );
        let result = state.into_result(content);
        assert!(result.has_image());
        assert_eq!(result.image_name.as_deref(), Some("image.png"));
        assert_eq!(result.content, "On it!");
    }
}
