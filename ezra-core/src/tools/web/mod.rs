//! Web search, page fetching and page summaries.

pub mod client;
pub mod extract;
pub mod search;
pub mod summarize;
pub mod text;

pub use client::HttpWebClient;

use crate::config::constants::web;
use crate::tools::args::{FetchArgs, WebSearchArgs};
use crate::tools::result::{FetchedPage, ToolData, ToolResult, WebSearchResults};
use crate::tools::traits::WebClient;
use anyhow::Result;
use summarize::summarize_page;

pub async fn web_search(client: &dyn WebClient, args: WebSearchArgs) -> Result<ToolResult> {
    let query = args.query.trim();
    if query.is_empty() {
        return Ok(ToolResult::invalid("query is required"));
    }

    let results = client.search(query).await?;
    tracing::debug!(query, count = results.len(), "web search finished");
    let message = if results.is_empty() {
        format!("No results found for: {query}")
    } else {
        format!("Found {} results for: {query}", results.len())
    };

    Ok(ToolResult::ok(message).with_data(ToolData::WebSearchResults(WebSearchResults {
        query: query.to_string(),
        original_question: args.original_question,
        results,
    })))
}

pub async fn fetch_webpage(client: &dyn WebClient, args: FetchArgs) -> Result<ToolResult> {
    let url = args.url.trim();
    if url.is_empty() {
        return Ok(ToolResult::invalid("url is required"));
    }

    let page = client.fetch(url).await?;
    let message = fetch_message(&page);
    Ok(ToolResult::ok(message).with_data(ToolData::FetchedPage(page)))
}

pub async fn summarize_website(client: &dyn WebClient, args: FetchArgs) -> Result<ToolResult> {
    let url = args.url.trim();
    if url.is_empty() {
        return Ok(ToolResult::invalid("url is required"));
    }

    let page = client.fetch(url).await?;
    let summary = summarize_page(&page);
    Ok(ToolResult::ok(format!("Generated summary for {}", summary.url))
        .with_data(ToolData::PageSummary(summary)))
}

fn fetch_message(page: &FetchedPage) -> String {
    if page.fallback_used {
        return format!(
            "Extracted {} characters using fallback extraction from {}",
            page.text_length, page.url
        );
    }

    let mut message = format!(
        "Extracted {} characters in {} sections from {}",
        page.text_length,
        page.sections.len(),
        page.url
    );
    if page.text_length > web::LONG_ARTICLE_CHARS {
        message.push_str(&format!(
            ". Note: For AI-powered summarization of this long article ({} chars), consider using summarize_website tool.",
            page.text_length
        ));
    }
    message
}
