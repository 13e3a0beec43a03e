//! DuckDuckGo HTML result parsing.

use super::text::{collapse_whitespace, truncate_chars};
use crate::config::constants::web;
use crate::tools::result::SearchResult;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static RESULT_LINK: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("a.result__a").ok());
static RESULT_BLOCK: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse(".result, .web-result").ok());
static RESULT_SNIPPET: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse(".result__snippet").ok());

/// Search URL for `query` on an HTML results endpoint
pub fn search_url(endpoint: &str, query: &str) -> String {
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("q", query)
        .finish();
    format!("{endpoint}?{encoded}")
}

/// At most five results that carry a title. Snippets are capped at 200
/// characters with "..." appended.
pub fn parse_search_results(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let (Some(block_sel), Some(link_sel)) = (RESULT_BLOCK.as_ref(), RESULT_LINK.as_ref()) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    let mut seen_links = 0usize;
    for block in document.select(block_sel) {
        let Some(link) = block.select(link_sel).next() else {
            continue;
        };
        seen_links += 1;
        if let Some(result) = build_result(
            &link.text().collect::<String>(),
            link.value().attr("href").unwrap_or_default(),
            RESULT_SNIPPET
                .as_ref()
                .and_then(|sel| block.select(sel).next())
                .map(|el| el.text().collect::<String>())
                .unwrap_or_default(),
        ) {
            results.push(result);
        }
        if results.len() >= web::MAX_SEARCH_RESULTS {
            return results;
        }
    }

    // Some layouts drop the result wrapper; fall back to bare anchors.
    if seen_links == 0 {
        for link in document.select(link_sel) {
            if let Some(result) = build_result(
                &link.text().collect::<String>(),
                link.value().attr("href").unwrap_or_default(),
                String::new(),
            ) {
                results.push(result);
            }
            if results.len() >= web::MAX_SEARCH_RESULTS {
                break;
            }
        }
    }
    results
}

fn build_result(raw_title: &str, href: &str, raw_snippet: String) -> Option<SearchResult> {
    let title = collapse_whitespace(raw_title);
    if title.is_empty() {
        return None;
    }

    let snippet = collapse_whitespace(&raw_snippet);
    let snippet = if snippet.chars().count() > web::SNIPPET_LIMIT {
        format!("{}...", truncate_chars(&snippet, web::SNIPPET_LIMIT))
    } else {
        snippet
    };

    Some(SearchResult {
        title,
        url: unwrap_redirect(href).unwrap_or_default(),
        snippet,
    })
}

/// Result links are wrapped in a redirect carrying the target in `uddg`.
/// Relative links without that parameter are dropped.
pub fn unwrap_redirect(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };

    if let Ok(parsed) = Url::parse(&absolute)
        && let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "uddg")
    {
        return Some(target.into_owned());
    }

    if href.starts_with('/') {
        None
    } else {
        Some(absolute)
    }
}
