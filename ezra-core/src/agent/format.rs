//! User-facing rendering of informational tool results.
//!
//! When the model calls a data tool and says nothing itself, the turn still
//! needs a reply. These renderers turn the structured payload into plain
//! text plus embeds; the adapter owns platform markup.

use super::turn::Embed;
use crate::config::constants::{platform, tools};
use crate::knowledge::UserContext;
use crate::tools::web::text::cut_at_sentence;
use crate::tools::{FactList, FetchedPage, ToolData, ToolResult, WebSearchResults};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Reply text and embeds derived from one tool result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub text: Option<String>,
    pub embeds: Vec<Embed>,
}

impl Rendered {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            embeds: Vec::new(),
        }
    }

    fn message_of(result: &ToolResult) -> Self {
        if result.message.trim().is_empty() {
            Self::default()
        } else {
            Self::text(result.message.clone())
        }
    }
}

/// `max_chars` is the platform message limit; page excerpts stay under it.
pub fn render_tool_result(name: &str, result: &ToolResult, max_chars: usize, now: DateTime<Utc>) -> Rendered {
    let Some(data) = &result.data else {
        return Rendered::default();
    };

    match (name, data) {
        (tools::WEB_SEARCH, ToolData::WebSearchResults(search)) => render_web_search(search),
        (tools::GET_USER_CONTEXT, ToolData::UserContextPayload(context)) => {
            Rendered::text(render_user_context(context))
        }
        (tools::SEARCH_FACTS, ToolData::FactList(list)) => Rendered::text(render_fact_list(list)),
        (tools::FETCH_WEBPAGE, ToolData::FetchedPage(page)) => {
            Rendered::text(render_fetched_page(page, max_chars))
        }
        (tools::GITHUB_LIST_ORG_REPOS, ToolData::Raw(Value::Array(repos))) if !repos.is_empty() => {
            Rendered::text(render_org_repos(repos, now))
        }
        (tools::GITHUB_REPO_INFO, ToolData::Raw(info @ Value::Object(_))) => {
            Rendered::text(render_repo_info(info, now))
        }
        (tools::GITHUB_SEARCH, ToolData::Raw(body)) => match render_github_search(body) {
            Some(text) => Rendered::text(text),
            None => Rendered::message_of(result),
        },
        (
            tools::GITHUB_LIST_ORG_REPOS
            | tools::GITHUB_REPO_INFO
            | tools::FETCH_WEBPAGE
            | tools::GET_USER_CONTEXT,
            _,
        ) => Rendered::message_of(result),
        (tools::SEARCH_FACTS, _) => Rendered::text("I couldn't find any facts about that topic."),
        // Everything else is left for the model to phrase
        _ => Rendered::default(),
    }
}

fn render_web_search(search: &WebSearchResults) -> Rendered {
    let display = if search.original_question.trim().is_empty() {
        search.query.as_str()
    } else {
        search.original_question.as_str()
    };

    if search.results.is_empty() {
        return Rendered::text(format!(
            "I couldn't find any results for \"{display}\". Try rephrasing your search."
        ));
    }

    let embeds = search
        .results
        .iter()
        .take(crate::config::constants::web::MAX_SEARCH_RESULTS)
        .map(|hit| Embed {
            title: hit.title.clone(),
            description: hit.snippet.clone(),
            url: hit.url.clone(),
            color: platform::EMBED_COLOR,
            ..Embed::default()
        })
        .collect();

    Rendered {
        text: Some(format!("Here's what I found for \"{display}\":")),
        embeds,
    }
}

fn render_user_context(context: &UserContext) -> String {
    let mut parts = Vec::new();
    if !context.facts.is_empty() {
        parts.push("Here's what I know about you:".to_string());
        parts.extend(context.facts.iter().map(|fact| format!("• {}", fact.content)));
    }
    if !context.topics.is_empty() {
        if !parts.is_empty() {
            parts.push(String::new());
        }
        let names: Vec<&str> = context.topics.iter().map(|topic| topic.name.as_str()).collect();
        parts.push(format!("Your interests: {}", names.join(", ")));
    }
    if parts.is_empty() {
        return "I don't have much information about you yet. Feel free to share something about yourself!"
            .to_string();
    }
    parts.join("\n")
}

fn render_fact_list(list: &FactList) -> String {
    if list.facts.is_empty() {
        return "I couldn't find any facts about that topic.".to_string();
    }
    let mut parts = vec![format!("I found {} fact(s):", list.facts.len())];
    parts.extend(list.facts.iter().map(|fact| format!("• {}", fact.content)));
    parts.join("\n")
}

fn render_fetched_page(page: &FetchedPage, max_chars: usize) -> String {
    if page.content.trim().is_empty() {
        return "I fetched the webpage but couldn't extract the content.".to_string();
    }

    let intro = format!(
        "I fetched the webpage content from {}. Here's what I found:\n\n",
        page.url
    );
    // Leave room for the truncation note
    let budget = max_chars
        .saturating_sub(200)
        .saturating_sub(intro.chars().count())
        .max(200);
    match cut_at_sentence(&page.content, budget, budget.saturating_sub(200)) {
        Some(excerpt) => format!(
            "{intro}{excerpt}\n\n[Content truncated - page is {} characters long]",
            page.content.chars().count()
        ),
        None => format!("{intro}{}", page.content),
    }
}

fn render_org_repos(repos: &[Value], now: DateTime<Utc>) -> String {
    let latest = &repos[0];
    let name = value_text(&latest["name"]).unwrap_or("unknown");
    let description = value_text(&latest["description"]);
    let updated = relative_time(&latest["updated_at"], now);

    if repos.len() == 1 {
        return match description {
            Some(desc) => format!(
                "The most recently updated repo is **{name}** - {desc}. It was last updated {updated}."
            ),
            None => format!("The most recently updated repo is **{name}**, last updated {updated}."),
        };
    }

    let mut reply = format!("The most recently updated repo is **{name}**");
    if let Some(desc) = description {
        reply.push_str(&format!(" ({desc})"));
    }
    reply.push_str(&format!(", last updated {updated}."));

    let others: Vec<&str> = repos
        .iter()
        .skip(1)
        .take(3)
        .filter_map(|repo| value_text(&repo["name"]))
        .collect();
    if !others.is_empty() {
        reply.push_str(&format!(" Other recent repos: {}.", others.join(", ")));
    }
    reply
}

fn render_repo_info(info: &Value, now: DateTime<Utc>) -> String {
    let name = value_text(&info["full_name"]).unwrap_or("unknown");
    let mut reply = format!("**{name}**");
    if let Some(desc) = value_text(&info["description"]) {
        reply.push_str(&format!(" - {desc}"));
    }
    let stars = info["stars"].as_u64().unwrap_or(0);
    reply.push_str(&format!("\n\nIt has {stars} stars"));
    if let Some(language) = value_text(&info["language"]) {
        reply.push_str(&format!(", written in {language}"));
    }
    reply.push_str(&format!(
        ", and was last updated {}.",
        relative_time(&info["updated_at"], now)
    ));
    reply
}

fn render_github_search(body: &Value) -> Option<String> {
    let items = body["items"].as_array()?;
    let lines: Vec<String> = items
        .iter()
        .take(3)
        .filter_map(|item| {
            let name = value_text(&item["full_name"])?;
            let desc = value_text(&item["description"]).unwrap_or("No description");
            Some(format!("• **{name}** - {desc}"))
        })
        .collect();
    (!lines.is_empty()).then(|| format!("Here's what I found on GitHub:\n\n{}", lines.join("\n")))
}

fn value_text(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|text| !text.is_empty())
}

/// "5 minutes ago", "yesterday", "3 weeks ago", then a calendar date
pub fn relative_time(timestamp: &Value, now: DateTime<Utc>) -> String {
    let Some(raw) = value_text(timestamp) else {
        return "recently".to_string();
    };
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else {
        return raw.to_string();
    };
    let then = parsed.with_timezone(&Utc);
    let elapsed = now.signed_duration_since(then);

    let hours = elapsed.num_hours();
    if hours < 1 {
        format!("{} minutes ago", elapsed.num_minutes().max(0))
    } else if hours < 24 {
        format!("{hours} hours ago")
    } else if hours < 48 {
        "yesterday".to_string()
    } else if hours < 7 * 24 {
        format!("{} days ago", hours / 24)
    } else if hours < 30 * 24 {
        format!("{} weeks ago", hours / (24 * 7))
    } else {
        then.format("%B %-d, %Y").to_string()
    }
}
