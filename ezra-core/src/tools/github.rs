//! Read-only GitHub access: repository info, search, org listings and
//! raw file reads.

use crate::config::constants::github;
use crate::error::ErrorKind;
use crate::tools::args::{GitHubSearchArgs, OrgReposArgs, ReadFileArgs, RepoArgs};
use crate::tools::result::{ToolData, ToolResult};
use crate::tools::web::text::truncate_chars;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

const RAW_BASE: &str = "https://raw.githubusercontent.com";
const DEFAULT_BRANCH: &str = "main";
const LEGACY_BRANCH: &str = "master";
const SEARCH_TYPES: &[&str] = &["repositories", "code", "issues", "users", "commits", "topics"];

#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    api_base: String,
    raw_base: String,
}

impl GitHubClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(github::TIMEOUT_SECS))
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(Self {
            http,
            api_base: github::API_BASE.to_string(),
            raw_base: RAW_BASE.to_string(),
        })
    }

    /// Override the API and raw-content hosts (GitHub Enterprise, tests)
    pub fn with_endpoints(mut self, api_base: impl Into<String>, raw_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.raw_base = raw_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn api_get(&self, path: &str, query: &[(&str, String)]) -> Result<(StatusCode, Value)> {
        let response = self
            .http
            .get(format!("{}{path}", self.api_base))
            .query(query)
            .header(ACCEPT, github::ACCEPT)
            .header(USER_AGENT, github::USER_AGENT)
            .send()
            .await
            .context("GitHub API error")?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok((status, Value::Null));
        }
        let body = response
            .json::<Value>()
            .await
            .context("Failed to parse response")?;
        Ok((status, body))
    }

    pub async fn repo_info(&self, args: RepoArgs) -> Result<ToolResult> {
        let (owner, repo) = (args.owner.trim(), args.repo.trim());
        if owner.is_empty() || repo.is_empty() {
            return Ok(ToolResult::invalid("owner and repo are required"));
        }

        let (status, body) = self.api_get(&format!("/repos/{owner}/{repo}"), &[]).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(ToolResult::failure(ErrorKind::NotFound, "Repository not found"));
        }
        if !status.is_success() {
            return Ok(api_failure(status, &body));
        }

        let summary = repo_summary(&body);
        let name = summary["full_name"].as_str().unwrap_or(repo).to_string();
        Ok(ToolResult::ok(format!("Repository info for {name}")).with_data(ToolData::Raw(summary)))
    }

    pub async fn search(&self, args: GitHubSearchArgs) -> Result<ToolResult> {
        let query = args.query.trim();
        if query.is_empty() {
            return Ok(ToolResult::invalid("query is required"));
        }
        let search_type = args
            .search_type
            .as_deref()
            .map(str::trim)
            .filter(|t| SEARCH_TYPES.contains(t))
            .unwrap_or("repositories");
        let limit = args.limit.unwrap_or(github::DEFAULT_LIMIT).clamp(1, 100);

        let (status, body) = self
            .api_get(
                &format!("/search/{search_type}"),
                &[("q", query.to_string()), ("per_page", limit.to_string())],
            )
            .await?;
        if !status.is_success() {
            return Ok(api_failure(status, &body));
        }

        let total = body.get("total_count").and_then(Value::as_u64).unwrap_or(0);
        Ok(ToolResult::ok(format!("Found {total} results")).with_data(ToolData::Raw(body)))
    }

    pub async fn list_org_repos(&self, args: OrgReposArgs) -> Result<ToolResult> {
        let org = args.org.trim();
        if org.is_empty() {
            return Ok(ToolResult::invalid("org is required"));
        }
        let limit = args.limit.unwrap_or(github::DEFAULT_LIMIT).clamp(1, 100);

        let (status, body) = self
            .api_get(
                &format!("/orgs/{org}/repos"),
                &[
                    ("sort", "updated".to_string()),
                    ("direction", "desc".to_string()),
                    ("per_page", limit.to_string()),
                ],
            )
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(ToolResult::failure(
                ErrorKind::NotFound,
                format!("Organization '{org}' not found"),
            ));
        }
        if !status.is_success() {
            return Ok(api_failure(status, &body));
        }

        let repos: Vec<Value> = body
            .as_array()
            .map(|items| items.iter().map(org_repo_entry).collect())
            .unwrap_or_default();
        Ok(org_repos_result(org, repos))
    }

    pub async fn read_file(&self, args: ReadFileArgs) -> Result<ToolResult> {
        let (owner, repo, path) = (args.owner.trim(), args.repo.trim(), args.path.trim());
        if owner.is_empty() || repo.is_empty() || path.is_empty() {
            return Ok(ToolResult::invalid("owner, repo, and path are required"));
        }
        let path = path.trim_start_matches('/');
        let requested = args
            .branch
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BRANCH);

        let mut branches = vec![requested];
        if requested == DEFAULT_BRANCH {
            branches.push(LEGACY_BRANCH);
        }

        for branch in branches {
            let url = format!("{}/{owner}/{repo}/{branch}/{path}", self.raw_base);
            let response = self
                .http
                .get(&url)
                .header(USER_AGENT, github::USER_AGENT)
                .send()
                .await
                .context("Failed to fetch file")?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                tracing::debug!(owner, repo, branch, path, "file not on branch");
                continue;
            }
            if !status.is_success() {
                return Ok(api_failure(status, &Value::Null));
            }

            let bytes = response.bytes().await.context("Failed to fetch file")?;
            let limited = &bytes[..bytes.len().min(github::MAX_FILE_BYTES)];
            let content = cap_file_content(&String::from_utf8_lossy(limited));
            return Ok(ToolResult::ok(format!("Read {path} from {owner}/{repo}@{branch}"))
                .with_data(ToolData::Raw(json!({
                    "path": path,
                    "branch": branch,
                    "content": content,
                }))));
        }

        Ok(ToolResult::failure(ErrorKind::NotFound, "File not found"))
    }
}

/// Fields surfaced for one repository
pub fn repo_summary(repo: &Value) -> Value {
    json!({
        "name": repo["name"],
        "full_name": repo["full_name"],
        "description": repo["description"],
        "stars": repo["stargazers_count"],
        "forks": repo["forks_count"],
        "language": repo["language"],
        "open_issues": repo["open_issues_count"],
        "url": repo["html_url"],
        "default_branch": repo["default_branch"],
        "created_at": repo["created_at"],
        "updated_at": repo["updated_at"],
        "topics": repo["topics"],
    })
}

fn org_repo_entry(repo: &Value) -> Value {
    json!({
        "name": repo["name"],
        "full_name": repo["full_name"],
        "description": repo["description"],
        "language": repo["language"],
        "updated_at": repo["updated_at"],
        "pushed_at": repo["pushed_at"],
        "url": repo["html_url"],
        "stars": repo["stargazers_count"],
    })
}

fn org_repos_result(org: &str, repos: Vec<Value>) -> ToolResult {
    let Some(most_recent) = repos.first() else {
        return ToolResult::ok(format!(
            "No public repositories found for organization '{org}'"
        ));
    };
    let message = format!(
        "Found {} repos. Most recently updated: {} (updated: {})",
        repos.len(),
        most_recent["name"].as_str().unwrap_or("unknown"),
        most_recent["updated_at"].as_str().unwrap_or("unknown"),
    );
    ToolResult::ok(message).with_data(ToolData::Raw(Value::Array(repos)))
}

fn cap_file_content(content: &str) -> String {
    if content.chars().count() > github::MAX_FILE_CHARS {
        format!("{}\n... (truncated)", truncate_chars(content, github::MAX_FILE_CHARS))
    } else {
        content.to_string()
    }
}

fn api_failure(status: StatusCode, body: &Value) -> ToolResult {
    let detail = body
        .get("message")
        .and_then(Value::as_str)
        .map(|message| format!(" ({message})"))
        .unwrap_or_default();
    let kind = if status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ErrorKind::Retryable
    } else {
        ErrorKind::ToolExecution
    };
    ToolResult::failure(kind, format!("GitHub API error: HTTP {}{detail}", status.as_u16()))
}
