//! Uniform result envelope returned by every tool.

use crate::error::ErrorKind;
use crate::knowledge::{Fact, UserContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub success: bool,
    /// Human-readable outcome; action tools put their answer here
    pub message: String,
    /// Structured payload; informational tools put their answer here
    pub data: Option<ToolData>,
    pub error: Option<String>,
    /// Classification of `error`, set on failures only
    pub error_kind: Option<ErrorKind>,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: ToolData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn failure(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            error_kind: Some(kind),
            ..Self::default()
        }
    }

    /// Parameter rejection; surfaced to the model, never to the adapter
    pub fn invalid(error: impl Into<String>) -> Self {
        Self::failure(ErrorKind::Validation, error)
    }

    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}

/// Per-tool payloads
#[derive(Debug, Clone, PartialEq)]
pub enum ToolData {
    Image(ImageArtifact),
    WebSearchResults(WebSearchResults),
    FetchedPage(FetchedPage),
    PageSummary(PageSummary),
    UserContextPayload(Box<UserContext>),
    FactList(FactList),
    GenericMessage(String),
    /// Pass-through data (platform tools, GitHub responses, search hits)
    Raw(Value),
}

/// Generated image plus the parameters that produced it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageArtifact {
    pub bytes: Vec<u8>,
    /// File extension, e.g. "png"
    pub format: String,
    pub seed: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub workflow: String,
    pub elapsed_seconds: f64,
}

impl ImageArtifact {
    pub fn file_name(&self) -> String {
        let format = if self.format.trim().is_empty() {
            "png"
        } else {
            self.format.trim()
        };
        format!("image.{format}")
    }

    pub fn metadata(&self) -> serde_json::Map<String, Value> {
        let mut meta = serde_json::Map::new();
        if let Some(seed) = self.seed {
            meta.insert("seed".into(), Value::from(seed));
        }
        meta.insert("width".into(), Value::from(self.width));
        meta.insert("height".into(), Value::from(self.height));
        if !self.workflow.is_empty() {
            meta.insert("workflow".into(), Value::from(self.workflow.clone()));
        }
        meta.insert("elapsed_seconds".into(), Value::from(self.elapsed_seconds));
        meta
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResults {
    pub query: String,
    #[serde(default)]
    pub original_question: String,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSection {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub heading: String,
    /// 1-6 for h1-h6, 0 for untitled runs of text
    pub level: u8,
    pub content: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub title: String,
    /// Markdown-flavoured readable text
    pub content: String,
    pub sections: Vec<PageSection>,
    pub metadata: BTreeMap<String, String>,
    pub text_length: usize,
    #[serde(default)]
    pub fallback_used: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactList {
    pub topic: String,
    pub facts: Vec<Fact>,
}

/// Map a handler failure onto the error taxonomy. Timeouts and transport
/// failures are retryable; everything else is a plain tool failure.
pub fn classify_error(error: &anyhow::Error) -> ErrorKind {
    for cause in error.chain() {
        if let Some(http) = cause.downcast_ref::<reqwest::Error>()
            && (http.is_timeout() || http.is_connect())
        {
            return ErrorKind::Retryable;
        }
        if let Some(store) = cause.downcast_ref::<crate::knowledge::StoreError>() {
            return match store.kind() {
                ErrorKind::Retryable => ErrorKind::Retryable,
                ErrorKind::NotFound => ErrorKind::NotFound,
                _ => ErrorKind::ToolExecution,
            };
        }
        if cause.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
            return ErrorKind::Retryable;
        }
    }

    let message = error.to_string().to_lowercase();
    if message.contains("timed out") || message.contains("timeout") {
        ErrorKind::Retryable
    } else {
        ErrorKind::ToolExecution
    }
}
