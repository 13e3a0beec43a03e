//! What a turn hands back to the platform adapter.

use crate::error::{AgentError, AgentResult};
use crate::llm::ToolCall;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inline: bool,
}

/// Rich card the adapter renders next to the reply
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub footer: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnResult {
    pub content: String,
    /// Every tool call the model made across all recursion steps
    pub tool_calls: Vec<ToolCall>,
    /// The adapter must not reply at all
    pub ignored: bool,
    pub embeds: Vec<Embed>,
    #[serde(skip)]
    pub image_bytes: Option<Vec<u8>>,
    pub image_name: Option<String>,
    pub image_meta: Option<Map<String, Value>>,
}

impl TurnResult {
    pub fn ignored(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            ignored: true,
            tool_calls,
            ..Self::default()
        }
    }

    pub fn has_image(&self) -> bool {
        self.image_bytes.as_ref().is_some_and(|bytes| !bytes.is_empty())
    }

    /// `AgentIgnored` for ignored turns so adapters can use `?`
    pub fn into_reply(self) -> AgentResult<Self> {
        if self.ignored {
            Err(AgentError::AgentIgnored)
        } else {
            Ok(self)
        }
    }
}
