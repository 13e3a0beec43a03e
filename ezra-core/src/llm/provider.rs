//! Provider-neutral request/response types for tool-calling chat models.
//!
//! Everything here follows the OpenAI chat-completions wire shape because the
//! agent talks to an OpenAI-compatible proxy. Providers translate from these
//! types to their own payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One chat-completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: String) -> Self {
        Self {
            role: MessageRole::User,
            content,
        }
    }
}

/// Each turn is a system prompt plus one user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    pub fn as_openai_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

/// Tool schema advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema object
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: String, description: String, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name,
                description,
                parameters,
            },
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function.name
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tool_type != "function" {
            return Err(format!(
                "Only 'function' type is supported, got: {}",
                self.tool_type
            ));
        }
        if self.function.name.is_empty() {
            return Err("Function name cannot be empty".to_string());
        }
        if self.function.description.is_empty() {
            return Err("Function description cannot be empty".to_string());
        }
        if !self.function.parameters.is_object() {
            return Err("Function parameters must be a JSON object".to_string());
        }
        Ok(())
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text as produced by the model
    pub arguments: String,
}

impl ToolCall {
    pub fn function(id: String, name: String, arguments: String) -> Self {
        Self {
            id,
            call_type: "function".to_string(),
            function: FunctionCall { name, arguments },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Arguments as a JSON value. Blank argument strings parse as `{}`.
    pub fn parsed_arguments(&self) -> Result<Value, serde_json::Error> {
        let raw = self.function.arguments.trim();
        if raw.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub usage: Option<Usage>,
    pub finish_reason: FinishReason,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: None,
            usage: None,
            finish_reason: FinishReason::Stop,
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls: Some(tool_calls),
            usage: None,
            finish_reason: FinishReason::ToolCalls,
        }
    }

    /// Trimmed text content, empty when absent
    pub fn content_text(&self) -> &str {
        self.content.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error(String),
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: LLMRequest) -> Result<LLMResponse, LLMError>;

    fn validate_request(&self, request: &LLMRequest) -> Result<(), LLMError> {
        if request.messages.is_empty() {
            return Err(LLMError::InvalidRequest(
                "Messages cannot be empty".to_string(),
            ));
        }
        if request.model.is_empty() {
            return Err(LLMError::InvalidRequest("Model cannot be empty".to_string()));
        }
        if let Some(tools) = &request.tools {
            for tool in tools {
                tool.validate().map_err(LLMError::InvalidRequest)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Rate limit exceeded")]
    RateLimit,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider error: {0}")]
    Provider(String),
}

impl LLMError {
    /// Network, quota and upstream failures may succeed on retry; schema and
    /// credential errors will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LLMError::RateLimit | LLMError::Network(_) | LLMError::Provider(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_arguments_parse_as_empty_object() {
        let call = ToolCall::function("call_1".into(), "ignore".into(), "  ".into());
        assert_eq!(call.parsed_arguments().ok(), Some(json!({})));
    }

    #[test]
    fn tool_definition_requires_object_schema() {
        let bad = ToolDefinition::function("x".into(), "desc".into(), json!("string"));
        assert!(bad.validate().is_err());
        let good = ToolDefinition::function("x".into(), "desc".into(), json!({"type": "object"}));
        assert!(good.validate().is_ok());
    }

    #[test]
    fn retryability_split() {
        assert!(LLMError::RateLimit.is_retryable());
        assert!(LLMError::Provider("HTTP 502".into()).is_retryable());
        assert!(!LLMError::Authentication("bad key".into()).is_retryable());
        assert!(!LLMError::InvalidRequest("schema".into()).is_retryable());
    }
}
