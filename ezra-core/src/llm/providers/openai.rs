use crate::llm::provider::{
    FinishReason, FunctionCall, LLMError, LLMProvider, LLMRequest, LLMResponse, MessageRole,
    ToolCall, Usage,
};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

/// Chat-completions client for OpenAI and OpenAI-compatible proxies
/// (LiteLLM, OpenRouter).
pub struct OpenAIProvider {
    api_key: String,
    http_client: HttpClient,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self::with_timeout(api_key, base_url, Duration::from_secs(120))
    }

    pub fn with_timeout(api_key: String, base_url: String, timeout: Duration) -> Self {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!(?error, "Failed to build model HTTP client; using defaults");
                HttpClient::new()
            });
        Self {
            api_key,
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        self.validate_request(&request)?;
        let openai_request = convert_to_openai_format(&request);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| LLMError::Network(format!("Network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, error_text));
        }

        let openai_response: Value = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {e}")))?;

        parse_openai_response(openai_response)
    }
}

fn map_status_error(status: StatusCode, body: String) -> LLMError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LLMError::Authentication(format!("HTTP {status}: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimit,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::NOT_FOUND => {
            LLMError::InvalidRequest(format!("HTTP {status}: {body}"))
        }
        _ => LLMError::Provider(format!("HTTP {status}: {body}")),
    }
}

pub(crate) fn convert_to_openai_format(request: &LLMRequest) -> Value {
    let mut messages = Vec::new();

    if let Some(system_prompt) = &request.system_prompt {
        messages.push(json!({
            "role": MessageRole::System.as_openai_str(),
            "content": system_prompt
        }));
    }

    for msg in &request.messages {
        messages.push(json!({
            "role": msg.role.as_openai_str(),
            "content": msg.content
        }));
    }

    let mut openai_request = json!({
        "model": request.model,
        "messages": messages,
        "stream": false
    });

    if let Some(max_tokens) = request.max_tokens {
        openai_request["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.temperature {
        openai_request["temperature"] = json!(temperature);
    }
    if let Some(tools) = &request.tools
        && !tools.is_empty()
    {
        openai_request["tools"] = json!(tools);
    }

    openai_request
}

pub(crate) fn parse_openai_response(response_json: Value) -> Result<LLMResponse, LLMError> {
    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .ok_or_else(|| LLMError::Provider("No choices in response".to_string()))?;

    let message = choice.get("message").ok_or_else(|| {
        LLMError::Provider("Invalid response format: missing message".to_string())
    })?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string());

    let tool_calls = message
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = call.get("function")?;
                    Some(ToolCall {
                        id: call.get("id")?.as_str()?.to_string(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: function.get("name")?.as_str()?.to_string(),
                            arguments: function
                                .get("arguments")
                                .and_then(|args| args.as_str())
                                .unwrap_or("{}")
                                .to_string(),
                        },
                    })
                })
                .collect::<Vec<_>>()
        })
        .filter(|calls| !calls.is_empty());

    let finish_reason = match choice.get("finish_reason").and_then(|fr| fr.as_str()) {
        Some("stop") | None => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        Some(other) => FinishReason::Error(other.to_string()),
    };

    let usage = response_json.get("usage").map(|u| Usage {
        prompt_tokens: field_u32(u, "prompt_tokens"),
        completion_tokens: field_u32(u, "completion_tokens"),
        total_tokens: field_u32(u, "total_tokens"),
    });

    Ok(LLMResponse {
        content,
        tool_calls,
        usage,
        finish_reason,
    })
}

fn field_u32(value: &Value, key: &str) -> u32 {
    value
        .get(key)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or_default()
}
