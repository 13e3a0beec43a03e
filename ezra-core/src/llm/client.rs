use super::provider::{LLMError, LLMProvider, LLMRequest, LLMResponse, Message, ToolDefinition};
use crate::config::ModelSection;
use crate::config::constants::model;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Linear backoff: attempt `n` waits `n * base_delay` before retrying.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: model::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(model::DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// `Generate(system_prompt, user_message, tools)` over an [`LLMProvider`].
///
/// The configured model id is fixed at construction; a turn that needs a
/// different model borrows a [`ScopedModel`] view instead of mutating the
/// client, so concurrent turns for other agents are unaffected.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: model::DEFAULT_TEMPERATURE,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &ModelSection) -> Self {
        Self {
            provider,
            model: config.model_id.clone(),
            temperature: config.temperature,
            retry: RetryPolicy {
                max_attempts: config.max_retries.max(1),
                base_delay: Duration::from_secs(config.retry_delay_secs),
            },
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// A view that uses `model` for its calls. Blank overrides fall back to
    /// the configured model.
    pub fn scoped<'a>(&'a self, model: Option<&'a str>) -> ScopedModel<'a> {
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.model.as_str());
        ScopedModel {
            client: self,
            model,
        }
    }

    pub async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, LLMError> {
        self.scoped(None)
            .generate(system_prompt, user_message, tools)
            .await
    }

    async fn generate_with(
        &self,
        model: &str,
        system_prompt: &str,
        user_message: &str,
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, LLMError> {
        let request = LLMRequest {
            messages: vec![Message::user(user_message.to_string())],
            system_prompt: Some(system_prompt.to_string()),
            tools: (!tools.is_empty()).then(|| tools.to_vec()),
            model: model.to_string(),
            max_tokens: None,
            temperature: Some(self.temperature),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.provider.generate(request.clone()).await {
                Ok(response) => {
                    debug!(
                        model,
                        attempt,
                        tool_calls = response.tool_calls().len(),
                        "model call succeeded"
                    );
                    return Ok(response);
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(model, attempt, error = %err, ?delay, "model call failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Borrowed client bound to a per-turn model id
pub struct ScopedModel<'a> {
    client: &'a ModelClient,
    model: &'a str,
}

impl ScopedModel<'_> {
    pub fn model(&self) -> &str {
        self.model
    }

    pub async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, LLMError> {
        self.client
            .generate_with(self.model, system_prompt, user_message, tools)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Flaky {
        outcomes: Mutex<VecDeque<Result<LLMResponse, LLMError>>>,
        models: Mutex<Vec<String>>,
    }

    impl Flaky {
        fn new(outcomes: Vec<Result<LLMResponse, LLMError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                models: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
            self.models.lock().push(request.model);
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LLMError::Provider("exhausted".into())))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn retries_transient_failures() -> Result<(), LLMError> {
        let provider = Flaky::new(vec![
            Err(LLMError::Network("reset".into())),
            Err(LLMError::RateLimit),
            Ok(LLMResponse::text("hi")),
        ]);
        let client = ModelClient::new(provider.clone(), "base").with_retry_policy(fast_retry());
        let response = client.generate("sys", "hello", &[]).await?;
        assert_eq!(response.content_text(), "hi");
        assert_eq!(provider.models.lock().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn does_not_retry_validation_errors() {
        let provider = Flaky::new(vec![
            Err(LLMError::InvalidRequest("bad".into())),
            Ok(LLMResponse::text("never")),
        ]);
        let client = ModelClient::new(provider.clone(), "base").with_retry_policy(fast_retry());
        assert!(client.generate("sys", "hello", &[]).await.is_err());
        assert_eq!(provider.models.lock().len(), 1);
    }

    #[tokio::test]
    async fn scoped_model_overrides_only_that_call() -> Result<(), LLMError> {
        let provider = Flaky::new(vec![Ok(LLMResponse::text("a")), Ok(LLMResponse::text("b"))]);
        let client = ModelClient::new(provider.clone(), "base").with_retry_policy(fast_retry());

        client.scoped(Some("agent-model")).generate("s", "u", &[]).await?;
        client.generate("s", "u", &[]).await?;

        assert_eq!(*provider.models.lock(), vec!["agent-model", "base"]);
        assert_eq!(client.scoped(Some("  ")).model(), "base");
        Ok(())
    }
}
