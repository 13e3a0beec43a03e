//! The think-act loop.
//!
//! One [`Orchestrator::run_turn_with_context`] call loads the agent's state,
//! asks the model, executes whatever tools it calls and either replies or
//! recurses with the accumulated tool output appended to the user message.
//! Turns for the same agent are serialised; turns for different agents run
//! concurrently.

use super::processor::{FoldOptions, StepSummary, TurnState, requested_article_count};
use super::turn::TurnResult;
use crate::config::EzraConfig;
use crate::config::constants::{agent, platform, tools};
use crate::error::{AgentError, AgentResult};
use crate::knowledge::{AgentConfig, KnowledgeStore, NewMessage, Role};
use crate::llm::{ModelClient, ToolCall};
use crate::memory::{MemoryJob, MemoryQueue};
use crate::prompts::{PromptBuilder, PromptInputs};
use crate::tools::web::client::normalize_url;
use crate::tools::{ToolContext, ToolRegistry};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMPLETED_FALLBACK: &str = "I've completed the requested actions.";

/// One inbound chat message, as the platform adapter sees it
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub agent_id: String,
    pub user_id: String,
    /// Empty for channel-less surfaces; nothing is logged as a message then
    pub channel_id: String,
    pub platform: String,
    pub message: String,
}

impl TurnRequest {
    pub fn new(agent_id: impl Into<String>, user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            user_id: user_id.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn in_channel(mut self, channel_id: impl Into<String>, platform: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self.platform = platform.into();
        self
    }

    fn normalized(mut self) -> AgentResult<Self> {
        if self.agent_id.trim().is_empty() {
            self.agent_id = agent::DEFAULT_AGENT_ID.to_string();
        }
        if self.user_id.trim().is_empty() {
            return Err(AgentError::Validation("user id cannot be empty".into()));
        }
        if self.platform.trim().is_empty() {
            self.platform = platform::DEFAULT_PLATFORM.to_string();
        }
        Ok(self)
    }
}

/// How one model step ended
enum Step {
    Ignored,
    Reply { content: String, summary: StepSummary },
}

pub struct Orchestrator {
    store: Arc<dyn KnowledgeStore>,
    model: ModelClient,
    tools: Arc<ToolRegistry>,
    prompts: PromptBuilder,
    memory: Option<Arc<MemoryQueue>>,
    max_depth: usize,
    history_window: usize,
    max_message_chars: usize,
    turn_deadline: Option<Duration>,
    agent_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn KnowledgeStore>, model: ModelClient, tools: Arc<ToolRegistry>) -> Self {
        Self {
            store,
            model,
            tools,
            prompts: PromptBuilder::new(),
            memory: None,
            max_depth: agent::MAX_RECURSION_DEPTH,
            history_window: agent::HISTORY_WINDOW,
            max_message_chars: platform::MAX_MESSAGE_LENGTH,
            turn_deadline: None,
            agent_locks: DashMap::new(),
        }
    }

    /// Apply the `[agent]` and `[platform]` sections
    pub fn configured(self, config: &EzraConfig) -> Self {
        self.with_max_depth(config.agent.max_recursion_depth)
            .with_history_window(config.agent.history_window)
            .with_max_message_chars(config.platform.max_message_length)
    }

    pub fn with_memory_queue(mut self, queue: Arc<MemoryQueue>) -> Self {
        self.memory = Some(queue);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_max_message_chars(mut self, chars: usize) -> Self {
        self.max_message_chars = chars.max(1);
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Whole-turn deadline; exceeding it yields `DeadlineExceeded`
    pub fn with_turn_deadline(mut self, deadline: Duration) -> Self {
        self.turn_deadline = Some(deadline);
        self
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn memory_queue(&self) -> Option<&Arc<MemoryQueue>> {
        self.memory.as_ref()
    }

    pub async fn run_turn(
        &self,
        agent_id: &str,
        user_id: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> AgentResult<TurnResult> {
        self.run_turn_with_context(TurnRequest::new(agent_id, user_id, message), cancel)
            .await
    }

    pub async fn run_turn_with_context(
        &self,
        request: TurnRequest,
        cancel: &CancellationToken,
    ) -> AgentResult<TurnResult> {
        let request = request.normalized()?;

        let lock = self
            .agent_locks
            .entry(request.agent_id.clone())
            .or_default()
            .clone();
        let _guard = cancellable(cancel, lock.lock()).await?;

        info!(
            agent_id = %request.agent_id,
            user_id = %request.user_id,
            channel_id = %request.channel_id,
            platform = %request.platform,
            "starting turn"
        );

        let turn = self.drive(&request, cancel);
        match self.turn_deadline {
            Some(deadline) => tokio::time::timeout(deadline, turn)
                .await
                .map_err(|_| AgentError::DeadlineExceeded)?,
            None => turn.await,
        }
    }

    async fn drive(&self, request: &TurnRequest, cancel: &CancellationToken) -> AgentResult<TurnResult> {
        let ctx = ToolContext::new(
            &request.agent_id,
            &request.user_id,
            &request.channel_id,
            &request.platform,
        );
        let article_request = requested_article_count(&request.message);
        if let Some(wanted) = article_request {
            debug!(wanted, "multi-article summary requested");
        }

        let mut state = TurnState::default();
        let mut message = request.message.clone();

        for depth in 0..self.max_depth {
            let step = self
                .step(&ctx, request, &message, depth, article_request, &mut state, cancel)
                .await?;

            let (content, summary) = match step {
                Step::Ignored => {
                    info!(agent_id = %ctx.agent_id, user_id = %ctx.user_id, depth, "turn ignored");
                    self.persist(request, None).await;
                    return Ok(TurnResult::ignored(state.tool_calls));
                }
                Step::Reply { content, summary } => (content, summary),
            };

            if !wants_recursion(&content, &state, summary, article_request) {
                return Ok(self.finish(request, state, content).await);
            }

            if depth + 1 >= self.max_depth {
                warn!(agent_id = %ctx.agent_id, depth, "recursion limit reached");
                let partial = self.finish(request, state, String::new()).await;
                return Err(AgentError::MaxRecursion {
                    partial: Box::new(partial),
                });
            }

            debug!(depth = depth + 1, tool_results = state.tool_results.len(), "recursing with tool results");
            message = recursion_message(&request.message, &state, article_request);
        }

        Err(AgentError::MaxRecursion {
            partial: Box::default(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn step(
        &self,
        ctx: &ToolContext,
        request: &TurnRequest,
        message: &str,
        depth: usize,
        article_request: Option<usize>,
        state: &mut TurnState,
        cancel: &CancellationToken,
    ) -> AgentResult<Step> {
        let mut window = cancellable(cancel, self.store.fetch_context_window(&ctx.agent_id)).await??;

        let config = match cancellable(cancel, self.store.get_agent_config(&ctx.agent_id)).await? {
            Ok(config) => config,
            Err(err) if err.is_not_found() => AgentConfig::default(),
            Err(err) => return Err(err.into()),
        };

        let user = match cancellable(cancel, self.store.get_user_context(&ctx.user_id)).await? {
            Ok(user) => Some(user),
            Err(err) => {
                debug!(user_id = %ctx.user_id, error = %err, "no user context");
                None
            }
        };

        if ctx.has_channel() && self.history_window > 0 {
            match cancellable(
                cancel,
                self.store
                    .get_conversation_history(&ctx.channel_id, self.history_window),
            )
            .await?
            {
                Ok(history) if !history.is_empty() => {
                    let entries: Vec<Value> = history
                        .iter()
                        .map(|message| {
                            json!({
                                "role": message.role.as_str(),
                                "author_id": message.author_id,
                                "content": message.content,
                                "timestamp": message.timestamp.to_rfc3339(),
                            })
                        })
                        .collect();
                    window
                        .user_context
                        .insert("recent_history".to_string(), Value::Array(entries));
                }
                Ok(_) => {}
                Err(err) => warn!(channel_id = %ctx.channel_id, error = %err, "failed to load history"),
            }
        }

        let mimic_prompt = self.tools.personality().mimic_prompt(&ctx.agent_id);
        let system_prompt = self
            .prompts
            .build(&PromptInputs {
                window: &window,
                user: user.as_ref(),
                ctx,
                mimic_prompt: mimic_prompt.as_deref(),
                system_instructions: Some(config.system_instructions.as_str()),
            })
            .map_err(|err| AgentError::Validation(format!("failed to build system prompt: {err}")))?;

        let definitions = self.tools.definitions_for_turn(&ctx.agent_id, &request.message);
        let model = self.model.scoped(Some(config.model.as_str()));
        debug!(
            agent_id = %ctx.agent_id,
            depth,
            model = model.model(),
            tools = definitions.len(),
            "calling model"
        );
        let response = cancellable(cancel, model.generate(&system_prompt, message, &definitions)).await??;

        let mut content = response.content_text().to_string();
        let calls = response.tool_calls().to_vec();
        let options = FoldOptions {
            max_chars: self.max_message_chars,
            defer_page_render: article_request.is_some_and(|wanted| state.fetch_count < wanted),
        };
        let mut summary = StepSummary {
            tool_calls: calls.len(),
            ..StepSummary::default()
        };
        let results_before = state.tool_results.len();

        for call in &calls {
            state.tool_calls.push(call.clone());
            let name = call.name();
            if name == tools::IGNORE {
                return Ok(Step::Ignored);
            }
            if name == tools::WEB_SEARCH {
                summary.ran_web_search = true;
            }
            if name == tools::FETCH_WEBPAGE
                && let Some(url) = requested_url(call)
                && already_fetched(state, &url)
            {
                state.reject_duplicate_fetch(&url);
                continue;
            }

            debug!(tool = name, depth, "executing tool call");
            let result = cancellable(cancel, self.tools.execute_call(ctx, call)).await?;
            state.fold(call, &result, &mut content, options);
        }
        summary.tool_results = state.tool_results.len() - results_before;

        Ok(Step::Reply { content, summary })
    }

    /// Fill in empty content, persist both sides and queue memory evaluation
    async fn finish(&self, request: &TurnRequest, state: TurnState, content: String) -> TurnResult {
        let content = if content.trim().is_empty() {
            fallback_content(&state)
        } else {
            content
        };

        self.persist(request, Some(&content)).await;

        if let Some(queue) = &self.memory {
            queue.submit(MemoryJob::new(
                &request.agent_id,
                &request.user_id,
                &request.message,
            ));
        }

        let result = state.into_result(content);
        info!(
            agent_id = %request.agent_id,
            user_id = %request.user_id,
            tool_calls = result.tool_calls.len(),
            embeds = result.embeds.len(),
            has_image = result.has_image(),
            "turn complete"
        );
        result
    }

    /// Persistence failures never fail the turn
    async fn persist(&self, request: &TurnRequest, reply: Option<&str>) {
        if let Err(err) = self
            .store
            .log_interaction(&request.agent_id, &request.user_id, &request.message, Utc::now())
            .await
        {
            warn!(agent_id = %request.agent_id, user_id = %request.user_id, error = %err, "failed to log interaction");
        }

        if request.channel_id.trim().is_empty() {
            return;
        }

        let inbound = NewMessage::new(
            &request.agent_id,
            &request.user_id,
            &request.channel_id,
            &request.message,
            Role::User,
            &request.platform,
        );
        if let Err(err) = self.store.log_message(inbound).await {
            warn!(channel_id = %request.channel_id, error = %err, "failed to log user message");
        }

        if let Some(reply) = reply {
            let outbound = NewMessage::new(
                &request.agent_id,
                &request.user_id,
                &request.channel_id,
                reply,
                Role::Agent,
                &request.platform,
            );
            if let Err(err) = self.store.log_message(outbound).await {
                warn!(channel_id = %request.channel_id, error = %err, "failed to log agent message");
            }
        }
    }
}

async fn cancellable<F: Future>(cancel: &CancellationToken, future: F) -> AgentResult<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AgentError::Cancelled),
        output = future => Ok(output),
    }
}

fn requested_url(call: &ToolCall) -> Option<String> {
    let args = call.parsed_arguments().ok()?;
    let url = args.get("url")?.as_str()?.trim();
    (!url.is_empty()).then(|| url.to_string())
}

fn already_fetched(state: &TurnState, url: &str) -> bool {
    state.has_fetched(url)
        || normalize_url(url).is_ok_and(|normalized| state.has_fetched(normalized.as_str()))
}

/// Whether the step's outcome calls for another model round
fn wants_recursion(
    content: &str,
    state: &TurnState,
    summary: StepSummary,
    article_request: Option<usize>,
) -> bool {
    let empty = content.trim().is_empty();
    if empty && summary.tool_results > 0 {
        return true;
    }
    if empty && summary.ran_web_search {
        return true;
    }
    article_request.is_some_and(|wanted| summary.tool_calls > 0 && state.fetch_count < wanted)
}

fn fallback_content(state: &TurnState) -> String {
    if state.tool_results.is_empty() {
        COMPLETED_FALLBACK.to_string()
    } else {
        state.tool_results.join("\n")
    }
}

/// The user message for the next step, always rebuilt from the original
fn recursion_message(original: &str, state: &TurnState, article_request: Option<usize>) -> String {
    let mut message = format!(
        "{original}\n\n[Tool Results]:\n{}",
        state.tool_results.join("\n")
    );

    match article_request {
        Some(wanted) if state.fetch_count < wanted => {
            message.push_str(&format!(
                "\n\nYou have fetched {} of {wanted} requested articles.",
                state.fetch_count
            ));
            if state.fetched_urls.is_empty() {
                message.push_str(" Fetch the first article URL from the search results next.");
            } else {
                message.push_str("\nAlready fetched URLs (DO NOT FETCH THESE AGAIN):");
                for url in &state.fetched_urls {
                    message.push_str("\n- ");
                    message.push_str(url);
                }
                message.push_str(
                    "\nPick a DIFFERENT article URL from the search results and fetch it next.",
                );
            }
        }
        Some(wanted) => {
            message.push_str(&format!(
                "\n\nAll {wanted} requested articles have been fetched. Now summarize them for the user."
            ));
        }
        None => {
            message.push_str("\n\nNow provide a helpful response to the user based on these results.");
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{AgentIdentity, NewAgent, SqliteKnowledgeStore};
    use crate::llm::{LLMError, LLMProvider, LLMRequest, LLMResponse, RetryPolicy};
    use crate::tools::ToolServices;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::VecDeque;

    /// Replays queued responses; repeats the last one when the queue runs dry
    struct ScriptedModel {
        responses: SyncMutex<VecDeque<LLMResponse>>,
        last: SyncMutex<Option<LLMResponse>>,
        requests: SyncMutex<Vec<LLMRequest>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<LLMResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: SyncMutex::new(responses.into()),
                last: SyncMutex::new(None),
                requests: SyncMutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
            self.requests.lock().push(request);
            let next = self.responses.lock().pop_front();
            let mut last = self.last.lock();
            match next {
                Some(response) => {
                    *last = Some(response.clone());
                    Ok(response)
                }
                None => last
                    .clone()
                    .ok_or_else(|| LLMError::Provider("script exhausted".into())),
            }
        }
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::function(format!("call-{name}"), name.to_string(), args.to_string())
    }

    async fn orchestrator(model: Arc<ScriptedModel>, agent_model: &str) -> Orchestrator {
        let store: Arc<dyn KnowledgeStore> = match SqliteKnowledgeStore::open_in_memory() {
            Ok(store) => Arc::new(store),
            Err(err) => panic!("in-memory store: {err}"),
        };
        let created = store
            .create_agent(NewAgent {
                id: "Ezra".into(),
                name: "Ezra".into(),
                model: agent_model.into(),
                system_instructions: String::new(),
                identity: AgentIdentity::new("Ezra", "Helpful"),
            })
            .await;
        if let Err(err) = created {
            panic!("agent: {err}");
        }
        let services = match ToolServices::new(store.clone()) {
            Ok(services) => services,
            Err(err) => panic!("services: {err}"),
        };
        let client = ModelClient::new(model, "base-model").with_retry_policy(RetryPolicy::none());
        Orchestrator::new(store, client, Arc::new(ToolRegistry::new(services)))
    }

    fn request(message: &str) -> TurnRequest {
        TurnRequest::new("Ezra", "alice", message).in_channel("general", "discord")
    }

    #[test]
    fn recursion_message_lists_fetched_urls() {
        let state = TurnState {
            tool_results: vec!["[ARTICLE 1 from https://a.example]:\nA".into()],
            fetched_urls: vec!["https://a.example".into(), "https://b.example".into()],
            fetch_count: 2,
            ..TurnState::default()
        };
        let message = recursion_message("summarize the first 3 articles about rust", &state, Some(3));
        assert!(message.starts_with("summarize the first 3 articles about rust\n\n[Tool Results]:\n"));
        assert!(message.contains("You have fetched 2 of 3 requested articles."));
        assert!(message.contains(
            "Already fetched URLs (DO NOT FETCH THESE AGAIN):\n- https://a.example\n- https://b.example"
        ));

        let done = recursion_message("what is rust?", &state, None);
        assert!(done.ends_with("Now provide a helpful response to the user based on these results."));
    }

    #[test]
    fn recursion_rules() {
        let mut state = TurnState::default();
        let quiet = StepSummary::default();
        assert!(!wants_recursion("", &state, quiet, None));

        let searched = StepSummary {
            tool_calls: 1,
            ran_web_search: true,
            ..StepSummary::default()
        };
        assert!(wants_recursion("", &state, searched, None));

        let acted = StepSummary {
            tool_calls: 1,
            tool_results: 1,
            ..StepSummary::default()
        };
        state.tool_results.push("[create_topic]: done".into());
        assert!(wants_recursion(" ", &state, acted, None));
        assert!(!wants_recursion("Done.", &state, acted, None));
        // results from an earlier step alone do not keep the loop going
        assert!(!wants_recursion("", &state, quiet, None));

        state.fetch_count = 1;
        let fetched = StepSummary {
            tool_calls: 1,
            ..StepSummary::default()
        };
        assert!(wants_recursion("Here is one", &state, fetched, Some(2)));
        state.fetch_count = 2;
        assert!(!wants_recursion("Here are both", &state, fetched, Some(2)));
    }

    #[tokio::test]
    async fn plain_reply_is_persisted_in_order() -> AgentResult<()> {
        let model = ScriptedModel::new(vec![LLMResponse::text("Hello Alice!")]);
        let orchestrator = orchestrator(model.clone(), "").await;

        let result = orchestrator
            .run_turn_with_context(request("hi there"), &CancellationToken::new())
            .await?;
        assert_eq!(result.content, "Hello Alice!");
        assert!(!result.ignored);
        assert_eq!(model.calls(), 1);
        assert_eq!(model.requests.lock()[0].model, "base-model");

        let history = orchestrator.store().get_conversation_history("general", 10).await?;
        let roles: Vec<Role> = history.iter().map(|message| message.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Agent]);
        assert_eq!(history[1].content, "Hello Alice!");
        Ok(())
    }

    #[tokio::test]
    async fn agent_model_and_history_reach_the_model() -> AgentResult<()> {
        let model = ScriptedModel::new(vec![LLMResponse::text("one"), LLMResponse::text("two")]);
        let orchestrator = orchestrator(model.clone(), "agent-model").await;
        let cancel = CancellationToken::new();

        orchestrator.run_turn_with_context(request("first message"), &cancel).await?;
        orchestrator.run_turn_with_context(request("second message"), &cancel).await?;

        let requests = model.requests.lock();
        assert!(requests.iter().all(|request| request.model == "agent-model"));
        let system = requests[1].system_prompt.clone().unwrap_or_default();
        assert!(system.contains("recent_history"));
        assert!(system.contains("first message"));
        Ok(())
    }

    #[tokio::test]
    async fn tool_only_responses_hit_the_recursion_limit() {
        let model = ScriptedModel::new(vec![LLMResponse::with_tool_calls(vec![call(
            tools::CREATE_TOPIC,
            json!({"name": "Rust"}),
        )])]);
        let orchestrator = orchestrator(model.clone(), "").await;

        let outcome = orchestrator
            .run_turn_with_context(request("remember rust as a topic"), &CancellationToken::new())
            .await;
        let partial = match outcome {
            Err(AgentError::MaxRecursion { partial }) => partial,
            other => panic!("expected MaxRecursion, got {other:?}"),
        };
        assert_eq!(model.calls(), agent::MAX_RECURSION_DEPTH);
        assert_eq!(partial.tool_calls.len(), agent::MAX_RECURSION_DEPTH);
        assert!(partial.content.starts_with("[create_topic]"));

        let recursed = model.requests.lock()[1].messages[0].content.clone();
        assert!(recursed.starts_with("remember rust as a topic\n\n[Tool Results]:\n[create_topic]"));
    }

    #[tokio::test]
    async fn ignore_ends_the_turn_without_a_reply() -> AgentResult<()> {
        let model = ScriptedModel::new(vec![LLMResponse::with_tool_calls(vec![
            call(tools::IGNORE, json!({})),
            call(tools::SEND_MESSAGE, json!({"text": "never sent"})),
        ])]);
        let orchestrator = orchestrator(model.clone(), "").await;

        let result = orchestrator
            .run_turn_with_context(request(""), &CancellationToken::new())
            .await?;
        assert!(result.ignored);
        assert!(result.content.is_empty());
        assert_eq!(result.tool_calls.len(), 1);
        assert!(matches!(result.into_reply(), Err(AgentError::AgentIgnored)));

        let history = orchestrator.store().get_conversation_history("general", 10).await?;
        assert!(history.iter().all(|message| message.role == Role::User));
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_turns_never_call_the_model() {
        let model = ScriptedModel::new(vec![LLMResponse::text("unused")]);
        let orchestrator = orchestrator(model.clone(), "").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = orchestrator.run_turn_with_context(request("hello"), &cancel).await;
        assert!(matches!(outcome, Err(AgentError::Cancelled)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn missing_user_id_is_rejected() {
        let model = ScriptedModel::new(Vec::new());
        let orchestrator = orchestrator(model, "").await;
        let outcome = orchestrator
            .run_turn("Ezra", " ", "hello", &CancellationToken::new())
            .await;
        assert!(matches!(outcome, Err(AgentError::Validation(_))));
    }
}
