//! Shared doubles for the end-to-end tests: a scripted model, an offline
//! web client and a fully wired orchestrator over an on-disk store.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use ezra_core::knowledge::{AgentIdentity, NewAgent};
use ezra_core::llm::{LLMError, LLMProvider, LLMRequest, LLMResponse, RetryPolicy, ToolCall};
use ezra_core::memory::QueueOptions;
use ezra_core::tools::{FetchedPage, SearchResult, WebClient};
use ezra_core::{
    KnowledgeStore, MemoryEvaluator, MemoryQueue, ModelClient, Orchestrator, PromptBuilder,
    SqliteKnowledgeStore, ToolRegistry, ToolServices,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tempfile::TempDir;

pub const AGENT: &str = "Ezra";
pub const CHANNEL: &str = "general";
pub const PLATFORM: &str = "discord";

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replays queued responses in order and records every request
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<LLMResponse>>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<LLMResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        lock(&self.requests).clone()
    }

    /// The user message of the n-th request
    pub fn user_message(&self, index: usize) -> String {
        lock(&self.requests)
            .get(index)
            .and_then(|request| request.messages.first())
            .map(|message| message.content.clone())
            .unwrap_or_default()
    }

    pub fn system_prompt(&self, index: usize) -> String {
        lock(&self.requests)
            .get(index)
            .and_then(|request| request.system_prompt.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        lock(&self.requests).push(request);
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| LLMError::Provider("script exhausted".into()))
    }
}

/// Offline web: fixed search hits, synthetic pages
pub struct FakeWeb {
    results: Vec<SearchResult>,
    fetched: Mutex<Vec<String>>,
}

impl FakeWeb {
    pub fn with_articles(urls: &[&str]) -> Arc<Self> {
        let results = urls
            .iter()
            .enumerate()
            .map(|(index, url)| SearchResult {
                title: format!("Article {}", index + 1),
                url: url.to_string(),
                snippet: format!("Preview of article {}", index + 1),
            })
            .collect();
        Arc::new(Self {
            results,
            fetched: Mutex::new(Vec::new()),
        })
    }

    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }
}

#[async_trait]
impl WebClient for FakeWeb {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
        Ok(self.results.clone())
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        lock(&self.fetched).push(url.to_string());
        let content = format!("The article at {url} explains async Rust. It covers futures and executors.");
        Ok(FetchedPage {
            url: url.to_string(),
            title: format!("Page {url}"),
            text_length: content.len(),
            content,
            sections: Vec::new(),
            metadata: Default::default(),
            fallback_used: false,
        })
    }
}

pub fn call(name: &str, args: Value) -> ToolCall {
    ToolCall::function(format!("call-{name}"), name.to_string(), args.to_string())
}

pub fn tool_step(name: &str, args: Value) -> LLMResponse {
    LLMResponse::with_tool_calls(vec![call(name, args)])
}

pub struct Harness {
    pub store: Arc<dyn KnowledgeStore>,
    pub model: Arc<ScriptedProvider>,
    pub web: Arc<FakeWeb>,
    pub queue: Option<Arc<MemoryQueue>>,
    pub orchestrator: Orchestrator,
    _dir: TempDir,
}

pub struct HarnessBuilder {
    script: Vec<LLMResponse>,
    judge: Option<Arc<ScriptedProvider>>,
    web: Arc<FakeWeb>,
}

impl HarnessBuilder {
    pub fn new(script: Vec<LLMResponse>) -> Self {
        Self {
            script,
            judge: None,
            web: FakeWeb::with_articles(&[]),
        }
    }

    pub fn with_judge(mut self, judge: Arc<ScriptedProvider>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_web(mut self, web: Arc<FakeWeb>) -> Self {
        self.web = web;
        self
    }

    pub async fn build(self) -> Result<Harness> {
        let dir = tempfile::tempdir()?;
        let store: Arc<dyn KnowledgeStore> =
            Arc::new(SqliteKnowledgeStore::open(dir.path().join("ezra.db"))?);
        store
            .create_agent(NewAgent {
                id: AGENT.into(),
                name: AGENT.into(),
                model: String::new(),
                system_instructions: String::new(),
                identity: AgentIdentity::new(AGENT, "Friendly and curious"),
            })
            .await?;

        let services = ToolServices::new(store.clone())?.with_web_client(self.web.clone());
        let model = ScriptedProvider::new(self.script);
        let client = ModelClient::new(model.clone(), "test-model").with_retry_policy(RetryPolicy::none());
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap_or_default();

        let mut orchestrator = Orchestrator::new(store.clone(), client, Arc::new(ToolRegistry::new(services)))
            .with_prompt_builder(PromptBuilder::new().with_date(today));

        let queue = self.judge.map(|judge| {
            let judge = ModelClient::new(judge, "judge-model").with_retry_policy(RetryPolicy::none());
            Arc::new(MemoryQueue::start_with(
                MemoryEvaluator::new(judge, store.clone()),
                QueueOptions {
                    workers: 2,
                    capacity: 16,
                    deadline: Duration::from_secs(5),
                },
            ))
        });
        if let Some(queue) = &queue {
            orchestrator = orchestrator.with_memory_queue(queue.clone());
        }

        Ok(Harness {
            store,
            model,
            web: self.web,
            queue,
            orchestrator,
            _dir: dir,
        })
    }
}
