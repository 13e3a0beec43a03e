//! Tool registry, schemas and dispatch

mod builtins;
mod declarations;
mod executors;
mod registration;

pub use declarations::build_function_declarations;
pub use registration::{ToolExecutorFn, ToolHandler, ToolRegistration};

use builtins::register_builtin_tools;

use crate::config::constants::tools;
use crate::error::ErrorKind;
use crate::knowledge::KnowledgeStore;
use crate::llm::{ToolCall, ToolDefinition};
use crate::tools::args::{InvocationError, ToolInvocation};
use crate::tools::context::ToolContext;
use crate::tools::github::GitHubClient;
use crate::tools::personality::PersonalityService;
use crate::tools::result::{ToolData, ToolResult, classify_error};
use crate::tools::traits::{ImageGenerator, PlatformTool, WebClient};
use crate::tools::web::HttpWebClient;
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Phrases that let a mimicking agent see `mimic_personality` again
const REMIMIC_CUES: &[&str] = &["mimic", "update personality", "refresh personality"];

/// Collaborators the builtin tools call into
#[derive(Clone)]
pub struct ToolServices {
    pub store: Arc<dyn KnowledgeStore>,
    pub web: Arc<dyn WebClient>,
    pub github: GitHubClient,
    pub image_generator: Option<Arc<dyn ImageGenerator>>,
}

impl ToolServices {
    /// Live HTTP clients, no image generator
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Result<Self> {
        Ok(Self {
            store,
            web: Arc::new(HttpWebClient::new()?),
            github: GitHubClient::new()?,
            image_generator: None,
        })
    }

    pub fn with_web_client(mut self, web: Arc<dyn WebClient>) -> Self {
        self.web = web;
        self
    }

    pub fn with_image_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.image_generator = Some(generator);
        self
    }
}

pub struct ToolRegistry {
    store: Arc<dyn KnowledgeStore>,
    web: Arc<dyn WebClient>,
    github: GitHubClient,
    image_generator: Option<Arc<dyn ImageGenerator>>,
    personality: Arc<PersonalityService>,
    declarations: HashMap<String, ToolDefinition>,
    tool_registrations: Vec<ToolRegistration>,
    tool_lookup: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new(services: ToolServices) -> Self {
        let personality = Arc::new(PersonalityService::new(services.store.clone()));
        let mut registry = Self {
            store: services.store,
            web: services.web,
            github: services.github,
            image_generator: services.image_generator,
            personality,
            declarations: declarations::declaration_index(),
            tool_registrations: Vec::new(),
            tool_lookup: HashMap::new(),
        };

        register_builtin_tools(&mut registry);
        registry
    }

    pub fn register_tool(&mut self, registration: ToolRegistration) -> Result<()> {
        if self.tool_lookup.contains_key(registration.name()) {
            return Err(anyhow!(
                "Tool '{}' is already registered",
                registration.name()
            ));
        }

        let index = self.tool_registrations.len();
        self.tool_lookup.insert(registration.name(), index);
        self.tool_registrations.push(registration);
        Ok(())
    }

    /// Platform tools are added once at startup, before the first turn
    pub fn register_platform_tool(&mut self, tool: Arc<dyn PlatformTool>) -> Result<()> {
        self.register_tool(ToolRegistration::from_platform_tool(tool))
    }

    pub fn available_tools(&self) -> Vec<String> {
        self.tool_registrations
            .iter()
            .map(|registration| registration.name().to_string())
            .collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tool_lookup.contains_key(name)
    }

    pub fn personality(&self) -> &Arc<PersonalityService> {
        &self.personality
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Whether the tool's data is meant to be shown to the user as-is
    pub fn is_informational(&self, name: &str) -> bool {
        if tools::INFORMATIONAL.contains(&name) {
            return true;
        }
        self.registration(name)
            .is_some_and(|registration| match registration.handler() {
                ToolHandler::Platform(tool) => tool.is_informational(),
                ToolHandler::RegistryFn(_) => false,
            })
    }

    /// Every tool advertised to the model, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tool_registrations
            .iter()
            .filter(|registration| registration.expose_in_llm())
            .filter_map(|registration| match registration.handler() {
                ToolHandler::RegistryFn(_) => self.declarations.get(registration.name()).cloned(),
                ToolHandler::Platform(tool) => {
                    Some(declarations::platform_declaration(tool.as_ref()))
                }
            })
            .collect()
    }

    /// Tool list for one turn. A mimicking agent does not see
    /// `mimic_personality` unless the message asks for (re)mimicking.
    pub fn definitions_for_turn(&self, agent_id: &str, message: &str) -> Vec<ToolDefinition> {
        let mut definitions = self.definitions();
        if self.personality.is_mimicking(agent_id) {
            let lower = message.to_lowercase();
            if !REMIMIC_CUES.iter().any(|cue| lower.contains(cue)) {
                definitions.retain(|definition| definition.function_name() != tools::MIMIC_PERSONALITY);
            }
        }
        definitions
    }

    /// Execute a model tool call. Failures come back as unsuccessful
    /// results, never as errors.
    pub async fn execute_call(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResult {
        match call.parsed_arguments() {
            Ok(args) => self.execute_tool(ctx, call.name(), args).await,
            Err(err) => ToolResult::invalid(format!(
                "invalid arguments for {}: {err}",
                call.name()
            )),
        }
    }

    pub async fn execute_tool(&self, ctx: &ToolContext, name: &str, args: Value) -> ToolResult {
        let Some(registration) = self.registration(name) else {
            tracing::warn!(tool = name, agent_id = %ctx.agent_id, "unknown tool requested");
            return ToolResult::failure(ErrorKind::Validation, format!("Unknown tool: {name}"));
        };

        tracing::debug!(tool = name, agent_id = %ctx.agent_id, user_id = %ctx.user_id, "executing tool");
        let outcome = match registration.handler() {
            ToolHandler::RegistryFn(executor) => match ToolInvocation::parse(name, args) {
                Ok(invocation) => executor(self, ctx, invocation).await,
                Err(InvocationError::UnknownTool(unknown)) => {
                    return ToolResult::failure(
                        ErrorKind::Validation,
                        format!("Unknown tool: {unknown}"),
                    );
                }
                Err(err) => return ToolResult::invalid(err.to_string()),
            },
            ToolHandler::Platform(tool) => tool
                .execute(ctx, args)
                .await
                .map(|data| ToolResult::ok(format!("{name} completed")).with_data(ToolData::Raw(data))),
        };

        match outcome {
            Ok(result) => {
                if !result.success {
                    tracing::debug!(tool = name, error = result.error_text(), "tool rejected call");
                }
                result
            }
            Err(err) => {
                let kind = classify_error(&err);
                tracing::warn!(tool = name, agent_id = %ctx.agent_id, error = %format!("{err:#}"), ?kind, "tool failed");
                ToolResult::failure(kind, format!("{err:#}"))
            }
        }
    }

    fn registration(&self, name: &str) -> Option<&ToolRegistration> {
        self.tool_lookup
            .get(name)
            .and_then(|index| self.tool_registrations.get(*index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::SqliteKnowledgeStore;
    use crate::tools::result::{FetchedPage, SearchResult};
    use async_trait::async_trait;
    use serde_json::json;

    const CUSTOM_TOOL_NAME: &str = "discord_get_channel_info";

    struct NoWeb;

    #[async_trait]
    impl WebClient for NoWeb {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
            Err(anyhow!("request timed out"))
        }

        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            Err(anyhow!("HTTP 404 for {url}"))
        }
    }

    struct EchoHistory;

    #[async_trait]
    impl PlatformTool for EchoHistory {
        fn name(&self) -> &'static str {
            CUSTOM_TOOL_NAME
        }

        fn description(&self) -> &'static str {
            "Reads recent channel history"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"limit": {"type": "integer"}}})
        }

        async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
            Ok(json!({"channel": ctx.channel_id, "args": args}))
        }

        fn is_informational(&self) -> bool {
            true
        }
    }

    fn registry() -> Result<ToolRegistry> {
        let store: Arc<dyn KnowledgeStore> = Arc::new(SqliteKnowledgeStore::open_in_memory()?);
        let services = ToolServices::new(store)?.with_web_client(Arc::new(NoWeb));
        Ok(ToolRegistry::new(services))
    }

    fn ctx() -> ToolContext {
        ToolContext::new("Ezra", "alice", "general", "web")
    }

    #[tokio::test]
    async fn registers_builtin_tools() -> Result<()> {
        let registry = registry()?;
        assert!(registry.has_tool(tools::CORE_MEMORY_INSERT));
        assert!(registry.has_tool(tools::UPDATE_CORE_MEMORY));
        assert!(!registry.has_tool(tools::GENERATE_IMAGE));

        let advertised: Vec<String> = registry
            .definitions()
            .iter()
            .map(|definition| definition.function_name().to_string())
            .collect();
        assert!(advertised.contains(&tools::IGNORE.to_string()));
        assert!(!advertised.contains(&tools::UPDATE_CORE_MEMORY.to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_tools_and_bad_arguments_are_results() -> Result<()> {
        let registry = registry()?;

        let unknown = registry.execute_tool(&ctx(), "x", json!({})).await;
        assert!(!unknown.success);
        assert_eq!(unknown.error_text(), "Unknown tool: x");
        assert_eq!(unknown.error_kind, Some(ErrorKind::Validation));

        let bad = registry
            .execute_call(
                &ctx(),
                &ToolCall::function("c1".into(), tools::CREATE_FACT.into(), "{not json".into()),
            )
            .await;
        assert_eq!(bad.error_kind, Some(ErrorKind::Validation));
        Ok(())
    }

    #[tokio::test]
    async fn handler_errors_are_classified() -> Result<()> {
        let registry = registry()?;
        let result = registry
            .execute_tool(&ctx(), tools::WEB_SEARCH, json!({"query": "rust"}))
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Retryable));
        Ok(())
    }

    #[tokio::test]
    async fn update_core_memory_runs_as_replace() -> Result<()> {
        let registry = registry()?;
        let result = registry
            .execute_tool(
                &ctx(),
                tools::UPDATE_CORE_MEMORY,
                json!({"name": "identity", "content": "I am X"}),
            )
            .await;
        assert!(result.success, "{:?}", result.error);

        let window = registry.store().fetch_context_window("Ezra").await?;
        assert_eq!(window.memory_block("identity").map(|b| b.content.as_str()), Some("I am X"));
        Ok(())
    }

    #[tokio::test]
    async fn allows_registering_platform_tools() -> Result<()> {
        let mut registry = registry()?;
        registry.register_platform_tool(Arc::new(EchoHistory))?;
        assert!(registry.register_platform_tool(Arc::new(EchoHistory)).is_err());
        assert!(registry.is_informational(CUSTOM_TOOL_NAME));

        let response = registry
            .execute_tool(&ctx(), CUSTOM_TOOL_NAME, json!({"limit": 5}))
            .await;
        match response.data {
            Some(ToolData::Raw(data)) => {
                assert_eq!(data["channel"], "general");
                assert_eq!(data["args"]["limit"], 5);
            }
            other => panic!("unexpected data: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn mimicking_agents_do_not_see_mimic_tool() -> Result<()> {
        let registry = registry()?;
        let has_mimic = |definitions: Vec<ToolDefinition>| {
            definitions
                .iter()
                .any(|definition| definition.function_name() == tools::MIMIC_PERSONALITY)
        };
        assert!(has_mimic(registry.definitions_for_turn("Ezra", "hello")));

        let store = registry.store().clone();
        store.get_or_create_user("u-bob", "u-bob", "bob", "web").await?;
        store
            .log_message(crate::knowledge::NewMessage::new(
                "Ezra",
                "u-bob",
                "general",
                "honestly this is great",
                crate::knowledge::Role::User,
                "web",
            ))
            .await?;
        let started = registry
            .execute_tool(&ctx(), tools::MIMIC_PERSONALITY, json!({"user_id": "u-bob"}))
            .await;
        assert!(started.success, "{:?}", started.error);

        assert!(!has_mimic(registry.definitions_for_turn("Ezra", "hello")));
        assert!(has_mimic(registry.definitions_for_turn("Ezra", "please MIMIC carol")));
        assert!(has_mimic(registry.definitions_for_turn("Other", "hello")));
        Ok(())
    }
}
