//! Wiring of the core components from configuration

use super::args::Cli;
use anyhow::{Context, Result};
use ezra_core::config::constants::agent;
use ezra_core::config::load_dotenv;
use ezra_core::knowledge::{AgentIdentity, NewAgent};
use ezra_core::{
    ConfigManager, EzraConfig, KnowledgeStore, MemoryEvaluator, MemoryQueue, ModelClient,
    OpenAIProvider, Orchestrator, SqliteKnowledgeStore, ToolRegistry, ToolServices,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Platform name recorded for terminal users and messages
pub const CLI_PLATFORM: &str = "cli";

pub struct Runtime {
    pub config: EzraConfig,
    pub agent_id: String,
    pub store: Arc<dyn KnowledgeStore>,
    pub evaluator: MemoryEvaluator,
    pub queue: Arc<MemoryQueue>,
    pub orchestrator: Orchestrator,
}

pub fn load_config(cli: &Cli) -> Result<EzraConfig> {
    load_dotenv()?;
    let manager = match &cli.config {
        Some(path) => ConfigManager::load_from_file(path)?,
        None => ConfigManager::load()?,
    };
    if let Some(path) = manager.config_path() {
        debug!(path = %path.display(), "using configuration file");
    }

    let mut config = manager.into_config();
    if let Some(db) = &cli.db {
        config.store.uri = db.display().to_string();
    }
    Ok(config)
}

pub fn agent_id(cli: &Cli, config: &EzraConfig) -> String {
    cli.agent
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| config.agent.default_agent_id.clone())
}

pub fn open_store(config: &EzraConfig) -> Result<Arc<dyn KnowledgeStore>> {
    let path = config.store.database_path();
    let store = SqliteKnowledgeStore::open(&path)
        .with_context(|| format!("Failed to open knowledge store at {}", path.display()))?;
    Ok(Arc::new(store))
}

impl Runtime {
    pub async fn build(cli: &Cli) -> Result<Self> {
        let config = load_config(cli)?;
        let agent_id = agent_id(cli, &config);
        let store = open_store(&config)?;
        ensure_agent(store.as_ref(), &agent_id).await?;

        let provider = Arc::new(OpenAIProvider::with_timeout(
            config.model.api_key(),
            config.model.api_base(),
            Duration::from_secs(config.model.request_timeout_secs),
        ));
        info!(endpoint = %config.model.api_base(), model = %config.model.model_id, "model client ready");

        let services =
            ToolServices::new(store.clone()).context("Failed to build tool services")?;
        let registry = Arc::new(ToolRegistry::new(services));

        let evaluator = MemoryEvaluator::new(
            ModelClient::from_config(provider.clone(), &config.model),
            store.clone(),
        );
        let queue = Arc::new(MemoryQueue::start(evaluator.clone(), &config.memory));

        let orchestrator = Orchestrator::new(
            store.clone(),
            ModelClient::from_config(provider, &config.model),
            registry,
        )
        .configured(&config)
        .with_memory_queue(queue.clone());

        Ok(Self {
            config,
            agent_id,
            store,
            evaluator,
            queue,
            orchestrator,
        })
    }

    /// Let queued memory evaluations finish, bounded by the evaluation deadline
    pub async fn drain(&self) {
        let budget = self.config.memory.evaluation_timeout() + Duration::from_secs(1);
        if tokio::time::timeout(budget, self.queue.wait_idle()).await.is_err() {
            debug!(pending = self.queue.pending(), "memory queue still busy at exit");
        }
        self.queue.shutdown();
    }
}

/// Create the agent with default identity the first time it is used
pub async fn ensure_agent(store: &dyn KnowledgeStore, agent_id: &str) -> Result<()> {
    match store.get_agent_config(agent_id).await {
        Ok(_) => Ok(()),
        Err(err) if err.is_not_found() => {
            info!(agent_id, "creating agent with default identity");
            store
                .create_agent(NewAgent {
                    id: agent_id.to_string(),
                    name: agent_id.to_string(),
                    model: String::new(),
                    system_instructions: String::new(),
                    identity: AgentIdentity::new(agent_id, agent::DEFAULT_PERSONALITY),
                })
                .await
                .with_context(|| format!("Failed to create agent '{agent_id}'"))?;
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("Failed to load agent '{agent_id}'")),
    }
}
