//! Administrative commands that talk to the store directly

use super::runtime::{self, CLI_PLATFORM, Runtime};
use anyhow::{Context, Result, anyhow};
use ezra_core::agent::LanguageInstructionHandler;
use ezra_core::knowledge::{AgentIdentity, NewAgent};
use ezra_core::{EzraConfig, Language};
use serde_json::json;

pub struct InitAgentOptions {
    pub name: Option<String>,
    pub personality: Option<String>,
    pub model: String,
    pub instructions: String,
}

pub async fn handle_init_agent_command(
    config: &EzraConfig,
    agent_id: &str,
    options: InitAgentOptions,
) -> Result<()> {
    let store = runtime::open_store(config)?;
    let name = options
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| agent_id.to_string());
    let personality = options
        .personality
        .unwrap_or_else(|| ezra_core::config::constants::agent::DEFAULT_PERSONALITY.to_string());

    let agent = store
        .create_agent(NewAgent {
            id: agent_id.to_string(),
            name: name.clone(),
            model: options.model,
            system_instructions: options.instructions,
            identity: AgentIdentity::new(name, personality),
        })
        .await
        .with_context(|| format!("Failed to create agent '{agent_id}'"))?;

    println!("{}", serde_json::to_string_pretty(&agent)?);
    Ok(())
}

pub async fn handle_set_language_command(
    config: &EzraConfig,
    agent_id: &str,
    user_id: &str,
    language: &str,
) -> Result<()> {
    let language = Language::from_code(language).ok_or_else(|| {
        let known: Vec<&str> = Language::all().iter().map(|l| l.code()).collect();
        anyhow!("Unknown language '{language}'. Supported: {}", known.join(", "))
    })?;

    let store = runtime::open_store(config)?;
    runtime::ensure_agent(store.as_ref(), agent_id).await?;
    let user = store
        .get_or_create_user(user_id, user_id, "", CLI_PLATFORM)
        .await
        .with_context(|| format!("Failed to load user '{user_id}'"))?;

    LanguageInstructionHandler::new(store)
        .apply(agent_id, &user, language)
        .await
        .context("Failed to store language preference")?;

    println!("{} will now be answered in {language}.", user.id);
    Ok(())
}

pub async fn handle_cleanup_memories_command(runtime: &Runtime, user_id: &str) -> Result<()> {
    let report = runtime
        .evaluator
        .cleanup_duplicate_facts(user_id)
        .await
        .with_context(|| format!("Failed to clean up facts for '{user_id}'"))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "user_id": user_id,
            "duplicate_groups": report.groups,
            "deleted_facts": report.deleted,
        }))?
    );
    runtime.queue.shutdown();
    Ok(())
}

pub async fn handle_stats_command(config: &EzraConfig, agent_id: &str) -> Result<()> {
    let store = runtime::open_store(config)?;
    let stats = store
        .context_stats(agent_id)
        .await
        .with_context(|| format!("Failed to read stats for agent '{agent_id}'"))?;
    let users = store.list_users().await?.len();
    let topics = store.list_topics().await?.len();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "agent_id": agent_id,
            "context": stats,
            "users": users,
            "topics": topics,
        }))?
    );
    Ok(())
}
