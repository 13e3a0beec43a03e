mod common;

use anyhow::Result;
use common::{AGENT, CHANNEL, HarnessBuilder, PLATFORM, ScriptedProvider};
use ezra_core::knowledge::NewFact;
use ezra_core::llm::{LLMResponse, ModelClient, RetryPolicy};
use ezra_core::memory::MemoryOutcome;
use ezra_core::{KnowledgeStore, MemoryEvaluator, SqliteKnowledgeStore, TurnRequest};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn decision(content: &str, importance: u8) -> LLMResponse {
    LLMResponse::text(
        json!({
            "should_save": true,
            "memory_type": "preference",
            "content": content,
            "topics": [],
            "importance": importance,
            "updates_existing": false,
            "existing_id": "",
            "reasoning": "stated preference"
        })
        .to_string(),
    )
}

async fn evaluator(judge: Arc<ScriptedProvider>) -> Result<(MemoryEvaluator, Arc<dyn KnowledgeStore>)> {
    let store: Arc<dyn KnowledgeStore> = Arc::new(SqliteKnowledgeStore::open_in_memory()?);
    store.get_or_create_user("alice", "alice", "alice", PLATFORM).await?;
    let client = ModelClient::new(judge, "judge-model").with_retry_policy(RetryPolicy::none());
    Ok((MemoryEvaluator::new(client, store.clone()), store))
}

#[tokio::test]
async fn favourite_colour_is_remembered_after_the_turn() -> Result<()> {
    let judge = ScriptedProvider::new(vec![decision("User's favorite color is teal", 6)]);
    let harness = HarnessBuilder::new(vec![LLMResponse::text("Teal is a lovely color!")])
        .with_judge(judge.clone())
        .build()
        .await?;

    let request = TurnRequest::new(AGENT, "alice", "My favorite color is teal.").in_channel(CHANNEL, PLATFORM);
    let result = harness
        .orchestrator
        .run_turn_with_context(request, &CancellationToken::new())
        .await?;
    assert_eq!(result.content, "Teal is a lovely color!");

    let Some(queue) = &harness.queue else {
        panic!("harness was built with a judge");
    };
    queue.wait_idle().await;
    assert_eq!(judge.calls(), 1);

    let context = harness.store.get_user_context("alice").await?;
    let fact = context
        .facts
        .iter()
        .find(|fact| fact.content.to_lowercase().contains("teal"))
        .unwrap_or_else(|| panic!("no teal fact in {:?}", context.facts));
    let topics = harness.store.fact_topics(&fact.id).await?;
    assert!(topics.iter().any(|topic| topic.name == "Preferences"));
    Ok(())
}

#[tokio::test]
async fn low_importance_is_not_saved() -> Result<()> {
    let judge = ScriptedProvider::new(vec![decision("User had toast today", 2)]);
    let (evaluator, store) = evaluator(judge).await?;

    let outcome = evaluator.process(AGENT, "alice", "I had toast for breakfast today").await?;
    assert_eq!(outcome, MemoryOutcome::Skipped);
    assert!(store.get_user_facts("alice").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn updates_existing_rewrites_the_fact_in_place() -> Result<()> {
    let judge = ScriptedProvider::new(Vec::new());
    let (_, store) = evaluator(judge).await?;
    let existing = store
        .create_fact(
            NewFact::new(AGENT, "User's favorite color is blue")
                .with_source("preference")
                .told_by("alice")
                .about(["Preferences"]),
        )
        .await?;

    let judge = ScriptedProvider::new(vec![LLMResponse::text(
        json!({
            "should_save": true,
            "memory_type": "preference",
            "content": "User's favorite color is teal",
            "importance": 6,
            "updates_existing": true,
            "existing_id": existing.id,
        })
        .to_string(),
    )]);
    let client = ModelClient::new(judge, "judge-model").with_retry_policy(RetryPolicy::none());
    let evaluator = MemoryEvaluator::new(client, store.clone());

    let outcome = evaluator
        .process(AGENT, "alice", "Actually my favorite color is teal now")
        .await?;
    assert_eq!(
        outcome,
        MemoryOutcome::Updated {
            fact_id: existing.id.clone()
        }
    );

    let facts = store.get_user_facts("alice").await?;
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].id, existing.id);
    assert_eq!(facts[0].content, "User's favorite color is teal");
    Ok(())
}
