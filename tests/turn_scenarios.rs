mod common;

use anyhow::Result;
use common::{AGENT, CHANNEL, FakeWeb, HarnessBuilder, PLATFORM, tool_step};
use ezra_core::agent::Mention;
use ezra_core::config::constants::{agent, tools};
use ezra_core::knowledge::Role;
use ezra_core::llm::LLMResponse;
use ezra_core::{AgentError, LanguageInstructionHandler, LanguageOutcome, TurnRequest};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn request(user: &str, message: &str) -> TurnRequest {
    TurnRequest::new(AGENT, user, message).in_channel(CHANNEL, PLATFORM)
}

#[tokio::test]
async fn tool_only_model_ends_in_max_recursion_with_persisted_partial() -> Result<()> {
    let script = (0..agent::MAX_RECURSION_DEPTH)
        .map(|_| tool_step(tools::CREATE_TOPIC, json!({"name": "Gardening"})))
        .collect();
    let harness = HarnessBuilder::new(script).build().await?;

    let outcome = harness
        .orchestrator
        .run_turn_with_context(request("alice", "track gardening for me"), &CancellationToken::new())
        .await;

    let partial = match outcome {
        Err(AgentError::MaxRecursion { partial }) => partial,
        other => panic!("expected MaxRecursion, got {other:?}"),
    };
    assert_eq!(harness.model.calls(), agent::MAX_RECURSION_DEPTH);
    assert!(partial.content.starts_with("[create_topic]"));

    let history = harness.store.get_conversation_history(CHANNEL, 10).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Agent);
    assert_eq!(history[1].content, partial.content);
    Ok(())
}

#[tokio::test]
async fn empty_reply_after_tool_step_falls_back_to_tool_results() -> Result<()> {
    let script = vec![
        tool_step(tools::CREATE_TOPIC, json!({"name": "Gardening"})),
        LLMResponse::text(""),
        LLMResponse::text(""),
        LLMResponse::text(""),
        LLMResponse::text(""),
    ];
    let harness = HarnessBuilder::new(script).build().await?;

    let result = harness
        .orchestrator
        .run_turn_with_context(request("alice", "track gardening for me"), &CancellationToken::new())
        .await?;

    assert_eq!(harness.model.calls(), 2);
    assert!(result.content.starts_with("[create_topic]: "));
    let history = harness.store.get_conversation_history(CHANNEL, 10).await?;
    assert_eq!(history.last().map(|message| message.content.as_str()), Some(result.content.as_str()));
    Ok(())
}

#[tokio::test]
async fn ignore_tool_suppresses_the_reply() -> Result<()> {
    let harness = HarnessBuilder::new(vec![tool_step(tools::IGNORE, json!({}))])
        .build()
        .await?;

    let result = harness
        .orchestrator
        .run_turn_with_context(request("alice", "lol"), &CancellationToken::new())
        .await?;

    assert!(result.ignored);
    assert!(result.content.is_empty());
    assert!(matches!(result.into_reply(), Err(AgentError::AgentIgnored)));
    let history = harness.store.get_conversation_history(CHANNEL, 10).await?;
    assert!(history.iter().all(|message| message.role == Role::User));
    Ok(())
}

#[tokio::test]
async fn two_article_summary_takes_four_model_calls() -> Result<()> {
    let first = "https://news.example/async-1";
    let second = "https://news.example/async-2";
    let web = FakeWeb::with_articles(&[first, second, "https://news.example/async-3"]);
    let script = vec![
        tool_step(tools::WEB_SEARCH, json!({"query": "async rust"})),
        tool_step(tools::FETCH_WEBPAGE, json!({"url": first})),
        tool_step(tools::FETCH_WEBPAGE, json!({"url": second})),
        LLMResponse::text("Both articles explain futures and executors."),
    ];
    let harness = HarnessBuilder::new(script).with_web(web).build().await?;

    let result = harness
        .orchestrator
        .run_turn_with_context(
            request("alice", "summarize the first 2 articles about async rust"),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(harness.model.calls(), 4);
    assert_eq!(result.content, "Both articles explain futures and executors.");
    assert_eq!(result.tool_calls.len(), 3);
    assert_eq!(harness.web.fetched(), vec![first.to_string(), second.to_string()]);
    assert!(!result.embeds.is_empty());

    let third = harness.model.user_message(2);
    assert!(third.contains(&format!("Already fetched URLs (DO NOT FETCH THESE AGAIN):\n- {first}")));
    let last = harness.model.user_message(3);
    assert!(last.contains(&format!("[ARTICLE 2 from {second}]")));
    assert!(last.contains("All 2 requested articles have been fetched"));
    Ok(())
}

#[tokio::test]
async fn repeated_fetch_of_the_same_url_is_refused() -> Result<()> {
    let first = "https://news.example/a";
    let second = "https://news.example/b";
    let web = FakeWeb::with_articles(&[first, second]);
    let script = vec![
        tool_step(tools::WEB_SEARCH, json!({"query": "tokio"})),
        tool_step(tools::FETCH_WEBPAGE, json!({"url": first})),
        tool_step(tools::FETCH_WEBPAGE, json!({"url": first})),
        tool_step(tools::FETCH_WEBPAGE, json!({"url": second})),
        LLMResponse::text("Summaries of two distinct articles."),
    ];
    let harness = HarnessBuilder::new(script).with_web(web).build().await?;

    let result = harness
        .orchestrator
        .run_turn_with_context(
            request("alice", "summarize two articles about tokio"),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(result.content, "Summaries of two distinct articles.");
    assert_eq!(harness.web.fetched(), vec![first.to_string(), second.to_string()]);
    assert!(harness.model.user_message(3).contains("was already fetched in this turn"));
    Ok(())
}

#[tokio::test]
async fn update_core_memory_alias_keeps_one_block() -> Result<()> {
    let script = vec![
        tool_step(tools::UPDATE_CORE_MEMORY, json!({"name": "identity", "content": "I am X"})),
        LLMResponse::text("Done."),
        tool_step(tools::UPDATE_CORE_MEMORY, json!({"name": "identity", "content": "I am Y"})),
        LLMResponse::text("Done again."),
    ];
    let harness = HarnessBuilder::new(script).build().await?;
    let cancel = CancellationToken::new();

    let first = harness
        .orchestrator
        .run_turn_with_context(request("alice", "you are X now"), &cancel)
        .await?;
    assert_eq!(first.content, "Done.");
    let window = harness.store.fetch_context_window(AGENT).await?;
    assert_eq!(window.memory_block("identity").map(|b| b.content.as_str()), Some("I am X"));

    harness
        .orchestrator
        .run_turn_with_context(request("alice", "actually you are Y"), &cancel)
        .await?;
    let window = harness.store.fetch_context_window(AGENT).await?;
    let identity: Vec<_> = window
        .core_memory
        .iter()
        .filter(|block| block.name == "identity")
        .collect();
    assert_eq!(identity.len(), 1);
    assert_eq!(identity[0].content, "I am Y");
    Ok(())
}

#[tokio::test]
async fn language_instruction_reaches_the_target_users_prompt() -> Result<()> {
    let script = vec![LLMResponse::text("Bonjour Bob !"), LLMResponse::text("Hi Alice!")];
    let harness = HarnessBuilder::new(script).build().await?;
    harness.store.get_or_create_user("bob", "bob", "bob", PLATFORM).await?;

    let handler = LanguageInstructionHandler::new(harness.store.clone());
    let outcome = handler
        .handle(
            AGENT,
            &Mention::new("alice", "alice"),
            PLATFORM,
            "set language for @bob to French",
            &[],
        )
        .await?;
    assert!(matches!(outcome, LanguageOutcome::Applied { ref user_id, .. } if user_id == "bob"));

    let cancel = CancellationToken::new();
    harness
        .orchestrator
        .run_turn_with_context(request("bob", "salut"), &cancel)
        .await?;
    harness
        .orchestrator
        .run_turn_with_context(request("alice", "hello"), &cancel)
        .await?;

    let bob_prompt = harness.model.system_prompt(0);
    assert!(bob_prompt.contains("## LANGUAGE PREFERENCE"));
    assert!(bob_prompt.contains("French (language code: fr)"));
    assert!(!harness.model.system_prompt(1).contains("## LANGUAGE PREFERENCE"));
    Ok(())
}

#[tokio::test]
async fn concurrent_turns_for_one_agent_do_not_interleave() -> Result<()> {
    let script = vec![
        tool_step(tools::CORE_MEMORY_REPLACE, json!({"name": "notes", "content": "first writer"})),
        LLMResponse::text("Noted."),
        tool_step(tools::CORE_MEMORY_REPLACE, json!({"name": "notes", "content": "second writer"})),
        LLMResponse::text("Noted."),
    ];
    let harness = HarnessBuilder::new(script).build().await?;
    let cancel = CancellationToken::new();

    let (alice, bob) = tokio::join!(
        harness
            .orchestrator
            .run_turn_with_context(request("alice", "note this"), &cancel),
        harness
            .orchestrator
            .run_turn_with_context(request("bob", "note that"), &cancel),
    );

    // Each turn saw its own tool step followed by its own reply
    assert_eq!(alice?.content, "Noted.");
    assert_eq!(bob?.content, "Noted.");
    assert_eq!(harness.model.calls(), 4);

    let window = harness.store.fetch_context_window(AGENT).await?;
    let notes: Vec<_> = window.core_memory.iter().filter(|b| b.name == "notes").collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "second writer");
    Ok(())
}
