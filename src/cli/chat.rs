//! `chat` and `ask`: conversation turns from the terminal

use super::runtime::{CLI_PLATFORM, Runtime};
use anyhow::{Context, Result, bail};
use ezra_core::agent::{Mention, TurnResult};
use ezra_core::{AgentError, LanguageInstructionHandler, LanguageOutcome, TurnRequest};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

const APOLOGY: &str = "Sorry, I ran into a problem handling that message.";

pub async fn handle_ask_command(runtime: &Runtime, user: &str, channel: &str, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        bail!("No message provided. Use: ezra ask \"Your message here\"");
    }
    let session = Session::new(runtime, user, channel).await?;
    session.exchange(message).await?;
    runtime.drain().await;
    Ok(())
}

pub async fn handle_chat_command(runtime: &Runtime, user: &str, channel: &str) -> Result<()> {
    let session = Session::new(runtime, user, channel).await?;
    println!("Chatting with {} as {user}. Type 'exit' to quit.", runtime.agent_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }
        session.exchange(message).await?;
    }

    runtime.drain().await;
    Ok(())
}

struct Session<'a> {
    runtime: &'a Runtime,
    requester: Mention,
    channel: String,
    language: LanguageInstructionHandler,
}

impl<'a> Session<'a> {
    async fn new(runtime: &'a Runtime, user: &str, channel: &str) -> Result<Self> {
        let record = runtime
            .store
            .get_or_create_user(user, user, user, CLI_PLATFORM)
            .await
            .with_context(|| format!("Failed to register user '{user}'"))?;
        Ok(Self {
            runtime,
            requester: Mention::new(record.id, record.display_name),
            channel: channel.to_string(),
            language: LanguageInstructionHandler::new(runtime.store.clone()),
        })
    }

    /// One message in, at most one reply out
    async fn exchange(&self, message: &str) -> Result<()> {
        let outcome = self
            .language
            .handle(&self.runtime.agent_id, &self.requester, CLI_PLATFORM, message, &[])
            .await;
        match outcome {
            Ok(LanguageOutcome::NotAnInstruction) => {}
            Ok(LanguageOutcome::TargetNotFound { name }) => {
                println!("I couldn't find a user named {name}.");
                return Ok(());
            }
            Ok(applied) => {
                if let Some(confirmation) = applied.confirmation() {
                    println!("{confirmation}");
                }
                return Ok(());
            }
            Err(err) => warn!(error = %err, "language instruction failed"),
        }

        let request = TurnRequest::new(&self.runtime.agent_id, &self.requester.user_id, message)
            .in_channel(&self.channel, CLI_PLATFORM);
        let cancel = CancellationToken::new();
        let turn = self.runtime.orchestrator.run_turn_with_context(request, &cancel);
        tokio::pin!(turn);

        let outcome = tokio::select! {
            outcome = &mut turn => outcome,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                turn.await
            }
        };

        match outcome.and_then(TurnResult::into_reply) {
            Ok(result) => print_reply(&result)?,
            Err(AgentError::AgentIgnored) => {}
            Err(AgentError::MaxRecursion { partial }) => print_reply(&partial)?,
            Err(AgentError::Cancelled) => println!("(cancelled)"),
            Err(err) => {
                error!(error = %err, kind = ?err.kind(), "turn failed");
                println!("{APOLOGY}");
            }
        }
        Ok(())
    }
}

fn print_reply(result: &TurnResult) -> Result<()> {
    println!("{}", result.content);
    for embed in &result.embeds {
        if !embed.title.is_empty() {
            println!("  * {}", embed.title);
        }
        if !embed.url.is_empty() {
            println!("    {}", embed.url);
        }
        if !embed.description.is_empty() {
            println!("    {}", embed.description);
        }
    }

    if let (Some(bytes), Some(name)) = (&result.image_bytes, &result.image_name)
        && !bytes.is_empty()
    {
        let path = Path::new(name);
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to save generated image to {}", path.display()))?;
        println!("[image saved to {}]", path.display());
    }
    Ok(())
}
