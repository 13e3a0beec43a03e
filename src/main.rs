mod cli;

use anyhow::Result;
use clap::Parser;
use cli::admin::{self, InitAgentOptions};
use cli::chat;
use cli::runtime::{self, Runtime};
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level);

    match args.command.as_ref().unwrap_or(&Commands::Chat) {
        Commands::Chat => {
            let runtime = Runtime::build(&args).await?;
            chat::handle_chat_command(&runtime, &args.user, &args.channel).await
        }
        Commands::Ask { message } => {
            let runtime = Runtime::build(&args).await?;
            chat::handle_ask_command(&runtime, &args.user, &args.channel, &message.join(" ")).await
        }
        Commands::InitAgent {
            name,
            personality,
            model,
            instructions,
        } => {
            let config = runtime::load_config(&args)?;
            let agent_id = runtime::agent_id(&args, &config);
            let options = InitAgentOptions {
                name: name.clone(),
                personality: personality.clone(),
                model: model.clone(),
                instructions: instructions.clone(),
            };
            admin::handle_init_agent_command(&config, &agent_id, options).await
        }
        Commands::SetLanguage { user, language } => {
            let config = runtime::load_config(&args)?;
            let agent_id = runtime::agent_id(&args, &config);
            admin::handle_set_language_command(&config, &agent_id, user, language).await
        }
        Commands::CleanupMemories { user } => {
            let runtime = Runtime::build(&args).await?;
            admin::handle_cleanup_memories_command(&runtime, user).await
        }
        Commands::Stats => {
            let config = runtime::load_config(&args)?;
            let agent_id = runtime::agent_id(&args, &config);
            admin::handle_stats_command(&config, &agent_id).await
        }
    }
}

/// `RUST_LOG` wins; otherwise `EZRA_LOG`, then the `--log-level` flag
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(ezra_core::config::constants::env::LOG_LEVEL))
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
