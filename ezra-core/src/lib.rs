//! Ezra Core Library
//!
//! The reasoning core of a persistent-memory conversational agent: a
//! knowledge store for agents, users, facts, topics and conversations, a
//! tool registry the model drives, the think-act [`Orchestrator`] and a
//! background [`MemoryEvaluator`] that decides what to remember.
//!
//! Platform adapters (chat bots, HTTP servers, the bundled CLI) build an
//! [`Orchestrator`] and call [`Orchestrator::run_turn_with_context`] once per
//! inbound message.

pub mod agent;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod language;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod tools;

pub use agent::{
    Embed, LanguageInstructionHandler, LanguageOutcome, Mention, Orchestrator, TurnRequest,
    TurnResult,
};
pub use config::{ConfigManager, EzraConfig};
pub use error::{AgentError, AgentResult, ErrorKind};
pub use knowledge::{KnowledgeStore, SqliteKnowledgeStore, StoreError, StoreResult};
pub use language::Language;
pub use llm::{LLMError, LLMProvider, ModelClient, OpenAIProvider};
pub use memory::{MemoryEvaluator, MemoryJob, MemoryQueue};
pub use prompts::PromptBuilder;
pub use tools::{ToolContext, ToolRegistry, ToolResult, ToolServices};
