//! Model client: a thin wrapper over a tool-calling chat-completion endpoint.

pub mod client;
pub mod provider;
pub mod providers;

pub use client::{ModelClient, RetryPolicy, ScopedModel};
pub use provider::{
    FinishReason, FunctionCall, FunctionDefinition, LLMError, LLMProvider, LLMRequest,
    LLMResponse, Message, MessageRole, ToolCall, ToolDefinition, Usage,
};
pub use providers::OpenAIProvider;
