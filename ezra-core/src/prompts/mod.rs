//! System prompt generation.
//!
//! [`PromptBuilder`] composes the per-turn system prompt from the agent's
//! context window, the user's context and the active mimic, with static
//! text kept in [`PromptTemplates`].

pub mod system;
pub mod templates;

pub use system::{PromptBuilder, PromptInputs, resolve_language};
pub use templates::PromptTemplates;
