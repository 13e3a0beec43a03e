//! Turn execution: the think-act loop and what it hands back.

pub mod format;
pub mod language_handler;
pub mod orchestrator;
pub mod processor;
pub mod turn;

pub use format::{Rendered, relative_time, render_tool_result};
pub use language_handler::{LanguageInstructionHandler, LanguageOutcome, Mention};
pub use orchestrator::{Orchestrator, TurnRequest};
pub use processor::{TurnState, requested_article_count};
pub use turn::{Embed, EmbedField, TurnResult};
