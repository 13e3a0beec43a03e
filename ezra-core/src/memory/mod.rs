//! Memory evaluation: deciding what to remember from a conversation.
//!
//! The [`MemoryEvaluator`] asks a judge model whether a user message holds
//! a memory and writes it as a fact, updating instead of duplicating when
//! the judge recognises an existing fact. The [`MemoryQueue`] runs those
//! evaluations in the background after a turn returns.

pub mod evaluator;
pub mod json_extract;
pub mod queue;

pub use evaluator::{
    CleanupReport, EvaluationError, MemoryDecision, MemoryEvaluator, MemoryOutcome, MemoryType,
    is_non_memory_message,
};
pub use json_extract::{JsonExtractError, JsonShape, extract_json};
pub use queue::{MemoryJob, MemoryQueue, QueueOptions};
