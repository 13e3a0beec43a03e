//! Crate-wide error taxonomy.
//!
//! Component seams keep their own `thiserror` enums ([`LLMError`],
//! [`StoreError`]); [`AgentError`] is what the orchestrator surfaces to a
//! platform adapter, and [`ErrorKind`] is the coarse classification an
//! adapter uses to pick a user-visible reaction.

use crate::agent::TurnResult;
use crate::knowledge::StoreError;
use crate::llm::provider::LLMError;
use thiserror::Error;

/// Coarse error classes shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Retryable,
    Cancelled,
    DeadlineExceeded,
    ToolExecution,
    MaxRecursion,
    AgentIgnored,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transient failure: {0}")]
    Retryable(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// The turn hit the recursion cap. `partial` carries the fallback reply
    /// so the adapter can still answer.
    #[error("maximum recursion depth reached")]
    MaxRecursion { partial: Box<TurnResult> },

    #[error("turn ignored by agent")]
    AgentIgnored,

    #[error(transparent)]
    Model(#[from] LLMError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::NotFound(_) => ErrorKind::NotFound,
            AgentError::Validation(_) => ErrorKind::Validation,
            AgentError::Retryable(_) => ErrorKind::Retryable,
            AgentError::Cancelled => ErrorKind::Cancelled,
            AgentError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            AgentError::ToolExecution { .. } => ErrorKind::ToolExecution,
            AgentError::MaxRecursion { .. } => ErrorKind::MaxRecursion,
            AgentError::AgentIgnored => ErrorKind::AgentIgnored,
            AgentError::Model(err) if err.is_retryable() => ErrorKind::Retryable,
            AgentError::Model(_) => ErrorKind::Validation,
            AgentError::Store(err) => err.kind(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }

    /// The reply an adapter should still deliver, if any.
    pub fn partial_result(&self) -> Option<&TurnResult> {
        match self {
            AgentError::MaxRecursion { partial } => Some(partial),
            _ => None,
        }
    }
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_keeps_its_kind() {
        let err: AgentError = StoreError::NotFound("agent 'x'".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_retryable());
    }

    #[test]
    fn network_failures_are_retryable() {
        let err: AgentError = LLMError::Network("connection reset".into()).into();
        assert!(err.is_retryable());
        let err: AgentError = LLMError::InvalidRequest("bad schema".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn max_recursion_exposes_partial_reply() {
        let partial = TurnResult {
            content: "partial".into(),
            ..TurnResult::default()
        };
        let err = AgentError::MaxRecursion {
            partial: Box::new(partial),
        };
        assert_eq!(err.partial_result().map(|r| r.content.as_str()), Some("partial"));
    }
}
