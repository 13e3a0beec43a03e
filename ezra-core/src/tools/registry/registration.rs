use super::ToolRegistry;
use crate::tools::args::ToolInvocation;
use crate::tools::context::ToolContext;
use crate::tools::result::ToolResult;
use crate::tools::traits::PlatformTool;
use futures::future::BoxFuture;
use std::sync::Arc;

pub type ToolExecutorFn = for<'a> fn(
    &'a ToolRegistry,
    &'a ToolContext,
    ToolInvocation,
) -> BoxFuture<'a, anyhow::Result<ToolResult>>;

#[derive(Clone)]
pub enum ToolHandler {
    /// Builtin tool; arguments are parsed into a [`ToolInvocation`] first
    RegistryFn(ToolExecutorFn),
    /// Platform tool; arguments pass through untouched
    Platform(Arc<dyn PlatformTool>),
}

#[derive(Clone)]
pub struct ToolRegistration {
    name: &'static str,
    expose_in_llm: bool,
    handler: ToolHandler,
}

impl ToolRegistration {
    pub fn new(name: &'static str, executor: ToolExecutorFn) -> Self {
        Self {
            name,
            expose_in_llm: true,
            handler: ToolHandler::RegistryFn(executor),
        }
    }

    pub fn from_platform_tool(tool: Arc<dyn PlatformTool>) -> Self {
        Self {
            name: tool.name(),
            expose_in_llm: true,
            handler: ToolHandler::Platform(tool),
        }
    }

    /// Hidden tools still execute when called; they are just not advertised
    pub fn with_llm_visibility(mut self, expose: bool) -> Self {
        self.expose_in_llm = expose;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn expose_in_llm(&self) -> bool {
        self.expose_in_llm
    }

    pub fn handler(&self) -> ToolHandler {
        self.handler.clone()
    }
}
