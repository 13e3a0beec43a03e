//! # Tool system
//!
//! Every capability the model can invoke lives here. A tool is a name, a
//! JSON schema advertised to the model and a handler; the
//! [`ToolRegistry`] owns the catalog and dispatches calls.
//!
//! ## Layout
//!
//! - [`args`]: typed arguments and the [`ToolInvocation`] sum type
//! - [`result`]: the [`ToolResult`] envelope and its tagged [`ToolData`]
//! - [`registry`]: registration, schemas and execution
//! - handler modules grouped by concern: [`memory`], [`knowledge`],
//!   [`topics`], [`conversation`], [`personality`], [`web`], [`github`]
//!   and [`image`]
//! - [`traits`]: extension seams for platform tools, image generation and
//!   outbound HTTP
//!
//! Handlers never panic on bad input. Parameter problems come back as
//! `Validation` results and handler errors are classified at the registry
//! seam, so a failing tool never aborts a turn.

pub mod args;
pub mod context;
pub mod conversation;
pub mod github;
pub mod image;
pub mod knowledge;
pub mod memory;
pub mod personality;
pub mod registry;
pub mod result;
pub mod topics;
pub mod traits;
pub mod web;

pub use args::{InvocationError, ToolInvocation};
pub use context::ToolContext;
pub use github::GitHubClient;
pub use personality::{PersonalityService, StyleProfile};
pub use registry::{ToolRegistration, ToolRegistry, ToolServices, build_function_declarations};
pub use result::{
    FactList, FetchedPage, ImageArtifact, PageSection, PageSummary, SearchResult, ToolData,
    ToolResult, WebSearchResults, classify_error,
};
pub use traits::{ImageGenerator, ImageRequest, PlatformTool, WebClient};
pub use web::HttpWebClient;
