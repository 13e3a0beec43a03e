//! Configuration for the Ezra runtime.
//!
//! Values come from an optional `ezra.toml`, layered with environment
//! variables (after `.env` is loaded). Compile-time defaults live in
//! [`constants`].

pub mod api_keys;
pub mod constants;
pub mod loader;

pub use api_keys::{load_dotenv, resolve_api_key};
pub use loader::{
    AgentSection, ConfigManager, EzraConfig, MemorySection, ModelSection, PlatformSection,
    ServerSection, StoreSection,
};
