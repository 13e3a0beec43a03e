//! Command-line front end: argument parsing plus one handler per command.

pub mod admin;
pub mod args;
pub mod chat;
pub mod runtime;

pub use args::{Cli, Commands};
