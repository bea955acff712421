//! # slack-cli
//!
//! Command-line surface over `token-store`: workspace token management and
//! the SSH key used to encrypt tokens at rest.

pub mod cli;
mod commands;
pub mod terminal;

pub use cli::{Args, Command, ConfigCommand, WorkspacesCommand};
pub use commands::App;
pub use terminal::TerminalInteraction;
