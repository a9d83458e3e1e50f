//! Command handlers for CLI subcommands
//!
//! This module contains the implementation logic for each CLI subcommand.

mod completions;
mod config;
mod fetch;

pub use completions::handle_completions;
pub use config::handle_config;
pub use fetch::handle_fetch;
