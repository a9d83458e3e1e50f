//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::path::PathBuf;
use tether_core::Method;

/// Tether CLI - resilient HTTP fetches against configured endpoints
///
/// Requests run through the Tether pipeline: outcomes are classified,
/// transport failures are retried with backoff, and repeated requests
/// inside an endpoint's window are flagged as duplicates.
#[derive(Parser, Debug)]
#[command(
    name = "tether",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "TETHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a request to a configured endpoint or an absolute URL
    Fetch(FetchArgs),

    /// Manage configuration files
    Config(ConfigArgs),

    /// Generate shell completions for the specified shell
    Completions(CompletionsArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Endpoint name from the configuration file, or an absolute URL
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: Method,

    /// Query item as NAME=VALUE (repeatable); a bare NAME is dropped
    #[arg(short = 'Q', long = "query", value_name = "NAME=VALUE")]
    pub query: Vec<String>,

    /// Header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// JSON request body
    #[arg(long, value_name = "JSON", conflicts_with = "form")]
    pub json: Option<String>,

    /// Send query items as a URL-encoded form
    #[arg(long)]
    pub form: bool,

    /// Total attempts including the first one
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Wait out the full backoff even when connectivity returns
    #[arg(long)]
    pub timer_only: bool,

    /// Per-attempt timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Save the response body to a file
    #[arg(long = "save-to", value_name = "OUTPUT_FILE")]
    pub save_to: Option<PathBuf>,

    /// Pretty-print JSON response bodies
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init(ConfigInitArgs),

    /// Show the effective configuration
    Show(ConfigShowArgs),

    /// Validate the effective configuration
    Validate,
}

/// Arguments for config init
#[derive(Parser, Debug)]
pub struct ConfigInitArgs {
    /// Destination file (defaults to ./tether.toml, or the user config with --user)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Write to the user configuration directory
    #[arg(long, conflicts_with = "path")]
    pub user: bool,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for config show
#[derive(Parser, Debug)]
pub struct ConfigShowArgs {
    /// Show configuration in specified format
    #[arg(short, long, value_enum, default_value = "toml")]
    pub format: ConfigFormat,
}

/// Configuration file formats
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Arguments for generating shell completions
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Pretty-printed JSON output
    JsonPretty,
}

/// Supported shells for completion generation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}

impl Shell {
    /// Convert to clap_complete shell type
    pub fn to_clap_shell(self) -> clap_complete::Shell {
        match self {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_level() {
        let cli = Cli::parse_from(["tether", "-vv", "fetch", "users"]);
        assert_eq!(cli.verbosity_level(), 2);

        let quiet_cli = Cli::parse_from(["tether", "--quiet", "fetch", "users"]);
        assert_eq!(quiet_cli.verbosity_level(), 0);
    }

    #[test]
    fn test_fetch_args() {
        let cli = Cli::parse_from([
            "tether",
            "fetch",
            "https://api.example.com/items",
            "-X",
            "post",
            "-Q",
            "page=2",
            "--query",
            "sort=asc",
            "-H",
            "X-Trace: abc",
            "--max-attempts",
            "4",
            "--timer-only",
        ]);

        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch command");
        };
        assert_eq!(args.target, "https://api.example.com/items");
        assert_eq!(args.method, Method::Post);
        assert_eq!(args.query, vec!["page=2", "sort=asc"]);
        assert_eq!(args.headers, vec!["X-Trace: abc"]);
        assert_eq!(args.max_attempts, Some(4));
        assert!(args.timer_only);
        assert!(!args.form);
    }

    #[test]
    fn test_json_conflicts_with_form() {
        let result = Cli::try_parse_from(["tether", "fetch", "users", "--json", "{}", "--form"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_subcommands() {
        let cli = Cli::parse_from(["tether", "config", "show", "--format", "yaml"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show(args),
            }) => assert_eq!(args.format, ConfigFormat::Yaml),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
