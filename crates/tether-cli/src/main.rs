//! Tether CLI - fetch configured endpoints through the resilient request pipeline
//!
//! This is the main entry point for the `tether` binary.

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod output;

use cli::{Cli, Commands};
use colored::control;
use config::Config;
use error::Result;
use logging::{timing::Timer, LogSettings};
use output::OutputWriter;
use std::process;
use tracing::instrument;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    // Loaded before logging so the [logging] section applies; errors surface below.
    let config = Config::load_with_file(cli.config.as_deref());

    let guard = match init_logging(&cli, config.as_ref().ok()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e),
    };

    // Flush file logging before exiting.
    drop(guard);

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

            if e.should_show_help() {
                eprintln!("\nFor more information, try '--help'");
            }

            process::exit(e.exit_code());
        }
    }
}

/// Main application logic
#[instrument(skip_all, fields(command = ?cli.command))]
async fn run(cli: Cli, config: Config) -> Result<()> {
    let _timer = Timer::new("cli_execution");

    let mut output = OutputWriter::new(cli.output, cli.use_color(), cli.quiet);

    tracing::info!(verbosity = cli.verbosity_level(), "Executing command");

    match cli.command {
        Commands::Fetch(args) => handlers::handle_fetch(args, &config, &mut output).await,
        Commands::Config(args) => handlers::handle_config(args, &config, &mut output).await,
        Commands::Completions(args) => handlers::handle_completions(args),
    }
}

/// Initialize the logging system
fn init_logging(cli: &Cli, config: Option<&Config>) -> Result<Option<WorkerGuard>> {
    let verbosity = cli.verbosity_level();
    let mut settings = LogSettings::from_verbosity(verbosity);

    if let Some(config) = config {
        settings.apply_file_config(&config.logging, verbosity);
    }
    settings.merge_with_env();

    if cli.quiet {
        settings.level = "error".to_string();
    }

    logging::init_logging(&settings)
}
