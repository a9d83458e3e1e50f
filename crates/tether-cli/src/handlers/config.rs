//! Configuration command handlers

use crate::cli::{ConfigAction, ConfigArgs, ConfigFormat, ConfigInitArgs, ConfigShowArgs};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputWriter;
use std::path::PathBuf;

/// Environment variables the CLI reads
const ENV_VARS: [&str; 5] = [
    "TETHER_CONFIG",
    "TETHER_LOG_LEVEL",
    "TETHER_LOG_FORMAT",
    "TETHER_LOG_FILE",
    "RUST_LOG",
];

/// Handle the config command
pub async fn handle_config(args: ConfigArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    match args.action {
        ConfigAction::Init(init_args) => handle_config_init(init_args, output),
        ConfigAction::Show(show_args) => handle_config_show(show_args, config, output),
        ConfigAction::Validate => handle_config_validate(config, output),
    }
}

/// Handle config init subcommand
fn handle_config_init(args: ConfigInitArgs, output: &mut OutputWriter) -> Result<()> {
    let path = match (args.path, args.user) {
        (Some(path), _) => path,
        (None, true) => Config::user_config_path()
            .ok_or_else(|| Error::config("Unable to determine user config directory"))?,
        (None, false) => PathBuf::from("tether.toml"),
    };

    if path.exists() && !args.force {
        output.warning(&format!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        ))?;
        return Ok(());
    }

    Config::sample().save(&path)?;
    tracing::info!(path = %path.display(), "Wrote default configuration");

    output.success(&format!("✓ Created config at {}", path.display()))?;
    output.info("Edit the [endpoints] section to add your own endpoints.")?;
    Ok(())
}

/// Handle config show subcommand
fn handle_config_show(args: ConfigShowArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let content = match args.format {
        ConfigFormat::Toml => config.to_toml()?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    output.writeln(content.trim_end())
}

/// Handle config validate subcommand
fn handle_config_validate(config: &Config, output: &mut OutputWriter) -> Result<()> {
    output.info("Validating configuration...")?;

    if let Err(e) = config.validate() {
        output.error(&format!("✗ Configuration validation failed: {}", e))?;
        return Err(e);
    }
    output.success(&format!(
        "✓ Configuration is valid ({} endpoint{})",
        config.endpoints.len(),
        if config.endpoints.len() == 1 { "" } else { "s" }
    ))?;

    output.section("Configuration Sources")?;
    for path in Config::default_config_paths() {
        let marker = if path.exists() { "✓" } else { "✗" };
        output.info(&format!("{} {}", marker, path.display()))?;
    }

    let active: Vec<(&str, String)> = ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|value| (*name, value)))
        .collect();
    if !active.is_empty() {
        output.section("Active Environment Variables")?;
        for (name, value) in active {
            output.info(&format!("• {} = {}", name, value))?;
        }
    }

    Ok(())
}
