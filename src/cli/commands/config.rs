use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use super::redact_url;
use crate::cli::output::{Formatter, get_formatter};
use crate::error::ConfigError;
use crate::models::{Config, OutputFormat, ResolvedConfig};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create the global config instead of ./estate-indexer.toml"
        )]
        global: bool,
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show configuration file paths")]
    Path,
}

/// `config init` and `config path` never need a valid configuration, so the
/// load result is passed through unresolved.
pub fn handle_config(
    cmd: ConfigCommand,
    loaded: Result<ResolvedConfig, ConfigError>,
    format: OutputFormat,
) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(loaded?, format),
        ConfigCommand::Path => handle_path(loaded.ok(), format),
    }
}

fn handle_init(global: bool, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let path = target_path(global)?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::write_default(&path)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn target_path(global: bool) -> Result<PathBuf> {
    if global {
        Config::global_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))
    } else {
        Config::project_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine current directory"))
    }
}

/// Copy of the configuration that is safe to print.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.vector_store.api_key.is_some() {
        config.vector_store.api_key = Some("********".to_string());
    }
    config.vector_store.url = redact_url(&config.vector_store.url);
    config.analytics.url = redact_url(&config.analytics.url);
    config
}

fn handle_show(resolved: ResolvedConfig, format: OutputFormat) -> Result<()> {
    let config = redacted(&resolved.config);

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "source": resolved.source.to_string(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# Loaded from: {}", resolved.source);
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn handle_path(resolved: Option<ResolvedConfig>, format: OutputFormat) -> Result<()> {
    let project = Config::project_path();
    let global = Config::global_path();
    let active = resolved.map(|r| r.source.to_string());

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "active": active,
            "project": project,
            "global": global,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Configuration paths:");
    println!();
    if let Some(active) = active {
        println!("Active: {}", active);
    }
    for (label, path) in [("Project", project), ("Global", global)] {
        if let Some(path) = path {
            let state = if path.exists() { "exists" } else { "absent" };
            println!("{} config ({}): {}", label, state, path.display());
        }
    }
    Ok(())
}
