//! Configuration view and validation commands: `ticketboard config`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use ticketboard::config::{BoardConfig, BoardToml, CONFIG_DIR, CONFIG_FILE};

use super::super::ConfigCommands;

fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE))
}

pub fn cmd_config(config: &BoardConfig, explicit: Option<&Path>, command: Option<ConfigCommands>) -> Result<()> {
    let path = config_path(explicit);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No board.toml found at {} (using defaults)", path.display());
            }
            println!();

            let toml = &config.toml;
            println!("[store]");
            println!("  api_url = \"{}\"", toml.store.api_url);
            println!("  token = {}", if toml.store.token.is_some() { "(set)" } else { "(unset)" });
            println!("  timeout_secs = {}", toml.store.timeout_secs);
            println!();
            println!("[server]");
            println!("  port = {}", toml.server.port);
            println!("  db_path = \"{}\"", toml.server.db_path.display());
            println!();
            println!("[logging]");
            println!("  filter = \"{}\"", toml.logging.filter);
            println!("  json = {}", toml.logging.json);
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!("  api_url = \"{}\"", config.api_url());
            println!("  token = {}", if config.token().is_some() { "(set)" } else { "(unset)" });
            println!("  log_filter = \"{}\"", config.log_filter());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
                anyhow::bail!("{} configuration warning(s)", warnings.len());
            }
        }
        Some(ConfigCommands::Init) => cmd_config_init(explicit)?,
    }

    Ok(())
}

/// Write a default board.toml unless one already exists.
pub fn cmd_config_init(explicit: Option<&Path>) -> Result<()> {
    let path = config_path(explicit);
    if path.exists() {
        println!("board.toml already exists at {}", path.display());
        println!("Delete it first if you want to recreate it.");
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    BoardToml::default().save(&path)?;
    println!("Created board.toml at {}", path.display());
    Ok(())
}
