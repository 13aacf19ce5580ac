//! CLI entry point for the user settings service.
//!
//! This binary provides the `usersettings` command: `serve` starts the
//! HTTP server, the other subcommands inspect and edit the database
//! directly.

mod cli;
mod commands;
mod config;
mod helpers;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::helpers::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` is optional and never overrides variables already set.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    // The server logs at the configured level; one-shot commands keep
    // stdout clean for their own output.
    let level = match &cli.command {
        Commands::Serve { .. } => config.log_level.clone(),
        _ => "warn".to_owned(),
    };
    init_tracing(&level);
    if let Ok(path) = &dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    match cli.command {
        Commands::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            commands::cmd_serve(&config).await
        }
        Commands::Get { user, key } => commands::cmd_get(&config, &user, &key).await,
        Commands::Set { user, key, value } => commands::cmd_set(&config, &user, &key, &value).await,
        Commands::List { user } => commands::cmd_list(&config, &user).await,
        Commands::Delete { user, key } => commands::cmd_delete(&config, &user, &key).await,
        Commands::Import { user, file } => commands::cmd_import(&config, &user, &file).await,
        Commands::Purge { user } => commands::cmd_purge(&config, &user).await,
        Commands::Migrate => commands::cmd_migrate(&config).await,
    }
}
