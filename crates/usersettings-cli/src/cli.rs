//! CLI argument definitions.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// usersettings -- per-user key-value settings service.
#[derive(Parser)]
#[command(
    name = "usersettings",
    version,
    about = "Per-user key-value settings service",
    long_about = "Stores arbitrary JSON settings per user in SQLite and serves them over HTTP. \
                  The local subcommands operate on the database directly."
)]
pub struct Cli {
    /// Path to the SQLite database (overrides config and DATABASE_PATH).
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to a TOML config file [default: config/default.toml].
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on.
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print one setting as JSON.
    Get {
        /// The owning user id.
        user: String,
        /// The setting key.
        key: String,
    },

    /// Store one setting. The value is parsed as JSON, falling back to a
    /// plain string.
    Set {
        /// The owning user id.
        user: String,
        /// The setting key.
        key: String,
        /// The value, e.g. `dark`, `14`, `true` or `{"sidebar":false}`.
        value: String,
    },

    /// List every setting of a user.
    List {
        /// The owning user id.
        user: String,
    },

    /// Delete one setting.
    Delete {
        /// The owning user id.
        user: String,
        /// The setting key.
        key: String,
    },

    /// Store every entry of a JSON object file for a user.
    Import {
        /// The owning user id.
        user: String,
        /// Path to a file holding a flat JSON object.
        file: PathBuf,
    },

    /// Delete every setting of a user.
    Purge {
        /// The owning user id.
        user: String,
    },

    /// Create the database if needed and apply pending migrations.
    Migrate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn global_database_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "usersettings",
            "get",
            "u1",
            "theme",
            "--database",
            "/tmp/s.db",
        ])
        .unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/s.db")));
        assert!(matches!(cli.command, Commands::Get { ref key, .. } if key == "theme"));
    }

    #[test]
    fn serve_flags_are_optional() {
        let cli = Cli::try_parse_from(["usersettings", "serve", "-p", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { bind, port } => {
                assert!(bind.is_none());
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected serve"),
        }
    }
}
