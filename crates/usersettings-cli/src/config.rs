//! Service configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults,
//! 2. the `[server]` table of `config/default.toml` (if present),
//! 3. environment variables (`BIND_ADDR`, `PORT`, `DATABASE_PATH`,
//!    `LOG_LEVEL`, `USER_HEADER`), after `.env` has been loaded,
//! 4. command-line flags, applied by the caller.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;
use usersettings_web::{DEFAULT_USER_HEADER, WebConfig};

/// Config file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Resolved configuration for one process.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub log_level: String,
    pub user_header: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 4001,
            database_path: PathBuf::from("data/settings.db"),
            log_level: "info".into(),
            user_header: DEFAULT_USER_HEADER.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    bind_addr: Option<String>,
    port: Option<u16>,
    database_path: Option<PathBuf>,
    log_level: Option<String>,
    user_header: Option<String>,
}

impl AppConfig {
    /// Load from `path` (or [`DEFAULT_CONFIG_PATH`]) and the process
    /// environment.
    ///
    /// A missing default file is fine; a missing file that was asked for
    /// explicitly, or one that does not parse, is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        let contents = match std::fs::read_to_string(path) {
            Ok(c) => Some(c),
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                None
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        Self::from_sources(contents.as_deref(), env_non_empty)
            .with_context(|| format!("invalid configuration ({})", path.display()))
    }

    /// Build a config from TOML text and an environment lookup.
    pub fn from_sources(
        toml_text: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(text) = toml_text {
            let file: FileConfig = toml::from_str(text).context("failed to parse TOML")?;
            let server = file.server;
            if let Some(v) = server.bind_addr {
                config.bind_addr = v;
            }
            if let Some(v) = server.port {
                config.port = v;
            }
            if let Some(v) = server.database_path {
                config.database_path = v;
            }
            if let Some(v) = server.log_level {
                config.log_level = v;
            }
            if let Some(v) = server.user_header {
                config.user_header = v.to_ascii_lowercase();
            }
        }

        if let Some(v) = env("BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(v) = env("PORT") {
            config.port = v
                .parse()
                .with_context(|| format!("PORT must be a port number, got {v:?}"))?;
        }
        if let Some(v) = env("DATABASE_PATH") {
            config.database_path = PathBuf::from(v);
        }
        if let Some(v) = env("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = env("USER_HEADER") {
            config.user_header = v.to_ascii_lowercase();
        }

        Ok(config)
    }

    /// The subset of settings the HTTP layer needs.
    pub fn web_config(&self) -> WebConfig {
        WebConfig {
            bind_addr: self.bind_addr.clone(),
            port: self.port,
            user_header: self.user_header.clone(),
        }
    }
}

/// Read an environment variable, treating empty values as unset.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_any_source() {
        let config = AppConfig::from_sources(None, env_from(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.port, 4001);
        assert_eq!(config.user_header, "x-user-id");
    }

    #[test]
    fn file_overrides_defaults() {
        let toml = r#"
            [server]
            port = 8080
            database_path = "/var/lib/settings/settings.db"
        "#;
        let config = AppConfig::from_sources(Some(toml), env_from(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_path,
            PathBuf::from("/var/lib/settings/settings.db")
        );
        assert_eq!(config.bind_addr, "0.0.0.0");
    }

    #[test]
    fn env_overrides_file() {
        let toml = "[server]\nport = 8080\nlog_level = \"warn\"\n";
        let env = env_from(&[("PORT", "9000"), ("USER_HEADER", "X-Auth-User")]);

        let config = AppConfig::from_sources(Some(toml), env).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.user_header, "x-auth-user");
    }

    #[test]
    fn file_without_server_table_is_fine() {
        let config = AppConfig::from_sources(Some("[other]\nx = 1\n"), env_from(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = AppConfig::from_sources(None, env_from(&[("PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(AppConfig::from_sources(Some("[server\nport ="), env_from(&[])).is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn web_config_carries_bind_and_header() {
        let config = AppConfig {
            port: 5000,
            user_header: "x-remote-user".into(),
            ..AppConfig::default()
        };
        let web = config.web_config();
        assert_eq!(web.port, 5000);
        assert_eq!(web.user_header, "x-remote-user");
    }
}
