//! Subcommand implementations.
//!
//! `serve` runs the HTTP server; the rest open the database directly,
//! do one operation, print the result and close the store.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::info;
use usersettings_store::{SettingValue, SettingsStore};
use usersettings_web::WebServer;

use crate::config::AppConfig;
use crate::helpers::{format_millis, parse_cli_value};

async fn open_store(config: &AppConfig) -> Result<SettingsStore> {
    let path = config.database_path.clone();
    let display = path.display().to_string();
    SettingsStore::open(path)
        .await
        .with_context(|| format!("failed to open database at {display}"))
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

pub async fn cmd_serve(config: &AppConfig) -> Result<()> {
    info!(
        database = %config.database_path.display(),
        bind = %config.bind_addr,
        port = config.port,
        "starting usersettings"
    );

    let store = open_store(config).await?;
    let server = WebServer::new(config.web_config(), store.clone());

    let served = server.start().await.context("web server failed");

    // Close even when serving failed, then report the first error.
    store.close().await.context("failed to close database")?;
    served?;

    info!("shutdown complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Local subcommands
// ---------------------------------------------------------------------------

pub async fn cmd_get(config: &AppConfig, user: &str, key: &str) -> Result<()> {
    let store = open_store(config).await?;
    let value = store.get(user, key).await;
    store.close().await?;

    match value? {
        Some(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        None => bail!("no setting {key:?} for user {user:?}"),
    }
}

pub async fn cmd_set(config: &AppConfig, user: &str, key: &str, raw: &str) -> Result<()> {
    let value = parse_cli_value(raw);
    let store = open_store(config).await?;
    let result = store.set(user, key, value.clone()).await;
    store.close().await?;
    result?;

    println!("  [+] {user}/{key} = {value}");
    Ok(())
}

pub async fn cmd_list(config: &AppConfig, user: &str) -> Result<()> {
    let store = open_store(config).await?;
    let entries = store.entries(user).await;
    store.close().await?;
    let entries = entries?;

    if entries.is_empty() {
        println!("  No settings for {user}.");
        return Ok(());
    }

    println!();
    println!("  {:<24} {:<8} {:<24} VALUE", "KEY", "TYPE", "UPDATED");
    for setting in &entries {
        println!(
            "  {:<24} {:<8} {:<24} {}",
            setting.key,
            setting.value.type_name(),
            format_millis(setting.updated_at),
            setting.value
        );
    }
    println!();
    Ok(())
}

pub async fn cmd_delete(config: &AppConfig, user: &str, key: &str) -> Result<()> {
    let store = open_store(config).await?;
    let deleted = store.delete(user, key).await;
    store.close().await?;

    if deleted? {
        println!("  [-] deleted {user}/{key}");
    } else {
        println!("  [=] {user}/{key} did not exist");
    }
    Ok(())
}

pub async fn cmd_import(config: &AppConfig, user: &str, file: &Path) -> Result<()> {
    let settings = read_settings_file(file)?;
    let store = open_store(config).await?;
    let saved = store.set_many(user, settings).await;
    store.close().await?;

    println!("  [+] saved {} settings for {user}", saved?);
    Ok(())
}

pub async fn cmd_purge(config: &AppConfig, user: &str) -> Result<()> {
    let store = open_store(config).await?;
    let removed = store.purge_user(user).await;
    store.close().await?;

    println!("  [-] removed {} settings for {user}", removed?);
    Ok(())
}

pub async fn cmd_migrate(config: &AppConfig) -> Result<()> {
    let path = config.database_path.clone();
    let display = path.display().to_string();
    let db = usersettings_store::Database::open(&path)
        .with_context(|| format!("failed to open database at {display}"))?;
    let applied = db.run_migrations().await;
    db.close().await?;

    println!(
        "  [+] {display}: {} migration(s) applied, schema at v{}",
        applied?,
        usersettings_store::migration::latest_version()
    );
    Ok(())
}

/// Parse a file holding a flat JSON object of settings.
fn read_settings_file(file: &Path) -> Result<Vec<(String, SettingValue)>> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let body: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let Value::Object(map) = body else {
        bail!("{} must contain a JSON object", file.display());
    };
    Ok(map.into_iter().map(|(k, v)| (k, v.into())).collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config_in(dir: &Path) -> AppConfig {
        AppConfig {
            database_path: dir.join("settings.db"),
            ..AppConfig::default()
        }
    }

    #[test]
    fn settings_file_must_be_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(read_settings_file(&path).is_err());

        std::fs::write(&path, r#"{"theme": "dark", "size": 3}"#).unwrap();
        let entries = read_settings_file(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn set_then_import_then_purge() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        cmd_migrate(&config).await.unwrap();
        cmd_set(&config, "u1", "theme", "dark").await.unwrap();

        let file = dir.path().join("bulk.json");
        std::fs::write(&file, r#"{"a": 1, "b": {"c": true}}"#).unwrap();
        cmd_import(&config, "u1", &file).await.unwrap();

        let store = SettingsStore::open(config.database_path.clone())
            .await
            .unwrap();
        let all = store.get_all("u1").await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all["theme"], SettingValue::from("dark"));
        assert_eq!(all["b"].as_json(), &json!({"c": true}));
        store.close().await.unwrap();

        cmd_purge(&config, "u1").await.unwrap();
        assert!(cmd_get(&config, "u1", "theme").await.is_err());
    }
}
