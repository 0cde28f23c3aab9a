use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/crm.db";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub total_fees: i64,
    /// Empty means a random per-process secret; sessions then die with the process.
    #[serde(default)]
    pub session_secret: String,
    pub session_ttl_seconds: i64,
    pub require_session: bool,
    #[serde(default)]
    pub static_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            database_url: DEFAULT_DATABASE_URL.into(),
            total_fees: 100_000,
            session_secret: String::new(),
            session_ttl_seconds: 12 * 60 * 60,
            require_session: true,
            static_dir: Some("build".into()),
        }
    }
}

/// Defaults, then `server.toml` if present, then `APP__*` variables, then the
/// legacy bare variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new("server"))
}

pub fn load_settings_from(file_stem: &Path) -> anyhow::Result<Settings> {
    let defaults = Settings::default();
    let mut builder = Config::builder()
        .set_default("bind_addr", defaults.bind_addr)?
        .set_default("database_url", defaults.database_url)?
        .set_default("total_fees", defaults.total_fees)?
        .set_default("session_secret", defaults.session_secret)?
        .set_default("session_ttl_seconds", defaults.session_ttl_seconds)?
        .set_default("require_session", defaults.require_session)?
        .set_default("static_dir", defaults.static_dir)?
        .add_source(File::from(file_stem).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .try_parsing(true),
        );

    if let Ok(port) = std::env::var("PORT") {
        builder = builder.set_override("bind_addr", format!("0.0.0.0:{}", port.trim()))?;
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        builder = builder.set_override("database_url", url)?;
    }
    if let Ok(secret) = std::env::var("SESSION_SECRET") {
        builder = builder.set_override("session_secret", secret)?;
    }

    let settings: Settings = builder
        .build()
        .context("failed to assemble configuration")?
        .try_deserialize()
        .context("invalid configuration")?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    fn validate(&self) -> anyhow::Result<()> {
        if self.total_fees <= 0 {
            anyhow::bail!("total_fees must be positive, got {}", self.total_fees);
        }
        if self.session_ttl_seconds <= 0 {
            anyhow::bail!("session_ttl_seconds must be positive");
        }
        Ok(())
    }

    pub fn static_root(&self) -> Option<PathBuf> {
        self.static_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }
    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        let path = path.replace('\\', "/");
        if is_windows_drive_path(&path) {
            return format!("sqlite:{path}");
        }
        return format!("sqlite://{path}");
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        if is_windows_drive_path(&path) {
            return format!("sqlite:{path}");
        }
        return format!("sqlite://{path}");
    }

    let path = raw_database_url.replace('\\', "/");
    if is_windows_drive_path(&path) {
        return format!("sqlite:{path}");
    }
    format!("sqlite://{path}")
}

fn is_windows_drive_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
