use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use catalog::DEFAULT_MEALDB_URL;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const SETTINGS_FILE: &str = "bot.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bot_token: Option<String>,
    pub database_url: String,
    pub catalog_url: String,
    pub telegram_api_url: String,
    pub health_bind: String,
    pub catalog_timeout_seconds: u64,
    pub poll_timeout_seconds: u64,
    pub log_level: String,
    pub greetings: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: None,
            database_url: "sqlite://./data/recipes.db".into(),
            catalog_url: DEFAULT_MEALDB_URL.into(),
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.into(),
            health_bind: "127.0.0.1:8080".into(),
            catalog_timeout_seconds: 10,
            poll_timeout_seconds: 30,
            log_level: "info".into(),
            greetings: bot_core::DEFAULT_GREETINGS
                .iter()
                .map(|g| g.to_string())
                .collect(),
        }
    }
}

/// `bot.toml`; every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bot_token: Option<String>,
    database_url: Option<String>,
    catalog_url: Option<String>,
    telegram_api_url: Option<String>,
    health_bind: Option<String>,
    catalog_timeout_seconds: Option<u64>,
    poll_timeout_seconds: Option<u64>,
    log_level: Option<String>,
    greetings: Option<Vec<String>>,
}

impl Settings {
    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_seconds)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_seconds)
    }

    pub fn require_bot_token(&self) -> anyhow::Result<&str> {
        match self.bot_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => bail!(
                "no Telegram bot token configured; set BOT_TOKEN (or APP__BOT_TOKEN) \
                 or `bot_token` in {SETTINGS_FILE}"
            ),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        Url::parse(&self.catalog_url)
            .with_context(|| format!("invalid catalog_url '{}'", self.catalog_url))?;
        Url::parse(&self.telegram_api_url)
            .with_context(|| format!("invalid telegram_api_url '{}'", self.telegram_api_url))?;
        if self.catalog_timeout_seconds == 0 {
            bail!("catalog_timeout_seconds must be positive");
        }
        Ok(())
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.bot_token {
            self.bot_token = Some(v);
        }
        if let Some(v) = file.database_url {
            self.database_url = v;
        }
        if let Some(v) = file.catalog_url {
            self.catalog_url = v;
        }
        if let Some(v) = file.telegram_api_url {
            self.telegram_api_url = v;
        }
        if let Some(v) = file.health_bind {
            self.health_bind = v;
        }
        if let Some(v) = file.catalog_timeout_seconds {
            self.catalog_timeout_seconds = v;
        }
        if let Some(v) = file.poll_timeout_seconds {
            self.poll_timeout_seconds = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.greetings {
            self.greetings = v;
        }
    }

    /// Later keys win, so `APP__*` overrides the short names.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("BOT_TOKEN") {
            self.bot_token = Some(v);
        }
        if let Some(v) = var("APP__BOT_TOKEN") {
            self.bot_token = Some(v);
        }

        if let Some(v) = var("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = var("APP__DATABASE_URL") {
            self.database_url = v;
        }

        if let Some(v) = var("CATALOG_URL") {
            self.catalog_url = v;
        }
        if let Some(v) = var("TELEGRAM_API_URL") {
            self.telegram_api_url = v;
        }

        if let Some(v) = var("HEALTH_BIND") {
            self.health_bind = v;
        }
        if let Some(v) = var("APP__HEALTH_BIND") {
            self.health_bind = v;
        }

        if let Some(parsed) = var("APP__CATALOG_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            self.catalog_timeout_seconds = parsed;
        }
        if let Some(parsed) = var("APP__POLL_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            self.poll_timeout_seconds = parsed;
        }

        if let Some(v) = var("LOG_LEVEL") {
            self.log_level = v;
        }

        if let Some(v) = var("APP__GREETINGS") {
            self.greetings = v
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

fn load_settings_from(
    path: &Path,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        let file: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        settings.apply_file(file);
    }
    settings.apply_env(var);
    settings.validate()?;
    Ok(settings)
}

/// Plain paths become `sqlite://` URLs; the store creates missing parent
/// directories when it opens the file.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
