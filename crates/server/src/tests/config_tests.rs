use super::*;

use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

fn missing_file() -> std::path::PathBuf {
    std::env::temp_dir().join("recipe_bot_no_such_settings.toml")
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite:recipes.db"),
        "sqlite://recipes.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url("  "),
        Settings::default().database_url
    );
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_from(&missing_file(), env(&[])).expect("settings");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.catalog_url, "https://www.themealdb.com/api/json/v1/1");
    assert!(settings.require_bot_token().is_err());
}

#[test]
fn app_prefixed_env_overrides_short_names() {
    let settings = load_settings_from(
        &missing_file(),
        env(&[
            ("BOT_TOKEN", "short"),
            ("APP__BOT_TOKEN", "prefixed"),
            ("DATABASE_URL", "sqlite://a.db"),
            ("APP__DATABASE_URL", "sqlite://b.db"),
            ("APP__CATALOG_TIMEOUT_SECONDS", "3"),
            ("APP__POLL_TIMEOUT_SECONDS", "not-a-number"),
            ("APP__GREETINGS", "hey, hola ,,"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.require_bot_token().expect("token"), "prefixed");
    assert_eq!(settings.database_url, "sqlite://b.db");
    assert_eq!(settings.catalog_timeout(), Duration::from_secs(3));
    assert_eq!(settings.poll_timeout_seconds, 30);
    assert_eq!(settings.greetings, vec!["hey", "hola"]);
}

#[test]
fn file_values_sit_between_defaults_and_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bot.toml");
    fs::write(
        &path,
        r#"
bot_token = "from-file"
health_bind = "0.0.0.0:9000"
greetings = ["salut"]
"#,
    )
    .expect("write");

    let settings =
        load_settings_from(&path, env(&[("HEALTH_BIND", "127.0.0.1:9100")])).expect("settings");
    assert_eq!(settings.bot_token.as_deref(), Some("from-file"));
    assert_eq!(settings.health_bind, "127.0.0.1:9100");
    assert_eq!(settings.greetings, vec!["salut"]);
}

#[test]
fn blank_token_is_rejected_with_hint() {
    let settings = Settings {
        bot_token: Some("   ".into()),
        ..Settings::default()
    };
    let err = settings.require_bot_token().expect_err("blank token");
    assert!(err.to_string().contains("BOT_TOKEN"));
}

#[test]
fn invalid_urls_fail_validation() {
    let result = load_settings_from(&missing_file(), env(&[("CATALOG_URL", "not a url")]));
    assert!(result.is_err());

    let settings = Settings {
        catalog_timeout_seconds: 0,
        ..Settings::default()
    };
    assert!(settings.validate().is_err());
}

#[test]
fn malformed_settings_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bot.toml");
    fs::write(&path, "catalog_timeout_seconds = \"soon\"").expect("write");

    assert!(load_settings_from(&path, env(&[])).is_err());
}
