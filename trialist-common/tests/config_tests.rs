//! Unit tests for configuration loading and resolution
//!
//! Tests the implementation of:
//! - Config file priority (CLI path → TRIALIST_CONFIG → default locations)
//! - Required `database_url` with CLI → ENV → TOML priority
//! - Compiled defaults for optional settings
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate TRIALIST_CONFIG or TRIALIST_DATABASE_URL are marked
//! with #[serial] so they run sequentially.

use serial_test::serial;
use std::env;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use trialist_common::config::{
    ConfigResolver, ConfigSource, ServiceSettings, TomlConfig, CONFIG_ENV_VAR, DATABASE_URL_ENV_VAR,
    DEFAULT_ANALYSIS_URL, DEFAULT_CAMPAIGN_ID,
};
use trialist_common::Error;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_toml_config_full_parse() {
    let file = write_config(
        r#"
        database_url = "sqlite:///var/lib/trialist/ohmage.db"
        analysis_url = "https://example.org/ocpu/wrap/json"
        request_timeout_secs = 15
        default_campaign_id = "urn:campaign:trialist:mock"

        [logging]
        level = "debug"
        "#,
    );

    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(
        config.database_url.as_deref(),
        Some("sqlite:///var/lib/trialist/ohmage.db")
    );
    assert_eq!(config.request_timeout_secs, Some(15));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_toml_config_empty_file_uses_defaults() {
    let file = write_config("");
    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_toml_config_invalid_syntax_is_config_error() {
    let file = write_config("database_url = [unterminated");
    let result = TomlConfig::load(file.path());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_resolver_cli_path_takes_precedence_over_env() {
    let cli_file = write_config("default_campaign_id = \"from-cli\"");
    let env_file = write_config("default_campaign_id = \"from-env\"");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let loaded = ConfigResolver::new(Some(cli_file.path().to_path_buf()))
        .load()
        .unwrap();
    assert_eq!(loaded.config.default_campaign_id.as_deref(), Some("from-cli"));
    assert_eq!(loaded.source, ConfigSource::File(cli_file.path().to_path_buf()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_env_path_used_without_cli() {
    let env_file = write_config("default_campaign_id = \"from-env\"");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let loaded = ConfigResolver::new(None).load().unwrap();
    assert_eq!(loaded.config.default_campaign_id.as_deref(), Some("from-env"));
    assert_eq!(loaded.source, ConfigSource::File(env_file.path().to_path_buf()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_missing_explicit_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let resolver = ConfigResolver::new(Some("/nonexistent/trialist/config.toml".into()));

    match resolver.load() {
        Err(Error::Config(msg)) => assert!(msg.contains("not found")),
        other => panic!("Expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_settings_require_database_url() {
    env::remove_var(DATABASE_URL_ENV_VAR);

    let result = ServiceSettings::resolve(None, &TomlConfig::default());
    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("database_url")),
        other => panic!("Expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_settings_database_url_priority() {
    let toml_config = TomlConfig {
        database_url: Some("sqlite://toml.db".to_string()),
        ..Default::default()
    };

    env::remove_var(DATABASE_URL_ENV_VAR);
    let settings = ServiceSettings::resolve(None, &toml_config).unwrap();
    assert_eq!(settings.database_url, "sqlite://toml.db");

    env::set_var(DATABASE_URL_ENV_VAR, "sqlite://env.db");
    let settings = ServiceSettings::resolve(None, &toml_config).unwrap();
    assert_eq!(settings.database_url, "sqlite://env.db");

    let settings = ServiceSettings::resolve(Some("sqlite://cli.db"), &toml_config).unwrap();
    assert_eq!(settings.database_url, "sqlite://cli.db");

    env::remove_var(DATABASE_URL_ENV_VAR);
}

#[test]
#[serial]
fn test_settings_compiled_defaults() {
    env::remove_var(DATABASE_URL_ENV_VAR);
    let toml_config = TomlConfig {
        database_url: Some("sqlite::memory:".to_string()),
        ..Default::default()
    };

    let settings = ServiceSettings::resolve(None, &toml_config).unwrap();
    assert_eq!(settings.analysis_url, DEFAULT_ANALYSIS_URL);
    assert_eq!(settings.default_campaign_id, DEFAULT_CAMPAIGN_ID);
    assert_eq!(settings.request_timeout, Duration::from_secs(60));
    assert_eq!(settings.log_level, "info");
}

#[test]
fn test_error_messages_name_their_category() {
    assert_eq!(
        Error::Config("database_url is not configured".to_string()).to_string(),
        "Configuration error: database_url is not configured"
    );
    assert_eq!(
        Error::DataIntegrity("survey_response row 3".to_string()).to_string(),
        "Data integrity error: survey_response row 3"
    );
}

#[test]
#[serial]
fn test_settings_reject_non_http_analysis_url() {
    env::remove_var(DATABASE_URL_ENV_VAR);
    let toml_config = TomlConfig {
        database_url: Some("sqlite::memory:".to_string()),
        analysis_url: Some("ftp://example.org/wrap".to_string()),
        ..Default::default()
    };

    assert!(matches!(
        ServiceSettings::resolve(None, &toml_config),
        Err(Error::Config(_))
    ));
}

#[test]
#[serial]
fn test_settings_reject_zero_timeout() {
    env::remove_var(DATABASE_URL_ENV_VAR);
    let toml_config = TomlConfig {
        database_url: Some("sqlite::memory:".to_string()),
        request_timeout_secs: Some(0),
        ..Default::default()
    };

    assert!(matches!(
        ServiceSettings::resolve(None, &toml_config),
        Err(Error::Config(_))
    ));
}
