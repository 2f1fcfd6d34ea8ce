// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Wabridge configuration system.

use wabridge_config::load_config_from_str;
use wabridge_config::model::WabridgeConfig;

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_wabridge_config() {
    let toml = r#"
[session]
reconnect_delay_secs = 20
pairing_request_delay_secs = 2
pairing_wait_timeout_secs = 30
roster_sync_delay_secs = 5

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[retry]
max_retries = 3
recent_capacity = 64
recent_ttl_secs = 120
counter_ttl_secs = 600
recreate_cooldown_secs = 1800
recovery_delay_ms = 1500

[network]
enabled = false
check_interval_secs = 10
failure_threshold = 5
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.session.reconnect_delay_secs, 20);
    assert_eq!(config.session.pairing_request_delay_secs, 2);
    assert_eq!(config.session.pairing_wait_timeout_secs, 30);
    assert_eq!(config.session.roster_sync_delay_secs, 5);
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.retry.recent_capacity, 64);
    assert_eq!(config.retry.recent_ttl_secs, 120);
    assert_eq!(config.retry.counter_ttl_secs, 600);
    assert_eq!(config.retry.recreate_cooldown_secs, 1800);
    assert_eq!(config.retry.recovery_delay_ms, 1500);
    assert!(!config.network.enabled);
    assert_eq!(config.network.check_interval_secs, 10);
    assert_eq!(config.network.failure_threshold, 5);
}

/// Unknown field in [session] section is rejected at load time.
#[test]
fn unknown_field_in_session_produces_error() {
    let toml = r#"
[session]
reconect_delay_secs = 10
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    // Figment wraps serde's deny_unknown_fields error
    assert!(
        err_str.contains("unknown field") || err_str.contains("reconect_delay_secs"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unknown field in [retry] section is rejected at load time.
#[test]
fn unknown_field_in_retry_produces_error() {
    let toml = r#"
[retry]
max_retrys = 9
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("max_retrys"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let toml = "";
    let config = load_config_from_str(toml).expect("empty TOML should use defaults");

    assert_eq!(config.session.reconnect_delay_secs, 10);
    assert_eq!(config.session.pairing_request_delay_secs, 5);
    assert_eq!(config.session.roster_sync_delay_secs, 15);
    assert!(!config.storage.database_path.is_empty());
    assert!(config.storage.wal_mode);
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.recent_capacity, 512);
    assert_eq!(config.retry.recent_ttl_secs, 300);
    assert_eq!(config.retry.counter_ttl_secs, 900);
    assert_eq!(config.retry.recreate_cooldown_secs, 3600);
    assert_eq!(config.retry.recovery_delay_ms, 3000);
    assert!(config.network.enabled);
    assert_eq!(config.network.check_interval_secs, 30);
    assert_eq!(config.network.failure_threshold, 3);
}

/// A partial [session] section keeps defaults for the absent keys.
#[test]
fn partial_section_keeps_defaults_for_absent_keys() {
    let toml = r#"
[session]
reconnect_delay_secs = 3
"#;

    let config = load_config_from_str(toml).expect("partial section should deserialize");
    assert_eq!(config.session.reconnect_delay_secs, 3);
    assert_eq!(config.session.pairing_request_delay_secs, 5);
    assert_eq!(config.session.roster_sync_delay_secs, 15);
}

/// Later merge layers override earlier ones, field by field.
#[test]
fn merge_layers_override_field_by_field() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[retry]
max_retries = 2
"#;

    let config: WabridgeConfig = Figment::new()
        .merge(Serialized::defaults(WabridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("retry.max_retries", 7u32))
        .extract()
        .expect("layered figment should extract");

    assert_eq!(config.retry.max_retries, 7);
    // Sibling fields are untouched by the override.
    assert_eq!(config.retry.recent_capacity, 512);
}

/// The full default config round-trips through TOML serialization.
#[test]
fn default_config_round_trips_through_toml() {
    let config = WabridgeConfig::default();
    let rendered = toml::to_string(&config).expect("defaults should serialize");
    let reloaded = load_config_from_str(&rendered).expect("rendered TOML should reload");

    assert_eq!(
        reloaded.session.reconnect_delay_secs,
        config.session.reconnect_delay_secs
    );
    assert_eq!(reloaded.storage.database_path, config.storage.database_path);
    assert_eq!(reloaded.retry.max_retries, config.retry.max_retries);
    assert_eq!(
        reloaded.network.failure_threshold,
        config.network.failure_threshold
    );
}
