// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./wabridge.toml` > `~/.config/wabridge/wabridge.toml` > `/etc/wabridge/wabridge.toml`
//! with environment variable overrides via `WABRIDGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::WabridgeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wabridge/wabridge.toml` (system-wide)
/// 3. `~/.config/wabridge/wabridge.toml` (user XDG config)
/// 4. `./wabridge.toml` (local directory)
/// 5. `WABRIDGE_*` environment variables
pub fn load_config() -> Result<WabridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WabridgeConfig::default()))
        .merge(Toml::file("/etc/wabridge/wabridge.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("wabridge/wabridge.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("wabridge.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<WabridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WabridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WabridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WabridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `WABRIDGE_SESSION_RECONNECT_DELAY_SECS`
/// must map to `session.reconnect_delay_secs`, not `session.reconnect.delay.secs`.
fn env_provider() -> Env {
    Env::prefixed("WABRIDGE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: WABRIDGE_SESSION_RECONNECT_DELAY_SECS -> "session_reconnect_delay_secs"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("session_", "session.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("retry_", "retry.", 1)
            .replacen("network_", "network.", 1);
        mapped.into()
    })
}
