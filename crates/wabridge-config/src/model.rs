// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Wabridge session manager.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Wabridge configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WabridgeConfig {
    /// Session lifecycle and reconnect settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message retry coordination settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Network health monitor settings.
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Flat delay before every reconnect attempt after a non-terminal close.
    ///
    /// Deliberately not exponential: the observed upstream behavior retries
    /// at a fixed cadence with no attempt cap, and only an explicit logout
    /// or pause stops the loop.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Settling delay between socket open and the pairing-code request, so
    /// an unregistered socket has finished its handshake first.
    #[serde(default = "default_pairing_request_delay_secs")]
    pub pairing_request_delay_secs: u64,

    /// How long `create` waits for a pairing code (or a live connection)
    /// before reporting the attempt as failed.
    #[serde(default = "default_pairing_wait_timeout_secs")]
    pub pairing_wait_timeout_secs: u64,

    /// Settling delay between entering the connected state and the one-time
    /// roster sync, to avoid racing the protocol engine's own initial sync.
    #[serde(default = "default_roster_sync_delay_secs")]
    pub roster_sync_delay_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            pairing_request_delay_secs: default_pairing_request_delay_secs(),
            pairing_wait_timeout_secs: default_pairing_wait_timeout_secs(),
            roster_sync_delay_secs: default_roster_sync_delay_secs(),
        }
    }
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_pairing_request_delay_secs() -> u64 {
    5
}

fn default_pairing_wait_timeout_secs() -> u64 {
    60
}

fn default_roster_sync_delay_secs() -> u64 {
    15
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file backing the durable tier.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("wabridge").join("wabridge.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("wabridge.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Message retry coordination configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Ceiling on delivery retries per message.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum number of remembered outbound messages per session.
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,

    /// Time-to-live for remembered outbound messages, in seconds.
    #[serde(default = "default_recent_ttl_secs")]
    pub recent_ttl_secs: u64,

    /// Sliding time-to-live for per-message retry counters, in seconds.
    #[serde(default = "default_counter_ttl_secs")]
    pub counter_ttl_secs: u64,

    /// Minimum interval between cryptographic session recreations for the
    /// same destination, in seconds.
    #[serde(default = "default_recreate_cooldown_secs")]
    pub recreate_cooldown_secs: u64,

    /// Debounce delay before an out-of-band recovery request fires, in
    /// milliseconds.
    #[serde(default = "default_recovery_delay_ms")]
    pub recovery_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            recent_capacity: default_recent_capacity(),
            recent_ttl_secs: default_recent_ttl_secs(),
            counter_ttl_secs: default_counter_ttl_secs(),
            recreate_cooldown_secs: default_recreate_cooldown_secs(),
            recovery_delay_ms: default_recovery_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_recent_capacity() -> usize {
    512
}

fn default_recent_ttl_secs() -> u64 {
    300
}

fn default_counter_ttl_secs() -> u64 {
    900
}

fn default_recreate_cooldown_secs() -> u64 {
    3600
}

fn default_recovery_delay_ms() -> u64 {
    3000
}

/// Network health monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// Whether the host-level reachability monitor runs at all.
    #[serde(default = "default_network_enabled")]
    pub enabled: bool,

    /// Interval between reachability probes, in seconds.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Consecutive probe failures before sessions are paused by network.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: default_network_enabled(),
            check_interval_secs: default_check_interval_secs(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_network_enabled() -> bool {
    true
}

fn default_check_interval_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_flat_reconnect_delay() {
        let config = WabridgeConfig::default();
        assert_eq!(config.session.reconnect_delay_secs, 10);
        assert_eq!(config.session.roster_sync_delay_secs, 15);
    }

    #[test]
    fn default_retry_limits_match_protocol_expectations() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.recent_capacity, 512);
        assert_eq!(retry.recent_ttl_secs, 300);
        assert_eq!(retry.recreate_cooldown_secs, 3600);
        assert_eq!(retry.recovery_delay_ms, 3000);
    }

    #[test]
    fn default_database_path_is_nonempty() {
        let storage = StorageConfig::default();
        assert!(!storage.database_path.is_empty());
        assert!(storage.wal_mode);
    }
}
