// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Wabridge session manager.
//!
//! TOML files merged over compiled defaults, with `WABRIDGE_*` environment
//! variable overrides. Unknown keys are rejected at load time.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{NetworkConfig, RetryConfig, SessionConfig, StorageConfig, WabridgeConfig};
