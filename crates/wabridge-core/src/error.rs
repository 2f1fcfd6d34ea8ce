// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Wabridge session manager.

use thiserror::Error;

/// The primary error type used across all Wabridge crates.
#[derive(Debug, Error)]
pub enum WabridgeError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Protocol engine errors (socket open failure, fetch failure, send failure).
    #[error("engine error: {message}")]
    Engine {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No session is registered under the given identifier.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session for the identifier already exists in a non-terminal state.
    #[error("session already connected: {0}")]
    AlreadyConnected(String),

    /// Transient connection failure; the supervisor backs off and retries.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation rejected because the session is paused. Callers treat this
    /// as a no-op rather than a user-facing failure.
    #[error("session is paused: {0}")]
    SessionPaused(String),

    /// One of the two credential tiers failed to persist a write. Never
    /// swallowed: the tiers risk permanent desync otherwise.
    #[error("credential write failed: {0}")]
    CredentialWriteFailed(String),

    /// Delivery retries for a message hit the configured ceiling.
    #[error("retry budget exhausted for message {0}")]
    RetryExhausted(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
