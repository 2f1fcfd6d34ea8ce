// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Wabridge workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a message, as assigned by the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a session.
///
/// Transitions are owned exclusively by the connection supervisor.
/// `Disconnected` is terminal: it is entered only on an explicit logout and
/// is never auto-reconnected. The two paused states are deliberately
/// distinct so that "operator stopped this session" and "the host lost
/// connectivity" never get conflated in persisted status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Connecting,
    Pairing,
    Connected,
    Disconnected,
    PausedByUser,
    PausedByNetwork,
}

impl SessionStatus {
    /// Terminal states require operator re-pairing and are never restored.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Disconnected)
    }

    pub fn is_paused(self) -> bool {
        matches!(
            self,
            SessionStatus::PausedByUser | SessionStatus::PausedByNetwork
        )
    }
}

/// Durable session row, one per registered identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Stable identifier of the registered identity (phone-number-shaped).
    pub id: String,
    pub status: SessionStatus,
    /// Push display name, updated live while connected.
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub is_business: bool,
    /// ISO 8601 timestamps.
    pub created_at: String,
    pub updated_at: String,
}

/// Authentication status of a session, as consumed by the dashboard layer.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub is_authenticated: bool,
    pub status: String,
    pub phone_number: String,
}
