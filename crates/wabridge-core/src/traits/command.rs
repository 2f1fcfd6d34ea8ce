// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command layer boundary.
//!
//! Plugin and command execution live outside the core. When a registry is
//! wired in, the connection supervisor hands it every inbound message; the
//! core never depends on a concrete implementation.

use async_trait::async_trait;

use crate::error::WabridgeError;
use crate::traits::engine::EngineMessage;

/// Dispatch surface for inbound messages.
#[async_trait]
pub trait CommandRegistry: Send + Sync + 'static {
    /// Handles one inbound message for a session. Failures are logged by the
    /// caller and never interrupt event processing.
    async fn dispatch(
        &self,
        session_id: &str,
        message: &EngineMessage,
    ) -> Result<(), WabridgeError>;
}
