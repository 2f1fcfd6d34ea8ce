// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits for the external protocol engine.
//!
//! The engine owns the wire protocol (framing, encryption, the pairing
//! handshake). Wabridge consumes it through [`ProtocolEngine::open`], which
//! yields a per-session socket handle plus an ordered event stream. Events
//! for one session must be processed strictly in arrival order.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::WabridgeError;
use crate::types::MessageId;

/// Why the engine closed a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    /// Explicit logout. Terminal: the session requires re-pairing.
    LoggedOut,
    /// The engine asked for a clean restart of the socket.
    RestartRequired,
    /// The transport dropped.
    ConnectionLost,
    /// The connection was taken over by another client.
    ConnectionReplaced,
    /// Anything the engine could not classify.
    Unknown,
}

impl CloseCause {
    /// Terminal causes stop the reconnect loop; everything else is retried
    /// after a fixed backoff.
    pub fn is_terminal(self) -> bool {
        matches!(self, CloseCause::LoggedOut)
    }
}

/// Connection lifecycle notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Delivery receipt classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// The peer acknowledged delivery.
    Delivered,
    /// The peer could not decrypt and asked for a retransmission.
    Retry,
}

/// Membership change kinds for `GroupParticipantsUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

/// One keyed write to the signal-protocol key store.
///
/// `value: None` is a deletion. The key seen by the store is
/// `"{category}-{id}"`; identity-mapping categories embed a direction
/// marker in `id`.
#[derive(Debug, Clone)]
pub struct KeyWrite {
    pub category: String,
    pub id: String,
    pub value: Option<serde_json::Value>,
}

/// A message surfaced by the engine's upsert stream.
///
/// Serialized verbatim into the message archive so retransmission lookups
/// can recover the original payload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: Option<String>,
    pub from_me: bool,
    /// Opaque message payload; persisted verbatim for retransmission lookups.
    pub content: serde_json::Value,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

/// Events emitted by the engine for one session, in arrival order.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    ConnectionUpdate {
        connection: Option<ConnectionState>,
        close: Option<CloseCause>,
    },
    /// The primary credentials blob changed and must be checkpointed.
    CredentialsUpdate(serde_json::Value),
    /// Keyed signal material writes and deletions.
    KeysUpdate(Vec<KeyWrite>),
    MessageUpsert(Vec<EngineMessage>),
    MessageReceipt {
        message_id: String,
        destination: String,
        status: ReceiptStatus,
    },
    /// Full metadata snapshots for newly joined groups.
    GroupsUpsert(Vec<serde_json::Value>),
    /// Partial metadata updates; fields absent from the payload are unchanged.
    GroupsUpdate(Vec<serde_json::Value>),
    GroupParticipantsUpdate {
        group_id: String,
        participants: Vec<String>,
        action: ParticipantAction,
    },
}

/// The identity the engine authenticated as.
#[derive(Debug, Clone)]
pub struct EngineUser {
    pub stable_id: String,
    pub alternate_id: Option<String>,
    pub display_name: Option<String>,
}

/// Everything the supervisor needs to open one session socket.
#[derive(Debug, Clone)]
pub struct EngineSessionSpec {
    pub session_id: String,
    /// The primary credentials blob loaded from the store (freshly
    /// initialized on first run).
    pub credentials: serde_json::Value,
}

/// A live socket plus its ordered event stream.
pub struct EngineConnection {
    pub socket: Arc<dyn EngineSocket>,
    pub events: mpsc::Receiver<EngineEvent>,
}

/// The external protocol engine. One `open` call per connection attempt.
#[async_trait]
pub trait ProtocolEngine: Send + Sync + 'static {
    async fn open(&self, spec: EngineSessionSpec) -> Result<EngineConnection, WabridgeError>;
}

/// Per-connection operations exposed by the engine.
#[async_trait]
pub trait EngineSocket: Send + Sync + 'static {
    /// Whether the loaded credentials are registered with the engine.
    /// `false` means the session must go through pairing first.
    fn is_registered(&self) -> bool;

    /// The authenticated identity, available once registered.
    fn user(&self) -> Option<EngineUser>;

    /// Requests a pairing code for the identifier. The engine returns a
    /// fixed-length digit string.
    async fn request_pairing_code(&self, identifier: &str) -> Result<String, WabridgeError>;

    async fn send_message(
        &self,
        to: &str,
        content: serde_json::Value,
    ) -> Result<MessageId, WabridgeError>;

    async fn fetch_all_participating_groups(
        &self,
    ) -> Result<Vec<serde_json::Value>, WabridgeError>;

    async fn fetch_group_metadata(&self, group_id: &str)
        -> Result<serde_json::Value, WabridgeError>;

    async fn business_profile_exists(&self, id: &str) -> Result<bool, WabridgeError>;

    async fn profile_picture_url(&self, id: &str) -> Result<Option<String>, WabridgeError>;

    /// Whether a cryptographic session exists for the destination.
    async fn has_crypto_session(&self, destination: &str) -> Result<bool, WabridgeError>;

    /// Discards and renegotiates the cryptographic session for the
    /// destination.
    async fn recreate_crypto_session(&self, destination: &str) -> Result<(), WabridgeError>;

    /// Asks the peer's primary device to resend a message out of band.
    async fn request_message_recovery(
        &self,
        destination: &str,
        message_id: &str,
    ) -> Result<(), WabridgeError>;

    /// Explicit logout. Terminal for the session.
    async fn logout(&self) -> Result<(), WabridgeError>;

    /// Closes the transport without logging out.
    async fn close(&self);
}
