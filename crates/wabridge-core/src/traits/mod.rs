// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Wabridge owns session lifecycle, persistence, and retry coordination; the
//! wire protocol, the credential tier backends, and the command layer are
//! collaborators consumed through the traits in this module.

pub mod command;
pub mod engine;
pub mod store;

pub use command::CommandRegistry;
pub use engine::{
    CloseCause, ConnectionState, EngineConnection, EngineEvent, EngineMessage, EngineSessionSpec,
    EngineSocket, EngineUser, KeyWrite, ParticipantAction, ProtocolEngine, ReceiptStatus,
};
pub use store::CredentialTier;
