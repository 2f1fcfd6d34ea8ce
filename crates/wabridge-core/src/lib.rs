// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Wabridge session manager.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Wabridge workspace. The external protocol
//! engine, the credential tiers, and the command layer are all consumed
//! through traits defined here.

pub mod error;
pub mod identity;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::WabridgeError;
pub use types::{AuthStatus, MessageId, SessionRecord, SessionStatus};

pub use traits::{
    CloseCause, CommandRegistry, ConnectionState, CredentialTier, EngineConnection, EngineEvent,
    EngineMessage, EngineSessionSpec, EngineSocket, EngineUser, KeyWrite, ParticipantAction,
    ProtocolEngine, ReceiptStatus,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wabridge_error_has_all_variants() {
        let _config = WabridgeError::Config("test".into());
        let _storage = WabridgeError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _engine = WabridgeError::Engine {
            message: "test".into(),
            source: None,
        };
        let _not_found = WabridgeError::SessionNotFound("15551230000".into());
        let _already = WabridgeError::AlreadyConnected("15551230000".into());
        let _failed = WabridgeError::ConnectionFailed("socket refused".into());
        let _paused = WabridgeError::SessionPaused("15551230000".into());
        let _cred = WabridgeError::CredentialWriteFailed("durable tier down".into());
        let _exhausted = WabridgeError::RetryExhausted("msg-1".into());
        let _internal = WabridgeError::Internal("test".into());
    }

    #[test]
    fn close_cause_terminality() {
        assert!(CloseCause::LoggedOut.is_terminal());
        assert!(!CloseCause::ConnectionLost.is_terminal());
        assert!(!CloseCause::RestartRequired.is_terminal());
        assert!(!CloseCause::Unknown.is_terminal());
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_engine<T: ProtocolEngine>() {}
        fn _assert_socket<T: EngineSocket>() {}
        fn _assert_tier<T: CredentialTier>() {}
        fn _assert_commands<T: CommandRegistry>() {}
    }
}
