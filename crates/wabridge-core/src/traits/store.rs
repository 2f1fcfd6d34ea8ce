// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential tier backend trait.
//!
//! Credentials are persisted through two tiers behind one store: a fast tier
//! read on the hot path and a durable tier that survives process restart.
//! Both tiers implement this trait; the store decides which writes are
//! mirrored where.

use async_trait::async_trait;

use crate::error::WabridgeError;

/// One pluggable credential persistence backend.
///
/// Keys are opaque strings of the form `"{category}-{id}"` plus the primary
/// `"creds"` entry. Values are opaque JSON blobs owned by the protocol
/// engine.
#[async_trait]
pub trait CredentialTier: Send + Sync + 'static {
    async fn get(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, WabridgeError>;

    async fn put(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), WabridgeError>;

    async fn delete(&self, session_id: &str, key: &str) -> Result<(), WabridgeError>;

    /// Every entry currently held for the session. Used by the checkpoint
    /// pass that flushes the fast tier into the durable tier.
    async fn entries(
        &self,
        session_id: &str,
    ) -> Result<Vec<(String, serde_json::Value)>, WabridgeError>;

    /// Removes every entry for the session.
    async fn purge(&self, session_id: &str) -> Result<(), WabridgeError>;
}
