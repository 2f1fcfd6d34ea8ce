// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The two credential tier backends.
//!
//! [`MemoryTier`] is the default fast tier: an in-process concurrent map with
//! the latency profile of the hot read path. [`SqliteTier`] is the durable
//! tier, backed by the shared [`Database`]. Both sit behind the
//! [`CredentialTier`] trait so embedders can swap either side.

use async_trait::async_trait;
use dashmap::DashMap;
use wabridge_core::{CredentialTier, WabridgeError};

use crate::database::Database;
use crate::queries;

/// In-process fast tier.
#[derive(Default)]
pub struct MemoryTier {
    entries: DashMap<(String, String), serde_json::Value>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialTier for MemoryTier {
    async fn get(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, WabridgeError> {
        Ok(self
            .entries
            .get(&(session_id.to_string(), key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn put(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), WabridgeError> {
        self.entries
            .insert((session_id.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str, key: &str) -> Result<(), WabridgeError> {
        self.entries
            .remove(&(session_id.to_string(), key.to_string()));
        Ok(())
    }

    async fn entries(
        &self,
        session_id: &str,
    ) -> Result<Vec<(String, serde_json::Value)>, WabridgeError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == session_id)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect())
    }

    async fn purge(&self, session_id: &str) -> Result<(), WabridgeError> {
        self.entries.retain(|(session, _), _| session != session_id);
        Ok(())
    }
}

/// SQLite-backed durable tier.
#[derive(Clone)]
pub struct SqliteTier {
    db: Database,
}

impl SqliteTier {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialTier for SqliteTier {
    async fn get(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, WabridgeError> {
        let Some(text) = queries::credentials::get(&self.db, session_id, key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&text)
            .map_err(|e| WabridgeError::Storage { source: Box::new(e) })?;
        Ok(Some(value))
    }

    async fn put(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), WabridgeError> {
        queries::credentials::upsert(&self.db, session_id, key, &value.to_string()).await
    }

    async fn delete(&self, session_id: &str, key: &str) -> Result<(), WabridgeError> {
        queries::credentials::delete(&self.db, session_id, key).await
    }

    async fn entries(
        &self,
        session_id: &str,
    ) -> Result<Vec<(String, serde_json::Value)>, WabridgeError> {
        let rows = queries::credentials::entries(&self.db, session_id).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for (key, text) in rows {
            let value = serde_json::from_str(&text)
                .map_err(|e| WabridgeError::Storage { source: Box::new(e) })?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    async fn purge(&self, session_id: &str) -> Result<(), WabridgeError> {
        queries::credentials::purge(&self.db, session_id).await
    }
}
