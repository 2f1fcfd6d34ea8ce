// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembled persistence surface handed to the session registry.
//!
//! One [`Storage`] owns the durable SQLite database plus the wired-together
//! credential store, contact directory, group cache, and message archive.
//! The default wiring pairs an in-process [`MemoryTier`] fast tier with the
//! SQLite durable tier; embedders with a persistent fast tier plug it in via
//! [`Storage::open_with_fast_tier`].

use std::sync::Arc;

use wabridge_config::StorageConfig;
use wabridge_core::{CredentialTier, SessionRecord, SessionStatus, WabridgeError};

use crate::contacts::ContactDirectory;
use crate::credentials::CredentialStore;
use crate::database::{now_iso, Database};
use crate::groups::GroupCache;
use crate::messages::MessageArchive;
use crate::queries;
use crate::tiers::{MemoryTier, SqliteTier};

/// All persistence for the session manager, cheap to clone.
#[derive(Clone)]
pub struct Storage {
    db: Database,
    credentials: CredentialStore,
    contacts: ContactDirectory,
    groups: GroupCache,
    messages: MessageArchive,
}

impl Storage {
    /// Opens the durable tier and assembles the default wiring.
    pub async fn open(config: &StorageConfig) -> Result<Self, WabridgeError> {
        let db = Database::open(config).await?;
        Ok(Self::assemble(db, Arc::new(MemoryTier::new())))
    }

    /// Opens the durable tier with a caller-supplied fast tier.
    pub async fn open_with_fast_tier(
        config: &StorageConfig,
        fast: Arc<dyn CredentialTier>,
    ) -> Result<Self, WabridgeError> {
        let db = Database::open(config).await?;
        Ok(Self::assemble(db, fast))
    }

    fn assemble(db: Database, fast: Arc<dyn CredentialTier>) -> Self {
        let durable: Arc<dyn CredentialTier> = Arc::new(SqliteTier::new(db.clone()));
        let contacts = ContactDirectory::new(db.clone());
        let credentials = CredentialStore::new(fast, durable, db.clone(), contacts.clone());
        let groups = GroupCache::new(db.clone(), contacts.clone());
        let messages = MessageArchive::new(db.clone());
        Self {
            db,
            credentials,
            contacts,
            groups,
            messages,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn contacts(&self) -> &ContactDirectory {
        &self.contacts
    }

    pub fn groups(&self) -> &GroupCache {
        &self.groups
    }

    pub fn messages(&self) -> &MessageArchive {
        &self.messages
    }

    // --- Session rows ---

    /// Creates the durable row for a new session.
    pub async fn insert_session(&self, id: &str) -> Result<SessionRecord, WabridgeError> {
        let now = now_iso();
        let record = SessionRecord {
            id: id.to_string(),
            status: SessionStatus::Connecting,
            display_name: None,
            profile_url: None,
            is_business: false,
            created_at: now.clone(),
            updated_at: now,
        };
        queries::sessions::upsert(&self.db, &record).await?;
        Ok(record)
    }

    pub async fn session(&self, id: &str) -> Result<Option<SessionRecord>, WabridgeError> {
        queries::sessions::get(&self.db, id).await
    }

    pub async fn sessions(&self) -> Result<Vec<SessionRecord>, WabridgeError> {
        queries::sessions::list(&self.db).await
    }

    pub async fn set_session_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<(), WabridgeError> {
        queries::sessions::set_status(&self.db, id, status).await
    }

    pub async fn update_session_profile(
        &self,
        id: &str,
        display_name: Option<String>,
        profile_url: Option<String>,
        is_business: bool,
    ) -> Result<(), WabridgeError> {
        queries::sessions::update_profile(&self.db, id, display_name, profile_url, is_business)
            .await
    }

    /// Removes the session row and every row derived from the session:
    /// credentials in both tiers, contact mappings, group snapshots, and
    /// archived messages.
    pub async fn purge_session(&self, id: &str) -> Result<(), WabridgeError> {
        self.credentials.purge(id).await?;
        self.contacts.purge(id).await?;
        self.groups.purge(id).await?;
        self.messages.purge(id).await?;
        queries::sessions::delete(&self.db, id).await
    }

    /// Checkpoints the WAL before shutdown.
    pub async fn close(&self) -> Result<(), WabridgeError> {
        self.db.close().await
    }
}
