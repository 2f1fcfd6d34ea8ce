// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-tier credential store.
//!
//! The fast tier is read on the hot path and receives every write; entries in
//! the `app-state-sync-key` category are additionally mirrored to the durable
//! tier synchronously, because that category must survive restart with
//! minimal staleness. Ordinary key material becomes durable at the next full
//! creds checkpoint ([`CredentialStore::write_creds`]).
//!
//! All operations for one session are serialized behind a per-session lock:
//! callers use read-then-conditionally-insert patterns that would otherwise
//! lose updates.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use wabridge_core::{CredentialTier, SessionStatus, WabridgeError};

use crate::contacts::ContactDirectory;
use crate::database::Database;
use crate::queries;

/// Key of the primary credentials blob.
pub const CREDS_KEY: &str = "creds";

/// Category mirrored synchronously to the durable tier on every write.
pub const CHECKPOINT_CATEGORY: &str = "app-state-sync-key";

/// Category whose writes reveal identity mappings.
const LID_MAPPING_CATEGORY: &str = "lid-mapping";

/// Two-tier credential persistence for all sessions.
#[derive(Clone)]
pub struct CredentialStore {
    fast: Arc<dyn CredentialTier>,
    durable: Arc<dyn CredentialTier>,
    db: Database,
    contacts: ContactDirectory,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl CredentialStore {
    pub fn new(
        fast: Arc<dyn CredentialTier>,
        durable: Arc<dyn CredentialTier>,
        db: Database,
        contacts: ContactDirectory,
    ) -> Self {
        Self {
            fast,
            durable,
            db,
            contacts,
            locks: Arc::new(DashMap::new()),
        }
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Writes one keyed credential entry.
    ///
    /// Identity-mapping categories are decoded into the contact directory
    /// first; decode failures are logged and never block the write.
    pub async fn write(
        &self,
        session_id: &str,
        category: &str,
        id: &str,
        value: &serde_json::Value,
    ) -> Result<(), WabridgeError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        if category == LID_MAPPING_CATEGORY {
            if let Err(e) = self
                .contacts
                .record_mapping_write(session_id, id, value)
                .await
            {
                warn!(session_id, key_id = id, error = %e, "failed to record identity mapping");
            }
        }

        let key = format!("{category}-{id}");
        self.fast
            .put(session_id, &key, value)
            .await
            .map_err(|e| WabridgeError::CredentialWriteFailed(format!("fast tier: {e}")))?;

        if category == CHECKPOINT_CATEGORY {
            self.durable
                .put(session_id, &key, value)
                .await
                .map_err(|e| WabridgeError::CredentialWriteFailed(format!("durable tier: {e}")))?;
        }
        Ok(())
    }

    /// Reads one keyed credential entry from the fast tier.
    ///
    /// There is no durable-tier fallback: a missing fast-tier entry reads as
    /// absent.
    pub async fn read(
        &self,
        session_id: &str,
        category: &str,
        id: &str,
    ) -> Result<Option<serde_json::Value>, WabridgeError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        let key = format!("{category}-{id}");
        self.fast.get(session_id, &key).await
    }

    /// Removes one keyed credential entry from the fast tier.
    ///
    /// Durable-tier rows are superseded by later writes, not proactively
    /// deleted.
    pub async fn remove(
        &self,
        session_id: &str,
        category: &str,
        id: &str,
    ) -> Result<(), WabridgeError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        let key = format!("{category}-{id}");
        self.fast.delete(session_id, &key).await
    }

    /// Loads the primary credentials blob, initializing fresh credentials on
    /// first run.
    pub async fn load_creds(&self, session_id: &str) -> Result<serde_json::Value, WabridgeError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        match self.fast.get(session_id, CREDS_KEY).await? {
            Some(creds) => Ok(creds),
            None => {
                debug!(session_id, "no stored credentials, initializing fresh");
                Ok(fresh_credentials())
            }
        }
    }

    /// Checkpoints the primary credentials blob.
    ///
    /// Writes the blob to both tiers, flushes every not-yet-mirrored
    /// fast-tier entry into the durable tier, and flips the durable session
    /// row to connected. Any tier failure is reported as
    /// [`WabridgeError::CredentialWriteFailed`]; partial success is never
    /// swallowed.
    pub async fn write_creds(
        &self,
        session_id: &str,
        creds: &serde_json::Value,
    ) -> Result<(), WabridgeError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        self.fast
            .put(session_id, CREDS_KEY, creds)
            .await
            .map_err(|e| WabridgeError::CredentialWriteFailed(format!("fast tier: {e}")))?;
        self.durable
            .put(session_id, CREDS_KEY, creds)
            .await
            .map_err(|e| WabridgeError::CredentialWriteFailed(format!("durable tier: {e}")))?;

        // Full checkpoint: ordinary key material becomes durable here.
        for (key, value) in self.fast.entries(session_id).await? {
            if key == CREDS_KEY {
                continue;
            }
            self.durable
                .put(session_id, &key, &value)
                .await
                .map_err(|e| {
                    WabridgeError::CredentialWriteFailed(format!("checkpoint of {key}: {e}"))
                })?;
        }

        queries::sessions::set_status(&self.db, session_id, SessionStatus::Connected)
            .await
            .map_err(|e| WabridgeError::CredentialWriteFailed(format!("session row: {e}")))?;
        Ok(())
    }

    /// Removes every credential entry for the session from both tiers.
    pub async fn purge(&self, session_id: &str) -> Result<(), WabridgeError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        self.fast.purge(session_id).await?;
        self.durable.purge(session_id).await?;
        self.locks.remove(session_id);
        Ok(())
    }
}

/// Fresh, unregistered credentials for a first run. The protocol engine
/// fills in the real key material during pairing.
fn fresh_credentials() -> serde_json::Value {
    json!({ "registered": false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiers::{MemoryTier, SqliteTier};
    use serde_json::json;
    use tempfile::tempdir;
    use wabridge_config::StorageConfig;

    async fn setup() -> (CredentialStore, Arc<dyn CredentialTier>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("creds.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let db = Database::open(&config).await.unwrap();
        let fast: Arc<dyn CredentialTier> = Arc::new(MemoryTier::new());
        let durable: Arc<dyn CredentialTier> = Arc::new(SqliteTier::new(db.clone()));
        let contacts = ContactDirectory::new(db.clone());
        let store = CredentialStore::new(fast, durable.clone(), db, contacts);
        (store, durable, dir)
    }

    #[tokio::test]
    async fn sync_key_category_is_mirrored_to_both_tiers() {
        let (store, durable, _dir) = setup().await;
        let value = json!({"key_data": "abc"});
        store
            .write("s1", "app-state-sync-key", "7", &value)
            .await
            .unwrap();

        assert_eq!(
            store.read("s1", "app-state-sync-key", "7").await.unwrap(),
            Some(value.clone())
        );
        assert_eq!(
            durable.get("s1", "app-state-sync-key-7").await.unwrap(),
            Some(value)
        );
    }

    #[tokio::test]
    async fn ordinary_keys_stay_in_fast_tier_until_checkpoint() {
        let (store, durable, _dir) = setup().await;
        let value = json!({"private": "xyz"});
        store.write("s1", "pre-key", "3", &value).await.unwrap();

        assert_eq!(
            store.read("s1", "pre-key", "3").await.unwrap(),
            Some(value.clone())
        );
        assert!(durable.get("s1", "pre-key-3").await.unwrap().is_none());

        // The full creds checkpoint flushes ordinary keys to the durable tier.
        store
            .write_creds("s1", &json!({"registered": true}))
            .await
            .unwrap();
        assert_eq!(durable.get("s1", "pre-key-3").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn reads_never_fall_back_to_the_durable_tier() {
        let (store, durable, _dir) = setup().await;
        durable
            .put("s1", "session-9", &json!({"stale": true}))
            .await
            .unwrap();

        assert!(store.read("s1", "session", "9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_creds_initializes_fresh_on_first_run() {
        let (store, _durable, _dir) = setup().await;
        let creds = store.load_creds("s1").await.unwrap();
        assert_eq!(creds["registered"], json!(false));
    }

    #[tokio::test]
    async fn load_creds_returns_stored_blob() {
        let (store, _durable, _dir) = setup().await;
        let blob = json!({"registered": true, "me": {"id": "15551230000"}});
        store.write_creds("s1", &blob).await.unwrap();

        assert_eq!(store.load_creds("s1").await.unwrap(), blob);
    }

    #[tokio::test]
    async fn write_creds_flips_durable_session_row_to_connected() {
        let (store, _durable, _dir) = setup().await;
        store.write_creds("15551230000", &json!({})).await.unwrap();

        let record = queries::sessions::get(&store.db, "15551230000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SessionStatus::Connected);
    }

    #[tokio::test]
    async fn remove_deletes_only_the_fast_tier_entry() {
        let (store, durable, _dir) = setup().await;
        let value = json!({"key_data": "abc"});
        store
            .write("s1", "app-state-sync-key", "7", &value)
            .await
            .unwrap();

        store.remove("s1", "app-state-sync-key", "7").await.unwrap();
        assert!(store
            .read("s1", "app-state-sync-key", "7")
            .await
            .unwrap()
            .is_none());
        // The durable row is superseded by later writes, not deleted.
        assert_eq!(
            durable.get("s1", "app-state-sync-key-7").await.unwrap(),
            Some(value)
        );
    }

    #[tokio::test]
    async fn lid_mapping_writes_populate_the_contact_directory() {
        let (store, _durable, _dir) = setup().await;
        store
            .write("s1", "lid-mapping", "15551230000", &json!("8812345"))
            .await
            .unwrap();

        assert_eq!(
            store
                .contacts
                .resolve("s1", "15551230000@s.whatsapp.net")
                .await
                .unwrap()
                .as_deref(),
            Some("8812345@lid")
        );
    }

    #[tokio::test]
    async fn purge_clears_both_tiers() {
        let (store, durable, _dir) = setup().await;
        store
            .write("s1", "app-state-sync-key", "7", &json!({"a": 1}))
            .await
            .unwrap();
        store.write_creds("s1", &json!({})).await.unwrap();

        store.purge("s1").await.unwrap();
        assert!(store.load_creds("s1").await.unwrap()["registered"] == json!(false));
        assert!(durable.get("s1", "app-state-sync-key-7").await.unwrap().is_none());
        assert!(durable.get("s1", CREDS_KEY).await.unwrap().is_none());
    }
}
