// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session group metadata cache.
//!
//! Snapshots are opaque JSON owned by the protocol engine. Updates merge
//! into the stored snapshot: fields absent from a partial update keep their
//! prior values, while a `participants` list present in the update replaces
//! the prior list wholesale. Every successful upsert syncs the incoming
//! participants into the contact directory; participant identity reveals are
//! cheap and idempotent.

use tracing::{debug, warn};
use wabridge_core::{EngineSocket, WabridgeError};

use crate::contacts::ContactDirectory;
use crate::database::Database;
use crate::queries;

/// Group metadata cache for all sessions.
#[derive(Clone)]
pub struct GroupCache {
    db: Database,
    contacts: ContactDirectory,
}

impl GroupCache {
    pub fn new(db: Database, contacts: ContactDirectory) -> Self {
        Self { db, contacts }
    }

    /// Returns the cached snapshot for a group, if any.
    pub async fn get(
        &self,
        session_id: &str,
        group_id: &str,
    ) -> Result<Option<serde_json::Value>, WabridgeError> {
        let Some(text) = queries::groups::get(&self.db, session_id, group_id).await? else {
            return Ok(None);
        };
        let metadata = serde_json::from_str(&text)
            .map_err(|e| WabridgeError::Storage { source: Box::new(e) })?;
        Ok(Some(metadata))
    }

    /// Merges an incoming (possibly partial) snapshot into the cache.
    ///
    /// The incoming payload must carry the group id under `"id"`.
    pub async fn upsert(
        &self,
        session_id: &str,
        incoming: &serde_json::Value,
    ) -> Result<(), WabridgeError> {
        let group_id = incoming
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| WabridgeError::Engine {
                message: "group metadata payload is missing its id".to_string(),
                source: None,
            })?
            .to_string();

        let merged = match self.get(session_id, &group_id).await? {
            Some(existing) => merge_metadata(existing, incoming),
            None => incoming.clone(),
        };
        queries::groups::upsert(&self.db, session_id, &group_id, &merged.to_string()).await?;

        self.sync_participants(session_id, incoming).await;
        Ok(())
    }

    /// Drops one group from the cache.
    pub async fn remove(&self, session_id: &str, group_id: &str) -> Result<(), WabridgeError> {
        queries::groups::remove(&self.db, session_id, group_id).await
    }

    /// Lists every cached snapshot for the session.
    pub async fn list(&self, session_id: &str) -> Result<Vec<serde_json::Value>, WabridgeError> {
        let rows = queries::groups::list(&self.db, session_id).await?;
        let mut groups = Vec::with_capacity(rows.len());
        for text in rows {
            let metadata = serde_json::from_str(&text)
                .map_err(|e| WabridgeError::Storage { source: Box::new(e) })?;
            groups.push(metadata);
        }
        Ok(groups)
    }

    /// Pulls every group the session participates in from the engine and
    /// upserts each, skipping (and logging) per-group failures.
    ///
    /// Returns the number of groups cached.
    pub async fn sync_all(
        &self,
        session_id: &str,
        socket: &dyn EngineSocket,
    ) -> Result<usize, WabridgeError> {
        let groups = socket.fetch_all_participating_groups().await?;
        let mut synced = 0;
        for metadata in &groups {
            match self.upsert(session_id, metadata).await {
                Ok(()) => synced += 1,
                Err(e) => {
                    warn!(session_id, error = %e, "skipping group during roster sync");
                }
            }
        }
        debug!(session_id, synced, "roster sync complete");
        Ok(synced)
    }

    /// Removes every group snapshot for the session.
    pub async fn purge(&self, session_id: &str) -> Result<(), WabridgeError> {
        queries::groups::purge(&self.db, session_id).await
    }

    /// Records `(stable, alternate)` pairs for every participant in the
    /// incoming payload. Failures are logged per participant and never abort
    /// the batch.
    async fn sync_participants(&self, session_id: &str, incoming: &serde_json::Value) {
        let Some(participants) = incoming
            .get("participants")
            .and_then(serde_json::Value::as_array)
        else {
            return;
        };
        for participant in participants {
            let alternate = participant.get("id").and_then(serde_json::Value::as_str);
            let stable = participant
                .get("phone_number")
                .and_then(serde_json::Value::as_str);
            let (Some(stable), Some(alternate)) = (stable, alternate) else {
                continue;
            };
            if let Err(e) = self.contacts.record(session_id, stable, alternate).await {
                warn!(session_id, stable, error = %e, "failed to record participant mapping");
            }
        }
    }
}

/// Shallow merge of an incoming partial update into the existing snapshot.
///
/// Keys present in the update override the stored value; this is what makes
/// an incoming `participants` list replace the prior one rather than merging
/// element-wise.
fn merge_metadata(
    existing: serde_json::Value,
    incoming: &serde_json::Value,
) -> serde_json::Value {
    let (serde_json::Value::Object(mut base), Some(update)) = (existing, incoming.as_object())
    else {
        return incoming.clone();
    };
    for (key, value) in update {
        base.insert(key.clone(), value.clone());
    }
    serde_json::Value::Object(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use wabridge_config::StorageConfig;

    async fn setup() -> (GroupCache, ContactDirectory, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("groups.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let db = Database::open(&config).await.unwrap();
        let contacts = ContactDirectory::new(db.clone());
        (GroupCache::new(db, contacts.clone()), contacts, dir)
    }

    fn full_snapshot() -> serde_json::Value {
        json!({
            "id": "12345-67890@g.us",
            "subject": "book club",
            "announce": false,
            "participants": [
                {"id": "111@lid", "phone_number": "15551230001@s.whatsapp.net", "admin": "admin"},
                {"id": "222@lid", "phone_number": "15551230002@s.whatsapp.net"}
            ]
        })
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let (cache, _contacts, _dir) = setup().await;
        cache.upsert("s1", &full_snapshot()).await.unwrap();

        let stored = cache.get("s1", "12345-67890@g.us").await.unwrap().unwrap();
        assert_eq!(stored["subject"], json!("book club"));
        assert_eq!(stored["participants"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn partial_update_retains_absent_fields() {
        let (cache, _contacts, _dir) = setup().await;
        cache.upsert("s1", &full_snapshot()).await.unwrap();

        cache
            .upsert(
                "s1",
                &json!({"id": "12345-67890@g.us", "subject": "film club"}),
            )
            .await
            .unwrap();

        let stored = cache.get("s1", "12345-67890@g.us").await.unwrap().unwrap();
        assert_eq!(stored["subject"], json!("film club"));
        // Fields absent from the update keep their prior values.
        assert_eq!(stored["announce"], json!(false));
        assert_eq!(stored["participants"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn incoming_participants_replace_the_prior_list_wholesale() {
        let (cache, _contacts, _dir) = setup().await;
        cache.upsert("s1", &full_snapshot()).await.unwrap();

        cache
            .upsert(
                "s1",
                &json!({
                    "id": "12345-67890@g.us",
                    "participants": [
                        {"id": "333@lid", "phone_number": "15551230003@s.whatsapp.net"}
                    ]
                }),
            )
            .await
            .unwrap();

        let stored = cache.get("s1", "12345-67890@g.us").await.unwrap().unwrap();
        let participants = stored["participants"].as_array().unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0]["id"], json!("333@lid"));
    }

    #[tokio::test]
    async fn upsert_merge_is_idempotent() {
        let (cache, _contacts, _dir) = setup().await;
        let update = json!({"id": "12345-67890@g.us", "subject": "book club"});

        cache.upsert("s1", &update).await.unwrap();
        let once = cache.get("s1", "12345-67890@g.us").await.unwrap();
        cache.upsert("s1", &update).await.unwrap();
        let twice = cache.get("s1", "12345-67890@g.us").await.unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn upsert_syncs_incoming_participants_into_contacts() {
        let (cache, contacts, _dir) = setup().await;
        cache.upsert("s1", &full_snapshot()).await.unwrap();

        assert_eq!(
            contacts
                .resolve("s1", "15551230001@s.whatsapp.net")
                .await
                .unwrap()
                .as_deref(),
            Some("111@lid")
        );
        assert_eq!(
            contacts.resolve("s1", "222@lid").await.unwrap().as_deref(),
            Some("15551230002@s.whatsapp.net")
        );
    }

    #[tokio::test]
    async fn upsert_without_id_is_rejected() {
        let (cache, _contacts, _dir) = setup().await;
        let err = cache
            .upsert("s1", &json!({"subject": "no id"}))
            .await
            .expect_err("payload without id should be rejected");
        assert!(matches!(err, WabridgeError::Engine { .. }));
    }

    #[tokio::test]
    async fn remove_and_purge() {
        let (cache, _contacts, _dir) = setup().await;
        cache.upsert("s1", &full_snapshot()).await.unwrap();
        cache
            .upsert("s1", &json!({"id": "99999-00000@g.us", "subject": "other"}))
            .await
            .unwrap();

        cache.remove("s1", "12345-67890@g.us").await.unwrap();
        assert!(cache.get("s1", "12345-67890@g.us").await.unwrap().is_none());
        assert_eq!(cache.list("s1").await.unwrap().len(), 1);

        cache.purge("s1").await.unwrap();
        assert!(cache.list("s1").await.unwrap().is_empty());
    }
}
