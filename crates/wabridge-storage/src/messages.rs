// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable archive of messages surfaced by the engine's upsert stream.

use wabridge_core::{EngineMessage, WabridgeError};

use crate::database::Database;
use crate::queries;

/// Per-session message archive.
#[derive(Clone)]
pub struct MessageArchive {
    db: Database,
}

impl MessageArchive {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Archives one message. Redelivered ids are ignored: the first stored
    /// payload wins.
    pub async fn save(
        &self,
        session_id: &str,
        message: &EngineMessage,
    ) -> Result<(), WabridgeError> {
        let data = serde_json::to_string(message)
            .map_err(|e| WabridgeError::Storage { source: Box::new(e) })?;
        queries::messages::insert(&self.db, session_id, &message.id, &data).await
    }

    /// Recovers one archived message, for retransmission lookups.
    pub async fn get(
        &self,
        session_id: &str,
        message_id: &str,
    ) -> Result<Option<EngineMessage>, WabridgeError> {
        let Some(text) = queries::messages::get(&self.db, session_id, message_id).await? else {
            return Ok(None);
        };
        let message = serde_json::from_str(&text)
            .map_err(|e| WabridgeError::Storage { source: Box::new(e) })?;
        Ok(Some(message))
    }

    /// Number of archived messages for the session.
    pub async fn count(&self, session_id: &str) -> Result<u64, WabridgeError> {
        queries::messages::count(&self.db, session_id).await
    }

    /// Removes every archived message for the session.
    pub async fn purge(&self, session_id: &str) -> Result<(), WabridgeError> {
        queries::messages::purge(&self.db, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use wabridge_config::StorageConfig;

    async fn setup() -> (MessageArchive, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("msgs.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let db = Database::open(&config).await.unwrap();
        (MessageArchive::new(db), dir)
    }

    fn make_message(id: &str, body: &str) -> EngineMessage {
        EngineMessage {
            id: id.to_string(),
            chat_id: "15551230001@s.whatsapp.net".to_string(),
            sender_id: Some("15551230001@s.whatsapp.net".to_string()),
            from_me: false,
            content: json!({"text": body}),
            timestamp: 1_767_225_600,
        }
    }

    #[tokio::test]
    async fn save_and_get_round_trips() {
        let (archive, _dir) = setup().await;
        archive
            .save("s1", &make_message("m1", "hello"))
            .await
            .unwrap();

        let stored = archive.get("s1", "m1").await.unwrap().unwrap();
        assert_eq!(stored.content, json!({"text": "hello"}));
        assert!(!stored.from_me);
    }

    #[tokio::test]
    async fn redelivered_ids_keep_the_first_payload() {
        let (archive, _dir) = setup().await;
        archive
            .save("s1", &make_message("m1", "original"))
            .await
            .unwrap();
        archive
            .save("s1", &make_message("m1", "redelivered"))
            .await
            .unwrap();

        let stored = archive.get("s1", "m1").await.unwrap().unwrap();
        assert_eq!(stored.content, json!({"text": "original"}));
    }

    #[tokio::test]
    async fn count_and_purge_are_session_scoped() {
        let (archive, _dir) = setup().await;
        archive.save("s1", &make_message("m1", "a")).await.unwrap();
        archive.save("s1", &make_message("m2", "b")).await.unwrap();
        archive.save("s2", &make_message("m1", "c")).await.unwrap();

        assert_eq!(archive.count("s1").await.unwrap(), 2);
        assert_eq!(archive.count("s2").await.unwrap(), 1);

        archive.purge("s1").await.unwrap();
        assert_eq!(archive.count("s1").await.unwrap(), 0);
        assert_eq!(archive.count("s2").await.unwrap(), 1);
    }
}
