// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bidirectional stable ↔ alternate identity mapping.
//!
//! Mappings are revealed two ways: the key-exchange stream writes
//! `lid-mapping` entries (forward and reverse, distinguished by a marker in
//! the key id), and group roster syncs supply `(stable, alternate)` pairs for
//! participants. Last write wins per stable id.

use tracing::debug;
use wabridge_core::identity::{
    is_alternate_id, is_primary_user_id, ALTERNATE_DOMAIN, STABLE_DOMAIN,
};
use wabridge_core::WabridgeError;

use crate::database::Database;
use crate::queries;

/// Per-session contact mapping table.
#[derive(Clone)]
pub struct ContactDirectory {
    db: Database,
}

impl ContactDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Upserts a mapping, ignoring records whose stable id is not a primary
    /// user identifier.
    ///
    /// The key-exchange stream intermixes mapping updates for regular users
    /// and non-user entities (broadcast lists, newsletters, groups);
    /// recording the latter would corrupt lookups.
    pub async fn record(
        &self,
        session_id: &str,
        stable_id: &str,
        alternate_id: &str,
    ) -> Result<(), WabridgeError> {
        if !is_primary_user_id(stable_id) {
            debug!(session_id, stable_id, "skipping non-user identity mapping");
            return Ok(());
        }
        queries::contacts::upsert(&self.db, session_id, stable_id, alternate_id).await
    }

    /// Resolves in either direction: pass a stable id to get the alternate,
    /// or an alternate id to get the stable one.
    pub async fn resolve(
        &self,
        session_id: &str,
        id: &str,
    ) -> Result<Option<String>, WabridgeError> {
        if is_alternate_id(id) {
            queries::contacts::by_alternate(&self.db, session_id, id).await
        } else {
            queries::contacts::by_stable(&self.db, session_id, id).await
        }
    }

    /// Decodes one `lid-mapping` key-store write into a mapping.
    ///
    /// Forward writes carry the stable digits in the key id and the alternate
    /// digits in the value; reverse writes (marked in the key id) carry the
    /// alternate digits in the key id, before the underscore, and the stable
    /// digits in the value.
    pub async fn record_mapping_write(
        &self,
        session_id: &str,
        key_id: &str,
        value: &serde_json::Value,
    ) -> Result<(), WabridgeError> {
        let digits = match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string().trim_matches('"').to_string(),
        };
        if digits.is_empty() {
            return Ok(());
        }

        if key_id.contains("reverse") {
            let Some(alternate_digits) = key_id.split('_').next().filter(|s| !s.is_empty())
            else {
                return Ok(());
            };
            let stable = format!("{digits}@{STABLE_DOMAIN}");
            let alternate = format!("{alternate_digits}@{ALTERNATE_DOMAIN}");
            self.record(session_id, &stable, &alternate).await
        } else {
            let stable = format!("{key_id}@{STABLE_DOMAIN}");
            let alternate = format!("{digits}@{ALTERNATE_DOMAIN}");
            self.record(session_id, &stable, &alternate).await
        }
    }

    /// Removes every mapping for the session.
    pub async fn purge(&self, session_id: &str) -> Result<(), WabridgeError> {
        queries::contacts::purge(&self.db, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use wabridge_config::StorageConfig;

    async fn setup() -> (ContactDirectory, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("contacts.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let db = Database::open(&config).await.unwrap();
        (ContactDirectory::new(db), dir)
    }

    #[tokio::test]
    async fn recorded_pairs_resolve_in_both_directions() {
        let (contacts, _dir) = setup().await;
        contacts
            .record("s1", "15551230000@s.whatsapp.net", "8812345@lid")
            .await
            .unwrap();

        assert_eq!(
            contacts
                .resolve("s1", "15551230000@s.whatsapp.net")
                .await
                .unwrap()
                .as_deref(),
            Some("8812345@lid")
        );
        assert_eq!(
            contacts
                .resolve("s1", "8812345@lid")
                .await
                .unwrap()
                .as_deref(),
            Some("15551230000@s.whatsapp.net")
        );
    }

    #[tokio::test]
    async fn last_write_wins_per_stable_id() {
        let (contacts, _dir) = setup().await;
        contacts
            .record("s1", "15551230000@s.whatsapp.net", "111@lid")
            .await
            .unwrap();
        contacts
            .record("s1", "15551230000@s.whatsapp.net", "222@lid")
            .await
            .unwrap();

        assert_eq!(
            contacts
                .resolve("s1", "15551230000@s.whatsapp.net")
                .await
                .unwrap()
                .as_deref(),
            Some("222@lid")
        );
    }

    #[tokio::test]
    async fn non_user_stable_ids_are_never_recorded() {
        let (contacts, _dir) = setup().await;
        contacts
            .record("s1", "status@broadcast", "8812345@lid")
            .await
            .unwrap();
        contacts
            .record("s1", "12345-67890@g.us", "8812345@lid")
            .await
            .unwrap();

        assert!(contacts
            .resolve("s1", "8812345@lid")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn forward_mapping_write_decodes_stable_from_key() {
        let (contacts, _dir) = setup().await;
        contacts
            .record_mapping_write("s1", "15551230000", &json!("8812345"))
            .await
            .unwrap();

        assert_eq!(
            contacts
                .resolve("s1", "15551230000@s.whatsapp.net")
                .await
                .unwrap()
                .as_deref(),
            Some("8812345@lid")
        );
    }

    #[tokio::test]
    async fn reverse_mapping_write_decodes_alternate_from_key() {
        let (contacts, _dir) = setup().await;
        contacts
            .record_mapping_write("s1", "8812345_reverse", &json!("15551230000"))
            .await
            .unwrap();

        assert_eq!(
            contacts
                .resolve("s1", "8812345@lid")
                .await
                .unwrap()
                .as_deref(),
            Some("15551230000@s.whatsapp.net")
        );
    }

    #[tokio::test]
    async fn mappings_are_scoped_per_session() {
        let (contacts, _dir) = setup().await;
        contacts
            .record("s1", "15551230000@s.whatsapp.net", "111@lid")
            .await
            .unwrap();

        assert!(contacts
            .resolve("s2", "15551230000@s.whatsapp.net")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn purge_removes_all_session_mappings() {
        let (contacts, _dir) = setup().await;
        contacts
            .record("s1", "15551230000@s.whatsapp.net", "111@lid")
            .await
            .unwrap();
        contacts.purge("s1").await.unwrap();

        assert!(contacts
            .resolve("s1", "15551230000@s.whatsapp.net")
            .await
            .unwrap()
            .is_none());
    }
}
