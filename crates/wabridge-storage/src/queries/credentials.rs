// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential mirror operations for the durable tier.
//!
//! Rows are upserted on `(session_id, key)`; later writes supersede earlier
//! ones. Values are opaque JSON text owned by the protocol engine.

use rusqlite::params;
use wabridge_core::WabridgeError;

use crate::database::{map_tr_err, now_iso, Database};

/// Insert or replace one credential entry.
pub async fn upsert(
    db: &Database,
    session_id: &str,
    key: &str,
    value: &str,
) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    let key = key.to_string();
    let value = value.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO credentials (session_id, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (session_id, key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![session_id, key, value, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get one credential entry's JSON text.
pub async fn get(
    db: &Database,
    session_id: &str,
    key: &str,
) -> Result<Option<String>, WabridgeError> {
    let session_id = session_id.to_string();
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT value FROM credentials WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Delete one credential entry.
pub async fn delete(db: &Database, session_id: &str, key: &str) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM credentials WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Every credential entry for the session.
pub async fn entries(
    db: &Database,
    session_id: &str,
) -> Result<Vec<(String, String)>, WabridgeError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT key, value FROM credentials WHERE session_id = ?1")?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove every credential entry for the session.
pub async fn purge(db: &Database, session_id: &str) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM credentials WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
