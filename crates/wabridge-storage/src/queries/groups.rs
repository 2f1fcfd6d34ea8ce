// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group metadata rows, upserted on `(session_id, group_id)`.

use rusqlite::params;
use wabridge_core::WabridgeError;

use crate::database::{map_tr_err, now_iso, Database};

/// Insert or replace the stored metadata snapshot for a group.
pub async fn upsert(
    db: &Database,
    session_id: &str,
    group_id: &str,
    metadata: &str,
) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    let group_id = group_id.to_string();
    let metadata = metadata.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO group_metadata (session_id, group_id, metadata, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (session_id, group_id) DO UPDATE SET
                     metadata = excluded.metadata,
                     updated_at = excluded.updated_at",
                params![session_id, group_id, metadata, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get the stored metadata snapshot for a group.
pub async fn get(
    db: &Database,
    session_id: &str,
    group_id: &str,
) -> Result<Option<String>, WabridgeError> {
    let session_id = session_id.to_string();
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT metadata FROM group_metadata WHERE session_id = ?1 AND group_id = ?2",
                params![session_id, group_id],
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

/// List every cached group snapshot for the session.
pub async fn list(db: &Database, session_id: &str) -> Result<Vec<String>, WabridgeError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT metadata FROM group_metadata WHERE session_id = ?1 ORDER BY group_id",
            )?;
            let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
            let mut groups = Vec::new();
            for row in rows {
                groups.push(row?);
            }
            Ok(groups)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete one group snapshot.
pub async fn remove(db: &Database, session_id: &str, group_id: &str) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM group_metadata WHERE session_id = ?1 AND group_id = ?2",
                params![session_id, group_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove every group snapshot for the session.
pub async fn purge(db: &Database, session_id: &str) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM group_metadata WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
