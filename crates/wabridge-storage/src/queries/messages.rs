// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archived message rows, keyed on `(session_id, message_id)`.
//!
//! The archive feeds the engine's retransmission lookup and the dashboard
//! message counts. First write wins: re-delivered upserts of the same id do
//! not overwrite the original payload.

use rusqlite::params;
use wabridge_core::WabridgeError;

use crate::database::{map_tr_err, now_iso, Database};

/// Insert a message payload, ignoring duplicates.
pub async fn insert(
    db: &Database,
    session_id: &str,
    message_id: &str,
    data: &str,
) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    let message_id = message_id.to_string();
    let data = data.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO messages (session_id, message_id, data, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, message_id, data, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get one archived message payload.
pub async fn get(
    db: &Database,
    session_id: &str,
    message_id: &str,
) -> Result<Option<String>, WabridgeError> {
    let session_id = session_id.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT data FROM messages WHERE session_id = ?1 AND message_id = ?2 LIMIT 1",
                params![session_id, message_id],
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

/// Number of archived messages for the session.
pub async fn count(db: &Database, session_id: &str) -> Result<u64, WabridgeError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT count(*) FROM messages WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
        .await
        .map_err(map_tr_err)
}

/// Remove every archived message for the session.
pub async fn purge(db: &Database, session_id: &str) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM messages WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
