// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact mapping rows, upserted on `(session_id, stable_id)`.

use rusqlite::params;
use wabridge_core::WabridgeError;

use crate::database::{map_tr_err, Database};

/// Insert or replace the alternate id recorded for a stable id.
pub async fn upsert(
    db: &Database,
    session_id: &str,
    stable_id: &str,
    alternate_id: &str,
) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    let stable_id = stable_id.to_string();
    let alternate_id = alternate_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (session_id, stable_id, alternate_id)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (session_id, stable_id) DO UPDATE SET
                     alternate_id = excluded.alternate_id",
                params![session_id, stable_id, alternate_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up the alternate id for a stable id.
pub async fn by_stable(
    db: &Database,
    session_id: &str,
    stable_id: &str,
) -> Result<Option<String>, WabridgeError> {
    let session_id = session_id.to_string();
    let stable_id = stable_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT alternate_id FROM contacts WHERE session_id = ?1 AND stable_id = ?2 LIMIT 1",
                params![session_id, stable_id],
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

/// Look up the stable id for an alternate id.
pub async fn by_alternate(
    db: &Database,
    session_id: &str,
    alternate_id: &str,
) -> Result<Option<String>, WabridgeError> {
    let session_id = session_id.to_string();
    let alternate_id = alternate_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT stable_id FROM contacts WHERE session_id = ?1 AND alternate_id = ?2 LIMIT 1",
                params![session_id, alternate_id],
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

/// Remove every contact mapping for the session.
pub async fn purge(db: &Database, session_id: &str) -> Result<(), WabridgeError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM contacts WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
