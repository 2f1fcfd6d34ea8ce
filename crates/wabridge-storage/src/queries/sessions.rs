// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session row CRUD operations.

use rusqlite::params;
use wabridge_core::{SessionRecord, SessionStatus, WabridgeError};

use crate::database::{map_tr_err, now_iso, Database};

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<SessionRecord, rusqlite::Error> {
    let status_str: String = row.get(1)?;
    let status: SessionStatus = status_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SessionRecord {
        id: row.get(0)?,
        status,
        display_name: row.get(2)?,
        profile_url: row.get(3)?,
        is_business: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const SELECT_COLUMNS: &str =
    "id, status, display_name, profile_url, is_business, created_at, updated_at";

/// Insert or fully update a session row.
pub async fn upsert(db: &Database, record: &SessionRecord) -> Result<(), WabridgeError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, status, display_name, profile_url, is_business, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (id) DO UPDATE SET
                     status = excluded.status,
                     display_name = excluded.display_name,
                     profile_url = excluded.profile_url,
                     is_business = excluded.is_business,
                     updated_at = excluded.updated_at",
                params![
                    record.id,
                    record.status.to_string(),
                    record.display_name,
                    record.profile_url,
                    record.is_business,
                    record.created_at,
                    record.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert only the persisted status, leaving profile fields intact.
pub async fn set_status(
    db: &Database,
    id: &str,
    status: SessionStatus,
) -> Result<(), WabridgeError> {
    let id = id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (id) DO UPDATE SET
                     status = excluded.status,
                     updated_at = excluded.updated_at",
                params![id, status.to_string(), now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Update the live profile fields fetched after a successful connect.
pub async fn update_profile(
    db: &Database,
    id: &str,
    display_name: Option<String>,
    profile_url: Option<String>,
    is_business: bool,
) -> Result<(), WabridgeError> {
    let id = id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET display_name = ?1, profile_url = ?2, is_business = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![display_name, profile_url, is_business, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session row by ID.
pub async fn get(db: &Database, id: &str) -> Result<Option<SessionRecord>, WabridgeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_record);
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List every session row, newest first.
pub async fn list(db: &Database) -> Result<Vec<SessionRecord>, WabridgeError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], row_to_record)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a session row.
pub async fn delete(db: &Database, id: &str) -> Result<(), WabridgeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
