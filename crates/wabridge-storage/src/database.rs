// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes: `Database` wraps
//! one `tokio_rusqlite::Connection` and every query module calls through it.

use wabridge_config::StorageConfig;
use wabridge_core::WabridgeError;

/// Handle to the SQLite durable tier.
///
/// Cheap to clone; all clones share the single background writer thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (and creates, if needed) the database at the configured path,
    /// applies the connection PRAGMAs, and runs pending migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, WabridgeError> {
        let path = config.database_path.clone();
        if let Some(parent) = std::path::Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| WabridgeError::Storage { source: Box::new(e) })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| map_tr_err(tokio_rusqlite::Error::Error(e)))?;

        let journal_mode = if config.wal_mode { "WAL" } else { "DELETE" };
        let pragmas = format!(
            "PRAGMA journal_mode = {journal_mode};\n\
             PRAGMA synchronous = NORMAL;\n\
             PRAGMA foreign_keys = ON;"
        );

        conn.call(move |conn| conn.execute_batch(&pragmas))
            .await
            .map_err(map_tr_err)?;

        conn.call(crate::migrations::run_migrations)
            .await
            .map_err(|e| WabridgeError::Storage { source: Box::new(e) })?;

        Ok(Self { conn })
    }

    /// Returns the underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL and releases the handle.
    pub async fn close(&self) -> Result<(), WabridgeError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Maps a tokio-rusqlite error into the workspace storage error.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> WabridgeError {
    WabridgeError::Storage {
        source: Box::new(e),
    }
}

/// Current time as an ISO 8601 string with millisecond precision, the format
/// used for every persisted timestamp.
pub(crate) fn now_iso() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
