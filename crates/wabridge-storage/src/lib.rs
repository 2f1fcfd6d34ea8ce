// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for the Wabridge session manager.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`, plus the two-tier
//! credential store, the contact directory, the group metadata cache, and
//! the message archive built on top of it.

pub mod contacts;
pub mod credentials;
pub mod database;
pub mod groups;
pub mod messages;
pub mod migrations;
pub mod queries;
pub mod store;
pub mod tiers;

pub use contacts::ContactDirectory;
pub use credentials::{CredentialStore, CHECKPOINT_CATEGORY, CREDS_KEY};
pub use database::Database;
pub use groups::GroupCache;
pub use messages::MessageArchive;
pub use store::Storage;
pub use tiers::{MemoryTier, SqliteTier};
