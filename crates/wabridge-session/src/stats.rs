// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory runtime counters consumed by the dashboard layer.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

/// Per-session message counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SessionCounters {
    pub messages_received: u64,
    pub messages_sent: u64,
}

/// Aggregate counters across the whole registry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OverallStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub messages_received: u64,
    pub messages_sent: u64,
}

/// Shared runtime counters, cheap to clone.
#[derive(Clone, Default)]
pub struct RuntimeStats {
    sessions: Arc<DashMap<String, SessionCounters>>,
}

impl RuntimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, session_id: &str) {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .messages_received += 1;
    }

    pub fn record_sent(&self, session_id: &str) {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .messages_sent += 1;
    }

    pub fn session(&self, session_id: &str) -> SessionCounters {
        self.sessions
            .get(session_id)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    pub fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Sum of every session's counters.
    pub fn totals(&self) -> SessionCounters {
        let mut totals = SessionCounters::default();
        for entry in self.sessions.iter() {
            totals.messages_received += entry.messages_received;
            totals.messages_sent += entry.messages_sent;
        }
        totals
    }
}
