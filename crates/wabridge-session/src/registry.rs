// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry: the embedding surface of the workspace.
//!
//! Owns every live session handle, spawns one supervisor task per session,
//! and exposes the CRUD + pause/resume + stats surface the dashboard layer
//! consumes. Sessions share nothing but this registry's map; all per-session
//! state lives in the handle and its supervisor.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wabridge_config::WabridgeConfig;
use wabridge_core::identity::{bare_id, is_primary_user_id};
use wabridge_core::{
    AuthStatus, CommandRegistry, MessageId, ProtocolEngine, SessionRecord, SessionStatus,
    WabridgeError,
};
use wabridge_storage::Storage;

use crate::retry::RetryCoordinator;
use crate::stats::{OverallStats, RuntimeStats};
use crate::supervisor::{ControlState, LiveSocket, SessionSnapshot, Supervisor};

/// Result of a successful `create`.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub id: String,
    /// Set when the engine required pairing; absent when stored credentials
    /// connected directly.
    pub pairing_code: Option<String>,
}

/// Result of restoring persisted sessions at startup.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
    /// Per-session restore failures; one session's failure never aborts the
    /// others.
    pub errors: Vec<(String, String)>,
}

/// Read-only per-session counters for the dashboard layer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SessionStats {
    pub messages_received: u64,
    pub messages_sent: u64,
    pub archived_messages: u64,
}

#[derive(Clone)]
struct SessionHandle {
    control_tx: watch::Sender<ControlState>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    retry: Arc<RetryCoordinator>,
    socket_slot: Arc<ArcSwapOption<LiveSocket>>,
}

/// Registry of all live sessions.
pub struct SessionRegistry {
    engine: Arc<dyn ProtocolEngine>,
    storage: Storage,
    config: WabridgeConfig,
    commands: Option<Arc<dyn CommandRegistry>>,
    network_rx: Option<watch::Receiver<bool>>,
    sessions: DashMap<String, SessionHandle>,
    stats: RuntimeStats,
}

impl SessionRegistry {
    pub fn new(engine: Arc<dyn ProtocolEngine>, storage: Storage, config: WabridgeConfig) -> Self {
        Self {
            engine,
            storage,
            config,
            commands: None,
            network_rx: None,
            sessions: DashMap::new(),
            stats: RuntimeStats::new(),
        }
    }

    /// Wires in a command layer; inbound messages are dispatched to it.
    pub fn with_commands(mut self, commands: Arc<dyn CommandRegistry>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Wires in a network health signal; supervisors pause on unreachability.
    pub fn with_network_monitor(mut self, network_rx: watch::Receiver<bool>) -> Self {
        self.network_rx = Some(network_rx);
        self
    }

    /// Registers a new session for the identifier and waits for either a
    /// pairing code or a live connection.
    ///
    /// Fails with [`WabridgeError::AlreadyConnected`] when a session for the
    /// identifier already exists in a non-terminal state.
    pub async fn create(&self, identifier: &str) -> Result<CreatedSession, WabridgeError> {
        let id = bare_id(identifier).to_string();
        if !is_primary_user_id(&id) {
            return Err(WabridgeError::Config(format!(
                "session identifier must be phone-number-shaped, got {identifier:?}"
            )));
        }

        if let Some(handle) = self.sessions.get(&id) {
            if !handle.snapshot_rx.borrow().status.is_terminal() {
                return Err(WabridgeError::AlreadyConnected(id));
            }
        }
        // A terminal leftover is replaced by the fresh session.
        self.sessions.remove(&id);

        let record = self.storage.insert_session(&id).await?;
        let handle = self.spawn_session(&record, ControlState::Running);
        self.sessions.insert(id.clone(), handle.clone());
        info!(session_id = %id, "session created");

        let wait_for_pairing = {
            let mut snapshot_rx = handle.snapshot_rx.clone();
            async move {
                loop {
                    {
                        let snapshot = snapshot_rx.borrow_and_update();
                        if let Some(code) = &snapshot.pairing_code {
                            return Ok(Some(code.clone()));
                        }
                        match snapshot.status {
                            SessionStatus::Connected => return Ok(None),
                            SessionStatus::Disconnected => {
                                return Err(WabridgeError::ConnectionFailed(
                                    "session logged out during pairing".to_string(),
                                ));
                            }
                            _ => {}
                        }
                    }
                    if snapshot_rx.changed().await.is_err() {
                        return Err(WabridgeError::ConnectionFailed(
                            "supervisor stopped before pairing completed".to_string(),
                        ));
                    }
                }
            }
        };

        let timeout = Duration::from_secs(self.config.session.pairing_wait_timeout_secs);
        match tokio::time::timeout(timeout, wait_for_pairing).await {
            Ok(Ok(pairing_code)) => Ok(CreatedSession { id, pairing_code }),
            Ok(Err(e)) => {
                self.rollback_create(&id).await;
                Err(e)
            }
            Err(_) => {
                self.rollback_create(&id).await;
                Err(WabridgeError::ConnectionFailed(format!(
                    "timed out waiting for pairing code for {id}"
                )))
            }
        }
    }

    /// Snapshot of one session.
    pub fn get(&self, id: &str) -> Result<SessionSnapshot, WabridgeError> {
        let handle = self
            .sessions
            .get(id)
            .ok_or_else(|| WabridgeError::SessionNotFound(id.to_string()))?;
        Ok(handle.snapshot_rx.borrow().clone())
    }

    /// Snapshots of every live session.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .iter()
            .map(|entry| entry.value().snapshot_rx.borrow().clone())
            .collect()
    }

    /// Stops the supervisor, closes the socket, and purges every row derived
    /// from the session. Destructive and surfaced: purge failures are
    /// returned, not swallowed.
    pub async fn delete(&self, id: &str) -> Result<(), WabridgeError> {
        let Some((_, handle)) = self.sessions.remove(id) else {
            return Err(WabridgeError::SessionNotFound(id.to_string()));
        };
        self.stop_session(id, &handle).await;
        self.storage.purge_session(id).await?;
        info!(session_id = %id, "session deleted");
        Ok(())
    }

    /// Pauses a session. While paused the supervisor neither reconnects nor
    /// emits retry or network-health side effects.
    pub fn pause(&self, id: &str) -> Result<(), WabridgeError> {
        let handle = self
            .sessions
            .get(id)
            .ok_or_else(|| WabridgeError::SessionNotFound(id.to_string()))?;
        if handle.control_tx.send(ControlState::Paused).is_err() {
            debug!(session_id = %id, "pause requested for a stopped supervisor");
        }
        Ok(())
    }

    /// Resumes a paused session, triggering exactly one connect attempt.
    pub fn resume(&self, id: &str) -> Result<(), WabridgeError> {
        let handle = self
            .sessions
            .get(id)
            .ok_or_else(|| WabridgeError::SessionNotFound(id.to_string()))?;
        if handle.control_tx.send(ControlState::Running).is_err() {
            debug!(session_id = %id, "resume requested for a stopped supervisor");
        }
        Ok(())
    }

    /// Re-establishes a supervisor for every durable session row at process
    /// start. Logged-out rows are skipped; rows paused by the operator come
    /// back paused; rows paused by network come back running, since
    /// reachability is a live signal, not history.
    pub async fn restore_all(&self) -> Result<RestoreReport, WabridgeError> {
        let rows = self.storage.sessions().await?;
        let mut report = RestoreReport::default();

        let outcomes = join_all(rows.into_iter().map(|record| async move {
            let id = record.id.clone();
            (id, self.restore_one(record))
        }))
        .await;

        for (id, outcome) in outcomes {
            match outcome {
                Ok(true) => report.restored += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(session_id = %id, error = %e, "failed to restore session");
                    report.errors.push((id, e.to_string()));
                }
            }
        }

        info!(
            restored = report.restored,
            skipped = report.skipped,
            errors = report.errors.len(),
            "session restore complete"
        );
        Ok(report)
    }

    fn restore_one(&self, record: SessionRecord) -> Result<bool, WabridgeError> {
        if record.status.is_terminal() {
            debug!(session_id = %record.id, "skipping logged-out session");
            return Ok(false);
        }
        if self.sessions.contains_key(&record.id) {
            return Ok(false);
        }
        if !is_primary_user_id(&record.id) {
            return Err(WabridgeError::Internal(format!(
                "persisted session id {:?} is not phone-number-shaped",
                record.id
            )));
        }

        let initial = if record.status == SessionStatus::PausedByUser {
            ControlState::Paused
        } else {
            ControlState::Running
        };
        let id = record.id.clone();
        let handle = self.spawn_session(&record, initial);
        self.sessions.insert(id, handle);
        Ok(true)
    }

    /// Sends a message through the retry coordinator: the cryptographic
    /// session is recreated first when none exists, and the content is
    /// remembered so a later retry receipt can be answered.
    pub async fn send_message(
        &self,
        id: &str,
        to: &str,
        content: serde_json::Value,
    ) -> Result<MessageId, WabridgeError> {
        let handle = self
            .sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| WabridgeError::SessionNotFound(id.to_string()))?;

        let status = handle.snapshot_rx.borrow().status;
        if status.is_paused() {
            return Err(WabridgeError::SessionPaused(id.to_string()));
        }
        let Some(live) = handle.socket_slot.load_full() else {
            return Err(WabridgeError::ConnectionFailed(format!(
                "session {id} has no live socket"
            )));
        };
        let socket = live.0.clone();

        let has_session = socket.has_crypto_session(to).await?;
        let decision = handle.retry.should_recreate_session(to, 0, has_session);
        if decision.recreate {
            debug!(session_id = %id, destination = to, reason = decision.reason, "recreating crypto session before send");
            socket.recreate_crypto_session(to).await?;
        }

        let message_id = socket.send_message(to, content.clone()).await?;
        handle.retry.remember(to, &message_id.0, content);
        self.stats.record_sent(id);
        Ok(message_id)
    }

    /// Authentication status for the dashboard layer.
    pub fn auth_status(&self, id: &str) -> Result<AuthStatus, WabridgeError> {
        let snapshot = self.get(id)?;
        Ok(AuthStatus {
            is_authenticated: snapshot.status == SessionStatus::Connected,
            status: snapshot.status.to_string(),
            phone_number: snapshot.id,
        })
    }

    /// Per-session counters plus the durable message count.
    pub async fn session_stats(&self, id: &str) -> Result<SessionStats, WabridgeError> {
        if !self.sessions.contains_key(id) {
            return Err(WabridgeError::SessionNotFound(id.to_string()));
        }
        let counters = self.stats.session(id);
        let archived_messages = self.storage.messages().count(id).await?;
        Ok(SessionStats {
            messages_received: counters.messages_received,
            messages_sent: counters.messages_sent,
            archived_messages,
        })
    }

    /// Aggregate counters across every session.
    pub fn overall_stats(&self) -> OverallStats {
        let totals = self.stats.totals();
        let active_sessions = self
            .sessions
            .iter()
            .filter(|entry| entry.value().snapshot_rx.borrow().status == SessionStatus::Connected)
            .count();
        OverallStats {
            total_sessions: self.sessions.len(),
            active_sessions,
            messages_received: totals.messages_received,
            messages_sent: totals.messages_sent,
        }
    }

    /// Stops every supervisor without purging any state.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, SessionHandle)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (id, handle) in handles {
            self.stop_session(&id, &handle).await;
        }
        self.sessions.clear();
        info!("session registry shut down");
    }

    fn spawn_session(&self, record: &SessionRecord, initial: ControlState) -> SessionHandle {
        let (control_tx, control_rx) = watch::channel(initial);
        let initial_status = if initial == ControlState::Paused {
            SessionStatus::PausedByUser
        } else {
            SessionStatus::Connecting
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot {
            id: record.id.clone(),
            status: initial_status,
            pairing_code: None,
            display_name: record.display_name.clone(),
            profile_url: record.profile_url.clone(),
            created_at: record.created_at.clone(),
        });
        let cancel = CancellationToken::new();
        let retry = Arc::new(RetryCoordinator::new(&self.config.retry));
        let socket_slot = Arc::new(ArcSwapOption::empty());

        let supervisor = Supervisor {
            session_id: record.id.clone(),
            engine: self.engine.clone(),
            storage: self.storage.clone(),
            retry: retry.clone(),
            stats: self.stats.clone(),
            commands: self.commands.clone(),
            config: self.config.session.clone(),
            recovery_delay: Duration::from_millis(self.config.retry.recovery_delay_ms),
            control_rx,
            snapshot_tx: Arc::new(snapshot_tx),
            network_rx: self.network_rx.clone(),
            cancel: cancel.clone(),
            socket_slot: Arc::clone(&socket_slot),
        };
        let task = tokio::spawn(supervisor.run());

        SessionHandle {
            control_tx,
            snapshot_rx,
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
            retry,
            socket_slot,
        }
    }

    /// Cancels the supervisor, closes any live socket, and drops in-memory
    /// session state.
    async fn stop_session(&self, id: &str, handle: &SessionHandle) {
        handle.cancel.cancel();
        if let Some(live) = handle.socket_slot.load_full() {
            live.0.close().await;
        }
        if let Some(task) = handle.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(session_id = %id, error = ?e, "supervisor task panicked");
            }
        }
        handle.retry.clear();
        self.stats.remove(id);
    }

    async fn rollback_create(&self, id: &str) {
        let Some((_, handle)) = self.sessions.remove(id) else {
            return;
        };
        self.stop_session(id, &handle).await;
        if let Err(e) = self.storage.purge_session(id).await {
            warn!(session_id = %id, error = %e, "failed to purge session during create rollback");
        }
    }
}
