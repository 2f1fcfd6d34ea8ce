// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session connection supervisor.
//!
//! One supervisor task per session drives the state machine
//! `Connecting -> Pairing -> Connected -> Disconnected`, with the two paused
//! states entered from operator pause and network-health signals. Protocol
//! engine events are processed strictly in arrival order; suspension happens
//! only at awaited I/O, never mid-event.
//!
//! Reconnection uses a flat delay with no attempt cap: only an explicit
//! logout (terminal) or a pause stops the loop, and pause state is
//! re-checked before every attempt so a pause requested mid-delay prevents
//! the next connection.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wabridge_config::SessionConfig;
use wabridge_core::{
    CommandRegistry, ConnectionState, EngineConnection, EngineEvent, EngineMessage,
    EngineSessionSpec, EngineSocket, ProtocolEngine, ReceiptStatus, SessionStatus, WabridgeError,
};
use wabridge_storage::Storage;

use crate::retry::RetryCoordinator;
use crate::stats::RuntimeStats;

/// Operator-facing run state, toggled by pause/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlState {
    Running,
    Paused,
}

/// Published view of one session, read lock-free by the registry.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: String,
    pub status: SessionStatus,
    /// Present only while the session is pairing.
    pub pairing_code: Option<String>,
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub created_at: String,
}

/// The live socket slot published by the supervisor while a connection is
/// open. `ArcSwapOption` needs a sized payload, hence the newtype.
pub(crate) struct LiveSocket(pub(crate) Arc<dyn EngineSocket>);

enum Gate {
    Proceed,
    Stop,
}

enum Outcome {
    /// Explicit logout: the session is terminal and never reconnects.
    Terminal,
    /// Transient close: reconnect after the flat delay.
    Retry,
    /// Paused (operator or network): the gate decides when to reconnect.
    Paused,
    /// Cancelled from outside: leave the loop without touching status.
    Stop,
}

pub(crate) struct Supervisor {
    pub(crate) session_id: String,
    pub(crate) engine: Arc<dyn ProtocolEngine>,
    pub(crate) storage: Storage,
    pub(crate) retry: Arc<RetryCoordinator>,
    pub(crate) stats: RuntimeStats,
    pub(crate) commands: Option<Arc<dyn CommandRegistry>>,
    pub(crate) config: SessionConfig,
    pub(crate) recovery_delay: Duration,
    pub(crate) control_rx: watch::Receiver<ControlState>,
    pub(crate) snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
    pub(crate) network_rx: Option<watch::Receiver<bool>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) socket_slot: Arc<ArcSwapOption<LiveSocket>>,
}

impl Supervisor {
    pub(crate) async fn run(mut self) {
        loop {
            match self.wait_until_runnable().await {
                Gate::Proceed => {}
                Gate::Stop => break,
            }

            match self.connect_once().await {
                Outcome::Terminal => {
                    self.set_status(SessionStatus::Disconnected).await;
                    info!(session_id = %self.session_id, "session logged out, supervisor stopping");
                    break;
                }
                Outcome::Stop => break,
                Outcome::Paused => continue,
                Outcome::Retry => {
                    debug!(
                        session_id = %self.session_id,
                        delay_secs = self.config.reconnect_delay_secs,
                        "scheduling reconnect"
                    );
                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_secs(
                            self.config.reconnect_delay_secs,
                        )) => {}
                    }
                }
            }
        }
        self.socket_slot.store(None);
        debug!(session_id = %self.session_id, "supervisor exited");
    }

    /// Blocks while the session is paused by the operator or by network
    /// health. Pause state is checked here, before every connect attempt.
    async fn wait_until_runnable(&mut self) -> Gate {
        loop {
            if self.cancel.is_cancelled() {
                return Gate::Stop;
            }

            if *self.control_rx.borrow() == ControlState::Paused {
                self.set_status(SessionStatus::PausedByUser).await;
                let changed = {
                    let control = &mut self.control_rx;
                    tokio::select! {
                        () = self.cancel.cancelled() => None,
                        res = control.changed() => Some(res),
                    }
                };
                match changed {
                    None | Some(Err(_)) => return Gate::Stop,
                    Some(Ok(())) => continue,
                }
            }

            let network_down = self
                .network_rx
                .as_ref()
                .is_some_and(|rx| !*rx.borrow());
            if network_down {
                self.set_status(SessionStatus::PausedByNetwork).await;
                let Some(network) = self.network_rx.as_mut() else {
                    return Gate::Proceed;
                };
                let changed = tokio::select! {
                    () = self.cancel.cancelled() => None,
                    res = network.changed() => Some(res),
                };
                match changed {
                    None | Some(Err(_)) => return Gate::Stop,
                    Some(Ok(())) => continue,
                }
            }

            return Gate::Proceed;
        }
    }

    /// One full connection attempt: open the socket, pair if the credentials
    /// are unregistered, then drive events until the connection ends.
    async fn connect_once(&mut self) -> Outcome {
        self.set_status(SessionStatus::Connecting).await;

        let creds = match self
            .storage
            .credentials()
            .load_creds(&self.session_id)
            .await
        {
            Ok(creds) => creds,
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "failed to load credentials");
                return Outcome::Retry;
            }
        };

        let spec = EngineSessionSpec {
            session_id: self.session_id.clone(),
            credentials: creds,
        };
        let EngineConnection { socket, mut events } = match self.engine.open(spec).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "engine open failed");
                return Outcome::Retry;
            }
        };
        self.socket_slot
            .store(Some(Arc::new(LiveSocket(socket.clone()))));

        // Connection-scoped token for the settle task spawned on open.
        let settle_cancel = self.cancel.child_token();

        if !socket.is_registered() {
            // Let the fresh socket finish its handshake before asking.
            tokio::select! {
                () = self.cancel.cancelled() => {
                    socket.close().await;
                    self.socket_slot.store(None);
                    return Outcome::Stop;
                }
                () = tokio::time::sleep(Duration::from_secs(
                    self.config.pairing_request_delay_secs,
                )) => {}
            }
            self.set_status(SessionStatus::Pairing).await;
            match socket.request_pairing_code(&self.session_id).await {
                Ok(code) => {
                    info!(session_id = %self.session_id, "pairing code issued");
                    self.snapshot_tx.send_modify(|snapshot| {
                        snapshot.pairing_code = Some(code);
                    });
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "pairing code request failed");
                    socket.close().await;
                    self.socket_slot.store(None);
                    return Outcome::Retry;
                }
            }
        }

        let outcome = self.drive_events(&socket, &mut events, &settle_cancel).await;
        settle_cancel.cancel();
        self.socket_slot.store(None);
        outcome
    }

    /// Processes engine events in arrival order until the connection ends.
    async fn drive_events(
        &mut self,
        socket: &Arc<dyn EngineSocket>,
        events: &mut mpsc::Receiver<EngineEvent>,
        settle_cancel: &CancellationToken,
    ) -> Outcome {
        let cancel = self.cancel.clone();
        let mut control = self.control_rx.clone();
        let mut network = self.network_rx.clone();
        let mut roster_synced = false;

        // A pause requested while the connection was being set up must not
        // be lost to the watch cursor.
        if *control.borrow_and_update() == ControlState::Paused {
            socket.close().await;
            return Outcome::Paused;
        }

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    socket.close().await;
                    return Outcome::Stop;
                }
                res = control.changed() => {
                    if res.is_err() {
                        socket.close().await;
                        return Outcome::Stop;
                    }
                    if *control.borrow() == ControlState::Paused {
                        info!(session_id = %self.session_id, "pause requested, closing socket");
                        socket.close().await;
                        return Outcome::Paused;
                    }
                }
                () = network_unreachable(&mut network) => {
                    warn!(session_id = %self.session_id, "network unreachable, closing socket");
                    socket.close().await;
                    return Outcome::Paused;
                }
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else {
                        warn!(session_id = %self.session_id, "engine event stream ended");
                        return Outcome::Retry;
                    };
                    if let Some(outcome) = self
                        .handle_event(socket, settle_cancel, &mut roster_synced, event)
                        .await
                    {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Applies one engine event. Returns an outcome only when the event ends
    /// the connection.
    async fn handle_event(
        &mut self,
        socket: &Arc<dyn EngineSocket>,
        settle_cancel: &CancellationToken,
        roster_synced: &mut bool,
        event: EngineEvent,
    ) -> Option<Outcome> {
        match event {
            EngineEvent::ConnectionUpdate { connection, close } => {
                if let Some(cause) = close {
                    return Some(if cause.is_terminal() {
                        Outcome::Terminal
                    } else {
                        info!(session_id = %self.session_id, ?cause, "connection closed, will reconnect");
                        Outcome::Retry
                    });
                }
                match connection {
                    Some(ConnectionState::Open) => {
                        self.on_open(socket, settle_cancel, roster_synced).await;
                    }
                    Some(ConnectionState::Close) => {
                        info!(session_id = %self.session_id, "connection closed without cause, will reconnect");
                        return Some(Outcome::Retry);
                    }
                    _ => {}
                }
                None
            }
            EngineEvent::CredentialsUpdate(blob) => {
                if let Err(e) = self
                    .storage
                    .credentials()
                    .write_creds(&self.session_id, &blob)
                    .await
                {
                    // Tier desync risk: this must never be silently dropped.
                    error!(session_id = %self.session_id, error = %e, "credential checkpoint failed");
                }
                None
            }
            EngineEvent::KeysUpdate(writes) => {
                for write in writes {
                    let result = match &write.value {
                        Some(value) => {
                            self.storage
                                .credentials()
                                .write(&self.session_id, &write.category, &write.id, value)
                                .await
                        }
                        None => {
                            self.storage
                                .credentials()
                                .remove(&self.session_id, &write.category, &write.id)
                                .await
                        }
                    };
                    if let Err(e) = result {
                        error!(
                            session_id = %self.session_id,
                            category = %write.category,
                            key_id = %write.id,
                            error = %e,
                            "key store write failed"
                        );
                    }
                }
                None
            }
            EngineEvent::MessageUpsert(messages) => {
                for message in messages {
                    self.on_message(&message).await;
                }
                None
            }
            EngineEvent::MessageReceipt {
                message_id,
                destination,
                status,
            } => {
                match status {
                    ReceiptStatus::Delivered => self.retry.mark_success(&message_id),
                    ReceiptStatus::Retry => {
                        self.on_retry_receipt(socket, &message_id, &destination).await;
                    }
                }
                None
            }
            EngineEvent::GroupsUpsert(groups) => {
                for metadata in groups {
                    if let Err(e) = self.storage.groups().upsert(&self.session_id, &metadata).await
                    {
                        warn!(session_id = %self.session_id, error = %e, "group upsert failed");
                    }
                }
                None
            }
            EngineEvent::GroupsUpdate(updates) => {
                for update in updates {
                    if let Err(e) = self.storage.groups().upsert(&self.session_id, &update).await {
                        warn!(session_id = %self.session_id, error = %e, "group update failed");
                    }
                }
                None
            }
            EngineEvent::GroupParticipantsUpdate { group_id, .. } => {
                // Membership changed: re-fetch the authoritative snapshot.
                match socket.fetch_group_metadata(&group_id).await {
                    Ok(metadata) => {
                        if let Err(e) =
                            self.storage.groups().upsert(&self.session_id, &metadata).await
                        {
                            warn!(session_id = %self.session_id, group_id, error = %e, "group refresh failed");
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %self.session_id, group_id, error = %e, "group metadata fetch failed");
                    }
                }
                None
            }
        }
    }

    async fn on_open(
        &mut self,
        socket: &Arc<dyn EngineSocket>,
        settle_cancel: &CancellationToken,
        roster_synced: &mut bool,
    ) {
        self.set_status(SessionStatus::Connected).await;
        self.snapshot_tx
            .send_modify(|snapshot| snapshot.pairing_code = None);

        if *roster_synced {
            return;
        }
        *roster_synced = true;

        // One-time roster sync after a settling delay, off the event loop so
        // credential writes keep their arrival order. The engine runs its
        // own initial sync right after open; racing it produces partial
        // snapshots.
        let delay = Duration::from_secs(self.config.roster_sync_delay_secs);
        let storage = self.storage.clone();
        let session_id = self.session_id.clone();
        let socket = socket.clone();
        let snapshot_tx = self.snapshot_tx.clone();
        let cancel = settle_cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }

            match storage.groups().sync_all(&session_id, socket.as_ref()).await {
                Ok(count) => debug!(session_id = %session_id, count, "initial roster sync complete"),
                Err(e) => warn!(session_id = %session_id, error = %e, "initial roster sync failed"),
            }

            // Refresh the durable row with the live profile; every fetch is
            // best-effort.
            let Some(user) = socket.user() else { return };
            let is_business = socket
                .business_profile_exists(&user.stable_id)
                .await
                .unwrap_or(false);
            let profile_url = socket
                .profile_picture_url(&user.stable_id)
                .await
                .unwrap_or(None);
            if let Err(e) = storage
                .update_session_profile(
                    &session_id,
                    user.display_name.clone(),
                    profile_url.clone(),
                    is_business,
                )
                .await
            {
                warn!(session_id = %session_id, error = %e, "failed to persist live profile");
            }
            snapshot_tx.send_modify(|snapshot| {
                snapshot.display_name = user.display_name;
                snapshot.profile_url = profile_url;
            });
        });
    }

    async fn on_message(&mut self, message: &EngineMessage) {
        if let Err(e) = self.storage.messages().save(&self.session_id, message).await {
            warn!(session_id = %self.session_id, message_id = %message.id, error = %e, "failed to archive message");
        }

        if message.from_me {
            self.stats.record_sent(&self.session_id);
            self.retry
                .remember(&message.chat_id, &message.id, message.content.clone());
        } else {
            self.stats.record_received(&self.session_id);
            if let Some(commands) = &self.commands {
                if let Err(e) = commands.dispatch(&self.session_id, message).await {
                    warn!(session_id = %self.session_id, message_id = %message.id, error = %e, "command dispatch failed");
                }
            }
        }
    }

    /// The peer failed to decrypt an outbound message and asked for a
    /// retransmission.
    async fn on_retry_receipt(
        &self,
        socket: &Arc<dyn EngineSocket>,
        message_id: &str,
        destination: &str,
    ) {
        let count = self.retry.increment_retry(message_id);
        if self.retry.has_exceeded_max(message_id) {
            let err = WabridgeError::RetryExhausted(message_id.to_string());
            warn!(session_id = %self.session_id, count, error = %err, "giving up on message");
            self.retry.mark_failed(message_id);
            return;
        }

        let has_session = match socket.has_crypto_session(destination).await {
            Ok(has) => has,
            Err(e) => {
                warn!(session_id = %self.session_id, destination, error = %e, "crypto session query failed");
                false
            }
        };
        let decision = self
            .retry
            .should_recreate_session(destination, count, has_session);
        if decision.recreate {
            info!(
                session_id = %self.session_id,
                destination,
                reason = decision.reason,
                "recreating crypto session"
            );
            if let Err(e) = socket.recreate_crypto_session(destination).await {
                warn!(session_id = %self.session_id, destination, error = %e, "crypto session recreation failed");
            }
        }

        if let Some(content) = self.retry.recent_message(destination, message_id) {
            if let Err(e) = socket.send_message(destination, content).await {
                warn!(session_id = %self.session_id, message_id, error = %e, "retransmission failed");
            }
        } else {
            // Content already aged out of the cache: ask the peer's primary
            // device to resend it, debounced per message id.
            let socket = socket.clone();
            let destination = destination.to_string();
            let id = message_id.to_string();
            self.retry
                .schedule_recovery_request(message_id, self.recovery_delay, async move {
                    if let Err(e) = socket.request_message_recovery(&destination, &id).await {
                        warn!(message_id = %id, error = %e, "recovery request failed");
                    }
                });
        }
    }

    /// Publishes and persists a status transition.
    async fn set_status(&self, status: SessionStatus) {
        let changed = self.snapshot_tx.send_if_modified(|snapshot| {
            if snapshot.status == status {
                return false;
            }
            snapshot.status = status;
            if status != SessionStatus::Pairing {
                snapshot.pairing_code = None;
            }
            true
        });
        if changed {
            info!(session_id = %self.session_id, status = %status, "session status changed");
        }
        if let Err(e) = self.storage.set_session_status(&self.session_id, status).await {
            warn!(session_id = %self.session_id, error = %e, "failed to persist session status");
        }
    }
}

/// Resolves when the health signal reports unreachability; pends forever
/// when no monitor is wired in.
async fn network_unreachable(network: &mut Option<watch::Receiver<bool>>) {
    match network {
        Some(rx) => loop {
            if !*rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending().await,
    }
}
