// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted [`ProtocolEngine`] and [`EngineSocket`] implementations.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use wabridge_core::{
    EngineConnection, EngineEvent, EngineSessionSpec, EngineSocket, EngineUser, MessageId,
    ProtocolEngine, WabridgeError,
};

/// Event channel capacity for scripted connections.
const EVENT_BUFFER: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ScriptedConnection {
    socket: Arc<MockSocket>,
    events: mpsc::Receiver<EngineEvent>,
}

/// Protocol engine double that pops one scripted connection per `open`.
///
/// An unscripted `open` fails with [`WabridgeError::ConnectionFailed`], so a
/// supervisor with nothing left to connect to just keeps backing off.
#[derive(Default)]
pub struct MockEngine {
    connections: Mutex<VecDeque<ScriptedConnection>>,
    opened: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a connection for the next `open` call and returns the sender
    /// used to inject its events.
    pub fn script_connection(&self, socket: Arc<MockSocket>) -> mpsc::Sender<EngineEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        lock(&self.connections).push_back(ScriptedConnection { socket, events: rx });
        tx
    }

    /// Number of `open` calls observed so far.
    pub fn open_count(&self) -> usize {
        lock(&self.opened).len()
    }

    /// Session ids passed to `open`, in call order.
    pub fn opened_sessions(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }
}

#[async_trait]
impl ProtocolEngine for MockEngine {
    async fn open(&self, spec: EngineSessionSpec) -> Result<EngineConnection, WabridgeError> {
        lock(&self.opened).push(spec.session_id.clone());
        let conn = lock(&self.connections).pop_front().ok_or_else(|| {
            WabridgeError::ConnectionFailed(format!(
                "no scripted connection available for {}",
                spec.session_id
            ))
        })?;
        Ok(EngineConnection {
            socket: conn.socket,
            events: conn.events,
        })
    }
}

/// Recording socket double.
pub struct MockSocket {
    registered: AtomicBool,
    pairing_code: String,
    user: Mutex<Option<EngineUser>>,
    groups: Mutex<Vec<serde_json::Value>>,
    group_metadata: Mutex<HashMap<String, serde_json::Value>>,
    crypto_sessions: Mutex<HashSet<String>>,
    is_business: bool,
    picture_url: Option<String>,
    sent: Mutex<Vec<(String, serde_json::Value)>>,
    recreated: Mutex<Vec<String>>,
    recoveries: Mutex<Vec<(String, String)>>,
    closed: AtomicBool,
    logged_out: AtomicBool,
}

impl Default for MockSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSocket {
    /// A registered socket with an 8-digit pairing code on standby.
    pub fn new() -> Self {
        Self {
            registered: AtomicBool::new(true),
            pairing_code: "73214968".to_string(),
            user: Mutex::new(None),
            groups: Mutex::new(Vec::new()),
            group_metadata: Mutex::new(HashMap::new()),
            crypto_sessions: Mutex::new(HashSet::new()),
            is_business: false,
            picture_url: None,
            sent: Mutex::new(Vec::new()),
            recreated: Mutex::new(Vec::new()),
            recoveries: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            logged_out: AtomicBool::new(false),
        }
    }

    /// A socket whose credentials are not yet registered: the supervisor
    /// must go through pairing.
    pub fn unregistered() -> Self {
        let socket = Self::new();
        socket.registered.store(false, Ordering::SeqCst);
        socket
    }

    pub fn with_pairing_code(mut self, code: &str) -> Self {
        self.pairing_code = code.to_string();
        self
    }

    pub fn with_user(self, user: EngineUser) -> Self {
        *lock(&self.user) = Some(user);
        self
    }

    pub fn with_group(self, metadata: serde_json::Value) -> Self {
        lock(&self.groups).push(metadata);
        self
    }

    pub fn with_group_metadata(self, group_id: &str, metadata: serde_json::Value) -> Self {
        lock(&self.group_metadata).insert(group_id.to_string(), metadata);
        self
    }

    pub fn with_crypto_session(self, destination: &str) -> Self {
        lock(&self.crypto_sessions).insert(destination.to_string());
        self
    }

    pub fn with_business(mut self, is_business: bool) -> Self {
        self.is_business = is_business;
        self
    }

    pub fn with_picture_url(mut self, url: &str) -> Self {
        self.picture_url = Some(url.to_string());
        self
    }

    // --- Recorded observations ---

    pub fn sent_messages(&self) -> Vec<(String, serde_json::Value)> {
        lock(&self.sent).clone()
    }

    pub fn recreated_sessions(&self) -> Vec<String> {
        lock(&self.recreated).clone()
    }

    pub fn recovery_requests(&self) -> Vec<(String, String)> {
        lock(&self.recoveries).clone()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn was_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineSocket for MockSocket {
    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    fn user(&self) -> Option<EngineUser> {
        lock(&self.user).clone()
    }

    async fn request_pairing_code(&self, _identifier: &str) -> Result<String, WabridgeError> {
        Ok(self.pairing_code.clone())
    }

    async fn send_message(
        &self,
        to: &str,
        content: serde_json::Value,
    ) -> Result<MessageId, WabridgeError> {
        lock(&self.sent).push((to.to_string(), content));
        Ok(MessageId(uuid::Uuid::new_v4().to_string()))
    }

    async fn fetch_all_participating_groups(
        &self,
    ) -> Result<Vec<serde_json::Value>, WabridgeError> {
        Ok(lock(&self.groups).clone())
    }

    async fn fetch_group_metadata(
        &self,
        group_id: &str,
    ) -> Result<serde_json::Value, WabridgeError> {
        lock(&self.group_metadata)
            .get(group_id)
            .cloned()
            .ok_or_else(|| WabridgeError::Engine {
                message: format!("no metadata scripted for group {group_id}"),
                source: None,
            })
    }

    async fn business_profile_exists(&self, _id: &str) -> Result<bool, WabridgeError> {
        Ok(self.is_business)
    }

    async fn profile_picture_url(&self, _id: &str) -> Result<Option<String>, WabridgeError> {
        Ok(self.picture_url.clone())
    }

    async fn has_crypto_session(&self, destination: &str) -> Result<bool, WabridgeError> {
        Ok(lock(&self.crypto_sessions).contains(destination))
    }

    async fn recreate_crypto_session(&self, destination: &str) -> Result<(), WabridgeError> {
        lock(&self.recreated).push(destination.to_string());
        lock(&self.crypto_sessions).insert(destination.to_string());
        Ok(())
    }

    async fn request_message_recovery(
        &self,
        destination: &str,
        message_id: &str,
    ) -> Result<(), WabridgeError> {
        lock(&self.recoveries).push((destination.to_string(), message_id.to_string()));
        Ok(())
    }

    async fn logout(&self) -> Result<(), WabridgeError> {
        self.logged_out.store(true, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
