// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session message retry coordination.
//!
//! Remembers recently sent content (LRU + TTL bounded), counts delivery
//! retries per message against a configurable ceiling, decides when the
//! cryptographic session for a destination must be rebuilt, and debounces
//! out-of-band recovery requests so at most one is pending per message id.
//!
//! Eviction is advisory cleanup and interleaves freely with the normal
//! operations: a message can be marked failed after its entry was already
//! evicted. The LRU queue stores insertion timestamps so stale queue entries
//! for re-remembered keys are detected and skipped instead of evicting the
//! fresh entry.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use wabridge_config::RetryConfig;

/// Separator joining destination and message id into one cache key.
const KEY_SEPARATOR: char = '\u{0}';

/// Outcome of a session-recreation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecreateDecision {
    pub recreate: bool,
    pub reason: &'static str,
}

/// Counters exposed to the stats surface.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RetryStatistics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_retries: u64,
    pub session_recreations: u64,
    pub recovery_requests: u64,
}

struct RecentMessage {
    content: serde_json::Value,
    stored_at: Instant,
}

struct LruEntry {
    key: String,
    stored_at: Instant,
}

struct CounterEntry {
    count: u32,
    touched_at: Instant,
}

#[derive(Default)]
struct RetryState {
    recent: HashMap<String, RecentMessage>,
    lru: VecDeque<LruEntry>,
    /// message id -> recent cache key, kept consistent with `recent` on
    /// every eviction path.
    index: HashMap<String, String>,
    counters: HashMap<String, CounterEntry>,
    recreate_history: HashMap<String, Instant>,
    pending: HashMap<String, JoinHandle<()>>,
    stats: RetryStatistics,
}

/// Retry coordination for one session.
pub struct RetryCoordinator {
    max_retries: u32,
    recent_capacity: usize,
    recent_ttl: Duration,
    counter_ttl: Duration,
    recreate_cooldown: Duration,
    inner: Arc<Mutex<RetryState>>,
}

impl RetryCoordinator {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            recent_capacity: config.recent_capacity.max(1),
            recent_ttl: Duration::from_secs(config.recent_ttl_secs),
            counter_ttl: Duration::from_secs(config.counter_ttl_secs),
            recreate_cooldown: Duration::from_secs(config.recreate_cooldown_secs),
            inner: Arc::new(Mutex::new(RetryState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, RetryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remembers outbound content so a retry receipt can be answered with a
    /// retransmission.
    pub fn remember(&self, destination: &str, message_id: &str, content: serde_json::Value) {
        let now = Instant::now();
        let mut state = self.state();
        state.purge_expired(now, self.recent_ttl, self.counter_ttl, self.recreate_cooldown);
        while state.recent.len() >= self.recent_capacity {
            if !state.evict_oldest() {
                break;
            }
        }

        let key = entry_key(destination, message_id);
        state.recent.insert(
            key.clone(),
            RecentMessage {
                content,
                stored_at: now,
            },
        );
        state.index.insert(message_id.to_string(), key.clone());
        state.lru.push_back(LruEntry {
            key,
            stored_at: now,
        });
        debug!(destination, message_id, "added message to retry cache");
    }

    /// Returns the remembered content for a destination/message pair, if it
    /// is still live.
    pub fn recent_message(&self, destination: &str, message_id: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        let state = self.state();
        let entry = state.recent.get(&entry_key(destination, message_id))?;
        if now.duration_since(entry.stored_at) > self.recent_ttl {
            return None;
        }
        Some(entry.content.clone())
    }

    /// Decides whether the cryptographic session for a destination must be
    /// rebuilt before the next delivery attempt.
    ///
    /// Recreates unconditionally when no session exists; otherwise only when
    /// the retry count has reached 2 and the cooldown since the last
    /// recreation for that destination has elapsed (or none was recorded).
    pub fn should_recreate_session(
        &self,
        destination: &str,
        retry_count: u32,
        has_crypto_session: bool,
    ) -> RecreateDecision {
        let now = Instant::now();
        let mut state = self.state();

        if !has_crypto_session {
            state.recreate_history.insert(destination.to_string(), now);
            state.stats.session_recreations += 1;
            return RecreateDecision {
                recreate: true,
                reason: "no crypto session with destination",
            };
        }

        if retry_count < 2 {
            return RecreateDecision {
                recreate: false,
                reason: "",
            };
        }

        let cooled_down = state
            .recreate_history
            .get(destination)
            .is_none_or(|prev| now.duration_since(*prev) > self.recreate_cooldown);
        if cooled_down {
            state.recreate_history.insert(destination.to_string(), now);
            state.stats.session_recreations += 1;
            return RecreateDecision {
                recreate: true,
                reason: "retry count >= 2 and recreation cooldown elapsed",
            };
        }

        RecreateDecision {
            recreate: false,
            reason: "",
        }
    }

    /// Bumps and returns the retry counter for a message.
    pub fn increment_retry(&self, message_id: &str) -> u32 {
        let now = Instant::now();
        let mut state = self.state();
        state.purge_expired(now, self.recent_ttl, self.counter_ttl, self.recreate_cooldown);
        let entry = state
            .counters
            .entry(message_id.to_string())
            .or_insert(CounterEntry {
                count: 0,
                touched_at: now,
            });
        entry.count += 1;
        entry.touched_at = now;
        let count = entry.count;
        state.stats.total_retries += 1;
        count
    }

    /// Current retry count for a message. Reading slides the counter's TTL.
    pub fn retry_count(&self, message_id: &str) -> u32 {
        let now = Instant::now();
        let mut state = self.state();
        match state.counters.get_mut(message_id) {
            Some(entry) if now.duration_since(entry.touched_at) <= self.counter_ttl => {
                entry.touched_at = now;
                entry.count
            }
            _ => 0,
        }
    }

    /// Whether the message has hit the configured retry ceiling.
    pub fn has_exceeded_max(&self, message_id: &str) -> bool {
        self.retry_count(message_id) >= self.max_retries
    }

    /// Ends a message's retry bookkeeping after a confirmed delivery.
    pub fn mark_success(&self, message_id: &str) {
        self.finish(message_id, true);
    }

    /// Ends a message's retry bookkeeping after giving up on it.
    pub fn mark_failed(&self, message_id: &str) {
        self.finish(message_id, false);
    }

    fn finish(&self, message_id: &str, success: bool) {
        let mut state = self.state();
        if success {
            state.stats.successful_retries += 1;
        } else {
            state.stats.failed_retries += 1;
        }
        state.counters.remove(message_id);
        if let Some(handle) = state.pending.remove(message_id) {
            handle.abort();
            debug!(message_id, "cancelled pending recovery request");
        }
        state.remove_recent(message_id);
    }

    /// Schedules a debounced out-of-band recovery request.
    ///
    /// Re-scheduling for the same message id cancels the prior pending
    /// request: at most one callback is ever pending per id.
    pub fn schedule_recovery_request<F>(&self, message_id: &str, delay: Duration, request: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let id = message_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
                state.pending.remove(&id);
                state.stats.recovery_requests += 1;
            }
            request.await;
        });

        let mut state = self.state();
        if let Some(prev) = state.pending.insert(message_id.to_string(), handle) {
            prev.abort();
            debug!(message_id, "superseded pending recovery request");
        }
    }

    /// Snapshot of the retry counters.
    pub fn stats(&self) -> RetryStatistics {
        self.state().stats
    }

    /// Drops all state and cancels every pending recovery request. Used when
    /// the owning session is deleted.
    pub fn clear(&self) {
        let mut state = self.state();
        for (_, handle) in state.pending.drain() {
            handle.abort();
        }
        state.recent.clear();
        state.lru.clear();
        state.index.clear();
        state.counters.clear();
        state.recreate_history.clear();
    }
}

impl RetryState {
    /// Drops TTL-expired entries from every table.
    fn purge_expired(
        &mut self,
        now: Instant,
        recent_ttl: Duration,
        counter_ttl: Duration,
        recreate_cooldown: Duration,
    ) {
        let mut expired_keys = Vec::new();
        self.recent.retain(|key, entry| {
            let live = now.duration_since(entry.stored_at) <= recent_ttl;
            if !live {
                expired_keys.push(key.clone());
            }
            live
        });
        for key in expired_keys {
            if let Some(message_id) = message_id_of(&key) {
                self.index.remove(message_id);
            }
        }

        self.counters
            .retain(|_, entry| now.duration_since(entry.touched_at) <= counter_ttl);
        // History entries are only meaningful within the cooldown window;
        // keep twice that as slack.
        self.recreate_history
            .retain(|_, at| now.duration_since(*at) <= recreate_cooldown * 2);
    }

    /// Evicts the least-recently-remembered entry, skipping stale queue
    /// entries whose key was re-remembered since. Returns false when the
    /// queue is drained.
    fn evict_oldest(&mut self) -> bool {
        while let Some(candidate) = self.lru.pop_front() {
            let matches = self
                .recent
                .get(&candidate.key)
                .is_some_and(|entry| entry.stored_at == candidate.stored_at);
            if !matches {
                continue;
            }
            self.recent.remove(&candidate.key);
            if let Some(message_id) = message_id_of(&candidate.key) {
                self.index.remove(message_id);
            }
            return true;
        }
        false
    }

    fn remove_recent(&mut self, message_id: &str) {
        if let Some(key) = self.index.remove(message_id) {
            self.recent.remove(&key);
        }
    }
}

fn entry_key(destination: &str, message_id: &str) -> String {
    format!("{destination}{KEY_SEPARATOR}{message_id}")
}

fn message_id_of(key: &str) -> Option<&str> {
    key.rsplit_once(KEY_SEPARATOR).map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn coordinator(config: RetryConfig) -> RetryCoordinator {
        RetryCoordinator::new(&config)
    }

    fn default_coordinator() -> RetryCoordinator {
        coordinator(RetryConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn remember_and_fetch_round_trips() {
        let retry = default_coordinator();
        retry.remember("d1", "m1", json!({"text": "hi"}));

        assert_eq!(retry.recent_message("d1", "m1"), Some(json!({"text": "hi"})));
        assert_eq!(retry.recent_message("d2", "m1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn recreate_without_crypto_session_regardless_of_count() {
        let retry = default_coordinator();
        let decision = retry.should_recreate_session("d1", 0, false);
        assert!(decision.recreate);
    }

    #[tokio::test(start_paused = true)]
    async fn no_recreate_below_two_retries() {
        let retry = default_coordinator();
        let decision = retry.should_recreate_session("d1", 1, true);
        assert!(!decision.recreate);
    }

    #[tokio::test(start_paused = true)]
    async fn recreate_after_cooldown_elapsed() {
        let retry = default_coordinator();
        // Record a recreation, then move past the one-hour cooldown.
        assert!(retry.should_recreate_session("d1", 3, false).recreate);
        tokio::time::advance(Duration::from_secs(2 * 3600)).await;

        let decision = retry.should_recreate_session("d1", 3, true);
        assert!(decision.recreate);
    }

    #[tokio::test(start_paused = true)]
    async fn no_recreate_within_cooldown() {
        let retry = default_coordinator();
        assert!(retry.should_recreate_session("d1", 3, false).recreate);
        tokio::time::advance(Duration::from_secs(600)).await;

        let decision = retry.should_recreate_session("d1", 3, true);
        assert!(!decision.recreate);
    }

    #[tokio::test(start_paused = true)]
    async fn recreate_with_no_history_and_enough_retries() {
        let retry = default_coordinator();
        let decision = retry.should_recreate_session("d1", 2, true);
        assert!(decision.recreate);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_counter_increments_and_caps() {
        let retry = coordinator(RetryConfig {
            max_retries: 3,
            ..RetryConfig::default()
        });

        assert_eq!(retry.increment_retry("m1"), 1);
        assert_eq!(retry.increment_retry("m1"), 2);
        assert!(!retry.has_exceeded_max("m1"));
        assert_eq!(retry.increment_retry("m1"), 3);
        assert!(retry.has_exceeded_max("m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn counters_expire_after_ttl() {
        let retry = coordinator(RetryConfig {
            counter_ttl_secs: 60,
            ..RetryConfig::default()
        });
        retry.increment_retry("m1");
        tokio::time::advance(Duration::from_secs(120)).await;

        assert_eq!(retry.retry_count("m1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_success_clears_entry_counter_and_pending_callback() {
        let retry = default_coordinator();
        let fired = Arc::new(AtomicUsize::new(0));

        retry.remember("d1", "m1", json!({"text": "hi"}));
        retry.increment_retry("m1");
        let fired_clone = Arc::clone(&fired);
        retry.schedule_recovery_request("m1", Duration::from_secs(3), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        retry.mark_success("m1");

        assert_eq!(retry.recent_message("d1", "m1"), None);
        assert_eq!(retry.retry_count("m1"), 0);

        // The fake clock moves well past the debounce delay: the cancelled
        // callback must never fire.
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_failed_after_eviction_is_harmless() {
        let retry = coordinator(RetryConfig {
            recent_capacity: 1,
            ..RetryConfig::default()
        });
        retry.remember("d1", "m1", json!(1));
        retry.remember("d1", "m2", json!(2)); // evicts m1

        assert_eq!(retry.recent_message("d1", "m1"), None);
        retry.mark_failed("m1");
        assert_eq!(retry.recent_message("d1", "m2"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn lru_eviction_purges_the_message_id_index() {
        let retry = coordinator(RetryConfig {
            recent_capacity: 2,
            ..RetryConfig::default()
        });
        retry.remember("d1", "m1", json!(1));
        retry.remember("d1", "m2", json!(2));
        retry.remember("d1", "m3", json!(3));

        assert_eq!(retry.recent_message("d1", "m1"), None);
        assert_eq!(retry.recent_message("d1", "m2"), Some(json!(2)));
        assert_eq!(retry.recent_message("d1", "m3"), Some(json!(3)));

        // Re-remembering the evicted id works from a clean slate.
        retry.remember("d1", "m1", json!(10));
        assert_eq!(retry.recent_message("d1", "m1"), Some(json!(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_queue_entries_are_skipped_during_eviction() {
        let retry = coordinator(RetryConfig {
            recent_capacity: 2,
            ..RetryConfig::default()
        });
        retry.remember("d1", "m1", json!(1));
        tokio::time::advance(Duration::from_millis(10)).await;
        retry.remember("d1", "m1", json!(2)); // same key, fresh timestamp
        retry.remember("d1", "m2", json!(3));

        // Capacity forces one eviction; the stale m1 queue entry is skipped
        // and m2's arrival evicts nothing fresh.
        retry.remember("d1", "m3", json!(4));
        assert_eq!(retry.recent_message("d1", "m1"), None);
        assert_eq!(retry.recent_message("d1", "m2"), Some(json!(3)));
        assert_eq!(retry.recent_message("d1", "m3"), Some(json!(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn remembered_entries_expire_after_ttl() {
        let retry = coordinator(RetryConfig {
            recent_ttl_secs: 60,
            ..RetryConfig::default()
        });
        retry.remember("d1", "m1", json!(1));
        tokio::time::advance(Duration::from_secs(120)).await;

        assert_eq!(retry.recent_message("d1", "m1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_requests_are_debounced_per_message_id() {
        let retry = default_coordinator();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired_clone = Arc::clone(&fired);
            retry.schedule_recovery_request("m1", Duration::from_secs(3), async move {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(retry.stats().recovery_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn statistics_track_outcomes() {
        let retry = default_coordinator();
        retry.increment_retry("m1");
        retry.increment_retry("m2");
        retry.mark_success("m1");
        retry.mark_failed("m2");
        retry.should_recreate_session("d1", 0, false);

        let stats = retry.stats();
        assert_eq!(stats.total_retries, 2);
        assert_eq!(stats.successful_retries, 1);
        assert_eq!(stats.failed_retries, 1);
        assert_eq!(stats.session_recreations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_requests() {
        let retry = default_coordinator();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        retry.schedule_recovery_request("m1", Duration::from_secs(3), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        retry.clear();
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
