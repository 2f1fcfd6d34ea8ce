// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host-level network health monitor.
//!
//! Publishes a boolean reachability signal every supervisor watches. The
//! signal flips to unhealthy only after a configured number of consecutive
//! probe failures, so one flaky probe does not pause every session, and
//! flips back on the first success. This keeps "the host has no
//! connectivity" distinct from "the operator paused this session".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wabridge_config::NetworkConfig;

/// One reachability probe. Implementations typically resolve or ping a
/// well-known endpoint.
#[async_trait]
pub trait NetworkProbe: Send + Sync + 'static {
    /// Returns true when the host currently has connectivity.
    async fn probe(&self) -> bool;
}

/// Spawns the monitor task and returns the health signal.
///
/// The signal starts healthy; the task stops when `cancel` fires.
pub fn spawn_network_monitor(
    probe: Arc<dyn NetworkProbe>,
    config: &NetworkConfig,
    cancel: CancellationToken,
) -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(true);
    let interval = Duration::from_secs(config.check_interval_secs);
    let threshold = config.failure_threshold.max(1);

    tokio::spawn(async move {
        let mut consecutive_failures = 0u32;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }

            if probe.probe().await {
                if consecutive_failures >= threshold {
                    info!("network reachability restored");
                }
                consecutive_failures = 0;
                tx.send_if_modified(|healthy| {
                    let changed = !*healthy;
                    *healthy = true;
                    changed
                });
            } else {
                consecutive_failures += 1;
                if consecutive_failures == threshold {
                    warn!(consecutive_failures, "sustained network unreachability, pausing sessions");
                }
                if consecutive_failures >= threshold {
                    tx.send_if_modified(|healthy| {
                        let changed = *healthy;
                        *healthy = false;
                        changed
                    });
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ScriptedProbe {
        up: AtomicBool,
    }

    #[async_trait]
    impl NetworkProbe for ScriptedProbe {
        async fn probe(&self) -> bool {
            self.up.load(Ordering::SeqCst)
        }
    }

    fn config() -> NetworkConfig {
        NetworkConfig {
            enabled: true,
            check_interval_secs: 1,
            failure_threshold: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn flips_unhealthy_only_after_threshold_failures() {
        let probe = Arc::new(ScriptedProbe {
            up: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();
        let mut rx = spawn_network_monitor(probe, &config(), cancel.clone());

        assert!(*rx.borrow());

        // The paused clock auto-advances while we wait; the signal must not
        // flip before the third consecutive failure at t = 3s.
        let start = tokio::time::Instant::now();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
        assert!(start.elapsed() >= Duration::from_secs(3));

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_first_successful_probe() {
        let probe = Arc::new(ScriptedProbe {
            up: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();
        let mut rx = spawn_network_monitor(
            Arc::clone(&probe) as Arc<dyn NetworkProbe>,
            &config(),
            cancel.clone(),
        );

        rx.changed().await.unwrap();
        assert!(!*rx.borrow());

        probe.up.store(true, Ordering::SeqCst);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());

        cancel.cancel();
    }
}
