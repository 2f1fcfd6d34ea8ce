// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle management for the Wabridge workspace.
//!
//! The [`SessionRegistry`] is the embedding surface: it owns every live
//! session, runs one connection supervisor task per session, and composes
//! the credential store, identity resolver, group cache, and retry
//! coordinator around the external protocol engine.

pub mod network;
pub mod registry;
pub mod retry;
pub mod stats;
pub mod supervisor;

pub use network::{spawn_network_monitor, NetworkProbe};
pub use registry::{CreatedSession, RestoreReport, SessionRegistry, SessionStats};
pub use retry::{RecreateDecision, RetryCoordinator, RetryStatistics};
pub use stats::{OverallStats, RuntimeStats, SessionCounters};
pub use supervisor::SessionSnapshot;
