// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for the external protocol engine.
//!
//! [`MockEngine`] hands out scripted connections in order; [`MockSocket`]
//! records every operation so tests can assert on pairing, sends, crypto
//! session recreations, and recovery requests. Events are injected through
//! the `mpsc` sender returned by [`MockEngine::script_connection`].

pub mod mock_engine;

pub use mock_engine::{MockEngine, MockSocket};
