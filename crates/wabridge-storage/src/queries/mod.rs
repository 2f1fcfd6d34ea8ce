// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules for the durable tier.

pub mod contacts;
pub mod credentials;
pub mod groups;
pub mod messages;
pub mod sessions;
