// SPDX-FileCopyrightText: 2026 Wabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for the protocol's dual identity scheme.
//!
//! Every user is addressed either by a stable, phone-number-shaped
//! identifier (`<digits>@s.whatsapp.net`) or by a privacy-preserving
//! alternate identifier (`<digits>@lid`). Groups and broadcast entities use
//! their own domains and must never be recorded as user identities.

/// Domain suffix of stable (phone-number-shaped) user identifiers.
pub const STABLE_DOMAIN: &str = "s.whatsapp.net";

/// Domain suffix of privacy-preserving alternate identifiers.
pub const ALTERNATE_DOMAIN: &str = "lid";

/// Domain suffix of group identifiers.
pub const GROUP_DOMAIN: &str = "g.us";

/// Strips the domain and any device suffix from an identifier.
///
/// `"15551230000:12@s.whatsapp.net"` becomes `"15551230000"`.
pub fn bare_id(id: &str) -> &str {
    let user = id.split('@').next().unwrap_or(id);
    user.split(':').next().unwrap_or(user)
}

/// Returns the domain portion of an identifier, if any.
pub fn domain(id: &str) -> Option<&str> {
    id.split_once('@').map(|(_, d)| d)
}

/// Whether the identifier names a primary user by its stable form.
///
/// The key-exchange stream intermixes mapping updates for regular users and
/// non-user entities (broadcast lists, newsletters, groups). Recording a
/// non-user value as a stable id would corrupt lookups, so callers filter
/// with this predicate before recording.
pub fn is_primary_user_id(id: &str) -> bool {
    let bare = bare_id(id);
    if bare.is_empty() || !bare.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match domain(id) {
        None => true,
        Some(d) => d == STABLE_DOMAIN,
    }
}

/// Whether the identifier is an alternate (privacy-preserving) identifier.
pub fn is_alternate_id(id: &str) -> bool {
    domain(id) == Some(ALTERNATE_DOMAIN)
}

/// Whether the identifier names a group.
pub fn is_group_id(id: &str) -> bool {
    domain(id) == Some(GROUP_DOMAIN)
}
