//! MAC address normalization.
//!
//! Users type MACs with `:`/`-`/`.` separators in any case; Central stores
//! and expects them in various shapes per endpoint. All cache comparisons
//! happen on the normalized form: uppercase hex, no separators.

/// Normalize a MAC-ish string to uppercase hex with separators stripped.
///
/// Returns `None` when the input is not exactly 12 hex digits after
/// stripping, so callers can skip the MAC tier for non-MAC queries.
#[must_use]
pub fn normalize_mac(raw: &str) -> Option<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if stripped.len() == 12 && stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(stripped)
    } else {
        None
    }
}

/// Normalized prefix for partial-MAC queries (clients are often picked out
/// by the first octets). Same stripping rules, but any length up to 12 is
/// accepted.
#[must_use]
pub fn normalize_mac_prefix(raw: &str) -> Option<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !stripped.is_empty() && stripped.len() <= 12 && stripped.chars().all(|c| c.is_ascii_hexdigit())
    {
        Some(stripped)
    } else {
        None
    }
}
