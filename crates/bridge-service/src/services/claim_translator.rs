//! Pure claim and name transformations applied when bridging a handshake
//! identity into a token.

use crate::identity::Principal;
use common::claims::{kinds, ClaimSet};

/// Claim kinds copied from the principal into the token, in this order.
pub const OUTGOING_KINDS: [&str; 2] = [kinds::NAME, kinds::GROUP];

/// Rewrite `DOMAIN\user` to `user@DOMAIN`.
///
/// The name is split at the first backslash and both parts must be
/// non-empty; any other input is returned unchanged.
#[must_use]
pub fn translate_name(raw: &str) -> String {
    match raw.split_once('\\') {
        Some((domain, user)) if !domain.is_empty() && !user.is_empty() => {
            format!("{user}@{domain}")
        }
        _ => raw.to_string(),
    }
}

/// Drop bulk group-membership claims unless `keep_bulk_group_claims` is set.
///
/// Callers that have no preference should pass `false`. Order of the
/// remaining claims is preserved.
#[must_use]
pub fn filter_claims(claims: &ClaimSet, keep_bulk_group_claims: bool) -> ClaimSet {
    if keep_bulk_group_claims {
        return claims.clone();
    }
    claims.clone().retain_kinds(|kind| kind != kinds::GROUP)
}

/// The principal's claims that travel inside the token.
#[must_use]
pub fn outgoing_claims(principal: &Principal) -> ClaimSet {
    principal
        .claims()
        .clone()
        .retain_kinds(|kind| OUTGOING_KINDS.contains(&kind))
}
