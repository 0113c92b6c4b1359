//! Claim types carried inside negotiated tokens.
//!
//! A [`ClaimSet`] is an ordered list of `(kind, value)` pairs. On the wire it
//! is flattened into the JWT payload as a JSON object: each claim kind becomes
//! one key (in first-appearance order), holding a string when the kind has a
//! single value and an array when it has several.
//!
//! ```text
//! [(name, "CORP\alice"), (group, "g1"), (group, "g2")]
//!     => {"name":"CORP\\alice","group":["g1","g2"]}
//! ```

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Well-known claim kinds.
pub mod kinds {
    /// The handshake-native principal name.
    pub const NAME: &str = "name";

    /// Group/role membership. Users commonly carry dozens to hundreds of
    /// these, so they are the bulk kind filtered out of summaries by default.
    pub const GROUP: &str = "group";

    /// Default name of the reserved claim that carries the principal's
    /// authentication type across the token round-trip.
    pub const AUTHENTICATION_TYPE: &str = "$AuthenticationType";

    /// Registered JWT claim names. These are owned by [`super::TokenClaims`]
    /// and never appear inside a [`super::ClaimSet`] on the wire.
    pub const REGISTERED: [&str; 7] = ["iss", "aud", "sub", "nbf", "iat", "exp", "jti"];

    /// Returns true if `kind` collides with a registered JWT claim name.
    #[must_use]
    pub fn is_registered(kind: &str) -> bool {
        REGISTERED.contains(&kind)
    }
}

/// A single `(kind, value)` claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub kind: String,
    pub value: String,
}

impl Claim {
    #[must_use]
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.value)
    }
}

/// Ordered collection of claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet(Vec<Claim>);

impl ClaimSet {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, claim: Claim) {
        self.0.push(claim);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Claim> {
        self.0.iter()
    }

    /// All values of the given kind, in order.
    pub fn values<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |c| c.kind == kind)
            .map(|c| c.value.as_str())
    }

    /// First value of the given kind.
    #[must_use]
    pub fn first(&self, kind: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.value.as_str())
    }

    /// Number of claims of the given kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.0.iter().filter(|c| c.kind == kind).count()
    }

    /// Keeps only the claims for which `keep` returns true, preserving order.
    #[must_use]
    pub fn retain_kinds(self, keep: impl Fn(&str) -> bool) -> Self {
        Self(self.0.into_iter().filter(|c| keep(&c.kind)).collect())
    }

    /// Claim kinds in first-appearance order.
    fn kinds_in_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        for claim in &self.0 {
            if !order.contains(&claim.kind.as_str()) {
                order.push(claim.kind.as_str());
            }
        }
        order
    }
}

impl From<Vec<Claim>> for ClaimSet {
    fn from(claims: Vec<Claim>) -> Self {
        Self(claims)
    }
}

impl FromIterator<Claim> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Claim> for ClaimSet {
    fn extend<I: IntoIterator<Item = Claim>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for ClaimSet {
    type Item = Claim;
    type IntoIter = std::vec::IntoIter<Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ClaimSet {
    type Item = &'a Claim;
    type IntoIter = std::slice::Iter<'a, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for ClaimSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kinds = self.kinds_in_order();
        let mut map = serializer.serialize_map(Some(kinds.len()))?;
        for kind in kinds {
            let values: Vec<&str> = self.values(kind).collect();
            match values.as_slice() {
                [single] => map.serialize_entry(kind, single)?,
                many => map.serialize_entry(kind, many)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClaimSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ClaimSetVisitor;

        impl<'de> Visitor<'de> for ClaimSetVisitor {
            type Value = ClaimSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of claim kinds to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ClaimSet, A::Error> {
                let mut claims = Vec::new();
                while let Some((kind, value)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    match value {
                        serde_json::Value::Array(items) => {
                            for item in items {
                                claims.push(Claim::new(kind.clone(), value_to_string(item)));
                            }
                        }
                        other => claims.push(Claim::new(kind, value_to_string(other))),
                    }
                }
                Ok(ClaimSet(claims))
            }
        }

        deserializer.deserialize_map(ClaimSetVisitor)
    }
}

fn value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Payload of a negotiated token.
///
/// `sub` carries the canonical (`user@DOMAIN`) name. Everything that is not a
/// registered claim lives in the flattened [`ClaimSet`], including the
/// reserved authentication-type claim.
///
/// The `sub` field is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    pub sub: String,

    /// Not-before (Unix epoch seconds).
    pub nbf: i64,

    /// Issued-at (Unix epoch seconds).
    pub iat: i64,

    /// Expiration (Unix epoch seconds), exclusive.
    pub exp: i64,

    #[serde(flatten)]
    pub claims: ClaimSet,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("sub", &"[REDACTED]")
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("claims", &self.claims.len())
            .finish()
    }
}

impl TokenClaims {
    /// Every claim in the token, registered ones first, as an ordered set.
    #[must_use]
    pub fn to_claim_set(&self) -> ClaimSet {
        let mut all = ClaimSet::new();
        if let Some(iss) = &self.iss {
            all.push(Claim::new("iss", iss.clone()));
        }
        if let Some(aud) = &self.aud {
            all.push(Claim::new("aud", aud.clone()));
        }
        all.push(Claim::new("sub", self.sub.clone()));
        all.push(Claim::new("nbf", self.nbf.to_string()));
        all.push(Claim::new("iat", self.iat.to_string()));
        all.push(Claim::new("exp", self.exp.to_string()));
        all.extend(self.claims.iter().cloned());
        all
    }
}
