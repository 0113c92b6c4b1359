//! Identity summary routes.
//!
//! Show what a downstream handler sees under each authentication scheme.
//! Group claims are omitted unless the request carries `?keep_groups`.

use crate::identity::{Principal, ReconstitutedIdentity};
use crate::services::claim_translator;
use axum::{
    extract::Query,
    http::{Uri, Version},
    Extension, Json,
};
use common::claims::{kinds, ClaimSet};
use serde::{Deserialize, Serialize};

/// JSON body returned by the summary routes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentitySummary {
    pub protocol: String,
    pub path: String,
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_type: Option<String>,
    /// Rendered as `kind: value`.
    pub claims: Vec<String>,
    /// Group claims held by the identity, counted before filtering.
    pub group_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct DetailsQuery {
    keep_groups: Option<String>,
}

impl DetailsQuery {
    fn keep_groups(&self) -> bool {
        self.keep_groups.is_some()
    }
}

impl IdentitySummary {
    fn anonymous(version: Version, uri: &Uri) -> Self {
        Self {
            protocol: format!("{version:?}"),
            path: uri.path().to_string(),
            is_authenticated: false,
            name: None,
            authentication_type: None,
            claims: Vec::new(),
            group_count: 0,
        }
    }

    fn authenticated(
        version: Version,
        uri: &Uri,
        name: &str,
        authentication_type: &str,
        claims: &ClaimSet,
        keep_groups: bool,
    ) -> Self {
        Self {
            is_authenticated: true,
            name: Some(name.to_string()),
            authentication_type: Some(authentication_type.to_string()),
            claims: claim_translator::filter_claims(claims, keep_groups)
                .iter()
                .map(ToString::to_string)
                .collect(),
            group_count: claims.count(kinds::GROUP),
            ..Self::anonymous(version, uri)
        }
    }
}

/// Handler for GET /
pub async fn root() -> &'static str {
    "Negotiated token bridge. Fetch a token from the token endpoint, then call /protected with it."
}

/// Handler for GET /unprotected
pub async fn unprotected_details(version: Version, uri: Uri) -> Json<IdentitySummary> {
    Json(IdentitySummary::anonymous(version, &uri))
}

/// Handler for GET /protected (bearer).
pub async fn bearer_details(
    version: Version,
    uri: Uri,
    Query(query): Query<DetailsQuery>,
    Extension(identity): Extension<ReconstitutedIdentity>,
) -> Json<IdentitySummary> {
    Json(IdentitySummary::authenticated(
        version,
        &uri,
        identity.canonical_name(),
        identity.authentication_type(),
        identity.claims(),
        query.keep_groups(),
    ))
}

/// Handler for GET /protected_negotiate (handshake).
pub async fn handshake_details(
    version: Version,
    uri: Uri,
    Query(query): Query<DetailsQuery>,
    Extension(principal): Extension<Principal>,
) -> Json<IdentitySummary> {
    Json(IdentitySummary::authenticated(
        version,
        &uri,
        principal.name(),
        principal.authentication_type(),
        principal.claims(),
        query.keep_groups(),
    ))
}
