//! Integration tests for bearer-protected routes.

use bridge_service::policy::SigningAlgorithm;
use bridge_service::services::token_issuer::issue_token;
use bridge_test_utils::{
    test_policy, test_signing_key, PrincipalBuilder, TestBridgeServer, TEST_GROUPS_HEADER,
    TEST_HANDSHAKE_HEADER,
};
use reqwest::StatusCode;

async fn fetch_token(server: &TestBridgeServer) -> Result<String, anyhow::Error> {
    Ok(reqwest::Client::new()
        .get(server.token_url())
        .header(TEST_HANDSHAKE_HEADER, "CORP\\alice")
        .header(TEST_GROUPS_HEADER, "g1,g2")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?)
}

fn www_authenticate(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_bearer_token_reconstitutes_identity() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let token = fetch_token(&server).await?;

    // Act
    let response = reqwest::Client::new()
        .get(format!("{}/protected", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["is_authenticated"], true);
    assert_eq!(body["name"].as_str(), Some("alice@CORP"));
    assert_eq!(body["authentication_type"].as_str(), Some("Negotiate"));
    assert_eq!(body["claims"], serde_json::json!(["name: CORP\\alice"]));
    assert_eq!(body["group_count"], 2);

    // Only the token fetch performed a handshake
    assert_eq!(server.handshake_calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_bearer_summary_keeps_groups_on_request() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let token = fetch_token(&server).await?;

    let body: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/protected?keep_groups", server.url()))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(
        body["claims"],
        serde_json::json!(["name: CORP\\alice", "group: g1", "group: g2"])
    );

    Ok(())
}

#[tokio::test]
async fn test_missing_bearer_token_is_challenged() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;

    let response = reqwest::Client::new()
        .get(format!("{}/protected", server.url()))
        .header(TEST_HANDSHAKE_HEADER, "CORP\\alice")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        www_authenticate(&response).as_deref(),
        Some("Bearer realm=\"token-bridge\"")
    );

    // Bearer routes never fall back to the handshake
    assert_eq!(server.handshake_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_tampered_token_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let token = fetch_token(&server).await?;

    // Re-sign nothing; swap the payload for one claiming another subject
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let forged = issue_token(
        &PrincipalBuilder::new("CORP\\mallory").build(),
        &test_policy(),
        chrono::Utc::now().timestamp(),
    )?;
    let forged_payload = forged.split('.').nth(1).unwrap_or_default().to_string();
    if let Some(payload) = parts.get_mut(1) {
        *payload = forged_payload;
    }
    let tampered = parts.join(".");

    let response = reqwest::Client::new()
        .get(format!("{}/protected", server.url()))
        .bearer_auth(&tampered)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        www_authenticate(&response).as_deref(),
        Some("Bearer realm=\"token-bridge\", error=\"invalid_token\"")
    );

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"].as_str(), Some("INVALID_TOKEN"));

    Ok(())
}

#[tokio::test]
async fn test_token_signed_with_other_key_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let other_policy = test_policy().with_signing(test_signing_key(2), SigningAlgorithm::Hs256);
    let token = issue_token(
        &PrincipalBuilder::new("CORP\\alice").build(),
        &other_policy,
        chrono::Utc::now().timestamp(),
    )?;

    let response = reqwest::Client::new()
        .get(format!("{}/protected", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let issued_at = chrono::Utc::now().timestamp() - 1000;
    let token = issue_token(
        &PrincipalBuilder::new("CORP\\alice").build(),
        &test_policy(),
        issued_at,
    )?;

    let response = reqwest::Client::new()
        .get(format!("{}/protected", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_unprotected_route_is_anonymous() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;

    let body: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/unprotected", server.url()))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["is_authenticated"], false);
    assert!(body.get("name").is_none());
    assert_eq!(body["path"].as_str(), Some("/unprotected"));

    Ok(())
}
