//! Integration tests for the token endpoint and handshake-protected routes.

use bridge_test_utils::{
    test_policy, unsigned_policy, TestBridgeServer, TokenAssertions, TEST_GROUPS_HEADER,
    TEST_HANDSHAKE_HEADER,
};
use reqwest::StatusCode;

// ============================================================================
// Token Issuance
// ============================================================================

#[tokio::test]
async fn test_token_endpoint_issues_signed_token() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestBridgeServer::spawn(test_policy()).await?;

    // Act
    let response = reqwest::Client::new()
        .get(server.token_url())
        .header(TEST_HANDSHAKE_HEADER, "CORP\\alice")
        .header(TEST_GROUPS_HEADER, "g1,g2")
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("text/plain; charset=utf-8")
    );
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("no-store")
    );

    let token = response.text().await?;
    token
        .assert_signed()
        .assert_for_subject("alice@CORP")
        .assert_expires_in(900)
        .assert_has_claim("iss", "https://bridge.test")
        .assert_has_claim("group", "g1")
        .assert_has_claim("group", "g2")
        .assert_has_claim("$AuthenticationType", "Negotiate");

    assert_eq!(server.handshake_calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_token_endpoint_without_handshake_challenges() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;

    let response = reqwest::Client::new()
        .get(server.token_url())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok()),
        Some("Negotiate")
    );

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"].as_str(), Some("HANDSHAKE_REQUIRED"));

    Ok(())
}

#[tokio::test]
async fn test_unsigned_policy_issues_unsecured_token() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(unsigned_policy()).await?;

    let token = reqwest::Client::new()
        .get(server.token_url())
        .header(TEST_HANDSHAKE_HEADER, "CORP\\bob")
        .send()
        .await?
        .text()
        .await?;

    token
        .assert_unsigned()
        .assert_for_subject("bob@CORP")
        .assert_has_claim("iss", "AD AUTHORITY")
        .assert_lacks_claim("aud");

    Ok(())
}

#[tokio::test]
async fn test_custom_token_path() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn_with_path(test_policy(), "/auth/token").await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/auth/token", server.url()))
        .header(TEST_HANDSHAKE_HEADER, "CORP\\alice")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(server.token_url())
        .header(TEST_HANDSHAKE_HEADER, "CORP\\alice")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_token_path_colliding_with_builtin_route_is_rejected() {
    let result = TestBridgeServer::spawn_with_path(test_policy(), "/protected").await;
    assert!(result.is_err());
}

// ============================================================================
// Handshake-protected summary
// ============================================================================

#[tokio::test]
async fn test_handshake_summary_filters_groups() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .get(format!("{}/protected_negotiate", server.url()))
        .header(TEST_HANDSHAKE_HEADER, "CORP\\alice")
        .header(TEST_GROUPS_HEADER, "g1,g2")
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["is_authenticated"], true);
    assert_eq!(body["name"].as_str(), Some("CORP\\alice"));
    assert_eq!(body["authentication_type"].as_str(), Some("Negotiate"));
    assert_eq!(body["path"].as_str(), Some("/protected_negotiate"));
    assert_eq!(body["protocol"].as_str(), Some("HTTP/1.1"));
    assert_eq!(body["claims"], serde_json::json!(["name: CORP\\alice"]));
    assert_eq!(body["group_count"], 2);

    let body: serde_json::Value = client
        .get(format!("{}/protected_negotiate?keep_groups", server.url()))
        .header(TEST_HANDSHAKE_HEADER, "CORP\\alice")
        .header(TEST_GROUPS_HEADER, "g1,g2")
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

// ============================================================================
// Operational routes
// ============================================================================

#[tokio::test]
async fn test_health_and_metrics_endpoints() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let client = reqwest::Client::new();

    let response = client.get(format!("{}/health", server.url())).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");

    let response = client.get(format!("{}/metrics", server.url())).send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.get(server.url()).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.handshake_calls(), 0);

    Ok(())
}
