//! End-to-end tests for the client token cache against a running bridge.

use bridge_test_utils::{test_policy, TestBridgeServer, TEST_HANDSHAKE_HEADER};
use common::token_cache::{ClientTokenCache, HttpTokenEndpoint, TokenCacheError};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::sync::Arc;

/// Client configuration that completes the handshake on every request.
fn handshake_client() -> reqwest::ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(TEST_HANDSHAKE_HEADER, HeaderValue::from_static("CORP\\alice"));
    reqwest::Client::builder().default_headers(headers)
}

fn protected_request(
    client: &reqwest::Client,
    server: &TestBridgeServer,
) -> Result<reqwest::Request, anyhow::Error> {
    Ok(client
        .get(format!("{}/protected", server.url()))
        .build()?)
}

#[tokio::test]
async fn test_cache_fetches_once_and_reuses_credential() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let endpoint = HttpTokenEndpoint::new(handshake_client(), "/token")?;
    let cache = ClientTokenCache::new(endpoint);
    let client = reqwest::Client::new();

    // Act
    let first = cache
        .execute(&client, protected_request(&client, &server)?)
        .await?;
    let second = cache
        .execute(&client, protected_request(&client, &server)?)
        .await?;

    // Assert
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(server.handshake_calls(), 1);

    let body: serde_json::Value = second.json().await?;
    assert_eq!(body["name"].as_str(), Some("alice@CORP"));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_share_one_refresh() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let endpoint = HttpTokenEndpoint::new(handshake_client(), "/token")?;
    let cache = Arc::new(ClientTokenCache::new(endpoint));
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let client = client.clone();
        let request = protected_request(&client, &server)?;
        tasks.push(tokio::spawn(async move {
            cache.execute(&client, request).await
        }));
    }

    for task in tasks {
        let response = task.await??;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(server.handshake_calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_refused_handshake_leaves_cache_empty() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn(test_policy()).await?;
    // No handshake header: the token endpoint answers 401
    let endpoint = HttpTokenEndpoint::new(reqwest::Client::builder(), &server.token_url())?;
    let cache = ClientTokenCache::new(endpoint);
    let client = reqwest::Client::new();

    let result = cache
        .execute(&client, protected_request(&client, &server)?)
        .await;

    assert!(matches!(
        result,
        Err(TokenCacheError::Rejected { status: 401 })
    ));
    assert!(cache.current().is_none());

    Ok(())
}

#[tokio::test]
async fn test_refresh_uses_http1_when_caller_speaks_http2() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestBridgeServer::spawn(test_policy()).await?;
    let endpoint = HttpTokenEndpoint::new(handshake_client().http2_prior_knowledge(), "/token")?;
    let cache = ClientTokenCache::new(endpoint);
    let client = reqwest::Client::builder().http2_prior_knowledge().build()?;

    // Act
    let response = cache
        .execute(&client, protected_request(&client, &server)?)
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.version(), reqwest::Version::HTTP_2);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["protocol"].as_str(), Some("HTTP/2.0"));

    assert_eq!(server.handshake_versions(), vec![reqwest::Version::HTTP_11]);

    Ok(())
}
