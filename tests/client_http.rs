//! HTTP client integration tests against a mock TickTick server.
//!
//! Covers credential flows (OAuth code exchange, v2 sign-in), persistence of
//! those credentials, and the mapping of HTTP failures onto error variants.

use mockito::{Matcher, Server};
use tempfile::TempDir;
use ticktick_mcp::api::{ApiVersion, TickTickClient};
use ticktick_mcp::config::Config;
use ticktick_mcp::error::TickTickError;

fn config(dir: &TempDir, url: &str) -> Config {
    let mut config = Config::default();
    config.api.v1_base_url = format!("{}/open/v1", url);
    config.api.v2_base_url = format!("{}/api/v2", url);
    config.api.oauth_token_url = format!("{}/oauth/token", url);
    config.api.retry_count = 0;
    config.api.retry_delay_ms = 1;
    config.auth.token_dir = dir.path().join("tokens");
    config.cache.path = dir.path().join("cache.json");
    config
}

/// Integration test: authorization code exchange stores a usable v1 token
#[tokio::test]
async fn test_exchange_code_enables_v1() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let token = server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("code".into(), "auth-code".into()),
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("client_id".into(), "cid".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"fresh-token","token_type":"bearer","expires_in":3600}"#)
        .create_async()
        .await;
    let projects = server
        .mock("GET", "/open/v1/project")
        .match_header("authorization", "Bearer fresh-token")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let config = config(&dir, &server.url());
    let client = TickTickClient::from_config(&config).unwrap();
    client.configure_oauth("cid", "secret", None).unwrap();
    let issued = client.exchange_code("auth-code").await.unwrap();
    assert_eq!(issued.access_token, "fresh-token");
    assert!(client.has_v1());

    client.get(ApiVersion::V1, "/project").await.unwrap();
    token.assert_async().await;
    projects.assert_async().await;

    // A fresh client picks the token up from disk
    let reloaded = TickTickClient::from_config(&config).unwrap();
    assert!(reloaded.has_v1());
    assert!(reloaded.auth_status().oauth_configured);
}

/// Integration test: v2 sign-in sends session credentials on later requests
#[tokio::test]
async fn test_login_session_is_used_and_persisted() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let signin = server
        .mock("POST", "/api/v2/user/signin")
        .match_body(Matcher::PartialJson(serde_json::json!({"username": "me@example.com"})))
        .with_status(200)
        .with_header("set-cookie", "t=cookie-value; Path=/; HttpOnly")
        .with_body(r#"{"token":"session-abc","userId":"u1","inboxId":"inbox123"}"#)
        .create_async()
        .await;
    let tags = server
        .mock("GET", "/api/v2/tag")
        .match_header("authorization", "Bearer session-abc")
        .match_header("cookie", Matcher::Regex("t=cookie-value".to_string()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let config = config(&dir, &server.url());
    let client = TickTickClient::from_config(&config).unwrap();
    let session = client.login(" me@example.com ", "pw").await.unwrap();
    assert_eq!(session.inbox_id.as_deref(), Some("inbox123"));
    assert_eq!(client.inbox_id().as_deref(), Some("inbox123"));

    client.get(ApiVersion::V2, "/tag").await.unwrap();
    signin.assert_async().await;
    tags.assert_async().await;

    let reloaded = TickTickClient::from_config(&config).unwrap();
    assert!(reloaded.has_v2());
    assert_eq!(reloaded.inbox_id().as_deref(), Some("inbox123"));

    reloaded.logout().unwrap();
    let after_logout = TickTickClient::from_config(&config).unwrap();
    assert!(!after_logout.has_v2());
}

/// Integration test: rejected credentials surface as an authentication error
#[tokio::test]
async fn test_login_rejected() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let _signin = server
        .mock("POST", "/api/v2/user/signin")
        .with_status(401)
        .with_body(r#"{"errorMessage":"bad password"}"#)
        .create_async()
        .await;

    let client = TickTickClient::from_config(&config(&dir, &server.url())).unwrap();
    let err = client.login("me", "wrong").await.unwrap_err();
    assert!(matches!(err, TickTickError::Authentication(_)));
    assert!(!client.has_v2());
}

/// Integration test: HTTP status codes map onto error variants
#[tokio::test]
async fn test_status_mapping() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let _missing = server
        .mock("GET", "/open/v1/project/nope")
        .with_status(404)
        .with_body(r#"{"errorMessage":"project not found"}"#)
        .create_async()
        .await;
    let _limited = server
        .mock("GET", "/open/v1/project/busy")
        .with_status(429)
        .with_header("retry-after", "7")
        .create_async()
        .await;
    let _broken = server
        .mock("GET", "/open/v1/project/broken")
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;

    let mut config = config(&dir, &server.url());
    config.auth.access_token = Some("static-token".to_string());
    let client = TickTickClient::from_config(&config).unwrap();

    let err = client.get(ApiVersion::V1, "/project/nope").await.unwrap_err();
    assert!(matches!(err, TickTickError::NotFound(_)));
    assert_eq!(err.code(), "not_found");

    let err = client.get(ApiVersion::V1, "/project/busy").await.unwrap_err();
    assert!(matches!(err, TickTickError::RateLimited { retry_after_secs: 7 }));
    assert!(err.is_retryable());

    let err = client.get(ApiVersion::V1, "/project/broken").await.unwrap_err();
    assert!(matches!(err, TickTickError::Server { status: 503, .. }));
}

/// Integration test: empty success bodies read as a success marker
#[tokio::test]
async fn test_empty_body_is_success() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let _delete = server
        .mock("DELETE", "/open/v1/project/p1/task/t1")
        .with_status(200)
        .create_async()
        .await;

    let mut config = config(&dir, &server.url());
    config.auth.access_token = Some("static-token".to_string());
    let client = TickTickClient::from_config(&config).unwrap();

    let value = client.delete(ApiVersion::V1, "/project/p1/task/t1").await.unwrap();
    assert_eq!(value["success"], true);
}

/// Integration test: requests without credentials fail before reaching the network
#[tokio::test]
async fn test_unauthenticated_request() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let never = server.mock("GET", "/open/v1/project").expect(0).create_async().await;

    let client = TickTickClient::from_config(&config(&dir, &server.url())).unwrap();
    let err = client.get(ApiVersion::V1, "/project").await.unwrap_err();
    assert!(matches!(err, TickTickError::Authentication(_)));
    never.assert_async().await;
}
