//! Bearer auth and single-flight token refresh against a mock Account
//! Service.

use std::sync::Arc;
use std::time::Duration;

use compass_client::{ClientConfig, CompassClient, Credentials, TokenStore};
use compass_core::{DocumentApi, Error, ProfileApi, SessionAuth};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, access: &str, refresh: Option<&str>) -> CompassClient {
    let tokens = Arc::new(TokenStore::with_credentials(Credentials {
        access: access.to_string(),
        refresh: refresh.map(String::from),
    }));
    let config = ClientConfig::default().with_base_url(server.uri());
    CompassClient::with_tokens(config, tokens).expect("client")
}

async fn mount_documents(server: &MockServer, token: &str, status: u16) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!([]))
    } else {
        ResponseTemplate::new(status)
            .set_body_json(serde_json::json!({"detail": "Given token not valid"}))
    };
    Mock::given(method("GET"))
        .and(path("/api/documents/"))
        .and(header("Authorization", format!("Bearer {}", token).as_str()))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_stores_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(serde_json::json!({"username": "ada", "password": "pw"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access": "a1",
                "refresh": "r1"
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = CompassClient::new(ClientConfig::default().with_base_url(server.uri())).unwrap();
    assert!(!client.is_authenticated().await);

    let creds = client.login("ada", "pw").await.unwrap();
    assert_eq!(creds.access, "a1");
    assert!(client.is_authenticated().await);
    assert_eq!(client.tokens().refresh_token().await.as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_login_failure_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "detail": "No active account found with the given credentials"
        })))
        .mount(&server)
        .await;

    let client = CompassClient::new(ClientConfig::default().with_base_url(server.uri())).unwrap();
    let err = client.login("ada", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Auth(ref m) if m.contains("No active account")));
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_retried() {
    let server = MockServer::start().await;
    mount_documents(&server, "old", 401).await;
    mount_documents(&server, "new", 200).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .and(body_json(serde_json::json!({"refresh": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "old", Some("r1"));
    let docs = client.list_documents().await.unwrap();
    assert!(docs.is_empty());

    let creds = client.tokens().get().await.unwrap();
    assert_eq!(creds.access, "new");
    assert_eq!(creds.refresh.as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_concurrent_401s_refresh_once() {
    let server = MockServer::start().await;
    mount_documents(&server, "old", 401).await;
    mount_documents(&server, "new", 200).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access": "new"}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "old", Some("r1"));
    let (a, b, c) = tokio::join!(
        client.list_documents(),
        client.list_documents(),
        client.list_documents()
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
}

#[tokio::test]
async fn test_rejected_refresh_clears_credentials() {
    let server = MockServer::start().await;
    mount_documents(&server, "old", 401).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "detail": "Token is blacklisted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "old", Some("r1"));
    let err = client.list_documents().await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(!client.is_authenticated().await);
}

#[tokio::test]
async fn test_second_401_after_refresh_is_terminal() {
    let server = MockServer::start().await;
    mount_documents(&server, "old", 401).await;
    mount_documents(&server, "new", 401).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "old", Some("r1"));
    let err = client.list_documents().await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(client.tokens().get().await.is_none());
}

#[tokio::test]
async fn test_missing_refresh_token_clears_credentials() {
    let server = MockServer::start().await;
    mount_documents(&server, "old", 401).await;

    let client = client_for(&server, "old", None);
    let err = client.list_documents().await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(!client.is_authenticated().await);
}

#[tokio::test]
async fn test_server_error_keeps_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server, "a1", Some("r1"));
    let err = client.fetch_profile().await.unwrap_err();
    assert!(matches!(err, Error::Server { status: 503, .. }));
    assert!(err.is_retryable());
    assert!(client.is_authenticated().await);
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let tokens = Arc::new(TokenStore::with_credentials(Credentials {
        access: "a1".into(),
        refresh: None,
    }));
    let config = ClientConfig::default()
        .with_base_url(server.uri())
        .with_timeout(1);
    let client = CompassClient::with_tokens(config, tokens).unwrap();

    let err = client.list_documents().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {:?}", err);
    assert!(client.is_authenticated().await);
}

#[tokio::test]
async fn test_logout_blacklists_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(body_json(serde_json::json!({"refresh": "r1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"message": "logged out successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "a1", Some("r1"));
    client.logout().await;
    assert!(!client.is_authenticated().await);
}

#[tokio::test]
async fn test_logout_clears_locally_when_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid token"})))
        .mount(&server)
        .await;

    let client = client_for(&server, "a1", Some("r1"));
    client.logout().await;
    assert!(!client.is_authenticated().await);
}
