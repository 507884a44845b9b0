use chrono::{Duration, Utc};
use llm_eval_sdk::{IdentityClient, LlmEvalClient, SdkError, Session, SessionManager, TokenSource, User};
use serde_json::json;
use std::sync::Arc;
use llm_eval_core::domain::UserId;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_response(access: &str, refresh: &str, user_id: UserId) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 3600,
        "token_type": "bearer",
        "user": { "id": user_id, "email": "me@example.com" }
    })
}

fn identity(server: &MockServer) -> IdentityClient {
    IdentityClient::new(format!("{}/auth/v1", server.uri()), "anon-key").unwrap()
}

#[tokio::test]
async fn test_sign_in_publishes_session() {
    let server = MockServer::start().await;
    let user_id = UserId::new();
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "anon-key"))
        .and(body_json(json!({ "email": "me@example.com", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("a1", "r1", user_id)))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SessionManager::new(identity(&server));
    let mut changes = manager.subscribe();
    assert!(changes.borrow().is_none());

    let session = manager.sign_in("me@example.com", "pw").await.unwrap();
    assert_eq!(session.user.id, user_id);
    assert!(!session.is_expired());

    changes.changed().await.unwrap();
    assert_eq!(changes.borrow().as_ref().map(|s| s.access_token.clone()), Some("a1".to_string()));
    assert_eq!(manager.access_token().await.unwrap(), "a1");
}

#[tokio::test]
async fn test_bad_credentials_leave_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })),
        )
        .mount(&server)
        .await;

    let manager = SessionManager::new(identity(&server));
    assert!(manager.sign_in("me@example.com", "wrong").await.is_err());
    assert!(!manager.is_authenticated().await);
}

#[tokio::test]
async fn test_expired_session_is_refreshed_once() {
    let server = MockServer::start().await;
    let user_id = UserId::new();
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({ "refresh_token": "old-refresh" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("fresh", "r2", user_id)))
        .expect(1)
        .mount(&server)
        .await;

    let stale = Session {
        access_token: "stale".to_string(),
        refresh_token: "old-refresh".to_string(),
        expires_at: Utc::now() - Duration::minutes(5),
        user: User {
            id: user_id,
            email: None,
        },
    };
    let manager = SessionManager::with_session(identity(&server), Some(stale));

    assert_eq!(manager.access_token().await.unwrap(), "fresh");
    assert_eq!(manager.access_token().await.unwrap(), "fresh");
    assert_eq!(manager.current().await.unwrap().refresh_token, "r2");
}

#[tokio::test]
async fn test_sign_out_clears_even_if_remote_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("authorization", "Bearer live"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session {
        access_token: "live".to_string(),
        refresh_token: "r".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
        user: User {
            id: UserId::new(),
            email: None,
        },
    };
    let manager = SessionManager::with_session(identity(&server), Some(session));
    let changes = manager.subscribe();

    manager.sign_out().await;
    assert!(!manager.is_authenticated().await);
    assert!(changes.borrow().is_none());
    assert!(matches!(
        manager.access_token().await,
        Err(SdkError::NotAuthenticated(_))
    ));
}

#[tokio::test]
async fn test_client_uses_session_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/functions/v1/projects-list"))
        .and(header("authorization", "Bearer from-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session {
        access_token: "from-session".to_string(),
        refresh_token: "r".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
        user: User {
            id: UserId::new(),
            email: None,
        },
    };
    let manager: Arc<dyn TokenSource> =
        Arc::new(SessionManager::with_session(identity(&server), Some(session)));
    let client = LlmEvalClient::builder(format!("{}/functions/v1", server.uri()))
        .with_token_source(manager)
        .build()
        .unwrap();

    assert!(client.projects().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_client_without_session_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let manager = Arc::new(SessionManager::new(identity(&server)));
    let client = LlmEvalClient::builder(server.uri())
        .with_token_source(manager)
        .build()
        .unwrap();

    let err = client.projects().list().await.unwrap_err();
    assert!(err.is_auth_error());
}
