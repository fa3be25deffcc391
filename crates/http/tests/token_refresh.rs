//! Bearer token refresh-and-retry behavior

use hepatica_core::{AuthTokens, LoginRequest, PredictionRequest, Role, SessionStore, User};
use hepatica_http::{ApiClient, ClientError, InvalidationReason, SessionEvent};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hepatica_http=debug")
        .with_test_writer()
        .try_init();
}

fn tokens(access: &str, refresh: &str) -> AuthTokens {
    AuthTokens {
        access: access.to_string(),
        refresh: refresh.to_string(),
    }
}

fn patient() -> User {
    User {
        id: 1,
        username: "pat1".to_string(),
        email: "pat1@example.com".to_string(),
        role: Role::Patient,
        first_name: "Pat".to_string(),
        last_name: "Doe".to_string(),
    }
}

fn client_with(server: &MockServer, single_flight: bool) -> ApiClient {
    let session = Arc::new(SessionStore::in_memory());
    session.set_auth(patient(), tokens("a1", "r1"));
    ApiClient::builder()
        .base_url(server.uri())
        .session(session)
        .single_flight_refresh(single_flight)
        .build()
        .unwrap()
}

async fn mount_predictions(server: &MockServer, bearer: &str, status: u16, expected_calls: u64) {
    let response = if status == 200 {
        ResponseTemplate::new(200).set_body_json(json!([{
            "id": 7,
            "created_at": "2025-03-01T10:00:00Z",
            "features": { "Age": 54 },
            "result": 2.0,
            "confidence": 0.87,
            "status": "completed"
        }]))
    } else {
        ResponseTemplate::new(status).set_body_json(json!({ "detail": "Given token not valid" }))
    };

    Mock::given(method("GET"))
        .and(path("/api/predictions/"))
        .and(header("authorization", format!("Bearer {bearer}").as_str()))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_and_retried() {
    init_tracing();
    let mock_server = MockServer::start().await;

    mount_predictions(&mock_server, "a1", 401, 1).await;
    mount_predictions(&mock_server, "a2", 200, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .and(body_json(json!({ "refresh": "r1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a2" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with(&mock_server, true);
    let mut events = client.subscribe_events();

    let predictions = client.get_predictions().await.unwrap();
    assert_eq!(predictions.len(), 1);

    let session = client.session().snapshot();
    assert_eq!(session.tokens(), Some(&tokens("a2", "r1")));
    assert_eq!(session.user(), Some(&patient()));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_second_401_tears_down_session_without_second_refresh() {
    init_tracing();
    let mock_server = MockServer::start().await;

    mount_predictions(&mock_server, "a1", 401, 1).await;
    mount_predictions(&mock_server, "a2", 401, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a2" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with(&mock_server, true);
    let mut events = client.subscribe_events();

    let result = client.get_predictions().await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    assert!(result.unwrap_err().is_auth_expired());
    assert!(!client.session().is_authenticated());
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Invalidated {
            reason: InvalidationReason::RetryRejected
        }
    );

    mock_server.verify().await;
}

#[tokio::test]
async fn test_missing_refresh_token_tears_down_without_refresh_call() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/consent/status/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a2" })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let mut events = client.subscribe_events();

    let result = client.get_consent_status().await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    assert!(!client.session().is_authenticated());
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Invalidated {
            reason: InvalidationReason::MissingRefreshToken
        }
    );

    mock_server.verify().await;
}

#[tokio::test]
async fn test_rejected_refresh_tears_down_session() {
    init_tracing();
    let mock_server = MockServer::start().await;

    mount_predictions(&mock_server, "a1", 401, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token is blacklisted" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with(&mock_server, true);
    let mut events = client.subscribe_events();

    let result = client.get_predictions().await;
    match result {
        Err(ClientError::AuthenticationFailed(message)) => {
            assert!(message.contains("Given token not valid"));
        }
        other => panic!("expected authentication failure, got {other:?}"),
    }
    assert!(!client.session().is_authenticated());
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Invalidated {
            reason: InvalidationReason::RefreshRejected { status: 401 }
        }
    );

    mock_server.verify().await;
}

#[tokio::test]
async fn test_malformed_refresh_response_tears_down_session() {
    let mock_server = MockServer::start().await;

    mount_predictions(&mock_server, "a1", 401, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let client = client_with(&mock_server, true);
    let mut events = client.subscribe_events();

    assert!(client.get_predictions().await.is_err());
    assert!(!client.session().is_authenticated());
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::Invalidated {
            reason: InvalidationReason::RefreshFailed(_)
        }
    ));
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    init_tracing();
    let mock_server = MockServer::start().await;

    mount_predictions(&mock_server, "a1", 401, 2).await;
    mount_predictions(&mock_server, "a2", 200, 2).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "a2" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with(&mock_server, true);
    let (first, second) = futures::join!(client.get_predictions(), client.get_predictions());

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(client.session().tokens(), Some(tokens("a2", "r1")));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_concurrent_401s_refresh_independently_without_single_flight() {
    let mock_server = MockServer::start().await;

    mount_predictions(&mock_server, "a1", 401, 2).await;
    mount_predictions(&mock_server, "a2", 200, 2).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a2" })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_with(&mock_server, false);
    let (first, second) = futures::join!(client.get_predictions(), client.get_predictions());

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(client.session().tokens(), Some(tokens("a2", "r1")));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_retried_post_keeps_body_and_swaps_bearer() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let body = json!({ "features": { "Age": 54, "Edema": null, "Sex": "M" } });

    Mock::given(method("POST"))
        .and(path("/api/predict/"))
        .and(header("authorization", "Bearer a1"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Given token not valid" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/predict/"))
        .and(header("authorization", "Bearer a2"))
        .and(header("content-type", "application/json"))
        .and(body_json(body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 8,
            "created_at": "2025-03-01T10:00:00Z",
            "features": { "Age": 54, "Edema": null, "Sex": "M" },
            "result": 1.0,
            "confidence": 0.64,
            "status": "completed"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .and(body_json(json!({ "refresh": "r1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a2" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with(&mock_server, true);
    let request = PredictionRequest::from_form([("Age", "54"), ("Sex", "M"), ("Edema", "")]);
    let prediction = client.predict(&request).await.unwrap();

    assert_eq!(prediction.id, 8);
    assert_eq!(client.session().tokens(), Some(tokens("a2", "r1")));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_rejected_login_keeps_existing_session() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "No active account found with the given credentials" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a2" })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_with(&mock_server, true);
    let mut events = client.subscribe_events();

    let result = client
        .sign_in(&LoginRequest {
            username: "pat1".to_string(),
            password: "wrong".to_string(),
        })
        .await;

    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    assert!(client.session().is_authenticated());
    assert_eq!(client.session().tokens(), Some(tokens("a1", "r1")));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    // Credentials are never sent alongside a bearer token
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());

    mock_server.verify().await;
}

#[tokio::test]
async fn test_rejected_login_while_signed_out_emits_no_event() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let mut events = client.subscribe_events();

    let result = client
        .sign_in(&LoginRequest {
            username: "pat1".to_string(),
            password: "wrong".to_string(),
        })
        .await;

    assert!(result.is_err());
    assert!(!client.session().is_authenticated());
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_unauthenticated_401_refreshes_instead_of_reusing_token() {
    init_tracing();
    let mock_server = MockServer::start().await;

    // First matching mock wins, so the bearer-specific one is mounted first
    mount_predictions(&mock_server, "a2", 200, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/predictions/"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .and(body_json(json!({ "refresh": "r1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a2" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let session = Arc::clone(client.session());

    // Sign in while the anonymous request is in flight
    let (result, ()) = futures::join!(client.get_predictions(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.set_auth(patient(), tokens("a1", "r1"));
    });

    assert!(result.is_ok());
    assert_eq!(client.session().tokens(), Some(tokens("a2", "r1")));

    mock_server.verify().await;
}
