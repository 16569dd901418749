//! Gemini adapter driven against an in-process stand-in for the web app.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::json;

use webai_bridge::context::OpContext;
use webai_bridge::credentials::{CredentialSet, CredentialStore};
use webai_bridge::session::{SessionClient, SessionError, SessionHealth};
use webai_bridge::upstream::{
    ConversationContext, GeminiUpstream, Upstream, UpstreamError, UpstreamRequest,
};

const GENERATE_PATH: &str =
    "/_/BardChatUi/data/assistant.lamda.BardFrontendService/StreamGenerate";

async fn app_page(headers: HeaderMap) -> Response {
    let signed_in = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|cookie| cookie.contains("__Secure-1PSID=good"));
    if !signed_in {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    (
        [(SET_COOKIE, "__Secure-1PSIDCC=cc-app; Path=/")],
        r#"{"SNlM0e":"at-token","cfb2h":"boq_build"}"#,
    )
        .into_response()
}

async fn stream_generate() -> Response {
    let payload = json!([null, ["c_1", "r_1"], null, null, [["rc_1", ["hello"]]]]);
    let frame = json!([["wrb.fr", null, payload.to_string()]]).to_string();
    (
        [(SET_COOKIE, "__Secure-1PSIDCC=cc-generate; Path=/")],
        format!(")]}}'\n{frame}\n"),
    )
        .into_response()
}

async fn web_app() -> GeminiUpstream {
    let router = Router::new()
        .route("/app", get(app_page))
        .route(GENERATE_PATH, post(stream_generate));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    GeminiUpstream::with_base_url(format!("http://{addr}"), Duration::from_secs(5)).unwrap()
}

fn prompt(text: &str) -> UpstreamRequest {
    UpstreamRequest {
        prompt: text.to_string(),
        context: ConversationContext::default(),
    }
}

#[tokio::test]
async fn test_authenticate_and_send() {
    let upstream = web_app().await;
    let credentials = CredentialSet::new("good", "ts", "cc", 5);

    let authenticated = upstream.authenticate(&credentials).await.unwrap();
    assert_eq!(authenticated.rotation_token.as_deref(), Some("cc-app"));

    let reply = upstream
        .send(&authenticated.handle, &credentials, &prompt("hi"))
        .await
        .unwrap();
    assert_eq!(reply.result.reply, "hello");
    assert_eq!(reply.result.context.get_str("cid"), Some("c_1"));
    assert_eq!(reply.result.context.get_str("rcid"), Some("rc_1"));
    assert_eq!(reply.rotation_token.as_deref(), Some("cc-generate"));
}

#[tokio::test]
async fn test_unauthorized_is_rejected() {
    let upstream = web_app().await;

    let err = upstream
        .authenticate(&CredentialSet::new("stale", "ts", "cc", 5))
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Rejected(_)));
}

#[tokio::test]
async fn test_session_carries_rotated_cookie_into_store() {
    let upstream = Arc::new(web_app().await);
    let store = Arc::new(CredentialStore::new(CredentialSet::new("good", "ts", "cc", 5)));
    let client = SessionClient::new(upstream, Arc::clone(&store));

    client.init(&OpContext::new()).await.unwrap();
    assert_eq!(store.get().rotation_token(), "cc-app");
    assert_eq!(client.snapshot().credentials().rotation_token(), "cc-app");

    let result = client.call(&OpContext::new(), &prompt("hi")).await.unwrap();
    assert_eq!(result.reply, "hello");
    assert_eq!(store.get().rotation_token(), "cc-generate");
    assert_eq!(client.health(), SessionHealth::Healthy);
}

#[tokio::test]
async fn test_session_with_stale_cookie_is_rejected() {
    let upstream = Arc::new(web_app().await);
    let store = Arc::new(CredentialStore::new(CredentialSet::new("stale", "ts", "cc", 5)));
    let client = SessionClient::new(upstream, store);

    let err = client.init(&OpContext::new()).await.unwrap_err();
    assert!(matches!(err, SessionError::AuthenticationRejected(_)));
    assert_eq!(
        client.call(&OpContext::new(), &prompt("hi")).await.unwrap_err(),
        SessionError::SessionUnavailable
    );
}
