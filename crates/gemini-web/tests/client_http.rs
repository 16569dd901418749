//! Handshake and generate against an in-process stand-in for the web app.

use std::collections::HashMap;
use std::time::Duration;

use axum::Router;
use axum::extract::{Form, Query};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};

use gemini_web::{ChatMetadata, GeminiClient, GeminiCookies, GeminiError, build_http_client};

const GENERATE_PATH: &str =
    "/_/BardChatUi/data/assistant.lamda.BardFrontendService/StreamGenerate";

const APP_PAGE: &str = r#"<html><script>WIZ_global_data = {"SNlM0e":"at-token","cfb2h":"boq_build","FdrFJe":"-42"};</script></html>"#;

async fn app_page(headers: HeaderMap) -> Response {
    let cookie = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !cookie.contains("__Secure-1PSID=good") {
        return "<html>Sign in</html>".into_response();
    }
    (
        [(SET_COOKIE, "__Secure-1PSIDCC=cc-from-app; Path=/; Secure")],
        APP_PAGE,
    )
        .into_response()
}

#[derive(Deserialize)]
struct GenerateForm {
    at: String,
    #[serde(rename = "f.req")]
    f_req: String,
}

async fn stream_generate(
    Query(query): Query<HashMap<String, String>>,
    Form(form): Form<GenerateForm>,
) -> Response {
    if form.at != "at-token" || query.get("bl").map(String::as_str) != Some("boq_build") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let outer: Value = serde_json::from_str(&form.f_req).unwrap();
    let inner: Value = serde_json::from_str(outer[1].as_str().unwrap()).unwrap();
    let prompt = inner[0][0].as_str().unwrap_or_default();
    let cid = match inner[2][0].as_str() {
        Some("") | None => "c_new",
        Some(cid) => cid,
    };

    let payload = json!([
        null,
        [cid, "r_1"],
        null,
        null,
        [["rc_1", [format!("echo {prompt}")]]]
    ]);
    let frame = json!([["wrb.fr", null, payload.to_string()]]).to_string();
    (
        [(SET_COOKIE, "__Secure-1PSIDCC=cc-from-generate; Path=/")],
        format!(")]}}'\n\n{}\n{}\n", frame.len(), frame),
    )
        .into_response()
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn client_for(router: Router) -> GeminiClient {
    let base_url = serve(router).await;
    GeminiClient::with_base_url(build_http_client(Duration::from_secs(5)).unwrap(), base_url)
}

fn web_app() -> Router {
    Router::new()
        .route("/app", get(app_page))
        .route(GENERATE_PATH, post(stream_generate))
}

fn answering(status: StatusCode) -> Router {
    Router::new()
        .route("/app", get(move || async move { status }))
        .route(GENERATE_PATH, post(move || async move { status }))
}

fn good_cookies() -> GeminiCookies {
    GeminiCookies::new("good", "ts", "cc")
}

#[tokio::test]
async fn test_handshake_extracts_tokens_and_rotation() {
    let client = client_for(web_app()).await;

    let handshake = client.handshake(&good_cookies()).await.unwrap();
    assert_eq!(handshake.tokens.access_token, "at-token");
    assert_eq!(handshake.tokens.build_label.as_deref(), Some("boq_build"));
    assert_eq!(handshake.tokens.session_id.as_deref(), Some("-42"));
    assert_eq!(handshake.rotated_psidcc.as_deref(), Some("cc-from-app"));
}

#[tokio::test]
async fn test_handshake_signed_out_page_is_auth_failure() {
    let client = client_for(web_app()).await;

    let err = client
        .handshake(&GeminiCookies::new("stale", "ts", "cc"))
        .await
        .unwrap_err();
    assert!(matches!(err, GeminiError::AccessTokenMissing));
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn test_generate_round_trip() {
    let client = client_for(web_app()).await;
    let handshake = client.handshake(&good_cookies()).await.unwrap();

    let reply = client
        .generate(&good_cookies(), &handshake.tokens, "hi", &ChatMetadata::default())
        .await
        .unwrap();
    assert_eq!(reply.output.text, "echo hi");
    assert_eq!(reply.output.metadata.cid, "c_new");
    assert_eq!(reply.output.metadata.rcid, "rc_1");
    assert_eq!(reply.rotated_psidcc.as_deref(), Some("cc-from-generate"));

    let reply = client
        .generate(
            &good_cookies(),
            &handshake.tokens,
            "again",
            &reply.output.metadata,
        )
        .await
        .unwrap();
    assert_eq!(reply.output.text, "echo again");
    assert_eq!(reply.output.metadata.cid, "c_new");
}

#[tokio::test]
async fn test_status_mapping() {
    for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
        let client = client_for(answering(status)).await;
        let err = client.handshake(&good_cookies()).await.unwrap_err();
        assert!(err.is_auth_failure(), "{status}: {err}");
        assert!(!err.is_transient());
    }

    for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE] {
        let client = client_for(answering(status)).await;
        let err = client.handshake(&good_cookies()).await.unwrap_err();
        assert!(err.is_transient(), "{status}: {err}");
        assert!(!err.is_auth_failure());
    }
}

#[tokio::test]
async fn test_generate_server_error_is_transient() {
    let client = client_for(answering(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let tokens = gemini_web::PageTokens {
        access_token: "at-token".into(),
        build_label: None,
        session_id: None,
    };

    let err = client
        .generate(&good_cookies(), &tokens, "hi", &ChatMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GeminiError::Status {
            status: 500,
            endpoint: "generate"
        }
    ));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unparseable_generate_body_is_not_transient() {
    let router = Router::new()
        .route("/app", get(app_page))
        .route(GENERATE_PATH, post(|| async { "<html>oops</html>" }));
    let client = client_for(router).await;
    let handshake = client.handshake(&good_cookies()).await.unwrap();

    let err = client
        .generate(&good_cookies(), &handshake.tokens, "hi", &ChatMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GeminiError::Parse(_)));
    assert!(!err.is_transient());
    assert!(!err.is_auth_failure());
}
