//! The chat route end to end: mocked upstream, real router, real client.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chatrelay::consumer::{submit, Outcome, Transcript, GREETING};
use chatrelay::options::{HttpTransport, ModelOptions, TransportOptions};
use chatrelay::providers::{DeepSeekClient, RemoteRelay};
use chatrelay::server::{create_router, AppState, RELAY_FAILURE_MESSAGE};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HELLO_STREAM: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
    "data: [DONE]\n\n",
);

async fn upstream(status: u16, body: &str, content_type: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body.to_string(), content_type))
        .mount(&server)
        .await;
    server
}

fn state_for(server: &MockServer) -> AppState {
    let transport =
        TransportOptions::new(HttpTransport::new("sk-test").with_base_url(server.uri()));
    AppState::new(DeepSeekClient::new(ModelOptions::default(), transport).unwrap())
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn chat_route_reframes_upstream_stream() {
    let server = upstream(200, HELLO_STREAM, "text/event-stream").await;
    let app = create_router(state_for(&server));

    let resp = app
        .oneshot(chat_request(json!({"messages": [{"role": "user", "content": "Say hello"}]})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(resp.headers()[header::CONNECTION], "keep-alive");

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\n"
    );
}

#[tokio::test]
async fn special_characters_survive_reframing() {
    let upstream_body = format!(
        "data: {}\n\ndata: [DONE]\n\n",
        json!({"choices": [{"delta": {"content": "line \"one\"\n\t二"}}]})
    );
    let server = upstream(200, &upstream_body, "text/event-stream").await;
    let app = create_router(state_for(&server));

    let resp = app
        .oneshot(chat_request(json!({"messages": [{"role": "user", "content": "x"}]})))
        .await
        .unwrap();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let text = std::str::from_utf8(&body).unwrap();

    let payload = text
        .strip_prefix("data: ")
        .and_then(|rest| rest.strip_suffix("\n\n"))
        .unwrap();
    let frame: Value = serde_json::from_str(payload).unwrap();
    assert_eq!(frame["content"], "line \"one\"\n\t二");
}

#[tokio::test]
async fn upstream_failure_returns_generic_500() {
    let server = upstream(500, r#"{"message":"quota exceeded"}"#, "application/json").await;
    let app = create_router(state_for(&server));

    let resp = app
        .oneshot(chat_request(json!({"messages": [{"role": "user", "content": "hi"}]})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, json!({"error": RELAY_FAILURE_MESSAGE}));
}

#[tokio::test]
async fn terminal_client_receives_full_reply() {
    let server = upstream(200, HELLO_STREAM, "text/event-stream").await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state_for(&server));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let relay = RemoteRelay::new(&format!("http://{addr}")).unwrap();
    let mut updates = 0;
    let exchange = submit(&relay, Transcript::with_greeting(GREETING), "Say hello", |_| {
        updates += 1;
    })
    .await;

    assert_eq!(exchange.reply(), Some("Hello"));
    assert!(!exchange.loading);
    assert_eq!(exchange.outcome, Some(Outcome::Completed));
    assert_eq!(exchange.transcript.len(), 3);
    // empty reply, two deltas, end of loading
    assert_eq!(updates, 4);
}

#[tokio::test]
async fn terminal_client_falls_back_when_upstream_fails() {
    let server = upstream(503, "", "text/plain").await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state_for(&server));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let relay = RemoteRelay::new(&format!("http://{addr}")).unwrap();
    let exchange = submit(&relay, Transcript::new(), "hi", |_| {}).await;

    assert_eq!(exchange.reply(), Some(chatrelay::consumer::FALLBACK_REPLY));
    assert_eq!(exchange.outcome, Some(Outcome::Unavailable));
}
