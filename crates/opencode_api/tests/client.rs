#[path = "../src/testing.rs"]
#[allow(dead_code)]
mod testing;

use std::sync::atomic::Ordering;
use std::time::Duration;

use opencode_api::headers::basic_auth_value;
use opencode_api::{
    with_cancellation, ApiError, CancellationSignal, MessagePart, MessageRole, OpencodeClient,
    OpencodeConfig, SessionStatus,
};
use reqwest::StatusCode;
use serde_json::json;
use testing::{json_response, sse_held_open, Route, ScriptedResponse, ScriptedServer};

async fn server(routes: Vec<Route>) -> ScriptedServer {
    ScriptedServer::start(routes)
        .await
        .expect("local scripted server should bind")
}

fn client_for(server: &ScriptedServer) -> OpencodeClient {
    let config = OpencodeConfig::new(server.base_url()).with_password("secret");
    OpencodeClient::new(config).expect("client")
}

#[tokio::test]
async fn create_session_decodes_defaults_and_sends_title() {
    let server = server(vec![Route::new(
        "POST",
        "/session",
        json_response(
            200,
            r#"{"id":"s1","title":"T","createdAt":1000,"updatedAt":1000}"#,
        ),
    )])
    .await;
    let client = client_for(&server);

    let session = client
        .create_session(Some("T"), None)
        .await
        .expect("session should be created");

    assert_eq!(session.id, "s1");
    assert_eq!(session.title, "T");
    assert_eq!(session.created_at, 1000);
    assert_eq!(session.status, SessionStatus::Idle);
    assert!(!session.is_shared);

    let requests = server.requests_to("/session");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].json_body(), json!({"title": "T"}));
    assert_eq!(
        requests[0].header("content-type"),
        Some("application/json")
    );
}

#[tokio::test]
async fn send_message_joins_text_parts() {
    let server = server(vec![Route::new(
        "POST",
        "/session/s1/message",
        json_response(
            200,
            r#"{
                "info": {"id": "m1", "sessionID": "s1", "role": "assistant"},
                "parts": [
                    {"type": "text", "text": "a"},
                    {"type": "step-start"},
                    {"type": "text", "text": "b"}
                ]
            }"#,
        ),
    )])
    .await;
    let client = client_for(&server);

    let message = client
        .send_message("s1", "hi", Some("anthropic/claude"), None, None)
        .await
        .expect("message");

    assert_eq!(message.text_content(), "a\nb");
    assert_eq!(message.info.role, MessageRole::Assistant);
    assert_eq!(message.parts.len(), 2);

    let request = &server.requests_to("/session/s1/message")[0];
    assert_eq!(
        request.json_body(),
        json!({
            "parts": [{"type": "text", "content": "hi"}],
            "model": "anthropic/claude",
        })
    );
}

#[tokio::test]
async fn delete_session_reports_false_on_not_found() {
    let server = server(vec![Route::new(
        "DELETE",
        "/session/s1",
        json_response(404, r#"{"error":{"message":"session not found"}}"#),
    )])
    .await;
    let client = client_for(&server);

    assert!(!client.delete_session("s1").await);
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn abort_sends_empty_json_body() {
    let server = server(vec![Route::new(
        "POST",
        "/session/s1/abort",
        json_response(200, "true"),
    )])
    .await;
    let client = client_for(&server);

    assert!(client.abort_session("s1").await);
    let request = &server.requests_to("/session/s1/abort")[0];
    assert_eq!(request.body, "{}");
    assert_eq!(request.header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn every_request_carries_basic_auth() {
    let server = server(vec![
        Route::new(
            "GET",
            "/global/health",
            json_response(200, r#"{"healthy":true,"version":"1.2.3"}"#),
        ),
        Route::new("GET", "/session", json_response(200, "[]")),
    ])
    .await;
    let client = client_for(&server);

    let health = client.check_health().await.expect("health");
    assert!(health.healthy);
    assert_eq!(health.version, "1.2.3");
    assert!(client.list_sessions().await.expect("sessions").is_empty());

    let expected = basic_auth_value("opencode", "secret");
    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    for request in requests {
        assert_eq!(request.header("authorization"), Some(expected.as_str()));
        assert_eq!(request.header("accept"), Some("application/json"));
        assert!(request
            .header("user-agent")
            .is_some_and(|agent| agent.starts_with("opencode-sync/")));
    }
}

#[tokio::test]
async fn user_supplied_segments_and_queries_are_percent_encoded() {
    let server = server(vec![
        Route::new("GET", "/session/a%2Fb%20c", json_response(200, r#"{"id":"a/b c"}"#)),
        Route::new("GET", "/find", json_response(200, "[]")),
    ])
    .await;
    let client = client_for(&server);

    let session = client.get_session("a/b c").await.expect("session");
    assert_eq!(session.id, "a/b c");
    assert_eq!(session.title, "Untitled");

    client
        .search_in_files("fn main() & co")
        .await
        .expect("search");
    let search = &server.requests_to("/find")[0];
    assert_eq!(search.target, "/find?pattern=fn%20main%28%29%20%26%20co");
}

#[tokio::test]
async fn list_messages_passes_limit_and_decodes_list() {
    let server = server(vec![Route::new(
        "GET",
        "/session/s1/message",
        json_response(
            200,
            r#"[
                {"info": {"id": "m1", "sessionID": "s1", "role": "user"},
                 "parts": [{"type": "text", "text": "hi"}]},
                {"info": {"id": "m2", "sessionID": "s1", "role": "assistant"},
                 "parts": [{"type": "tool", "toolCall": {"id": "t1", "name": "bash"}}]}
            ]"#,
        ),
    )])
    .await;
    let client = client_for(&server);

    let messages = client
        .list_messages("s1", Some(100))
        .await
        .expect("messages");

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text_content(), "hi");
    assert!(matches!(
        &messages[1].parts[0],
        MessagePart::ToolCall { name, .. } if name == "bash"
    ));
    assert_eq!(
        server.requests_to("/session/s1/message")[0].target,
        "/session/s1/message?limit=100"
    );
}

#[tokio::test]
async fn list_endpoint_rejects_non_array() {
    let server = server(vec![Route::new(
        "GET",
        "/session",
        json_response(200, r#"{"sessions":[]}"#),
    )])
    .await;
    let client = client_for(&server);

    let error = client.list_sessions().await.expect_err("decode error");
    assert!(matches!(error, ApiError::Decode(_)));
}

#[tokio::test]
async fn http_errors_carry_status_and_server_message() {
    let server = server(vec![Route::new(
        "GET",
        "/session/missing",
        json_response(404, r#"{"error":{"message":"no such session"}}"#),
    )])
    .await;
    let client = client_for(&server);

    let error = client.get_session("missing").await.expect_err("404");
    match error {
        ApiError::Http { status, message } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(message, "no such session");
        }
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let server = server(vec![]).await;
    let base_url = server.base_url().to_owned();
    drop(server);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let client = OpencodeClient::new(OpencodeConfig::new(base_url)).expect("client");
    let error = client.list_sessions().await.expect_err("network");
    assert!(matches!(error, ApiError::Network(_)), "got {error:?}");
    assert!(error.is_retryable(&reqwest::Method::GET));
}

#[tokio::test]
async fn reset_connection_is_a_network_error() {
    let server = server(vec![Route::new("GET", "/session", ScriptedResponse::Reset)]).await;
    let client = client_for(&server);

    let error = client.list_sessions().await.expect_err("reset");
    assert!(matches!(error, ApiError::Network(_)), "got {error:?}");
}

#[tokio::test]
async fn providers_read_all_catalog() {
    let server = server(vec![
        Route::new(
            "GET",
            "/provider",
            json_response(
                200,
                r#"{"all":[{"id":"anthropic","name":"Anthropic","models":{"claude":{},"haiku":{}}}],"default":{}}"#,
            ),
        ),
        Route::new("PUT", "/auth/anthropic", json_response(200, "true")),
    ])
    .await;
    let client = client_for(&server);

    let providers = client.list_providers().await.expect("providers");
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].id, "anthropic");
    assert_eq!(providers[0].models, vec!["claude", "haiku"]);

    let credentials = [("key".to_owned(), "sk-1".to_owned())].into_iter().collect();
    assert!(client.set_provider_auth("anthropic", &credentials).await);
    assert_eq!(
        server.requests_to("/auth/anthropic")[0].json_body(),
        json!({"key": "sk-1"})
    );
}

#[tokio::test]
async fn read_file_falls_back_to_requested_path() {
    let server = server(vec![Route::new(
        "GET",
        "/file/content",
        json_response(200, r#"{"content":"fn main() {}"}"#),
    )])
    .await;
    let client = client_for(&server);

    let file = client.read_file("src/main.rs").await.expect("file");
    assert_eq!(file.path, "src/main.rs");
    assert_eq!(file.content, "fn main() {}");
    assert_eq!(file.encoding, "utf-8");
}

#[tokio::test]
async fn cancellation_flag_abandons_inflight_request() {
    let server = server(vec![Route::new(
        "GET",
        "/session",
        testing::sse_held_open(&[]),
    )])
    .await;
    let client = client_for(&server);
    let signal = CancellationSignal::default();

    let cancel = {
        let signal = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            signal.store(true, Ordering::Release);
        })
    };

    let error = with_cancellation(client.list_sessions(), &signal)
        .await
        .expect_err("cancelled");
    assert!(error.is_cancelled());
    cancel.await.expect("cancel task");
}

#[tokio::test]
async fn rest_calls_stop_at_the_whole_request_deadline() {
    let server = server(vec![Route::new("GET", "/session", sse_held_open(&[]))]).await;
    let config = OpencodeConfig::new(server.base_url())
        .with_read_timeout(Some(Duration::from_millis(400)))
        .with_write_timeout(Duration::from_millis(100));
    assert_eq!(config.request_deadline(), Some(Duration::from_millis(500)));
    let client = OpencodeClient::new(config).expect("client");

    let started = std::time::Instant::now();
    let error = tokio::time::timeout(Duration::from_secs(5), client.list_sessions())
        .await
        .expect("deadline should fire before the guard")
        .expect_err("trickling body never completes");

    assert!(matches!(error, ApiError::Network(_)), "got {error:?}");
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[test]
fn unbounded_reads_drop_the_request_deadline() {
    let config = OpencodeConfig::default().with_read_timeout(None);
    assert_eq!(config.request_deadline(), None);
    assert_eq!(
        OpencodeConfig::default().request_deadline(),
        Some(Duration::from_secs(90))
    );
}
