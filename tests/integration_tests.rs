//! End-to-end tests for the HTTP transport and chat session using wiremock.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use streamchat::{
    APOLOGY_MESSAGE, ChatClient, ChatConfig, ChatSession, Message, Role, TurnOutcome,
};

fn config_for(server: &MockServer) -> ChatConfig {
    ChatConfig::new()
        .with_base_url(server.uri())
        .with_timeout(Duration::from_secs(5))
}

/// Builds a reply body the way the service frames it: one word per record.
fn event_stream(words: &[&str]) -> String {
    let mut body = String::new();
    for word in words {
        let chunk = serde_json::json!({ "content": format!("{word} ") });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mount_reply(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

/// Serves one chunked reply on a raw socket, pausing before each record.
async fn serve_slowly(records: Vec<&'static str>, pause: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            let body_done = text
                .split_once("\r\n\r\n")
                .is_some_and(|(_, body)| body.ends_with('}'));
            if n == 0 || body_done {
                break;
            }
        }
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();
        for record in records {
            tokio::time::sleep(pause).await;
            let chunk = format!("{:x}\r\n{record}\r\n", record.len());
            socket.write_all(chunk.as_bytes()).await.unwrap();
        }
        socket.write_all(b"0\r\n\r\n").await.unwrap();
        socket.flush().await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn streamed_reply_becomes_one_assistant_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({ "message": "Hello world" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(event_stream(&["Hello", "world"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ChatSession::from_config(&config_for(&server)).unwrap();
    let outcome = session
        .send("Hello world", &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_completed(), "unexpected outcome: {outcome:?}");
    assert_eq!(
        session.messages(),
        &[
            Message::user("Hello world"),
            Message::assistant("Hello world ")
        ]
    );
}

#[tokio::test]
async fn malformed_records_do_not_break_the_reply() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"content\":\"Hi\"}\n\n",
        "data: not-json\n\n",
        ": keep-alive\n\n",
        "data: {\"content\":\" there\"}\n\n",
        "data: [DONE]\n\n",
    );
    mount_reply(&server, body.to_string()).await;

    let mut session = ChatSession::from_config(&config_for(&server)).unwrap();
    session
        .send("hi", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(session.messages()[1], Message::assistant("Hi there"));
    assert_eq!(session.stats().payload_anomalies, 1);
}

#[tokio::test]
async fn conversation_grows_across_turns() {
    let server = MockServer::start().await;
    mount_reply(&server, event_stream(&["ok"])).await;

    let mut session = ChatSession::from_config(&config_for(&server)).unwrap();
    let cancel = CancellationToken::new();
    session.send("one", &cancel).await.unwrap();
    session.send("two", &cancel).await.unwrap();

    let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(session.stats().completed, 2);
}

#[tokio::test]
async fn server_error_yields_a_single_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({ "detail": "boom" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ChatSession::from_config(&config_for(&server)).unwrap();
    let outcome = session
        .send("Hello", &CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        TurnOutcome::TransportFailed(err) => {
            assert!(err.is_server_error());
            assert!(err.to_string().contains("boom"));
        }
        other => panic!("expected a transport failure, got {other:?}"),
    }
    assert_eq!(
        session.messages(),
        &[Message::user("Hello"), Message::assistant(APOLOGY_MESSAGE)]
    );
}

#[tokio::test]
async fn refused_connection_yields_a_single_apology() {
    // Grab a free port, then close it so nothing is listening there.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ChatConfig::new()
        .with_base_url(format!("http://127.0.0.1:{port}"))
        .with_timeout(Duration::from_secs(5));

    let mut session = ChatSession::from_config(&config).unwrap();
    let outcome = session
        .send("Hello", &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, TurnOutcome::TransportFailed(_)));
    assert_eq!(session.message_count(), 2);
    assert_eq!(session.messages()[1].content, APOLOGY_MESSAGE);
}

#[tokio::test]
async fn health_check_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(&config_for(&server)).unwrap();
    let report = client.health().await.unwrap();
    assert_eq!(report.status.as_deref(), Some("ok"));
}

#[tokio::test]
async fn health_check_fails_on_unavailable_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = ChatClient::new(&config_for(&server)).unwrap();
    let err = client.health().await.unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(err.status_code(), Some(503));
}

#[tokio::test]
async fn base_path_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/v1/api/chat/stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(event_stream(&["routed"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server).with_base_url(format!("{}/chat/v1", server.uri()));
    let mut session = ChatSession::from_config(&config).unwrap();
    session
        .send("where", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(session.messages()[1].content, "routed ");
}

#[tokio::test]
async fn slow_reply_outlives_the_request_timeout() {
    let record = "data: {\"content\":\"a\"}\n\n";
    let base_url = serve_slowly(
        vec![record, record, record, "data: [DONE]\n\n"],
        Duration::from_millis(400),
    )
    .await;
    let config = ChatConfig::new()
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(1));

    let mut session = ChatSession::from_config(&config).unwrap();
    let outcome = session
        .send("q", &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_completed(), "unexpected outcome: {outcome:?}");
    assert_eq!(
        session.messages(),
        &[Message::user("q"), Message::assistant("aaa")]
    );
}
