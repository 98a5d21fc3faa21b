use complaint_chat::common::{ComplaintId, Direction, PartyId};
use complaint_chat::error::ChatError;
use complaint_chat::network::{ApiHistory, ComplaintApi, HttpComplaintApi};
use complaint_chat::storage::HistorySource;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Answer exactly one request with `status` and `body`; yields the raw request.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        request
    });
    (format!("http://{addr}"), server)
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let read = stream.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..read]);
        if let Some(end) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn api(base_url: String) -> HttpComplaintApi {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    HttpComplaintApi::with_client(http, base_url)
}

#[tokio::test]
async fn post_sends_message_body_and_returns_created_record() {
    let (base, server) = serve_once(
        "201 Created",
        r#"{"message": {"text": "hi", "sent_at": "2024-05-01T10:00:00Z"}}"#,
    )
    .await;

    let record = api(base)
        .post_message(&ComplaintId::from("42"), "hi")
        .await
        .unwrap()
        .expect("record");

    assert_eq!(record.content().as_deref(), Some("hi"));
    assert!(record.timestamp().is_some());
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /complaints/42/messages HTTP/1.1"));
    assert!(request.ends_with(r#"{"message":"hi"}"#));
}

#[tokio::test]
async fn post_without_record_is_still_a_success() {
    let (base, server) = serve_once("200 OK", r#"{"status": "sent"}"#).await;

    let record = api(base)
        .post_message(&ComplaintId::from("42"), "hi")
        .await
        .unwrap();

    assert!(record.is_none());
    server.await.unwrap();
}

#[tokio::test]
async fn post_failure_carries_server_message() {
    let (base, server) =
        serve_once("400 Bad Request", r#"{"detail": "Complaint is closed"}"#).await;

    let err = api(base)
        .post_message(&ComplaintId::from("42"), "hi")
        .await
        .unwrap_err();

    match err {
        ChatError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Complaint is closed");
        }
        other => panic!("unexpected error: {other}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn post_failure_without_body_uses_status_code() {
    let (base, server) = serve_once("500 Internal Server Error", "").await;

    let err = api(base)
        .post_message(&ComplaintId::from("42"), "hi")
        .await
        .unwrap_err();

    assert_eq!(err.notice_text(), "Failed to send (500)");
    server.await.unwrap();
}

#[tokio::test]
async fn history_is_fetched_and_normalised() {
    let (base, server) = serve_once(
        "200 OK",
        r#"[{"text": "help", "user_id": "cus-1"}, {"content": "on it", "sender_id": "emp-1"}, {"id": 3}]"#,
    )
    .await;

    let api: Arc<dyn ComplaintApi> = Arc::new(api(base));
    let history = ApiHistory::new(api, PartyId::from("emp-1"));
    let messages = history.fetch_history(&ComplaintId::from("9")).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].direction(), Direction::Received);
    assert_eq!(messages[1].direction(), Direction::Sent);
    let request = server.await.unwrap();
    assert!(request.starts_with("GET /complaints/9/messages HTTP/1.1"));
}

#[tokio::test]
async fn history_error_status_is_reported() {
    let (base, server) = serve_once("404 Not Found", r#"{"detail": "Not found"}"#).await;

    let err = api(base)
        .fetch_messages(&ComplaintId::from("9"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Status { status: 404, .. }));
    server.await.unwrap();
}
