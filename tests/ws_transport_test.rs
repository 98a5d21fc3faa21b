use std::time::Duration;

use complaint_chat::common::PartyId;
use complaint_chat::error::ChatError;
use complaint_chat::network::{ChannelSignal, Connector, WsConnector, channel_endpoint};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

async fn recv_signal(
    inbound: &mut tokio::sync::mpsc::UnboundedReceiver<ChannelSignal>,
) -> ChannelSignal {
    tokio::time::timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("signal within timeout")
        .expect("channel open")
}

#[tokio::test]
async fn websocket_channel_carries_frames_both_ways() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut path = String::new();
        let ws = accept_hdr_async(
            stream,
            |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                path = request.uri().path().to_string();
                Ok(response)
            },
        )
        .await
        .unwrap();
        let (mut writer, mut reader) = ws.split();

        writer
            .send(WsMessage::Text("cus-1: hello".into()))
            .await
            .unwrap();
        let received = loop {
            match reader.next().await {
                Some(Ok(WsMessage::Text(text))) => break text.to_string(),
                Some(Ok(_)) => continue,
                other => panic!("unexpected client frame: {other:?}"),
            }
        };
        writer.send(WsMessage::Close(None)).await.unwrap();
        (path, received)
    });

    let endpoint = channel_endpoint(&format!("ws://{addr}/ws"), &PartyId::from("emp-1"));
    let mut channel = WsConnector.connect(&endpoint).await.unwrap();

    assert_eq!(
        recv_signal(&mut channel.inbound).await,
        ChannelSignal::Frame("cus-1: hello".to_string())
    );
    channel
        .outbound
        .send(r#"{"sender":"emp-1","receiver":"cus-1","content":"hi"}"#.to_string())
        .unwrap();
    assert_eq!(recv_signal(&mut channel.inbound).await, ChannelSignal::Closed);

    let (path, received) = server.await.unwrap();
    assert_eq!(path, "/ws/emp-1");
    assert_eq!(
        received,
        r#"{"sender":"emp-1","receiver":"cus-1","content":"hi"}"#
    );
}

#[tokio::test]
async fn unreachable_service_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = format!("ws://{addr}/ws/emp-1");
    let err = match WsConnector.connect(&endpoint).await {
        Ok(_) => panic!("connect should fail"),
        Err(err) => err,
    };

    match err {
        ChatError::ConnectFailed { endpoint: failed, .. } => assert_eq!(failed, endpoint),
        other => panic!("unexpected error: {other}"),
    }
}
