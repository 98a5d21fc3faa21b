//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use complaint_chat::common::{ChatEvent, ComplaintId, PartyId};
use complaint_chat::config::EchoReconciliation;
use complaint_chat::error::{ChatError, Result};
use complaint_chat::network::{
    ChannelSignal, ChatClient, ClientOptions, ComplaintApi, Connector, LiveChannel,
};
use complaint_chat::protocol::MessageRecord;
use complaint_chat::protocol::envelope::{record_from_post_response, records_from_history};
use serde_json::Value;
use tokio::sync::{Notify, mpsc};

pub const SERVICE_BASE: &str = "wss://chat.test/ws";
pub const OWNER: &str = "emp-1";

/// The server side of a fake live channel.
pub struct RemoteEnd {
    pub endpoint: String,
    pub sent: mpsc::UnboundedReceiver<String>,
    pub signals: mpsc::UnboundedSender<ChannelSignal>,
}

impl RemoteEnd {
    pub fn push_frame(&self, text: &str) {
        self.signals
            .send(ChannelSignal::Frame(text.to_string()))
            .expect("channel owner alive");
    }

    pub fn close(&self) {
        self.signals
            .send(ChannelSignal::Closed)
            .expect("channel owner alive");
    }

    pub fn fail(&self, reason: &str) {
        self.signals
            .send(ChannelSignal::Errored(reason.to_string()))
            .expect("channel owner alive");
    }
}

#[derive(Default)]
pub struct FakeConnector {
    refuse: Mutex<bool>,
    hang: Mutex<bool>,
    attempts: Mutex<Vec<String>>,
    remotes: Mutex<VecDeque<RemoteEnd>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing() -> Arc<Self> {
        let connector = Self::default();
        *connector.refuse.lock().unwrap() = true;
        Arc::new(connector)
    }

    /// Connect attempts that never finish.
    pub fn hanging() -> Arc<Self> {
        let connector = Self::default();
        *connector.hang.lock().unwrap() = true;
        Arc::new(connector)
    }

    pub fn set_refuse(&self, refuse: bool) {
        *self.refuse.lock().unwrap() = refuse;
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Oldest channel that has not been taken yet.
    pub fn take_remote(&self) -> RemoteEnd {
        self.remotes
            .lock()
            .unwrap()
            .pop_front()
            .expect("a channel was opened")
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, endpoint: &str) -> Result<LiveChannel> {
        self.attempts.lock().unwrap().push(endpoint.to_string());
        let hang = *self.hang.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        if *self.refuse.lock().unwrap() {
            return Err(ChatError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        self.remotes.lock().unwrap().push_back(RemoteEnd {
            endpoint: endpoint.to_string(),
            sent: outbound_rx,
            signals: inbound_tx,
        });
        Ok(LiveChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// How the fake API answers a POST.
#[derive(Clone)]
pub enum PostReply {
    Body(Value),
    Fail { status: u16, message: String },
}

pub struct FakeApi {
    history: Mutex<HashMap<String, Value>>,
    history_fails: Mutex<bool>,
    reply: Mutex<PostReply>,
    posts: Mutex<Vec<(String, String)>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            history: Mutex::new(HashMap::new()),
            history_fails: Mutex::new(false),
            reply: Mutex::new(PostReply::Body(Value::Null)),
            posts: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        })
    }

    pub fn with_history(&self, complaint: &str, body: Value) {
        self.history
            .lock()
            .unwrap()
            .insert(complaint.to_string(), body);
    }

    pub fn fail_history(&self) {
        *self.history_fails.lock().unwrap() = true;
    }

    pub fn reply_with(&self, reply: PostReply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Hold every POST until the returned notify is signalled.
    pub fn gate_posts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComplaintApi for FakeApi {
    async fn fetch_messages(&self, complaint_id: &ComplaintId) -> Result<Vec<MessageRecord>> {
        if *self.history_fails.lock().unwrap() {
            return Err(ChatError::Status {
                status: 503,
                message: "history unavailable".to_string(),
            });
        }
        let body = self
            .history
            .lock()
            .unwrap()
            .get(complaint_id.as_str())
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        Ok(records_from_history(body))
    }

    async fn post_message(
        &self,
        complaint_id: &ComplaintId,
        content: &str,
    ) -> Result<Option<MessageRecord>> {
        self.posts
            .lock()
            .unwrap()
            .push((complaint_id.to_string(), content.to_string()));
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            PostReply::Body(body) => Ok(record_from_post_response(body)),
            PostReply::Fail { status, message } => Err(ChatError::Status { status, message }),
        }
    }
}

pub fn options(echo_reconciliation: EchoReconciliation) -> ClientOptions {
    ClientOptions {
        owner: PartyId::from(OWNER),
        display_name: Some("Employee".to_string()),
        service_base: SERVICE_BASE.to_string(),
        echo_reconciliation,
    }
}

pub fn client(
    connector: Arc<FakeConnector>,
    api: Arc<FakeApi>,
) -> (ChatClient, mpsc::Receiver<ChatEvent>) {
    client_with(connector, api, EchoReconciliation::Off)
}

pub fn client_with(
    connector: Arc<FakeConnector>,
    api: Arc<FakeApi>,
    echo_reconciliation: EchoReconciliation,
) -> (ChatClient, mpsc::Receiver<ChatEvent>) {
    client_with_capacity(connector, api, echo_reconciliation, 1024)
}

pub fn client_with_capacity(
    connector: Arc<FakeConnector>,
    api: Arc<FakeApi>,
    echo_reconciliation: EchoReconciliation,
    event_capacity: usize,
) -> (ChatClient, mpsc::Receiver<ChatEvent>) {
    let (event_tx, event_rx) = mpsc::channel(event_capacity);
    let client = ChatClient::new(options(echo_reconciliation), connector, api, event_tx);
    (client, event_rx)
}

/// Open a conversation and wait until its channel and history have settled.
pub async fn open(
    client: &mut ChatClient,
    complaint: &str,
    counterpart: &str,
    counterpart_name: Option<&str>,
) {
    client
        .open_conversation(
            ComplaintId::from(complaint),
            PartyId::from(counterpart),
            counterpart_name.map(str::to_string),
        )
        .await;
    settle(client).await;
}

pub async fn settle(client: &mut ChatClient) {
    while client.is_settling() {
        step(client).await;
    }
}

/// Process the next signal, history result or completion; fails the test if
/// none arrives.
pub async fn step(client: &mut ChatClient) {
    tokio::time::timeout(Duration::from_secs(2), client.process_next())
        .await
        .expect("client had nothing to process");
}

pub fn drain(events: &mut mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
