use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinError, JoinSet};

use crate::common::{
    ChannelBinding, ChatCommand, ChatEvent, ComplaintId, ConnectionState, Message, Notice, PartyId,
};
use crate::config::EchoReconciliation;
use crate::error::Result;
use crate::protocol::{Decoded, FrameContext, FrameDecoder};
use crate::storage::{ConversationStore, HistorySource};

use super::connection::{ConnectionManager, TaggedSignal};
use super::dispatcher::{Dispatch, FallbackOutcome, OutboundDispatcher, OutgoingMessage};
use super::http::{ApiHistory, ComplaintApi};
use super::transport::Connector;

/// A finished history fetch and the complaint it was started for.
type HistoryResult = (ComplaintId, Result<Vec<Message>>);

/// What happened to a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// No conversation is open.
    NoConversation,
    /// Empty content; nothing was sent and the draft was kept.
    Rejected,
    /// Sent over the live channel and echoed locally.
    Sent,
    /// Handed to the fallback transport; the message lands on completion.
    /// This includes sends made while the channel is still connecting.
    Deferred,
}

/// Local party settings for one chat client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub owner: PartyId,
    pub display_name: Option<String>,
    pub service_base: String,
    pub echo_reconciliation: EchoReconciliation,
}

/// Chat controller for one active view. Owns the live channel, the
/// conversation store and the compose draft; emits [`ChatEvent`]s.
pub struct ChatClient {
    event_sender: mpsc::Sender<ChatEvent>,
    options: ClientOptions,
    connection: ConnectionManager,
    signal_receiver: mpsc::UnboundedReceiver<TaggedSignal>,
    dispatcher: OutboundDispatcher,
    history: Arc<dyn HistorySource>,
    history_sender: mpsc::UnboundedSender<HistoryResult>,
    history_receiver: mpsc::UnboundedReceiver<HistoryResult>,
    store: ConversationStore,
    decoder: FrameDecoder,
    fallbacks: JoinSet<FallbackOutcome>,
    active: Option<ChannelBinding>,
    draft: String,
}

impl ChatClient {
    pub fn new(
        options: ClientOptions,
        connector: Arc<dyn Connector>,
        api: Arc<dyn ComplaintApi>,
        event_sender: mpsc::Sender<ChatEvent>,
    ) -> Self {
        let history = ApiHistory::new(Arc::clone(&api), options.owner.clone());
        Self::with_history(options, connector, api, Arc::new(history), event_sender)
    }

    pub fn with_history(
        options: ClientOptions,
        connector: Arc<dyn Connector>,
        api: Arc<dyn ComplaintApi>,
        history: Arc<dyn HistorySource>,
        event_sender: mpsc::Sender<ChatEvent>,
    ) -> Self {
        let (connection, signal_receiver) =
            ConnectionManager::new(connector, options.service_base.clone());
        let (history_sender, history_receiver) = mpsc::unbounded_channel();
        Self {
            event_sender,
            options,
            connection,
            signal_receiver,
            dispatcher: OutboundDispatcher::new(api),
            history,
            history_sender,
            history_receiver,
            store: ConversationStore::new(),
            decoder: FrameDecoder::default(),
            fallbacks: JoinSet::new(),
            active: None,
            draft: String::new(),
        }
    }

    pub fn with_decoder(mut self, decoder: FrameDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn owner(&self) -> &PartyId {
        &self.options.owner
    }

    pub fn active_conversation(&self) -> Option<&ChannelBinding> {
        self.active.as_ref()
    }

    pub fn messages_for(&self, complaint_id: &ComplaintId) -> &[Message] {
        self.store.messages_for(complaint_id)
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn is_online(&self, counterpart: &PartyId) -> bool {
        self.connection.is_online(counterpart)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Command loop: runs until the command channel closes, then tears the
    /// live channel down and waits for fallback sends still in flight, so
    /// their messages reach the store and the view before the client stops.
    pub async fn run(mut self, mut command_receiver: mpsc::Receiver<ChatCommand>) {
        log::info!("Chat client started for {}", self.options.owner);

        loop {
            tokio::select! {
                command = command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                Some(tagged) = self.signal_receiver.recv() => {
                    self.handle_signal(tagged).await;
                }
                Some((complaint_id, fetched)) = self.history_receiver.recv() => {
                    self.handle_history(complaint_id, fetched);
                }
                Some(joined) = self.fallbacks.join_next() => {
                    self.handle_fallback_joined(joined);
                }
            }
        }

        self.close_conversation().await;
        if !self.fallbacks.is_empty() {
            log::info!("Waiting for {} fallback sends", self.fallbacks.len());
        }
        while let Some(joined) = self.fallbacks.join_next().await {
            self.handle_fallback_joined(joined);
        }
        log::info!("Chat client for {} stopped", self.options.owner);
    }

    /// Process the next channel signal, history result or fallback completion.
    pub async fn process_next(&mut self) {
        tokio::select! {
            Some(tagged) = self.signal_receiver.recv() => {
                self.handle_signal(tagged).await;
            }
            Some((complaint_id, fetched)) = self.history_receiver.recv() => {
                self.handle_history(complaint_id, fetched);
            }
            Some(joined) = self.fallbacks.join_next() => {
                self.handle_fallback_joined(joined);
            }
        }
    }

    /// Whether the active conversation still waits on its channel or history.
    pub fn is_settling(&self) -> bool {
        let loading = self
            .active
            .as_ref()
            .is_some_and(|binding| self.store.is_loading(&binding.complaint_id));
        loading || self.connection.state() == ConnectionState::Connecting
    }

    pub async fn handle_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::OpenConversation {
                complaint_id,
                counterpart,
                counterpart_name,
            } => {
                self.open_conversation(complaint_id, counterpart, counterpart_name)
                    .await;
            }
            ChatCommand::CloseConversation => self.close_conversation().await,
            ChatCommand::UpdateDraft(text) => self.set_draft(text),
            ChatCommand::SubmitDraft => {
                self.submit_draft().await;
            }
            ChatCommand::SendMessage(content) => {
                self.send(content).await;
            }
            ChatCommand::ResetSession => self.reset_session().await,
        }
    }

    /// Bind the live channel to this conversation and start loading its
    /// history (first time only). Neither waits: the channel outcome and the
    /// history arrive later through [`process_next`](Self::process_next).
    /// A previous channel is closed before the new one opens.
    pub async fn open_conversation(
        &mut self,
        complaint_id: ComplaintId,
        counterpart: PartyId,
        counterpart_name: Option<String>,
    ) {
        let mut binding = ChannelBinding::new(
            self.options.owner.clone(),
            counterpart,
            complaint_id.clone(),
        );
        binding.counterpart_display_name = counterpart_name;
        self.active = Some(binding.clone());

        if self.store.begin_load(&complaint_id) {
            let history = Arc::clone(&self.history);
            let results = self.history_sender.clone();
            tokio::spawn(async move {
                let fetched = history.fetch_history(&complaint_id).await;
                if results.send((complaint_id, fetched)).is_err() {
                    log::debug!("History arrived after the chat client stopped");
                }
            });
        }

        if let Err(err) = self.connection.open(binding) {
            log::warn!("Cannot open live chat, sends will use the fallback transport: {err}");
        }
        self.flush_connection_events();
    }

    pub async fn close_conversation(&mut self) {
        self.connection.close();
        self.active = None;
        self.flush_connection_events();
    }

    /// Send the compose draft.
    pub async fn submit_draft(&mut self) -> SendStatus {
        let content = self.draft.clone();
        self.send(content).await
    }

    /// Send `content` to the active counterpart. The draft is cleared after
    /// every attempt except validation rejection.
    pub async fn send(&mut self, content: String) -> SendStatus {
        let Some(binding) = self.active.clone() else {
            log::warn!("Ignoring send with no open conversation");
            return SendStatus::NoConversation;
        };

        let outgoing = OutgoingMessage {
            complaint_id: binding.complaint_id.clone(),
            owner: self.options.owner.clone(),
            counterpart: binding.counterpart.clone(),
            content,
            sender_display_name: self.options.display_name.clone(),
        };

        let status = match self
            .dispatcher
            .dispatch(outgoing, &mut self.connection, &mut self.store)
        {
            Dispatch::Rejected => return SendStatus::Rejected,
            Dispatch::Echoed(message) => {
                let len = self.store.len_of(&binding.complaint_id);
                self.emit(ChatEvent::MessagesChanged {
                    complaint_id: binding.complaint_id.clone(),
                    len,
                    message,
                });
                let recipient = binding
                    .counterpart_display_name
                    .as_deref()
                    .unwrap_or("customer");
                self.emit(ChatEvent::Notice(Notice::success(format!(
                    "Message sent to {recipient}"
                ))));
                SendStatus::Sent
            }
            Dispatch::Deferred(fallback) => {
                log::debug!(
                    "Sending to complaint {} through the fallback transport",
                    fallback.complaint_id()
                );
                self.fallbacks.spawn(fallback.deliver());
                SendStatus::Deferred
            }
        };

        self.draft.clear();
        self.emit(ChatEvent::DraftCleared);
        status
    }

    /// Full session reset: channel, conversations and presence.
    pub async fn reset_session(&mut self) {
        self.close_conversation().await;
        self.store.clear();
        self.connection.clear_presence();
        log::info!("Chat session reset");
    }

    pub async fn handle_signal(&mut self, tagged: TaggedSignal) {
        if let Some(frame) = self.connection.handle_signal(tagged) {
            self.handle_frame(&frame);
        }
        self.flush_connection_events();
    }

    fn handle_history(&mut self, complaint_id: ComplaintId, fetched: Result<Vec<Message>>) {
        if self.store.finish_load(&complaint_id, fetched).is_some() {
            let len = self.store.len_of(&complaint_id);
            self.emit(ChatEvent::HistoryLoaded { complaint_id, len });
        }
    }

    fn handle_frame(&mut self, frame: &str) {
        let Some(binding) = self.connection.binding().cloned() else {
            return;
        };
        let ctx = FrameContext {
            complaint_id: &binding.complaint_id,
            counterpart: &binding.counterpart,
            counterpart_display_name: binding.counterpart_display_name.as_deref(),
        };

        match self.decoder.decode(frame, &ctx) {
            Decoded::Message(message) => {
                if self.try_reconcile(&binding.complaint_id, &message) {
                    return;
                }
                let len = self.store.append(&binding.complaint_id, message.clone());
                self.emit(ChatEvent::MessagesChanged {
                    complaint_id: binding.complaint_id.clone(),
                    len,
                    message,
                });
            }
            Decoded::Typing { who } => {
                self.emit(ChatEvent::Typing {
                    complaint_id: binding.complaint_id.clone(),
                    who,
                });
            }
            Decoded::Dropped(_) => {}
        }
    }

    /// Treat an unattributed frame matching our oldest pending message as the
    /// server's acknowledgment of it, when enabled.
    fn try_reconcile(&mut self, complaint_id: &ComplaintId, message: &Message) -> bool {
        if self.options.echo_reconciliation != EchoReconciliation::ConfirmPending
            || message.sender_identity().is_some()
        {
            return false;
        }
        match self
            .store
            .confirm_oldest_pending(complaint_id, message.content())
        {
            Some(correlation_id) => {
                log::debug!("Echo confirmed pending message {correlation_id}");
                self.emit(ChatEvent::MessageConfirmed {
                    complaint_id: complaint_id.clone(),
                    correlation_id,
                });
                true
            }
            None => false,
        }
    }

    fn handle_fallback_joined(&mut self, joined: std::result::Result<FallbackOutcome, JoinError>) {
        match joined {
            Ok(outcome) => self.handle_fallback_outcome(outcome),
            Err(err) => log::error!("Fallback send task failed: {err}"),
        }
    }

    fn handle_fallback_outcome(&mut self, outcome: FallbackOutcome) {
        let FallbackOutcome { message, error } = outcome;
        // Appended to the conversation captured at send time.
        let complaint_id = message.conversation_id().clone();
        let len = self.store.append(&complaint_id, message.clone());
        self.emit(ChatEvent::MessagesChanged {
            complaint_id,
            len,
            message,
        });
        if let Some(err) = error {
            self.emit(ChatEvent::Notice(Notice::error(err.notice_text())));
        }
    }

    fn flush_connection_events(&mut self) {
        for event in self.connection.take_events() {
            self.emit(event);
        }
    }

    /// Never waits on the view: a full event buffer drops the event.
    fn emit(&self, event: ChatEvent) {
        match self.event_sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::warn!("View is not keeping up, dropping event: {event:?}");
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("View is gone, event not delivered");
            }
        }
    }
}
