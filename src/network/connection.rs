//! Connection manager: owns the single live channel of the local party.
//!
//! State machine: `Closed -> Connecting -> Open -> (Closed | Errored)`.
//! At most one handle exists at a time; opening always closes first.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::common::{ChannelBinding, ChatEvent, ConnectionState, PartyId};
use crate::error::{ChatError, Result};
use crate::storage::PresenceTracker;

use super::transport::{ChannelSignal, Connector, LiveChannel, channel_endpoint};

/// What a handle reports back: the outcome of its connect attempt, then
/// whatever the established channel signals.
#[derive(Debug)]
pub enum HandleSignal {
    Connected(LiveChannel),
    ConnectFailed(ChatError),
    Channel(ChannelSignal),
}

/// A handle signal tagged with the generation of the handle that produced it.
#[derive(Debug)]
pub struct TaggedSignal {
    pub generation: u64,
    pub signal: HandleSignal,
}

/// The live handle. Dropping it tears the channel down.
pub struct ConnectionHandle {
    generation: u64,
    binding: ChannelBinding,
    state: ConnectionState,
    outbound: Option<mpsc::UnboundedSender<String>>,
    /// The connect attempt while `Connecting`, the inbound pump once `Open`.
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    pub fn owner(&self) -> &PartyId {
        &self.binding.owner
    }

    pub fn active_counterpart(&self) -> &PartyId {
        &self.binding.counterpart
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn teardown(&mut self) {
        self.outbound = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    service_base: String,
    handle: Option<ConnectionHandle>,
    presence: PresenceTracker,
    next_generation: u64,
    signal_sender: mpsc::UnboundedSender<TaggedSignal>,
    events: Vec<ChatEvent>,
}

impl ConnectionManager {
    /// Signals of every handle this manager opens are forwarded to the
    /// returned receiver.
    pub fn new(
        connector: Arc<dyn Connector>,
        service_base: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<TaggedSignal>) {
        let (signal_sender, signal_receiver) = mpsc::unbounded_channel();
        let manager = Self {
            connector,
            service_base: service_base.into(),
            handle: None,
            presence: PresenceTracker::new(),
            next_generation: 0,
            signal_sender,
            events: Vec::new(),
        };
        (manager, signal_receiver)
    }

    pub fn state(&self) -> ConnectionState {
        self.handle
            .as_ref()
            .map(ConnectionHandle::state)
            .unwrap_or(ConnectionState::Closed)
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn handle(&self) -> Option<&ConnectionHandle> {
        self.handle.as_ref()
    }

    pub fn binding(&self) -> Option<&ChannelBinding> {
        self.handle.as_ref().map(|handle| &handle.binding)
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn is_online(&self, counterpart: &PartyId) -> bool {
        self.presence.is_online(counterpart)
    }

    /// Transitions and presence changes recorded since the last call.
    pub fn take_events(&mut self) -> Vec<ChatEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start opening a channel on the owner's own endpoint, bound to
    /// `binding`'s counterpart. Any existing handle is closed first.
    ///
    /// Returns as soon as the handle is `Connecting`; the outcome arrives as a
    /// [`HandleSignal::Connected`] or [`HandleSignal::ConnectFailed`] signal.
    pub fn open(&mut self, binding: ChannelBinding) -> Result<()> {
        if binding.owner.as_str().is_empty() || binding.counterpart.as_str().is_empty() {
            return Err(ChatError::InvalidBinding(
                "owner and counterpart identities are required".to_string(),
            ));
        }

        self.close();

        self.next_generation += 1;
        let generation = self.next_generation;
        let endpoint = channel_endpoint(&self.service_base, &binding.owner);
        let counterpart = binding.counterpart.clone();

        log::debug!("Connecting #{generation} to {endpoint} for chat with {counterpart}");
        let connector = Arc::clone(&self.connector);
        let forward = self.signal_sender.clone();
        let attempt = tokio::spawn(async move {
            let signal = match connector.connect(&endpoint).await {
                Ok(channel) => HandleSignal::Connected(channel),
                Err(err) => HandleSignal::ConnectFailed(err),
            };
            if forward.send(TaggedSignal { generation, signal }).is_err() {
                log::debug!("Connect attempt #{generation} finished after the manager went away");
            }
        });

        self.handle = Some(ConnectionHandle {
            generation,
            binding,
            state: ConnectionState::Connecting,
            outbound: None,
            task: Some(attempt),
        });
        self.record_state(&counterpart, ConnectionState::Connecting);
        Ok(())
    }

    /// Explicit teardown. Closing when nothing is open is a no-op.
    pub fn close(&mut self) -> bool {
        let Some(mut handle) = self.handle.take() else {
            return false;
        };
        handle.teardown();
        let counterpart = handle.binding.counterpart.clone();
        log::info!("Closing channel for chat with {counterpart}");
        self.record_state(&counterpart, ConnectionState::Closed);
        self.record_presence(&counterpart, false);
        true
    }

    /// Apply a handle signal. Returns the frame text when it should be decoded.
    /// Signals from handles that were already torn down are ignored, which
    /// also drops (and so closes) a channel whose connect finished too late.
    pub fn handle_signal(&mut self, tagged: TaggedSignal) -> Option<String> {
        let Some(handle) = self.handle.as_mut() else {
            log::debug!("Ignoring signal for closed handle #{}", tagged.generation);
            return None;
        };
        if handle.generation != tagged.generation {
            log::debug!(
                "Ignoring stale signal from handle #{} (current #{})",
                tagged.generation,
                handle.generation
            );
            return None;
        }

        match tagged.signal {
            HandleSignal::Connected(channel) => {
                if handle.state != ConnectionState::Connecting {
                    log::debug!("Ignoring late connect for handle in {} state", handle.state);
                    return None;
                }
                let LiveChannel { outbound, mut inbound } = channel;
                let forward = self.signal_sender.clone();
                let generation = handle.generation;
                let pump = tokio::spawn(async move {
                    while let Some(signal) = inbound.recv().await {
                        let tagged = TaggedSignal {
                            generation,
                            signal: HandleSignal::Channel(signal),
                        };
                        if forward.send(tagged).is_err() {
                            break;
                        }
                    }
                });
                handle.outbound = Some(outbound);
                handle.task = Some(pump);
                handle.state = ConnectionState::Open;
                let counterpart = handle.binding.counterpart.clone();
                log::info!("Channel #{generation} open for chat with {counterpart}");
                self.record_state(&counterpart, ConnectionState::Open);
                self.record_presence(&counterpart, true);
                None
            }
            HandleSignal::ConnectFailed(err) => {
                log::warn!("Failed to open channel #{}: {err}", handle.generation);
                handle.state = ConnectionState::Errored;
                handle.task = None;
                let counterpart = handle.binding.counterpart.clone();
                self.record_state(&counterpart, ConnectionState::Errored);
                self.record_presence(&counterpart, false);
                None
            }
            HandleSignal::Channel(ChannelSignal::Frame(text)) => {
                if handle.state == ConnectionState::Open {
                    Some(text)
                } else {
                    log::debug!("Dropping frame received in {} state", handle.state);
                    None
                }
            }
            HandleSignal::Channel(ChannelSignal::Closed) => {
                self.close();
                None
            }
            HandleSignal::Channel(ChannelSignal::Errored(reason)) => {
                log::warn!("Channel error for chat with {}: {reason}", handle.binding.counterpart);
                handle.state = ConnectionState::Errored;
                handle.outbound = None;
                let counterpart = handle.binding.counterpart.clone();
                self.record_state(&counterpart, ConnectionState::Errored);
                self.record_presence(&counterpart, false);
                None
            }
        }
    }

    /// Queue a text frame on the open channel.
    pub fn transmit(&mut self, frame: String) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(ChatError::ChannelNotOpen);
        };
        if handle.state != ConnectionState::Open {
            return Err(ChatError::ChannelNotOpen);
        }
        let Some(outbound) = handle.outbound.as_ref() else {
            return Err(ChatError::ChannelNotOpen);
        };
        outbound.send(frame).map_err(|_| ChatError::ChannelClosed)
    }

    /// Forget all presence state (session reset).
    pub fn clear_presence(&mut self) {
        self.presence.clear();
    }

    fn record_state(&mut self, counterpart: &PartyId, state: ConnectionState) {
        log::debug!("Connection with {counterpart} -> {state}");
        self.events.push(ChatEvent::ConnectionChanged {
            counterpart: counterpart.clone(),
            state,
        });
    }

    fn record_presence(&mut self, counterpart: &PartyId, online: bool) {
        if self.presence.set(counterpart, online) {
            self.events.push(ChatEvent::PresenceChanged {
                counterpart: counterpart.clone(),
                online,
            });
        }
    }
}
