use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::common::PartyId;
use crate::error::{ChatError, Result};

/// What the live channel reports back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    Frame(String),
    Closed,
    Errored(String),
}

/// An established bidirectional channel.
///
/// Dropping `outbound` closes the channel from the local side.
#[derive(Debug)]
pub struct LiveChannel {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<ChannelSignal>,
}

/// Establishes the persistent channel for a local party.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<LiveChannel>;
}

/// `<chat-service-base>/<ownerIdentity>`: each party listens on its own channel.
pub fn channel_endpoint(service_base: &str, owner: &PartyId) -> String {
    format!("{}/{}", service_base.trim_end_matches('/'), owner)
}

/// WebSocket connector.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<LiveChannel> {
        let (ws_stream, _) =
            connect_async(endpoint)
                .await
                .map_err(|err| ChatError::ConnectFailed {
                    endpoint: endpoint.to_string(),
                    reason: err.to_string(),
                })?;
        log::info!("WebSocket connected to {endpoint}");

        let (mut ws_writer, mut ws_reader) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let writer_signals = inbound_tx.clone();
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(err) = ws_writer.send(WsMessage::Text(text)).await {
                    log::warn!("WebSocket send failed: {err}");
                    let _ = writer_signals.send(ChannelSignal::Errored(err.to_string()));
                    return;
                }
            }
            if let Err(err) = ws_writer.close().await {
                log::debug!("WebSocket close handshake failed: {err}");
            }
        });

        tokio::spawn(async move {
            while let Some(next) = ws_reader.next().await {
                let signal = match next {
                    Ok(WsMessage::Text(text)) => ChannelSignal::Frame(text),
                    Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => ChannelSignal::Frame(text),
                        Err(err) => {
                            log::warn!("Dropping non UTF-8 binary frame: {err}");
                            continue;
                        }
                    },
                    Ok(WsMessage::Close(frame)) => {
                        log::debug!("WebSocket closed by peer: {frame:?}");
                        let _ = inbound_tx.send(ChannelSignal::Closed);
                        return;
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        let _ = inbound_tx.send(ChannelSignal::Errored(err.to_string()));
                        return;
                    }
                };
                if inbound_tx.send(signal).is_err() {
                    // Owner went away.
                    return;
                }
            }
            let _ = inbound_tx.send(ChannelSignal::Closed);
        });

        Ok(LiveChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
