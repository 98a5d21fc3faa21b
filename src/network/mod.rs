pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod http;
pub mod transport;

pub use client::{ChatClient, ClientOptions, SendStatus};
pub use connection::{ConnectionHandle, ConnectionManager, HandleSignal, TaggedSignal};
pub use dispatcher::{Dispatch, FallbackOutcome, FallbackSend, OutboundDispatcher, OutgoingMessage};
pub use http::{ApiHistory, ComplaintApi, HttpComplaintApi};
pub use transport::{ChannelSignal, Connector, LiveChannel, WsConnector, channel_endpoint};
