//! Live complaint chat between a customer and the employee assigned to their
//! complaint: one persistent channel per local party, presence inferred from
//! that channel, optimistic local echo, and a REST fallback when the channel
//! is down.

pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod storage;
pub mod ui;

pub use common::{ChatCommand, ChatEvent, ComplaintId, Message, PartyId};
pub use error::{ChatError, Result};
pub use network::{ChatClient, ClientOptions, SendStatus};
