pub mod commands;
pub mod events;
pub mod types;

pub use commands::ChatCommand;
pub use events::ChatEvent;
pub use types::{
    ChannelBinding, ComplaintId, ConnectionState, DeliveryMarker, Direction, Message, Notice,
    NoticeLevel, PartyId,
};
