pub mod decoder;
pub mod envelope;

pub use decoder::{Decoded, DropReason, FrameContext, FrameDecoder, FrameMatcher};
pub use envelope::{MessageRecord, OutboundEnvelope};
