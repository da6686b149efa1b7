//! Wire protocol
//!
//! Every exchange is a self-delimiting frame: a 137-byte header followed by
//! an opaque payload. The same framing flows in both directions; frames the
//! broker pushes to subscribers carry the subscribe tag.

pub mod command;
pub mod constants;
pub mod decoder;
pub mod frame;

pub use command::Command;
pub use decoder::FrameDecoder;
pub use frame::{decode_header, decode_identifier, encode, encode_identifier, Frame, FrameHeader};
