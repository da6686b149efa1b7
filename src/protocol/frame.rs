//! Frame codec
//!
//! Pure encode/decode of the fixed 137-byte header plus payload. No I/O
//! happens here; see [`FrameDecoder`](super::decoder::FrameDecoder) for
//! reassembly from a byte stream.
//!
//! Channel identifiers occupy a fixed 128-byte slot. Longer identifiers are
//! truncated on a character boundary, shorter ones zero-padded. On decode the identifier ends at the
//! first zero byte, or at the end of the slot if there is none.

use bytes::{BufMut, Bytes, BytesMut};

use super::command::Command;
use super::constants::{COMMAND_SIZE, HEADER_SIZE, IDENTIFIER_SIZE, PAYLOAD_LENGTH_SIZE};

/// Decoded frame header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw command byte (may be unknown)
    pub command: u8,
    /// Declared payload length
    pub payload_len: u64,
    /// Channel identifier with padding stripped
    pub channel: String,
}

impl FrameHeader {
    /// Parsed command, `None` if the byte is not a known command
    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.command)
    }

    /// Total frame size (header + payload)
    ///
    /// Returns `None` if the size does not fit in `usize`.
    pub fn frame_len(&self) -> Option<usize> {
        usize::try_from(self.payload_len)
            .ok()
            .and_then(|len| len.checked_add(HEADER_SIZE))
    }
}

/// A complete frame
///
/// The payload is a `Bytes` view into the receive buffer, so handing a frame
/// to several subscribers does not copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw command byte (may be unknown)
    pub command: u8,
    /// Channel identifier
    pub channel: String,
    /// Opaque payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame for a known command
    pub fn new(command: Command, channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            command: command.as_u8(),
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Parsed command, `None` if the byte is not a known command
    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.command)
    }

    /// Encode to wire format
    pub fn encode(&self) -> Bytes {
        encode_raw(self.command, &self.channel, &self.payload)
    }
}

/// Encode a frame
///
/// The result is always `137 + payload.len()` bytes; the identifier is
/// truncated or padded rather than rejected.
pub fn encode(command: Command, channel: &str, payload: &[u8]) -> Bytes {
    encode_raw(command.as_u8(), channel, payload)
}

/// Encode a frame with an arbitrary command byte
pub fn encode_raw(command: u8, channel: &str, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());

    buf.put_u8(command);
    buf.put_u64(payload.len() as u64);
    put_identifier(&mut buf, channel);
    buf.put_slice(payload);

    buf.freeze()
}

/// Encode a channel identifier into its fixed-size slot
///
/// Truncation never splits a character, so the slot always holds valid
/// UTF-8 of at most 128 bytes.
pub fn encode_identifier(channel: &str) -> [u8; IDENTIFIER_SIZE] {
    let mut slot = [0u8; IDENTIFIER_SIZE];
    let mut len = channel.len().min(IDENTIFIER_SIZE);
    while !channel.is_char_boundary(len) {
        len -= 1;
    }
    slot[..len].copy_from_slice(&channel.as_bytes()[..len]);
    slot
}

fn put_identifier(buf: &mut BytesMut, channel: &str) {
    buf.put_slice(&encode_identifier(channel));
}

/// Decode a channel identifier slot
///
/// Bytes that are not valid UTF-8 (e.g. a multi-byte character cut by
/// truncation) are replaced rather than rejected.
pub fn decode_identifier(slot: &[u8]) -> String {
    let slot = &slot[..slot.len().min(IDENTIFIER_SIZE)];
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());

    String::from_utf8_lossy(&slot[..end]).into_owned()
}

/// Decode a frame header starting at `offset`
///
/// Returns `None` when fewer than [`HEADER_SIZE`] bytes are available from
/// `offset`; this means "wait for more data", not a malformed frame.
pub fn decode_header(buf: &[u8], offset: usize) -> Option<FrameHeader> {
    let header = buf.get(offset..)?.get(..HEADER_SIZE)?;

    let command = header[0];

    let mut len_bytes = [0u8; PAYLOAD_LENGTH_SIZE];
    len_bytes.copy_from_slice(&header[COMMAND_SIZE..COMMAND_SIZE + PAYLOAD_LENGTH_SIZE]);
    let payload_len = u64::from_be_bytes(len_bytes);

    let channel = decode_identifier(&header[COMMAND_SIZE + PAYLOAD_LENGTH_SIZE..]);

    Some(FrameHeader {
        command,
        payload_len,
        channel,
    })
}
