//! Stream reassembly
//!
//! A byte stream delivers frames in arbitrary pieces: a read may end in the
//! middle of a header, in the middle of a payload, or contain several frames
//! at once. [`FrameDecoder`] accumulates reads and yields complete frames in
//! arrival order.
//!
//! ```text
//!   read 1         read 2                      read 3
//! [hdr|pay][hdr|pa][yload][hdr|payload][h][dr|payload]
//!  frame 1  `----frame 2---' frame 3    `--frame 4---'
//! ```
//!
//! Consumed bytes are split off the accumulator, so only the unconsumed tail
//! is retained between reads.

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;

use super::constants::HEADER_SIZE;
use super::frame::{decode_header, Frame};

/// Incremental frame decoder for one connection
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_payload_size: Option<u64>,
}

impl FrameDecoder {
    /// Create a decoder with no payload size limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with an optional payload size limit
    pub fn with_limit(max_payload_size: Option<u64>) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_payload_size,
        }
    }

    /// Append newly received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed as frames
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Extract the next complete frame
    ///
    /// Returns `Ok(None)` when the buffer holds only a partial header or a
    /// partial payload. Without a configured limit no frame is ever
    /// rejected, whatever its declared length; the decoder simply waits for
    /// the payload.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let header = match decode_header(&self.buffer, 0) {
            Some(header) => header,
            None => return Ok(None),
        };

        if let Some(max) = self.max_payload_size {
            if header.payload_len > max {
                return Err(ProtocolError::FrameTooLarge {
                    declared: header.payload_len,
                    max,
                });
            }
        }

        // Without a cap even an unaddressable length just waits
        let frame_len = match header.frame_len() {
            Some(len) if self.buffer.len() >= len => len,
            _ => return Ok(None),
        };

        let mut payload = self.buffer.split_to(frame_len).freeze();
        payload.advance(HEADER_SIZE);

        Ok(Some(Frame {
            command: header.command,
            channel: header.channel,
            payload,
        }))
    }

    /// Append bytes and drain every complete frame
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<Frame>, ProtocolError> {
        self.extend(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::Command;
    use crate::protocol::frame::{encode, encode_raw};
    use bytes::Bytes;

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::new(Command::Subscribe, "alerts", Bytes::new()),
            Frame::new(Command::Publish, "alerts", b"fire".to_vec()),
            Frame::new(Command::ExclusivePublish, "jobs", vec![7u8; 1000]),
            Frame::new(Command::Publish, "", Bytes::new()),
            Frame::new(Command::Publish, "x".repeat(128), b"edge".to_vec()),
        ]
    }

    fn concat(frames: &[Frame]) -> Vec<u8> {
        frames.iter().flat_map(|f| f.encode().to_vec()).collect()
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder
            .decode(&encode(Command::Publish, "alerts", b"fire"))
            .unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command(), Some(Command::Publish));
        assert_eq!(frames[0].channel, "alerts");
        assert_eq!(&frames[0].payload[..], b"fire");
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_coalesced_frames() {
        let expected = sample_frames();
        let mut decoder = FrameDecoder::new();

        let frames = decoder.decode(&concat(&expected)).unwrap();

        assert_eq!(frames, expected);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_one_byte_chunks() {
        let expected = sample_frames();
        let bytes = concat(&expected);
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();

        for byte in &bytes {
            frames.extend(decoder.decode(std::slice::from_ref(byte)).unwrap());
        }

        assert_eq!(frames, expected);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_arbitrary_chunk_boundaries() {
        let expected = sample_frames();
        let bytes = concat(&expected);

        for chunk_size in [2, 7, 136, 137, 138, 500, 1024, bytes.len()] {
            let mut decoder = FrameDecoder::new();
            let mut frames = Vec::new();

            for chunk in bytes.chunks(chunk_size) {
                frames.extend(decoder.decode(chunk).unwrap());
            }

            assert_eq!(frames, expected, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn test_partial_header_waits() {
        let bytes = encode(Command::Publish, "alerts", b"fire");
        let mut decoder = FrameDecoder::new();

        assert!(decoder.decode(&bytes[..HEADER_SIZE - 1]).unwrap().is_empty());
        assert_eq!(decoder.buffered(), HEADER_SIZE - 1);

        let frames = decoder.decode(&bytes[HEADER_SIZE - 1..]).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_partial_payload_waits() {
        let bytes = encode(Command::Publish, "alerts", b"fire");
        let mut decoder = FrameDecoder::new();

        // Full header, partial payload
        assert!(decoder.decode(&bytes[..HEADER_SIZE + 2]).unwrap().is_empty());
        assert_eq!(decoder.buffered(), HEADER_SIZE + 2);

        let frames = decoder.decode(&bytes[HEADER_SIZE + 2..]).unwrap();
        assert_eq!(&frames[0].payload[..], b"fire");
    }

    #[test]
    fn test_tail_retained() {
        let first = encode(Command::Publish, "a", b"1");
        let second = encode(Command::Publish, "b", b"22");

        let mut bytes = first.to_vec();
        bytes.extend_from_slice(&second[..10]);

        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.buffered(), 10);
    }

    #[test]
    fn test_unknown_command_consumed() {
        let mut bytes = encode_raw(b'?', "x", b"junk").to_vec();
        bytes.extend_from_slice(&encode(Command::Publish, "x", b"ok"));

        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode(&bytes).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command(), None);
        assert_eq!(&frames[1].payload[..], b"ok");
    }

    #[test]
    fn test_huge_declared_length_waits_without_limit() {
        let mut bytes = encode(Command::Publish, "x", b"").to_vec();
        bytes[1..9].copy_from_slice(&(1u64 << 40).to_be_bytes());

        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_unaddressable_length_waits_without_limit() {
        let mut bytes = encode(Command::Publish, "x", b"").to_vec();
        bytes[1..9].copy_from_slice(&u64::MAX.to_be_bytes());

        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(&bytes).unwrap().is_empty());
        assert_eq!(decoder.buffered(), HEADER_SIZE);
    }

    #[test]
    fn test_limit_rejects_oversized() {
        let bytes = encode(Command::Publish, "x", &[0u8; 64]);
        let mut decoder = FrameDecoder::with_limit(Some(16));

        // Rejected as soon as the header is visible
        let err = decoder.decode(&bytes[..HEADER_SIZE]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FrameTooLarge {
                declared: 64,
                max: 16
            }
        );
    }

    #[test]
    fn test_limit_accepts_at_boundary() {
        let bytes = encode(Command::Publish, "x", &[1u8; 16]);
        let mut decoder = FrameDecoder::with_limit(Some(16));

        assert_eq!(decoder.decode(&bytes).unwrap().len(), 1);
    }
}
